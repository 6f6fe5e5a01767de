// Copyright 2023 Datafuse Labs.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Hooks that let callers change how strategies are compiled.
//!
//! Extensions are registered on an [`Api`](crate::Api) and consulted in
//! registration order every time a strategy is compiled. When several
//! extensions answer the same question the later one wins: its override
//! replaces earlier overrides, its decorator wraps earlier decorators and
//! its key order replaces earlier ones.

use std::any::Any;
use std::cmp::Ordering;
use std::sync::Arc;

use crate::codec::FieldPath;
use crate::codec::ValDecoder;
use crate::codec::ValEncoder;
use crate::error::Result;
use crate::reflect::TypeInfo;
use crate::tokenizer::Tokenizer;
use crate::writer::Writer;

/// Comparator for map keys as they appear on the wire.
pub type KeyOrder = Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>;

/// A decode routine supplied from outside the compiler.
pub trait ValueDecoder: Send + Sync {
    fn decode(&self, dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()>;
}

/// An encode routine supplied from outside the compiler.
pub trait ValueEncoder: Send + Sync {
    fn encode(&self, src: &dyn Any, w: &mut Writer<'_>) -> Result<()>;

    /// Whether `src` is left out by `omitempty`.
    fn is_empty(&self, _src: &dyn Any) -> bool {
        false
    }
}

struct FnDecoder<F>(F);

impl<F> ValueDecoder for FnDecoder<F>
where F: Fn(&mut dyn Any, &mut Tokenizer<'_>) -> Result<()> + Send + Sync
{
    fn decode(&self, dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()> {
        (self.0)(dst, iter)
    }
}

struct FnEncoder<F>(F);

impl<F> ValueEncoder for FnEncoder<F>
where F: Fn(&dyn Any, &mut Writer<'_>) -> Result<()> + Send + Sync
{
    fn encode(&self, src: &dyn Any, w: &mut Writer<'_>) -> Result<()> {
        (self.0)(src, w)
    }
}

/// Wraps a closure as a [`ValueDecoder`].
pub fn decoder_fn<F>(f: F) -> Arc<dyn ValueDecoder>
where F: Fn(&mut dyn Any, &mut Tokenizer<'_>) -> Result<()> + Send + Sync + 'static {
    Arc::new(FnDecoder(f))
}

/// Wraps a closure as a [`ValueEncoder`].
pub fn encoder_fn<F>(f: F) -> Arc<dyn ValueEncoder>
where F: Fn(&dyn Any, &mut Writer<'_>) -> Result<()> + Send + Sync + 'static {
    Arc::new(FnEncoder(f))
}

/// The fields of a struct as the compiler is about to bind them.
///
/// Bindings are in declared order, with embedded structs already flattened
/// and name conflicts already resolved.
pub struct StructDescriptor {
    pub ty: TypeInfo,
    pub bindings: Vec<Binding>,
}

impl StructDescriptor {
    /// Finds a binding by its Rust field path, e.g. `"name"` or `"base.id"`.
    pub fn binding_mut(&mut self, field: &str) -> Option<&mut Binding> {
        self.bindings.iter_mut().find(|b| b.field == field)
    }

    /// Drops the binding for `field`, if any.
    pub fn remove(&mut self, field: &str) {
        self.bindings.retain(|b| b.field != field);
    }
}

/// How one struct field is bound to the wire.
pub struct Binding {
    /// Rust field path, dotted through embedded structs.
    pub field: String,
    /// Names accepted when decoding. Empty means the field is never decoded.
    pub from_names: Vec<String>,
    /// The first name is used when encoding. Empty means never encoded.
    pub to_names: Vec<String>,
    pub omit_empty: bool,
    /// Set by the `,string` tag option.
    pub quoted: bool,
    pub decoder: Option<Arc<dyn ValueDecoder>>,
    pub encoder: Option<Arc<dyn ValueEncoder>>,
    /// The field's type.
    pub ty: TypeInfo,
    pub(crate) path: FieldPath,
}

impl Binding {
    /// Sets a single name used both ways.
    pub fn rename(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.from_names = vec![name.clone()];
        self.to_names = vec![name];
    }
}

/// A set of hooks into strategy compilation. Every hook has a no-op default.
pub trait Extension: Send + Sync {
    /// Edits the bindings of a struct before its strategies are built.
    fn update_struct_descriptor(&self, _desc: &mut StructDescriptor) {}

    /// Replaces the built-in decoder of a type.
    fn create_decoder(&self, _ty: &TypeInfo) -> Option<Arc<dyn ValueDecoder>> {
        None
    }

    /// Replaces the built-in encoder of a type.
    fn create_encoder(&self, _ty: &TypeInfo) -> Option<Arc<dyn ValueEncoder>> {
        None
    }

    /// Wraps the decoder built for a type.
    fn decorate_decoder(&self, _ty: &TypeInfo, dec: Arc<ValDecoder>) -> Arc<ValDecoder> {
        dec
    }

    /// Wraps the encoder built for a type.
    fn decorate_encoder(&self, _ty: &TypeInfo, enc: Arc<ValEncoder>) -> Arc<ValEncoder> {
        enc
    }

    /// Orders the entries of a map type when encoding.
    fn map_key_order(&self, _ty: &TypeInfo) -> Option<KeyOrder> {
        None
    }
}
