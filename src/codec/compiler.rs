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

use std::any::TypeId;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use tracing::trace;
use tracing::warn;

use super::encoder::NilAs;
use super::structs::StructDecoder;
use super::structs::StructEncoder;
use super::ForwardDecoder;
use super::ForwardEncoder;
use super::ValDecoder;
use super::ValEncoder;
use crate::config::ApiInner;
use crate::config::Config;
use crate::error::Error;
use crate::extension::Extension;
use crate::extension::KeyOrder;
use crate::reflect::TypeInfo;
use crate::reflect::TypeKind;

/// Builds the strategies for one top level request.
///
/// Types reached again while their own strategy is still being built get a
/// forward placeholder, which is resolved once the real strategy has been
/// published to the cache.
pub(crate) struct Compiler<'a> {
    api: &'a ApiInner,
    extensions: Vec<Arc<dyn Extension>>,
    pending_decoders: HashMap<TypeId, Arc<ForwardDecoder>>,
    pending_encoders: HashMap<TypeId, Arc<ForwardEncoder>>,
}

impl<'a> Compiler<'a> {
    pub(crate) fn new(api: &'a ApiInner) -> Compiler<'a> {
        Compiler {
            api,
            extensions: api.extensions.read().clone(),
            pending_decoders: HashMap::new(),
            pending_encoders: HashMap::new(),
        }
    }

    pub(crate) fn config(&self) -> &Config {
        &self.api.config
    }

    pub(crate) fn extensions(&self) -> &[Arc<dyn Extension>] {
        &self.extensions
    }

    pub(crate) fn decoder(&mut self, ty: &TypeInfo) -> Arc<ValDecoder> {
        if let Some(dec) = self.api.decoders.read().get(&ty.id) {
            return dec.clone();
        }
        if let Some(fwd) = self.pending_decoders.get(&ty.id) {
            return Arc::new(ValDecoder::Forward(fwd.clone()));
        }
        let fwd = Arc::new(ForwardDecoder::new(ty.clone(), self.api.this.clone()));
        self.pending_decoders.insert(ty.id, fwd.clone());

        let built = self.build_decoder(ty);
        let built = self
            .extensions
            .iter()
            .fold(built, |dec, ext| ext.decorate_decoder(ty, dec));
        self.pending_decoders.remove(&ty.id);

        // a concurrent compilation may have won the race; everybody uses its result
        let published = self
            .api
            .decoders
            .write()
            .entry(ty.id)
            .or_insert(built)
            .clone();
        fwd.resolve(&published);
        debug!(ty = ty.name, kind = published.kind(), "compiled decoder");
        published
    }

    pub(crate) fn encoder(&mut self, ty: &TypeInfo) -> Arc<ValEncoder> {
        if let Some(enc) = self.api.encoders.read().get(&ty.id) {
            return enc.clone();
        }
        if let Some(fwd) = self.pending_encoders.get(&ty.id) {
            return Arc::new(ValEncoder::Forward(fwd.clone()));
        }
        let fwd = Arc::new(ForwardEncoder::new(ty.clone(), self.api.this.clone()));
        self.pending_encoders.insert(ty.id, fwd.clone());

        let built = self.build_encoder(ty);
        let built = self
            .extensions
            .iter()
            .fold(built, |enc, ext| ext.decorate_encoder(ty, enc));
        self.pending_encoders.remove(&ty.id);

        let published = self
            .api
            .encoders
            .write()
            .entry(ty.id)
            .or_insert(built)
            .clone();
        fwd.resolve(&published);
        debug!(ty = ty.name, kind = published.kind(), "compiled encoder");
        published
    }

    fn build_decoder(&mut self, ty: &TypeInfo) -> Arc<ValDecoder> {
        let created = self
            .extensions
            .iter()
            .filter_map(|ext| ext.create_decoder(ty))
            .last();
        if let Some(dec) = created {
            return Arc::new(ValDecoder::Extension(dec));
        }
        let dec = match &ty.kind {
            TypeKind::Bool => ValDecoder::Bool,
            TypeKind::Int(kind) => ValDecoder::Int(*kind),
            TypeKind::Float(kind) => ValDecoder::Float(*kind),
            TypeKind::Char => ValDecoder::Char,
            TypeKind::String => ValDecoder::String,
            TypeKind::Optional(info) => ValDecoder::Optional(*info, self.decoder(&(info.inner)())),
            TypeKind::Pointer(info) => ValDecoder::Pointer(*info, self.decoder(&(info.inner)())),
            TypeKind::Array(info) => ValDecoder::Array(*info, self.decoder(&(info.elem)())),
            TypeKind::List(info) => ValDecoder::List(*info, self.decoder(&(info.elem)())),
            TypeKind::Map(info) => ValDecoder::Map(*info, self.decoder(&(info.value)())),
            TypeKind::Struct(info) => ValDecoder::Struct(StructDecoder::build(self, ty, info)),
            TypeKind::Dynamic => ValDecoder::Dynamic,
            TypeKind::Any => ValDecoder::Any,
            TypeKind::Raw => ValDecoder::Raw,
            TypeKind::Custom(info) => ValDecoder::Custom(ty.short_name(), *info),
            TypeKind::Unsupported => ValDecoder::LazyError(unsupported(ty)),
        };
        Arc::new(dec)
    }

    fn build_encoder(&mut self, ty: &TypeInfo) -> Arc<ValEncoder> {
        let created = self
            .extensions
            .iter()
            .filter_map(|ext| ext.create_encoder(ty))
            .last();
        if let Some(enc) = created {
            return Arc::new(ValEncoder::Extension(enc));
        }
        let validate = self.config().validate_raw_json;
        let enc = match &ty.kind {
            TypeKind::Bool => ValEncoder::Bool,
            TypeKind::Int(kind) => ValEncoder::Int(*kind),
            TypeKind::Float(kind) => ValEncoder::Float(*kind),
            TypeKind::Char => ValEncoder::Char,
            TypeKind::String => ValEncoder::String,
            TypeKind::Optional(info) => {
                let inner_ty = (info.inner)();
                let nil = self.nil_for(&inner_ty);
                ValEncoder::Optional(*info, self.encoder(&inner_ty), nil)
            }
            TypeKind::Pointer(info) => ValEncoder::Pointer(*info, self.encoder(&(info.inner)())),
            TypeKind::Array(info) => ValEncoder::Array(*info, self.encoder(&(info.elem)())),
            TypeKind::List(info) => ValEncoder::List(*info, self.encoder(&(info.elem)())),
            TypeKind::Map(info) => {
                let order = self.key_order(ty);
                ValEncoder::Map(*info, self.encoder(&(info.value)()), order)
            }
            TypeKind::Struct(info) => ValEncoder::Struct(StructEncoder::build(self, ty, info)),
            TypeKind::Dynamic => ValEncoder::Dynamic,
            TypeKind::Any => ValEncoder::Any,
            TypeKind::Raw => ValEncoder::Raw(validate),
            TypeKind::Custom(info) => ValEncoder::Custom(ty.short_name(), *info, validate),
            TypeKind::Unsupported => ValEncoder::LazyError(unsupported(ty)),
        };
        Arc::new(enc)
    }

    /// What `None` is written as for an `Option` around `inner`.
    fn nil_for(&self, inner: &TypeInfo) -> NilAs {
        if !self.config().nil_safe_collections {
            return NilAs::Null;
        }
        match inner.kind {
            TypeKind::List(_) | TypeKind::Array(_) => NilAs::EmptyArray,
            TypeKind::Map(_) => NilAs::EmptyObject,
            _ => NilAs::Null,
        }
    }

    fn key_order(&self, ty: &TypeInfo) -> Option<KeyOrder> {
        let custom = self
            .extensions
            .iter()
            .filter_map(|ext| ext.map_key_order(ty))
            .last();
        match custom {
            Some(order) => Some(order),
            None if self.config().sort_map_keys => Some(Arc::new(byte_order)),
            None => None,
        }
    }
}

fn byte_order(a: &str, b: &str) -> Ordering {
    a.cmp(b)
}

fn unsupported(ty: &TypeInfo) -> Error {
    warn!(ty = ty.name, "unsupported type compiled into a lazy error");
    Error::UnsupportedType(ty.name.to_string())
}

impl ApiInner {
    /// The published decoder of `ty`, compiling it on a cache miss.
    pub(crate) fn decoder_for(&self, ty: &TypeInfo) -> Arc<ValDecoder> {
        if let Some(dec) = self.decoders.read().get(&ty.id) {
            trace!(ty = ty.name, "decoder cache hit");
            return dec.clone();
        }
        Compiler::new(self).decoder(ty)
    }

    /// The published encoder of `ty`, compiling it on a cache miss.
    pub(crate) fn encoder_for(&self, ty: &TypeInfo) -> Arc<ValEncoder> {
        if let Some(enc) = self.encoders.read().get(&ty.id) {
            trace!(ty = ty.name, "encoder cache hit");
            return enc.clone();
        }
        Compiler::new(self).encoder(ty)
    }
}
