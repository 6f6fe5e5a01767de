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

//! Compiled decode and encode strategies.
//!
//! A strategy is built once per type per [`Api`](crate::Api) and is
//! immutable afterwards, so the same `Arc` is shared by every thread that
//! decodes or encodes that type. Strategies form a tree mirroring the type:
//! a `Vec<Option<T>>` decoder is a list node holding an optional node
//! holding the decoder of `T`.

mod compiler;
mod decoder;
mod encoder;
mod structs;

use std::any::type_name;
use std::any::Any;
use std::sync::Arc;
use std::sync::Weak;
use std::thread;

use once_cell::sync::OnceCell;

pub(crate) use encoder::NilAs;
pub(crate) use structs::FieldPath;
pub use structs::field_hash;
pub use structs::DispatchKind;
pub use structs::StructDecoder;
pub use structs::StructEncoder;

use crate::config::ApiInner;
use crate::error::Error;
use crate::error::Result;
use crate::extension::KeyOrder;
use crate::extension::ValueDecoder;
use crate::extension::ValueEncoder;
use crate::reflect::mismatch;
use crate::reflect::ArrayInfo;
use crate::reflect::CustomInfo;
use crate::reflect::FloatKind;
use crate::reflect::IntKind;
use crate::reflect::ListInfo;
use crate::reflect::MapInfo;
use crate::reflect::OptionalInfo;
use crate::reflect::PointerInfo;
use crate::reflect::TypeInfo;
use crate::tokenizer::Tokenizer;
use crate::writer::Writer;

// How often an unresolved placeholder yields before compiling on its own.
const FORWARD_SPINS: usize = 16;

/// A compiled decode strategy.
pub enum ValDecoder {
    Bool,
    Int(IntKind),
    Float(FloatKind),
    Char,
    String,
    /// A scalar carried inside a JSON string (`,string`).
    Quoted(Arc<ValDecoder>),
    Optional(OptionalInfo, Arc<ValDecoder>),
    Pointer(PointerInfo, Arc<ValDecoder>),
    Array(ArrayInfo, Arc<ValDecoder>),
    List(ListInfo, Arc<ValDecoder>),
    Map(MapInfo, Arc<ValDecoder>),
    Struct(StructDecoder),
    Dynamic,
    Any,
    Raw,
    Custom(&'static str, CustomInfo),
    Extension(Arc<dyn ValueDecoder>),
    /// Stands in for a type whose strategy is still being compiled.
    Forward(Arc<ForwardDecoder>),
    /// Fails with the stored error whenever it is used.
    LazyError(Error),
}

impl ValDecoder {
    /// Decodes the next value of `iter` into `dst`.
    ///
    /// `dst` must be a value of the type this strategy was compiled for.
    pub fn decode(&self, dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()> {
        match self {
            ValDecoder::Bool => decoder::decode_bool(dst, iter),
            ValDecoder::Int(kind) => decoder::decode_int(*kind, dst, iter),
            ValDecoder::Float(kind) => decoder::decode_float(*kind, dst, iter),
            ValDecoder::Char => decoder::decode_char(dst, iter),
            ValDecoder::String => decoder::decode_string(dst, iter),
            ValDecoder::Quoted(inner) => decoder::decode_quoted(inner, dst, iter),
            ValDecoder::Optional(info, inner) => decoder::decode_optional(info, inner, dst, iter),
            ValDecoder::Pointer(info, inner) => {
                let dst = (info.get_mut)(dst).ok_or_else(|| mismatch("Box"))?;
                inner.decode(dst, iter)
            }
            ValDecoder::Array(info, elem) => decoder::decode_array(info, elem, dst, iter),
            ValDecoder::List(info, elem) => decoder::decode_list(info, elem, dst, iter),
            ValDecoder::Map(info, value) => decoder::decode_map(info, value, dst, iter),
            ValDecoder::Struct(dec) => dec.decode(dst, iter),
            ValDecoder::Dynamic => decoder::decode_dynamic(dst, iter),
            ValDecoder::Any => decoder::decode_any(dst, iter),
            ValDecoder::Raw => decoder::decode_raw(dst, iter),
            ValDecoder::Custom(name, info) => decoder::decode_custom(name, info, dst, iter),
            ValDecoder::Extension(ext) => ext.decode(dst, iter),
            ValDecoder::Forward(fwd) => fwd.target()?.decode(dst, iter),
            ValDecoder::LazyError(err) => Err(iter.report(err.clone())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ValDecoder::Bool => "bool",
            ValDecoder::Int(_) => "int",
            ValDecoder::Float(_) => "float",
            ValDecoder::Char => "char",
            ValDecoder::String => "string",
            ValDecoder::Quoted(_) => "quoted",
            ValDecoder::Optional(..) => "optional",
            ValDecoder::Pointer(..) => "pointer",
            ValDecoder::Array(..) => "array",
            ValDecoder::List(..) => "list",
            ValDecoder::Map(..) => "map",
            ValDecoder::Struct(_) => "struct",
            ValDecoder::Dynamic => "dynamic",
            ValDecoder::Any => "any",
            ValDecoder::Raw => "raw",
            ValDecoder::Custom(..) => "custom",
            ValDecoder::Extension(_) => "extension",
            ValDecoder::Forward(_) => "forward",
            ValDecoder::LazyError(_) => "lazy_error",
        }
    }

    /// The struct decoder, when this strategy decodes a struct.
    pub fn as_struct(&self) -> Option<&StructDecoder> {
        match self {
            ValDecoder::Struct(dec) => Some(dec),
            _ => None,
        }
    }
}

/// A compiled encode strategy.
pub enum ValEncoder {
    Bool,
    Int(IntKind),
    Float(FloatKind),
    Char,
    String,
    Quoted(Arc<ValEncoder>),
    Optional(OptionalInfo, Arc<ValEncoder>, NilAs),
    Pointer(PointerInfo, Arc<ValEncoder>),
    Array(ArrayInfo, Arc<ValEncoder>),
    List(ListInfo, Arc<ValEncoder>),
    Map(MapInfo, Arc<ValEncoder>, Option<KeyOrder>),
    Struct(StructEncoder),
    Dynamic,
    Any,
    /// Raw bytes, checked against the grammar when the flag is set.
    Raw(bool),
    Custom(&'static str, CustomInfo, bool),
    Extension(Arc<dyn ValueEncoder>),
    Forward(Arc<ForwardEncoder>),
    LazyError(Error),
}

impl ValEncoder {
    /// Encodes `src` into `w`.
    pub fn encode(&self, src: &dyn Any, w: &mut Writer<'_>) -> Result<()> {
        match self {
            ValEncoder::Bool => {
                w.write_bool(*value::<bool>(src)?);
                Ok(())
            }
            ValEncoder::Int(kind) => encoder::encode_int(*kind, src, w),
            ValEncoder::Float(FloatKind::F32) => w.write_f32(*value::<f32>(src)?),
            ValEncoder::Float(FloatKind::F64) => w.write_f64(*value::<f64>(src)?),
            ValEncoder::Char => {
                let mut buf = [0; 4];
                w.write_string(value::<char>(src)?.encode_utf8(&mut buf));
                Ok(())
            }
            ValEncoder::String => {
                w.write_string(value::<String>(src)?);
                Ok(())
            }
            ValEncoder::Quoted(inner) => encoder::encode_quoted(inner, src, w),
            ValEncoder::Optional(info, inner, nil) => match (info.get)(src) {
                Some(v) => inner.encode(v, w),
                None => {
                    nil.write(w);
                    Ok(())
                }
            },
            ValEncoder::Pointer(info, inner) => {
                let src = (info.get)(src).ok_or_else(|| mismatch("Box"))?;
                inner.encode(src, w)
            }
            ValEncoder::Array(info, elem) => encoder::encode_array(info, elem, src, w),
            ValEncoder::List(info, elem) => encoder::encode_list(info, elem, src, w),
            ValEncoder::Map(info, value, order) => {
                encoder::encode_map(info, value, order.as_ref(), src, w)
            }
            ValEncoder::Struct(enc) => enc.encode(src, w),
            ValEncoder::Dynamic => w.write_value(value::<crate::Value>(src)?),
            ValEncoder::Any => value::<crate::Any>(src)?.write_to(w),
            ValEncoder::Raw(validate) => encoder::encode_raw(*validate, src, w),
            ValEncoder::Custom(name, info, validate) => {
                encoder::encode_custom(name, info, *validate, src, w)
            }
            ValEncoder::Extension(ext) => ext.encode(src, w),
            ValEncoder::Forward(fwd) => fwd.target()?.encode(src, w),
            ValEncoder::LazyError(err) => Err(w.report(err.clone())),
        }
    }

    /// Whether `src` counts as empty for `omitempty`.
    pub fn is_empty(&self, src: &dyn Any) -> bool {
        match self {
            ValEncoder::Bool => src.downcast_ref::<bool>().is_some_and(|v| !*v),
            ValEncoder::Int(kind) => encoder::int_is_zero(*kind, src),
            ValEncoder::Float(FloatKind::F32) => src.downcast_ref::<f32>().is_some_and(|v| *v == 0.0),
            ValEncoder::Float(FloatKind::F64) => src.downcast_ref::<f64>().is_some_and(|v| *v == 0.0),
            ValEncoder::Char => src.downcast_ref::<char>().is_some_and(|v| *v == '\0'),
            ValEncoder::String => src.downcast_ref::<String>().is_some_and(String::is_empty),
            ValEncoder::Quoted(inner) => inner.is_empty(src),
            ValEncoder::Optional(info, ..) => (info.get)(src).is_none(),
            ValEncoder::Pointer(..) => false,
            ValEncoder::Array(info, _) => info.len == 0,
            ValEncoder::List(info, _) => (info.len)(src) == 0,
            ValEncoder::Map(info, ..) => (info.len)(src) == 0,
            ValEncoder::Struct(_) => false,
            ValEncoder::Dynamic => src.downcast_ref::<crate::Value>().is_some_and(|v| v.is_null()),
            ValEncoder::Any => src.downcast_ref::<crate::Any>().is_some_and(|v| v.is_null()),
            ValEncoder::Raw(_) => src.downcast_ref::<crate::RawJson>().is_some_and(|v| v.is_empty()),
            ValEncoder::Custom(..) => false,
            ValEncoder::Extension(ext) => ext.is_empty(src),
            ValEncoder::Forward(fwd) => fwd.target().is_ok_and(|t| t.is_empty(src)),
            ValEncoder::LazyError(_) => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ValEncoder::Bool => "bool",
            ValEncoder::Int(_) => "int",
            ValEncoder::Float(_) => "float",
            ValEncoder::Char => "char",
            ValEncoder::String => "string",
            ValEncoder::Quoted(_) => "quoted",
            ValEncoder::Optional(..) => "optional",
            ValEncoder::Pointer(..) => "pointer",
            ValEncoder::Array(..) => "array",
            ValEncoder::List(..) => "list",
            ValEncoder::Map(..) => "map",
            ValEncoder::Struct(_) => "struct",
            ValEncoder::Dynamic => "dynamic",
            ValEncoder::Any => "any",
            ValEncoder::Raw(_) => "raw",
            ValEncoder::Custom(..) => "custom",
            ValEncoder::Extension(_) => "extension",
            ValEncoder::Forward(_) => "forward",
            ValEncoder::LazyError(_) => "lazy_error",
        }
    }
}

#[inline]
pub(crate) fn value<T: 'static>(src: &dyn Any) -> Result<&T> {
    src.downcast_ref::<T>()
        .ok_or_else(|| mismatch(type_name::<T>()))
}

#[inline]
pub(crate) fn slot<T: 'static>(dst: &mut dyn Any) -> Result<&mut T> {
    dst.downcast_mut::<T>()
        .ok_or_else(|| mismatch(type_name::<T>()))
}

/// Placeholder for a decoder that is being compiled further up the stack.
///
/// It is resolved as soon as the real decoder is published. If it is used
/// before that, or after the real decoder was dropped from the cache, it
/// compiles the type again through its [`Api`](crate::Api).
pub struct ForwardDecoder {
    ty: TypeInfo,
    target: OnceCell<Weak<ValDecoder>>,
    api: Weak<ApiInner>,
}

impl ForwardDecoder {
    pub(crate) fn new(ty: TypeInfo, api: Weak<ApiInner>) -> ForwardDecoder {
        ForwardDecoder {
            ty,
            target: OnceCell::new(),
            api,
        }
    }

    pub(crate) fn resolve(&self, dec: &Arc<ValDecoder>) {
        let _ = self.target.set(Arc::downgrade(dec));
    }

    fn target(&self) -> Result<Arc<ValDecoder>> {
        for _ in 0..FORWARD_SPINS {
            match self.target.get() {
                Some(weak) => match weak.upgrade() {
                    Some(dec) => return Ok(dec),
                    None => break,
                },
                None => thread::yield_now(),
            }
        }
        let api = self
            .api
            .upgrade()
            .ok_or_else(|| Error::Message(format!("decoder of {} outlived its api", self.ty.name)))?;
        Ok(api.decoder_for(&self.ty))
    }
}

/// Placeholder for an encoder that is being compiled further up the stack.
pub struct ForwardEncoder {
    ty: TypeInfo,
    target: OnceCell<Weak<ValEncoder>>,
    api: Weak<ApiInner>,
}

impl ForwardEncoder {
    pub(crate) fn new(ty: TypeInfo, api: Weak<ApiInner>) -> ForwardEncoder {
        ForwardEncoder {
            ty,
            target: OnceCell::new(),
            api,
        }
    }

    pub(crate) fn resolve(&self, enc: &Arc<ValEncoder>) {
        let _ = self.target.set(Arc::downgrade(enc));
    }

    fn target(&self) -> Result<Arc<ValEncoder>> {
        for _ in 0..FORWARD_SPINS {
            match self.target.get() {
                Some(weak) => match weak.upgrade() {
                    Some(enc) => return Ok(enc),
                    None => break,
                },
                None => thread::yield_now(),
            }
        }
        let api = self
            .api
            .upgrade()
            .ok_or_else(|| Error::Message(format!("encoder of {} outlived its api", self.ty.name)))?;
        Ok(api.encoder_for(&self.ty))
    }
}
