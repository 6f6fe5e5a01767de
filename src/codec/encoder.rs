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

use std::any::Any;

use super::value;
use super::ValEncoder;
use crate::error::Error;
use crate::error::Result;
use crate::extension::KeyOrder;
use crate::raw::RawJson;
use crate::reflect::mismatch;
use crate::reflect::ArrayInfo;
use crate::reflect::CustomInfo;
use crate::reflect::IntKind;
use crate::reflect::ListInfo;
use crate::reflect::MapInfo;
use crate::tokenizer::Tokenizer;
use crate::writer::Writer;
use crate::writer::WriterOptions;

/// What an empty `Option` of a collection is written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NilAs {
    Null,
    EmptyArray,
    EmptyObject,
}

impl NilAs {
    pub(crate) fn write(&self, w: &mut Writer<'_>) {
        match self {
            NilAs::Null => w.write_null(),
            NilAs::EmptyArray => w.write_empty_array(),
            NilAs::EmptyObject => w.write_empty_object(),
        }
    }
}

pub(super) fn encode_int(kind: IntKind, src: &dyn Any, w: &mut Writer<'_>) -> Result<()> {
    match kind {
        IntKind::I8 => w.write_i8(*value::<i8>(src)?),
        IntKind::I16 => w.write_i16(*value::<i16>(src)?),
        IntKind::I32 => w.write_i32(*value::<i32>(src)?),
        IntKind::I64 => w.write_i64(*value::<i64>(src)?),
        IntKind::I128 => w.write_i128(*value::<i128>(src)?),
        IntKind::Isize => w.write_i64(*value::<isize>(src)? as i64),
        IntKind::U8 => w.write_u8(*value::<u8>(src)?),
        IntKind::U16 => w.write_u16(*value::<u16>(src)?),
        IntKind::U32 => w.write_u32(*value::<u32>(src)?),
        IntKind::U64 => w.write_u64(*value::<u64>(src)?),
        IntKind::U128 => w.write_u128(*value::<u128>(src)?),
        IntKind::Usize => w.write_u64(*value::<usize>(src)? as u64),
    }
    Ok(())
}

pub(super) fn int_is_zero(kind: IntKind, src: &dyn Any) -> bool {
    fn zero<T: PartialEq + Default + 'static>(src: &dyn Any) -> bool {
        src.downcast_ref::<T>().is_some_and(|v| *v == T::default())
    }
    match kind {
        IntKind::I8 => zero::<i8>(src),
        IntKind::I16 => zero::<i16>(src),
        IntKind::I32 => zero::<i32>(src),
        IntKind::I64 => zero::<i64>(src),
        IntKind::I128 => zero::<i128>(src),
        IntKind::Isize => zero::<isize>(src),
        IntKind::U8 => zero::<u8>(src),
        IntKind::U16 => zero::<u16>(src),
        IntKind::U32 => zero::<u32>(src),
        IntKind::U64 => zero::<u64>(src),
        IntKind::U128 => zero::<u128>(src),
        IntKind::Usize => zero::<usize>(src),
    }
}

/// Writes the compact encoding of `src` as a JSON string.
pub(super) fn encode_quoted(inner: &ValEncoder, src: &dyn Any, w: &mut Writer<'_>) -> Result<()> {
    let options = WriterOptions {
        indent: 0,
        ..*w.options()
    };
    let mut sub = Writer::new().with_options(options);
    inner.encode(src, &mut sub).map_err(|e| w.report(e))?;
    let text = sub.into_inner()?;
    w.write_string(&String::from_utf8_lossy(&text));
    Ok(())
}

pub(super) fn encode_array(info: &ArrayInfo, elem: &ValEncoder, src: &dyn Any, w: &mut Writer<'_>) -> Result<()> {
    if info.len == 0 {
        w.write_empty_array();
        return Ok(());
    }
    w.enter()?;
    w.write_array_start();
    for idx in 0..info.len {
        if idx > 0 {
            w.write_more();
        }
        let item = (info.get)(src, idx).ok_or_else(|| mismatch("array"))?;
        elem.encode(item, w)?;
    }
    w.write_array_end();
    w.leave();
    Ok(())
}

pub(super) fn encode_list(info: &ListInfo, elem: &ValEncoder, src: &dyn Any, w: &mut Writer<'_>) -> Result<()> {
    let len = (info.len)(src);
    if len == 0 {
        w.write_empty_array();
        return Ok(());
    }
    w.enter()?;
    w.write_array_start();
    for idx in 0..len {
        if idx > 0 {
            w.write_more();
        }
        let item = (info.get)(src, idx).ok_or_else(|| mismatch("list"))?;
        elem.encode(item, w)?;
    }
    w.write_array_end();
    w.leave();
    Ok(())
}

/// Writes map entries, sorted by `order` when one is set.
pub(super) fn encode_map(
    info: &MapInfo,
    value: &ValEncoder,
    order: Option<&KeyOrder>,
    src: &dyn Any,
    w: &mut Writer<'_>,
) -> Result<()> {
    let mut entries = (info.entries)(src);
    if entries.is_empty() {
        w.write_empty_object();
        return Ok(());
    }
    if let Some(order) = order {
        entries.sort_by(|a, b| order(&*a.0, &*b.0));
    }
    w.enter()?;
    w.write_object_start();
    for (idx, (key, item)) in entries.into_iter().enumerate() {
        if idx > 0 {
            w.write_more();
        }
        w.write_object_field(&key);
        value.encode(item, w)?;
    }
    w.write_object_end();
    w.leave();
    Ok(())
}

/// Checks that `bytes` hold exactly one JSON value.
fn validate_json(bytes: &[u8]) -> Result<()> {
    let mut iter = Tokenizer::new(bytes);
    iter.validate()?;
    iter.expect_end()
}

pub(super) fn encode_raw(validate: bool, src: &dyn Any, w: &mut Writer<'_>) -> Result<()> {
    let raw = value::<RawJson>(src)?;
    if raw.is_empty() {
        w.write_null();
        return Ok(());
    }
    if validate {
        validate_json(raw.as_bytes()).map_err(|e| {
            w.report(Error::Marshal {
                type_name: "RawJson",
                message: e.to_string(),
            })
        })?;
    }
    w.write_raw(raw.as_bytes());
    Ok(())
}

/// Writes the output of the type's own `marshal_json`.
pub(super) fn encode_custom(
    name: &'static str,
    info: &CustomInfo,
    validate: bool,
    src: &dyn Any,
    w: &mut Writer<'_>,
) -> Result<()> {
    let bytes = match (info.marshal)(src) {
        Some(Ok(bytes)) => bytes,
        Some(Err(e)) => {
            return Err(w.report(Error::Marshal {
                type_name: name,
                message: e.to_string(),
            }));
        }
        None => return Err(mismatch(name)),
    };
    if validate {
        validate_json(&bytes).map_err(|e| {
            w.report(Error::Marshal {
                type_name: name,
                message: e.to_string(),
            })
        })?;
    }
    w.write_raw(&bytes);
    Ok(())
}
