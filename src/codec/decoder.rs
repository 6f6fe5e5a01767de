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

use super::slot;
use super::ValDecoder;
use crate::error::Error;
use crate::error::Result;
use crate::raw::RawJson;
use crate::reflect::mismatch;
use crate::reflect::ArrayInfo;
use crate::reflect::CustomInfo;
use crate::reflect::FloatKind;
use crate::reflect::IntKind;
use crate::reflect::ListInfo;
use crate::reflect::MapInfo;
use crate::reflect::OptionalInfo;
use crate::tokenizer::Tokenizer;
use crate::tokenizer::ValueType;
use crate::value::Value;

/// Fails with a type mismatch unless the next value is of type `expected`.
pub(crate) fn expect_type(iter: &mut Tokenizer<'_>, expected: ValueType) -> Result<()> {
    let found = iter.what_is_next()?;
    if found == expected {
        return Ok(());
    }
    Err(iter.report(Error::TypeMismatch {
        expected: expected.as_str(),
        found: found.as_str(),
    }))
}

// Scalars leave the destination untouched on `null`.

pub(super) fn decode_bool(dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()> {
    if iter.read_nil()? {
        return Ok(());
    }
    *slot::<bool>(dst)? = iter.read_bool()?;
    Ok(())
}

pub(super) fn decode_int(kind: IntKind, dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()> {
    if iter.read_nil()? {
        return Ok(());
    }
    match kind {
        IntKind::I8 => *slot::<i8>(dst)? = iter.read_i8()?,
        IntKind::I16 => *slot::<i16>(dst)? = iter.read_i16()?,
        IntKind::I32 => *slot::<i32>(dst)? = iter.read_i32()?,
        IntKind::I64 => *slot::<i64>(dst)? = iter.read_i64()?,
        IntKind::I128 => *slot::<i128>(dst)? = iter.read_i128()?,
        IntKind::Isize => *slot::<isize>(dst)? = iter.read_isize()?,
        IntKind::U8 => *slot::<u8>(dst)? = iter.read_u8()?,
        IntKind::U16 => *slot::<u16>(dst)? = iter.read_u16()?,
        IntKind::U32 => *slot::<u32>(dst)? = iter.read_u32()?,
        IntKind::U64 => *slot::<u64>(dst)? = iter.read_u64()?,
        IntKind::U128 => *slot::<u128>(dst)? = iter.read_u128()?,
        IntKind::Usize => *slot::<usize>(dst)? = iter.read_usize()?,
    }
    Ok(())
}

pub(super) fn decode_float(kind: FloatKind, dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()> {
    if iter.read_nil()? {
        return Ok(());
    }
    match kind {
        FloatKind::F32 => *slot::<f32>(dst)? = iter.read_f32()?,
        FloatKind::F64 => *slot::<f64>(dst)? = iter.read_f64()?,
    }
    Ok(())
}

pub(super) fn decode_char(dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()> {
    if iter.read_nil()? {
        return Ok(());
    }
    let dst = slot::<char>(dst)?;
    let c = {
        let s = iter.read_str()?;
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(c),
            _ => Err(Error::UnsupportedValue(format!("{:?} is not a single character", s))),
        }
    };
    *dst = c.map_err(|e| iter.report(e))?;
    Ok(())
}

pub(super) fn decode_string(dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()> {
    if iter.read_nil()? {
        return Ok(());
    }
    let dst = slot::<String>(dst)?;
    let s = iter.read_str()?;
    dst.clear();
    dst.push_str(s);
    Ok(())
}

/// Decodes a value written inside a JSON string, as the `,string` tag asks.
pub(super) fn decode_quoted(inner: &ValDecoder, dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()> {
    if iter.read_nil()? {
        return Ok(());
    }
    let text = iter.read_string()?;
    let mut sub = Tokenizer::new(text.as_bytes()).with_options(*iter.options());
    inner
        .decode(dst, &mut sub)
        .and_then(|_| sub.expect_end())
        .map_err(|e| {
            iter.report(Error::UnsupportedValue(format!(
                "invalid use of ,string tag, trying to decode {:?}: {}",
                text, e
            )))
        })
}

pub(super) fn decode_optional(
    info: &OptionalInfo,
    inner: &ValDecoder,
    dst: &mut dyn Any,
    iter: &mut Tokenizer<'_>,
) -> Result<()> {
    if iter.read_nil()? {
        (info.set_none)(dst);
        return Ok(());
    }
    let dst = (info.get_or_insert)(dst).ok_or_else(|| mismatch("Option"))?;
    inner.decode(dst, iter)
}

/// Fills a fixed size array. Extra elements are skipped and missing ones
/// are reset to their default.
pub(super) fn decode_array(
    info: &ArrayInfo,
    elem: &ValDecoder,
    dst: &mut dyn Any,
    iter: &mut Tokenizer<'_>,
) -> Result<()> {
    if iter.read_nil()? {
        return Ok(());
    }
    expect_type(iter, ValueType::Array)?;
    let mut idx = 0;
    if iter.read_array_begin()? {
        loop {
            match (info.get_mut)(dst, idx) {
                Some(slot) => elem.decode(slot, iter)?,
                None => iter.skip()?,
            }
            idx += 1;
            if !iter.read_array_more()? {
                break;
            }
        }
    }
    if idx < info.len {
        (info.reset_from)(dst, idx);
    }
    Ok(())
}

pub(super) fn decode_list(
    info: &ListInfo,
    elem: &ValDecoder,
    dst: &mut dyn Any,
    iter: &mut Tokenizer<'_>,
) -> Result<()> {
    if iter.read_nil()? {
        (info.clear)(dst);
        return Ok(());
    }
    expect_type(iter, ValueType::Array)?;
    (info.clear)(dst);
    if !iter.read_array_begin()? {
        return Ok(());
    }
    loop {
        let slot = (info.push)(dst).ok_or_else(|| mismatch("list"))?;
        elem.decode(slot, iter)?;
        if !iter.read_array_more()? {
            return Ok(());
        }
    }
}

/// Merges the members of an object into a map.
pub(super) fn decode_map(
    info: &MapInfo,
    value: &ValDecoder,
    dst: &mut dyn Any,
    iter: &mut Tokenizer<'_>,
) -> Result<()> {
    if iter.read_nil()? {
        (info.clear)(dst);
        return Ok(());
    }
    expect_type(iter, ValueType::Object)?;
    if !iter.read_object_begin()? {
        return Ok(());
    }
    loop {
        let slot = {
            let key = iter.read_field_name()?;
            (info.entry)(dst, key)
        };
        let slot = slot.map_err(|e| iter.report(e))?;
        value.decode(slot, iter)?;
        if !iter.read_object_more()? {
            return Ok(());
        }
    }
}

pub(super) fn decode_dynamic(dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()> {
    *slot::<Value>(dst)? = iter.read_value()?;
    Ok(())
}

pub(super) fn decode_any(dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()> {
    *slot::<crate::Any>(dst)? = iter.read_any()?;
    Ok(())
}

pub(super) fn decode_raw(dst: &mut dyn Any, iter: &mut Tokenizer<'_>) -> Result<()> {
    let dst = slot::<RawJson>(dst)?;
    let bytes = iter.skip_and_return_bytes()?;
    *dst = RawJson::from(bytes.into_owned());
    Ok(())
}

/// Hands the raw text of the next value to the type's own `unmarshal_json`.
pub(super) fn decode_custom(
    name: &'static str,
    info: &CustomInfo,
    dst: &mut dyn Any,
    iter: &mut Tokenizer<'_>,
) -> Result<()> {
    let res = {
        let bytes = iter.skip_and_return_bytes()?;
        (info.unmarshal)(dst, &bytes)
    };
    match res {
        Some(Ok(())) => Ok(()),
        Some(Err(e)) => Err(iter.report(Error::Unmarshal {
            type_name: name,
            message: e.to_string(),
        })),
        None => Err(mismatch(name)),
    }
}
