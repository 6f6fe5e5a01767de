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

use std::any::type_name;
use std::any::Any;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::hash::BuildHasher;
use std::hash::Hash;

use super::mismatch;
use super::ArrayInfo;
use super::FloatKind;
use super::IntKind;
use super::ListInfo;
use super::MapInfo;
use super::OptionalInfo;
use super::PointerInfo;
use super::Reflect;
use super::TypeInfo;
use super::TypeKind;
use crate::any::Any as LazyAny;
use crate::error::Error;
use crate::error::Result;
use crate::raw::RawJson;
use crate::value::Value;

macro_rules! impl_reflect {
    ($($ty:ty => $kind:expr),* $(,)?) => {
        $(
            impl Reflect for $ty {
                fn type_info() -> TypeInfo {
                    TypeInfo::new::<$ty>($kind)
                }
            }
        )*
    };
}

impl_reflect!(
    bool => TypeKind::Bool,
    i8 => TypeKind::Int(IntKind::I8),
    i16 => TypeKind::Int(IntKind::I16),
    i32 => TypeKind::Int(IntKind::I32),
    i64 => TypeKind::Int(IntKind::I64),
    i128 => TypeKind::Int(IntKind::I128),
    isize => TypeKind::Int(IntKind::Isize),
    u8 => TypeKind::Int(IntKind::U8),
    u16 => TypeKind::Int(IntKind::U16),
    u32 => TypeKind::Int(IntKind::U32),
    u64 => TypeKind::Int(IntKind::U64),
    u128 => TypeKind::Int(IntKind::U128),
    usize => TypeKind::Int(IntKind::Usize),
    f32 => TypeKind::Float(FloatKind::F32),
    f64 => TypeKind::Float(FloatKind::F64),
    char => TypeKind::Char,
    String => TypeKind::String,
    Value => TypeKind::Dynamic,
    LazyAny => TypeKind::Any,
    RawJson => TypeKind::Raw,
);

// Option<T>

impl<T: Reflect + Default> Reflect for Option<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Self>(TypeKind::Optional(OptionalInfo {
            inner: T::type_info,
            get: option_get::<T>,
            get_or_insert: option_get_or_insert::<T>,
            set_none: option_set_none::<T>,
        }))
    }
}

fn option_get<T: 'static>(v: &dyn Any) -> Option<&dyn Any> {
    v.downcast_ref::<Option<T>>()?
        .as_ref()
        .map(|v| v as &dyn Any)
}

fn option_get_or_insert<T: Default + 'static>(v: &mut dyn Any) -> Option<&mut dyn Any> {
    let v = v.downcast_mut::<Option<T>>()?;
    Some(v.get_or_insert_with(T::default) as &mut dyn Any)
}

fn option_set_none<T: 'static>(v: &mut dyn Any) {
    if let Some(v) = v.downcast_mut::<Option<T>>() {
        *v = None;
    }
}

// Box<T>

impl<T: Reflect> Reflect for Box<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Self>(TypeKind::Pointer(PointerInfo {
            inner: T::type_info,
            get: box_get::<T>,
            get_mut: box_get_mut::<T>,
        }))
    }
}

fn box_get<T: 'static>(v: &dyn Any) -> Option<&dyn Any> {
    v.downcast_ref::<Box<T>>().map(|v| &**v as &dyn Any)
}

fn box_get_mut<T: 'static>(v: &mut dyn Any) -> Option<&mut dyn Any> {
    v.downcast_mut::<Box<T>>().map(|v| &mut **v as &mut dyn Any)
}

// [T; N]

impl<T: Reflect + Default, const N: usize> Reflect for [T; N] {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Self>(TypeKind::Array(ArrayInfo {
            elem: T::type_info,
            len: N,
            get: array_get::<T, N>,
            get_mut: array_get_mut::<T, N>,
            reset_from: array_reset_from::<T, N>,
        }))
    }
}

fn array_get<T: 'static, const N: usize>(v: &dyn Any, idx: usize) -> Option<&dyn Any> {
    v.downcast_ref::<[T; N]>()?
        .get(idx)
        .map(|v| v as &dyn Any)
}

fn array_get_mut<T: 'static, const N: usize>(v: &mut dyn Any, idx: usize) -> Option<&mut dyn Any> {
    v.downcast_mut::<[T; N]>()?
        .get_mut(idx)
        .map(|v| v as &mut dyn Any)
}

fn array_reset_from<T: Default + 'static, const N: usize>(v: &mut dyn Any, from: usize) {
    if let Some(v) = v.downcast_mut::<[T; N]>() {
        for elem in v.iter_mut().skip(from) {
            *elem = T::default();
        }
    }
}

// Vec<T> and VecDeque<T>

/// Sequences that decode by appending default elements.
trait Sequence: Default + 'static {
    type Elem: Default + 'static;
    fn length(&self) -> usize;
    fn at(&self, idx: usize) -> Option<&Self::Elem>;
    fn clear_all(&mut self);
    fn push_default(&mut self) -> Option<&mut Self::Elem>;
}

impl<T: Default + 'static> Sequence for Vec<T> {
    type Elem = T;

    fn length(&self) -> usize {
        self.len()
    }

    fn at(&self, idx: usize) -> Option<&T> {
        self.get(idx)
    }

    fn clear_all(&mut self) {
        self.clear();
    }

    fn push_default(&mut self) -> Option<&mut T> {
        self.push(T::default());
        self.last_mut()
    }
}

impl<T: Default + 'static> Sequence for VecDeque<T> {
    type Elem = T;

    fn length(&self) -> usize {
        self.len()
    }

    fn at(&self, idx: usize) -> Option<&T> {
        self.get(idx)
    }

    fn clear_all(&mut self) {
        self.clear();
    }

    fn push_default(&mut self) -> Option<&mut T> {
        self.push_back(T::default());
        self.back_mut()
    }
}

fn list_info<L: Sequence>(elem: fn() -> TypeInfo) -> ListInfo {
    ListInfo {
        elem,
        len: list_len::<L>,
        get: list_get::<L>,
        clear: list_clear::<L>,
        push: list_push::<L>,
    }
}

fn list_len<L: Sequence>(v: &dyn Any) -> usize {
    v.downcast_ref::<L>().map_or(0, L::length)
}

fn list_get<L: Sequence>(v: &dyn Any, idx: usize) -> Option<&dyn Any> {
    v.downcast_ref::<L>()?.at(idx).map(|v| v as &dyn Any)
}

fn list_clear<L: Sequence>(v: &mut dyn Any) {
    if let Some(v) = v.downcast_mut::<L>() {
        v.clear_all();
    }
}

fn list_push<L: Sequence>(v: &mut dyn Any) -> Option<&mut dyn Any> {
    v.downcast_mut::<L>()?
        .push_default()
        .map(|v| v as &mut dyn Any)
}

impl<T: Reflect + Default> Reflect for Vec<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Self>(TypeKind::List(list_info::<Self>(T::type_info)))
    }
}

impl<T: Reflect + Default> Reflect for VecDeque<T> {
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Self>(TypeKind::List(list_info::<Self>(T::type_info)))
    }
}

// HashMap<K, V, S> and BTreeMap<K, V>

/// Types usable as map keys. On the wire every key is a JSON string.
pub trait MapKey: Sized + Send + Sync + 'static {
    fn to_key(&self) -> Cow<'_, str>;

    fn from_key(key: &str) -> Option<Self>;
}

impl MapKey for String {
    fn to_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(self)
    }

    fn from_key(key: &str) -> Option<Self> {
        Some(key.to_string())
    }
}

impl MapKey for bool {
    fn to_key(&self) -> Cow<'_, str> {
        Cow::Borrowed(if *self { "true" } else { "false" })
    }

    fn from_key(key: &str) -> Option<Self> {
        key.parse().ok()
    }
}

impl MapKey for char {
    fn to_key(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn from_key(key: &str) -> Option<Self> {
        let mut chars = key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }
}

macro_rules! impl_int_map_key {
    ($($ty:ty),*) => {
        $(
            impl MapKey for $ty {
                fn to_key(&self) -> Cow<'_, str> {
                    let mut buffer = itoa::Buffer::new();
                    Cow::Owned(buffer.format(*self).to_string())
                }

                fn from_key(key: &str) -> Option<Self> {
                    key.parse().ok()
                }
            }
        )*
    };
}

impl_int_map_key!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

/// Maps that decode through an entry API.
trait Mapping: Default + 'static {
    type Key: MapKey;
    type Val: Default + 'static;
    fn length(&self) -> usize;
    fn pairs(&self) -> Vec<(&Self::Key, &Self::Val)>;
    fn clear_all(&mut self);
    fn entry_default(&mut self, key: Self::Key) -> &mut Self::Val;
}

impl<K, V, S> Mapping for HashMap<K, V, S>
where
    K: MapKey + Hash + Eq,
    V: Default + 'static,
    S: BuildHasher + Default + 'static,
{
    type Key = K;
    type Val = V;

    fn length(&self) -> usize {
        self.len()
    }

    fn pairs(&self) -> Vec<(&K, &V)> {
        self.iter().collect()
    }

    fn clear_all(&mut self) {
        self.clear();
    }

    fn entry_default(&mut self, key: K) -> &mut V {
        self.entry(key).or_default()
    }
}

impl<K, V> Mapping for BTreeMap<K, V>
where
    K: MapKey + Ord,
    V: Default + 'static,
{
    type Key = K;
    type Val = V;

    fn length(&self) -> usize {
        self.len()
    }

    fn pairs(&self) -> Vec<(&K, &V)> {
        self.iter().collect()
    }

    fn clear_all(&mut self) {
        self.clear();
    }

    fn entry_default(&mut self, key: K) -> &mut V {
        self.entry(key).or_default()
    }
}

fn map_info<M: Mapping>(value: fn() -> TypeInfo) -> MapInfo {
    MapInfo {
        value,
        len: map_len::<M>,
        entries: map_entries::<M>,
        clear: map_clear::<M>,
        entry: map_entry::<M>,
    }
}

fn map_len<M: Mapping>(v: &dyn Any) -> usize {
    v.downcast_ref::<M>().map_or(0, M::length)
}

fn map_entries<M: Mapping>(v: &dyn Any) -> Vec<(Cow<'_, str>, &dyn Any)> {
    match v.downcast_ref::<M>() {
        Some(m) => m
            .pairs()
            .into_iter()
            .map(|(k, v)| (k.to_key(), v as &dyn Any))
            .collect(),
        None => Vec::new(),
    }
}

fn map_clear<M: Mapping>(v: &mut dyn Any) {
    if let Some(v) = v.downcast_mut::<M>() {
        v.clear_all();
    }
}

fn map_entry<'a, M: Mapping>(v: &'a mut dyn Any, key: &str) -> Result<&'a mut dyn Any> {
    let m = v
        .downcast_mut::<M>()
        .ok_or_else(|| mismatch(type_name::<M>()))?;
    let key = <M::Key as MapKey>::from_key(key).ok_or_else(|| Error::InvalidMapKey(key.to_string()))?;
    Ok(m.entry_default(key) as &mut dyn Any)
}

impl<K, V, S> Reflect for HashMap<K, V, S>
where
    K: MapKey + Hash + Eq,
    V: Reflect + Default,
    S: BuildHasher + Default + Send + Sync + 'static,
{
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Self>(TypeKind::Map(map_info::<Self>(V::type_info)))
    }
}

impl<K, V> Reflect for BTreeMap<K, V>
where
    K: MapKey + Ord,
    V: Reflect + Default,
{
    fn type_info() -> TypeInfo {
        TypeInfo::new::<Self>(TypeKind::Map(map_info::<Self>(V::type_info)))
    }
}
