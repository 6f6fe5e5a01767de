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

//! Type descriptors that drive the codec compiler.
//!
//! A [`TypeInfo`] tells the compiler what shape a Rust type has and how to
//! reach inside a value of that type. All access goes through plain `fn`
//! pointers over `&dyn Any`, so descriptors are cheap to copy and carry no
//! lifetimes. Nested types are referenced as `fn() -> TypeInfo` and are only
//! expanded when the compiler asks for them, which is what allows a type to
//! refer to itself through `Option<Box<Self>>`.

mod impls;
mod macros;

use std::any::type_name;
use std::any::Any;
use std::any::TypeId;
use std::borrow::Cow;
use std::fmt::Debug;
use std::fmt::Formatter;

pub use impls::MapKey;

use crate::error::Error;
use crate::error::Result;

/// A type the codec can decode into and encode from.
///
/// Implemented for the std scalars and containers, for [`Value`](crate::Value),
/// [`Any`](crate::Any) and [`RawJson`](crate::RawJson). User structs get an
/// impl through [`reflect_struct!`](crate::reflect_struct).
pub trait Reflect: Any + Send + Sync {
    fn type_info() -> TypeInfo;
}

/// Description of one Rust type.
#[derive(Clone)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: &'static str,
    pub kind: TypeKind,
}

impl TypeInfo {
    pub fn new<T: 'static>(kind: TypeKind) -> TypeInfo {
        TypeInfo {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            kind,
        }
    }

    pub fn of<T: Reflect>() -> TypeInfo {
        T::type_info()
    }

    /// The type name without its module path.
    pub fn short_name(&self) -> &'static str {
        let base = self.name.split('<').next().unwrap_or(self.name);
        match base.rfind("::") {
            Some(idx) => &self.name[idx + 2..],
            None => self.name,
        }
    }
}

impl Debug for TypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("kind", &self.kind.as_str())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatKind {
    F32,
    F64,
}

/// The closed set of shapes the compiler knows how to handle.
#[derive(Clone)]
pub enum TypeKind {
    Bool,
    Int(IntKind),
    Float(FloatKind),
    Char,
    String,
    /// `Option<T>`; `None` is `null` on the wire.
    Optional(OptionalInfo),
    /// `Box<T>`, transparent on the wire.
    Pointer(PointerInfo),
    /// `[T; N]`
    Array(ArrayInfo),
    /// `Vec<T>` and `VecDeque<T>`
    List(ListInfo),
    /// `HashMap<K, V>` and `BTreeMap<K, V>` with [`MapKey`] keys.
    Map(MapInfo),
    Struct(StructInfo),
    /// The owned [`Value`](crate::Value) tree.
    Dynamic,
    /// The lazy [`Any`](crate::Any) value.
    Any,
    /// [`RawJson`](crate::RawJson) bytes copied through as is.
    Raw,
    /// Types with their own [`MarshalJson`] and [`UnmarshalJson`].
    Custom(CustomInfo),
    /// Types registered with [`reflect_opaque!`](crate::reflect_opaque).
    Unsupported,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::Bool => "bool",
            TypeKind::Int(_) => "int",
            TypeKind::Float(_) => "float",
            TypeKind::Char => "char",
            TypeKind::String => "string",
            TypeKind::Optional(_) => "optional",
            TypeKind::Pointer(_) => "pointer",
            TypeKind::Array(_) => "array",
            TypeKind::List(_) => "list",
            TypeKind::Map(_) => "map",
            TypeKind::Struct(_) => "struct",
            TypeKind::Dynamic => "dynamic",
            TypeKind::Any => "any",
            TypeKind::Raw => "raw",
            TypeKind::Custom(_) => "custom",
            TypeKind::Unsupported => "unsupported",
        }
    }

    /// Scalars that may carry the `,string` tag option.
    pub fn is_quotable(&self) -> bool {
        matches!(
            self,
            TypeKind::Bool
                | TypeKind::Int(_)
                | TypeKind::Float(_)
                | TypeKind::String
                | TypeKind::Char
        )
    }
}

#[derive(Clone, Copy)]
pub struct OptionalInfo {
    pub inner: fn() -> TypeInfo,
    /// The inner value, `None` when the option is empty.
    pub get: fn(&dyn Any) -> Option<&dyn Any>,
    /// Fills an empty option with the default value and returns the inner value.
    pub get_or_insert: fn(&mut dyn Any) -> Option<&mut dyn Any>,
    pub set_none: fn(&mut dyn Any),
}

#[derive(Clone, Copy)]
pub struct PointerInfo {
    pub inner: fn() -> TypeInfo,
    pub get: fn(&dyn Any) -> Option<&dyn Any>,
    pub get_mut: fn(&mut dyn Any) -> Option<&mut dyn Any>,
}

#[derive(Clone, Copy)]
pub struct ArrayInfo {
    pub elem: fn() -> TypeInfo,
    pub len: usize,
    pub get: fn(&dyn Any, usize) -> Option<&dyn Any>,
    pub get_mut: fn(&mut dyn Any, usize) -> Option<&mut dyn Any>,
    /// Resets every element from the given index on to its default.
    pub reset_from: fn(&mut dyn Any, usize),
}

#[derive(Clone, Copy)]
pub struct ListInfo {
    pub elem: fn() -> TypeInfo,
    pub len: fn(&dyn Any) -> usize,
    pub get: fn(&dyn Any, usize) -> Option<&dyn Any>,
    pub clear: fn(&mut dyn Any),
    /// Appends a default element and returns it.
    pub push: fn(&mut dyn Any) -> Option<&mut dyn Any>,
}

#[derive(Clone, Copy)]
pub struct MapInfo {
    pub value: fn() -> TypeInfo,
    pub len: fn(&dyn Any) -> usize,
    /// Entries with their keys rendered as JSON object keys.
    pub entries: fn(&dyn Any) -> Vec<(Cow<'_, str>, &dyn Any)>,
    pub clear: fn(&mut dyn Any),
    /// Parses `key`, inserting a default value when absent.
    pub entry: for<'a> fn(&'a mut dyn Any, &str) -> Result<&'a mut dyn Any>,
}

#[derive(Clone, Default)]
pub struct StructInfo {
    pub fields: Vec<FieldInfo>,
}

impl StructInfo {
    pub fn new(fields: Vec<FieldInfo>) -> StructInfo {
        StructInfo { fields }
    }
}

/// One declared struct field with its accessors.
#[derive(Clone)]
pub struct FieldInfo {
    /// The Rust field name.
    pub name: &'static str,
    /// The raw tag, e.g. `"id,omitempty"`.
    pub tag: Option<&'static str>,
    /// Whether the fields of this field are flattened into the parent.
    pub embedded: bool,
    pub ty: fn() -> TypeInfo,
    pub get: fn(&dyn Any) -> Option<&dyn Any>,
    pub get_mut: fn(&mut dyn Any) -> Option<&mut dyn Any>,
}

impl FieldInfo {
    pub fn new<F: Reflect>(
        name: &'static str,
        get: fn(&dyn Any) -> Option<&dyn Any>,
        get_mut: fn(&mut dyn Any) -> Option<&mut dyn Any>,
    ) -> FieldInfo {
        FieldInfo {
            name,
            tag: None,
            embedded: false,
            ty: F::type_info,
            get,
            get_mut,
        }
    }

    pub fn with_tag(mut self, tag: &'static str) -> FieldInfo {
        self.tag = Some(tag);
        self
    }

    pub fn embed(mut self) -> FieldInfo {
        self.embedded = true;
        self
    }
}

/// Produces the JSON text of a value itself.
pub trait MarshalJson {
    fn marshal_json(&self) -> Result<Vec<u8>>;
}

/// Consumes the JSON text of a value itself.
pub trait UnmarshalJson {
    fn unmarshal_json(&mut self, data: &[u8]) -> Result<()>;
}

#[derive(Clone, Copy)]
pub struct CustomInfo {
    pub marshal: fn(&dyn Any) -> Option<Result<Vec<u8>>>,
    pub unmarshal: fn(&mut dyn Any, &[u8]) -> Option<Result<()>>,
}

impl CustomInfo {
    pub fn of<T: MarshalJson + UnmarshalJson + 'static>() -> CustomInfo {
        CustomInfo {
            marshal: custom_marshal::<T>,
            unmarshal: custom_unmarshal::<T>,
        }
    }
}

fn custom_marshal<T: MarshalJson + 'static>(v: &dyn Any) -> Option<Result<Vec<u8>>> {
    v.downcast_ref::<T>().map(|v| v.marshal_json())
}

fn custom_unmarshal<T: UnmarshalJson + 'static>(v: &mut dyn Any, data: &[u8]) -> Option<Result<()>> {
    v.downcast_mut::<T>().map(|v| v.unmarshal_json(data))
}

/// Error for an erased accessor applied to a value of the wrong type.
pub(crate) fn mismatch(name: &'static str) -> Error {
    Error::Message(format!("value is not a {}", name))
}
