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

/// Implements [`Reflect`](crate::Reflect) for a struct.
///
/// Every field that takes part in encoding is listed with its type and an
/// optional tag. Fields that are not listed are invisible to the codec.
/// A field marked `#[embed]` has its own fields flattened into the parent
/// object.
///
/// ```
/// use jsonbind::reflect_struct;
///
/// #[derive(Default)]
/// struct Base {
///     id: u64,
/// }
///
/// #[derive(Default)]
/// struct User {
///     base: Base,
///     name: String,
///     email: Option<String>,
///     secret: String,
/// }
///
/// reflect_struct!(Base { id: u64 });
/// reflect_struct!(User {
///     #[embed]
///     base: Base,
///     name: String => "name",
///     email: Option<String> => "email,omitempty",
///     secret: String => "-",
/// });
///
/// let user = User {
///     base: Base { id: 7 },
///     name: "ann".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(jsonbind::marshal_to_string(&user).unwrap(), r#"{"id":7,"name":"ann"}"#);
/// ```
#[macro_export]
macro_rules! reflect_struct {
    ($ty:ident { $( $(#[$attr:ident])* $field:ident : $fty:ty $(=> $tag:literal)? ),* $(,)? }) => {
        impl $crate::reflect::Reflect for $ty {
            fn type_info() -> $crate::reflect::TypeInfo {
                $crate::reflect::TypeInfo::new::<$ty>($crate::reflect::TypeKind::Struct(
                    $crate::reflect::StructInfo::new(vec![
                        $({
                            fn get(v: &dyn ::std::any::Any) -> Option<&dyn ::std::any::Any> {
                                v.downcast_ref::<$ty>().map(|v| {
                                    let field: &$fty = &v.$field;
                                    field as &dyn ::std::any::Any
                                })
                            }
                            fn get_mut(
                                v: &mut dyn ::std::any::Any,
                            ) -> Option<&mut dyn ::std::any::Any> {
                                v.downcast_mut::<$ty>().map(|v| {
                                    let field: &mut $fty = &mut v.$field;
                                    field as &mut dyn ::std::any::Any
                                })
                            }
                            $crate::reflect::FieldInfo::new::<$fty>(stringify!($field), get, get_mut)
                                $(.with_tag($tag))?
                                $(.$attr())*
                        }),*
                    ]),
                ))
            }
        }
    };
}

/// Implements [`Reflect`](crate::Reflect) for a type that implements
/// [`MarshalJson`](crate::MarshalJson) and [`UnmarshalJson`](crate::UnmarshalJson).
#[macro_export]
macro_rules! reflect_custom {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::reflect::Reflect for $ty {
                fn type_info() -> $crate::reflect::TypeInfo {
                    $crate::reflect::TypeInfo::new::<$ty>($crate::reflect::TypeKind::Custom(
                        $crate::reflect::CustomInfo::of::<$ty>(),
                    ))
                }
            }
        )+
    };
}

/// Implements [`Reflect`](crate::Reflect) for a type the codec cannot handle.
///
/// Such a type may still appear as a field. Compiling it succeeds, and the
/// error is reported only when a value of the type is actually decoded or
/// encoded.
#[macro_export]
macro_rules! reflect_opaque {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::reflect::Reflect for $ty {
                fn type_info() -> $crate::reflect::TypeInfo {
                    $crate::reflect::TypeInfo::new::<$ty>($crate::reflect::TypeKind::Unsupported)
                }
            }
        )+
    };
}
