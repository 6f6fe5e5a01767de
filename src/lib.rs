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

//! `jsonbind` is a type-directed `JSON` codec. It binds `JSON` text directly to Rust values
//! through per-type decode and encode strategies that are compiled once and cached.
//!
//! ## Features
//!
//! - Compiled strategies: the first use of a type builds an immutable strategy tree for it, later uses go straight to the cache.
//! - Struct binding: field tags (`name`, `omitempty`, `string`, `-`), embedded structs with Go-like conflict resolution, and hashed field dispatch for small structs.
//! - Lazy values: [`Any`] keeps the raw bytes of a value and only scans the parts that are looked at.
//! - Extensions: an ordered list of hooks can rename fields, override or decorate strategies, and order map keys.
//! - Configuration: a [`Config`] is frozen into an [`Api`] that owns its caches, extensions and buffer pools.
//!
//! ## Describing types
//!
//! Types opt in through [`Reflect`]. The std scalars and containers implement it already;
//! structs use [`reflect_struct!`]:
//!
//! ```
//! use jsonbind::reflect_struct;
//!
//! #[derive(Default)]
//! struct Point {
//!     x: i32,
//!     y: i32,
//!     label: Option<String>,
//! }
//!
//! reflect_struct!(Point {
//!     x: i32,
//!     y: i32,
//!     label: Option<String> => "label,omitempty",
//! });
//!
//! let mut p = Point::default();
//! jsonbind::unmarshal(br#"{"X": 1, "y": 2}"#, &mut p).unwrap();
//! assert_eq!((p.x, p.y), (1, 2));
//! assert_eq!(jsonbind::marshal_to_string(&p).unwrap(), r#"{"x":1,"y":2}"#);
//! ```
//!
//! ## Lazy access
//!
//! ```
//! use jsonbind::parse_path;
//!
//! let data = br#"{"users":[{"name":"ann"},{"name":"bob"}]}"#;
//! let names = jsonbind::get(data, &parse_path("{users,*,name}").unwrap());
//! assert_eq!(names.to_string(), r#"["ann","bob"]"#);
//! ```

#![allow(clippy::uninlined_format_args)]

mod any;
pub mod codec;
mod config;
mod constants;
mod error;
pub mod extension;
mod number;
mod raw;
pub mod reflect;
mod stream;
mod tokenizer;
mod value;
mod writer;

pub use any::parse_path;
pub use any::Any;
pub use any::PathKey;
pub use config::default_api;
pub use config::fastest_api;
pub use config::get;
pub use config::marshal;
pub use config::marshal_to_string;
pub use config::standard_api;
pub use config::unmarshal;
pub use config::valid;
pub use config::Api;
pub use config::Config;
pub use config::TokenizerGuard;
pub use config::WriterGuard;
pub use error::Error;
pub use error::ParseErrorCode;
pub use error::Result;
pub use extension::Extension;
pub use number::Number;
pub use raw::RawJson;
pub use reflect::MarshalJson;
pub use reflect::Reflect;
pub use reflect::TypeInfo;
pub use reflect::UnmarshalJson;
pub use stream::StreamDecoder;
pub use stream::StreamEncoder;
pub use tokenizer::Tokenizer;
pub use tokenizer::TokenizerOptions;
pub use tokenizer::ValueType;
pub use value::Object;
pub use value::Value;
pub use writer::Writer;
pub use writer::WriterOptions;
