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

//! A JSON value that is only parsed as far as it is looked at.
//!
//! Reading an [`Any`] skips over the value once and keeps its bytes.
//! Arrays and objects are scanned element by element when an element is
//! first asked for, numbers are parsed when first coerced. Clones share the
//! scanned state.
//!
//! Coercions never fail: a value that can not be converted gives the zero
//! value of the target type and leaves the reason in [`Any::last_error`].

mod lazy;
mod path;

use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::sync::Arc;

use parking_lot::Mutex;

use self::lazy::Doc;
use self::lazy::Node;
use self::lazy::Span;
use self::lazy::Until;
pub use self::path::parse_path;
pub use self::path::PathKey;
use crate::config::Api;
use crate::error::Error;
use crate::error::Result;
use crate::number::Number;
use crate::reflect::Reflect;
use crate::tokenizer::Tokenizer;
use crate::tokenizer::TokenizerOptions;
use crate::tokenizer::ValueType;
use crate::writer::Writer;

struct Inner {
    node: Node,
    last_error: Mutex<Option<Error>>,
}

/// A lazily materialized JSON value.
#[derive(Clone)]
pub struct Any {
    inner: Arc<Inner>,
}

impl Default for Any {
    fn default() -> Self {
        Any::from_node(Node::Null)
    }
}

/// A number as far as a coercion needs it.
#[derive(Clone, Copy)]
enum Numeric {
    Int(i128),
    Float(f64),
}

impl Numeric {
    fn from_number(n: Number) -> Numeric {
        match n {
            Number::Int64(v) => Numeric::Int(v as i128),
            Number::UInt64(v) => Numeric::Int(v as i128),
            Number::Float64(v) => Numeric::Float(v),
        }
    }

    fn to_i128(self) -> i128 {
        match self {
            Numeric::Int(v) => v,
            // saturates, NaN gives 0
            Numeric::Float(v) => v as i128,
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Numeric::Int(v) => v as f64,
            Numeric::Float(v) => v,
        }
    }
}

/// The longest prefix of `s` that reads as a JSON style number.
fn numeric_prefix(s: &str) -> &str {
    let bytes = s.as_bytes();
    let digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let sign = usize::from(bytes.first() == Some(&b'-'));
    let int_end = digits(sign);
    if int_end == sign {
        return "";
    }
    let mut end = int_end;
    let mut i = int_end;
    if bytes.get(i) == Some(&b'.') {
        let frac_end = digits(i + 1);
        if frac_end > i + 1 {
            end = frac_end;
            i = frac_end;
        }
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        let exp_end = digits(j);
        if exp_end > j {
            end = exp_end;
        }
    }
    &s[..end]
}

fn parse_numeric(s: &str) -> Option<Numeric> {
    let prefix = numeric_prefix(s.trim());
    if prefix.is_empty() {
        return None;
    }
    if !prefix.contains(['.', 'e', 'E']) {
        if let Ok(v) = prefix.parse::<i128>() {
            return Some(Numeric::Int(v));
        }
    }
    prefix.parse::<f64>().ok().map(Numeric::Float)
}

impl Any {
    fn from_node(node: Node) -> Any {
        Any {
            inner: Arc::new(Inner {
                node,
                last_error: Mutex::new(None),
            }),
        }
    }

    /// An `Any` standing for a failed read or lookup.
    pub fn invalid(err: Error) -> Any {
        Any::from_node(Node::Invalid(err))
    }

    /// Reads one JSON value from `data`; trailing bytes make it invalid.
    pub fn from_bytes(data: &[u8]) -> Any {
        Self::from_bytes_with(data, TokenizerOptions::default())
    }

    pub(crate) fn from_bytes_with(data: &[u8], options: TokenizerOptions) -> Any {
        let mut iter = Tokenizer::new(data).with_options(options);
        match iter.read_any().and_then(|any| iter.expect_end().map(|_| any)) {
            Ok(any) => any,
            Err(err) => Any::invalid(err),
        }
    }

    fn node(&self) -> &Node {
        &self.inner.node
    }

    fn record(&self, err: Error) {
        *self.inner.last_error.lock() = Some(err);
    }

    /// The error left by the last failed coercion, or the reason this value
    /// is invalid.
    pub fn last_error(&self) -> Option<Error> {
        if let Node::Invalid(err) = self.node() {
            return Some(err.clone());
        }
        self.inner.last_error.lock().clone()
    }

    pub fn value_type(&self) -> ValueType {
        match self.node() {
            Node::Invalid(_) => ValueType::Invalid,
            Node::Null => ValueType::Null,
            Node::Bool(_) => ValueType::Bool,
            Node::String(_) => ValueType::String,
            Node::Number(_) => ValueType::Number,
            Node::Array(_) | Node::List(_) => ValueType::Array,
            Node::Object(_) | Node::Map(_) => ValueType::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.node(), Node::Null)
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self.node(), Node::Invalid(_))
    }

    /// Number of elements or members; zero for scalars.
    pub fn size(&self) -> usize {
        match self.node() {
            Node::Array(c) | Node::Object(c) => match c.children() {
                Ok(children) => children.len(),
                Err(err) => {
                    self.record(err);
                    0
                }
            },
            Node::List(items) => items.len(),
            Node::Map(members) => members.len(),
            _ => 0,
        }
    }

    /// Member names of an object in document order.
    pub fn keys(&self) -> Vec<String> {
        match self.node() {
            Node::Object(c) => match c.children() {
                Ok(children) => children.into_iter().map(|(k, _)| k).collect(),
                Err(err) => {
                    self.record(err);
                    vec![]
                }
            },
            Node::Map(members) => members.iter().map(|(k, _)| k.clone()).collect(),
            _ => vec![],
        }
    }

    /// Element `idx` of an array, or an invalid `Any`.
    pub fn get_index(&self, idx: usize) -> Any {
        let found = match self.node() {
            Node::Invalid(_) => return self.clone(),
            Node::Array(c) => c.scan(Until::Index(idx)),
            Node::List(items) => Ok(items.get(idx).cloned()),
            _ => {
                return Any::invalid(Error::Message(format!(
                    "can not index {} with {}",
                    self.value_type().as_str(),
                    idx
                )))
            }
        };
        match found {
            Ok(Some(any)) => any,
            Ok(None) => Any::invalid(Error::Message(format!("index {} out of range", idx))),
            Err(err) => Any::invalid(err),
        }
    }

    /// Member `key` of an object, or an invalid `Any`.
    ///
    /// With duplicate keys the first one wins.
    pub fn get_key(&self, key: &str) -> Any {
        let found = match self.node() {
            Node::Invalid(_) => return self.clone(),
            Node::Object(c) => c.scan(Until::Key(key)),
            Node::Map(members) => Ok(members.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())),
            _ => {
                return Any::invalid(Error::Message(format!(
                    "can not get member {:?} of {}",
                    key,
                    self.value_type().as_str()
                )))
            }
        };
        match found {
            Ok(Some(any)) => any,
            Ok(None) => Any::invalid(Error::Message(format!("member {:?} not found", key))),
            Err(err) => Any::invalid(err),
        }
    }

    /// Follows `path` from this value.
    ///
    /// A wildcard applies the rest of the path to every element or member
    /// and collects the valid results into a new array or object.
    pub fn get(&self, path: &[PathKey]) -> Any {
        let Some((first, rest)) = path.split_first() else {
            return self.clone();
        };
        match first {
            PathKey::Key(key) => self.get_key(key).get(rest),
            PathKey::Index(idx) => self.get_index(*idx).get(rest),
            PathKey::Wildcard => match self.node() {
                Node::Invalid(_) => self.clone(),
                Node::Array(_) | Node::List(_) => {
                    let items = self
                        .members()
                        .into_iter()
                        .map(|(_, v)| v.get(rest))
                        .filter(Any::is_valid)
                        .collect();
                    Any::from_node(Node::List(items))
                }
                Node::Object(_) | Node::Map(_) => {
                    let members = self
                        .members()
                        .into_iter()
                        .map(|(k, v)| (k, v.get(rest)))
                        .filter(|(_, v)| v.is_valid())
                        .collect();
                    Any::from_node(Node::Map(members))
                }
                _ => Any::invalid(Error::Message(format!(
                    "wildcard over {}",
                    self.value_type().as_str()
                ))),
            },
        }
    }

    /// Children with their keys; array elements get empty keys.
    fn members(&self) -> Vec<(String, Any)> {
        match self.node() {
            Node::Array(c) | Node::Object(c) => c.children().unwrap_or_else(|err| {
                self.record(err);
                vec![]
            }),
            Node::List(items) => items.iter().map(|v| (String::new(), v.clone())).collect(),
            Node::Map(members) => members.clone(),
            _ => vec![],
        }
    }

    fn numeric(&self) -> Option<Numeric> {
        let res = match self.node() {
            Node::Invalid(err) => Err(err.clone()),
            Node::Null => Ok(Numeric::Int(0)),
            Node::Bool(b) => Ok(Numeric::Int(*b as i128)),
            Node::Number(n) => n.get().map(Numeric::from_number),
            Node::String(s) => parse_numeric(s).ok_or_else(|| Error::Message(format!("{:?} is not a number", s))),
            Node::Array(_) | Node::Object(_) | Node::List(_) | Node::Map(_) => {
                Ok(Numeric::Int((self.size() > 0) as i128))
            }
        };
        match res {
            Ok(n) => Some(n),
            Err(err) => {
                self.record(err);
                None
            }
        }
    }

    fn to_int<T: TryFrom<i128> + Default>(&self, min: i128, max: i128) -> T {
        match self.numeric() {
            Some(n) => T::try_from(n.to_i128().clamp(min, max)).unwrap_or_default(),
            None => T::default(),
        }
    }

    /// `false` for `null`, zero, `""`, `"0"`, `"false"` and empty containers.
    pub fn to_bool(&self) -> bool {
        match self.node() {
            Node::Invalid(err) => {
                self.record(err.clone());
                false
            }
            Node::Bool(b) => *b,
            Node::String(s) => {
                let s = s.trim();
                !(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false"))
            }
            _ => self.numeric().is_some_and(|n| n.to_f64() != 0.0),
        }
    }

    pub fn to_i32(&self) -> i32 {
        self.to_int(i32::MIN as i128, i32::MAX as i128)
    }

    pub fn to_i64(&self) -> i64 {
        self.to_int(i64::MIN as i128, i64::MAX as i128)
    }

    pub fn to_u32(&self) -> u32 {
        self.to_int(0, u32::MAX as i128)
    }

    pub fn to_u64(&self) -> u64 {
        self.to_int(0, u64::MAX as i128)
    }

    pub fn to_f32(&self) -> f32 {
        self.to_f64() as f32
    }

    pub fn to_f64(&self) -> f64 {
        self.numeric().map(Numeric::to_f64).unwrap_or_default()
    }

    /// The string itself for strings, the JSON text for anything else.
    pub fn to_string_value(&self) -> String {
        match self.node() {
            Node::Invalid(err) => {
                self.record(err.clone());
                String::new()
            }
            Node::Null => String::new(),
            Node::String(s) => s.clone(),
            Node::Number(n) => n.text().to_string(),
            _ => self.to_json().unwrap_or_else(|err| {
                self.record(err);
                String::new()
            }),
        }
    }

    /// Writes the value as JSON. Parts that were never scanned are copied
    /// byte for byte.
    pub fn write_to(&self, w: &mut Writer<'_>) -> Result<()> {
        match self.node() {
            Node::Invalid(err) => return Err(w.report(err.clone())),
            Node::Null => w.write_null(),
            Node::Bool(b) => w.write_bool(*b),
            Node::String(s) => w.write_string(s),
            Node::Number(_) | Node::Array(_) | Node::Object(_) => {
                if let Some(span) = self.node().span() {
                    w.write_raw(span.bytes());
                }
            }
            Node::List(items) => {
                if items.is_empty() {
                    w.write_empty_array();
                    return Ok(());
                }
                w.enter()?;
                w.write_array_start();
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        w.write_more();
                    }
                    item.write_to(w)?;
                }
                w.write_array_end();
                w.leave();
            }
            Node::Map(members) => {
                if members.is_empty() {
                    w.write_empty_object();
                    return Ok(());
                }
                w.enter()?;
                w.write_object_start();
                for (idx, (key, item)) in members.iter().enumerate() {
                    if idx > 0 {
                        w.write_more();
                    }
                    w.write_object_field(key);
                    item.write_to(w)?;
                }
                w.write_object_end();
                w.leave();
            }
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        let mut w = Writer::new();
        self.write_to(&mut w)?;
        let bytes = w.into_inner()?;
        String::from_utf8(bytes).map_err(|e| Error::Message(e.to_string()))
    }

    /// Decodes this value into a typed destination.
    pub fn decode_into<T: Reflect>(&self, api: &Api, dst: &mut T) -> Result<()> {
        if let Some(span) = self.node().span() {
            return api.unmarshal(span.bytes(), dst);
        }
        let text = self.to_json()?;
        api.unmarshal(text.as_bytes(), dst)
    }

    /// How many containers were scanned and numbers parsed so far in the
    /// documents this value was read from.
    pub fn parse_count(&self) -> usize {
        let mut docs: Vec<Arc<Doc>> = Vec::new();
        self.collect_docs(&mut docs);
        docs.iter().map(|doc| doc.parses()).sum()
    }

    fn collect_docs(&self, docs: &mut Vec<Arc<Doc>>) {
        match self.node() {
            Node::List(items) => items.iter().for_each(|item| item.collect_docs(docs)),
            Node::Map(members) => members.iter().for_each(|(_, item)| item.collect_docs(docs)),
            node => {
                if let Some(span) = node.span() {
                    if !docs.iter().any(|doc| Arc::ptr_eq(doc, &span.doc)) {
                        docs.push(span.doc.clone());
                    }
                }
            }
        }
    }
}

impl Display for Any {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.to_json() {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "<invalid: {}>", err),
        }
    }
}

impl Debug for Any {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Any({})", self)
    }
}

impl Tokenizer<'_> {
    /// Skips the next value and returns it as a lazy [`Any`].
    pub fn read_any(&mut self) -> Result<Any> {
        let bytes = self.skip_and_return_bytes()?.into_owned();
        let doc = Arc::new(Doc::new(bytes, *self.options()));
        Ok(Any::from_node(Node::from_span(Span::root(doc))))
    }
}
