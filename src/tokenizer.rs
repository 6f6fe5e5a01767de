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

//! Pull based JSON tokenizer.
//!
//! A [`Tokenizer`] is a cursor over either a fixed byte slice or an
//! incremental [`Read`] source. It reads one value at a time and never
//! builds an intermediate tree: callers ask for the next token, a string,
//! a number, or to skip the next value entirely.
//!
//! Errors are sticky. The first failure is recorded on the instance and
//! every later read returns it again until [`Tokenizer::reset`] is called.

mod number;
mod skip;
mod string;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Read;

use crate::constants::*;
use crate::error::Error;
use crate::error::ParseErrorCode;
use crate::error::Result;
use crate::number::Number;
use crate::value::Value;

/// The JSON type of the next value, as classified from its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Invalid,
    String,
    Number,
    Null,
    Bool,
    Array,
    Object,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Invalid => TYPE_INVALID,
            ValueType::String => TYPE_STRING,
            ValueType::Number => TYPE_NUMBER,
            ValueType::Null => TYPE_NULL,
            ValueType::Bool => TYPE_BOOLEAN,
            ValueType::Array => TYPE_ARRAY,
            ValueType::Object => TYPE_OBJECT,
        }
    }
}

static VALUE_TYPES: [ValueType; 256] = {
    let mut table = [ValueType::Invalid; 256];
    table[b'"' as usize] = ValueType::String;
    table[b'-' as usize] = ValueType::Number;
    let mut c = b'0';
    while c <= b'9' {
        table[c as usize] = ValueType::Number;
        c += 1;
    }
    // permissive literals NaN and Infinity
    table[b'N' as usize] = ValueType::Number;
    table[b'I' as usize] = ValueType::Number;
    table[b't' as usize] = ValueType::Bool;
    table[b'f' as usize] = ValueType::Bool;
    table[b'n' as usize] = ValueType::Null;
    table[b'[' as usize] = ValueType::Array;
    table[b'{' as usize] = ValueType::Object;
    table
};

#[inline]
pub(crate) fn value_type_of(c: u8) -> ValueType {
    VALUE_TYPES[c as usize]
}

#[inline]
fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\n' | b'\t' | b'\r')
}

/// Options that change how the tokenizer reads its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenizerOptions {
    /// Maximum nesting of arrays and objects.
    pub max_depth: usize,
    /// Accept `NaN`, `Infinity` and `-Infinity` as numbers.
    pub permissive_numbers: bool,
    /// Object keys are returned as raw bytes without unescaping.
    pub object_field_simple_string: bool,
}

impl Default for TokenizerOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            permissive_numbers: false,
            object_field_simple_string: false,
        }
    }
}

/// Byte cursor over a JSON document.
///
/// Invariant: `head <= tail <= buffer length`. In slice mode `tail` is the
/// input length; in reader mode the window is refilled once `head` reaches
/// `tail`, and `consumed` counts the bytes dropped by earlier refills so
/// error positions stay absolute.
pub struct Tokenizer<'a> {
    input: &'a [u8],
    reader: Option<Box<dyn Read + 'a>>,
    buf: Vec<u8>,
    head: usize,
    tail: usize,
    consumed: usize,
    depth: usize,
    options: TokenizerOptions,
    error: Option<Error>,
    pub(crate) scratch: Vec<u8>,
    capture: Option<Vec<u8>>,
    capture_start: usize,
}

impl<'a> Tokenizer<'a> {
    /// Creates a tokenizer over a complete document.
    pub fn new(input: &'a [u8]) -> Tokenizer<'a> {
        Self::with_scratch(input, Vec::new())
    }

    pub(crate) fn with_scratch(input: &'a [u8], scratch: Vec<u8>) -> Tokenizer<'a> {
        Tokenizer {
            input,
            reader: None,
            buf: Vec::new(),
            head: 0,
            tail: input.len(),
            consumed: 0,
            depth: 0,
            options: TokenizerOptions::default(),
            error: None,
            scratch,
            capture: None,
            capture_start: 0,
        }
    }

    /// Creates a tokenizer that pulls its input from `reader` on demand.
    pub fn from_reader<R: Read + 'a>(reader: R) -> Tokenizer<'a> {
        Tokenizer {
            input: &[],
            reader: Some(Box::new(reader)),
            buf: vec![0; READ_BUFFER_SIZE],
            head: 0,
            tail: 0,
            consumed: 0,
            depth: 0,
            options: TokenizerOptions::default(),
            error: None,
            scratch: Vec::new(),
            capture: None,
            capture_start: 0,
        }
    }

    pub fn with_options(mut self, options: TokenizerOptions) -> Tokenizer<'a> {
        self.options = options;
        self
    }

    pub fn options(&self) -> &TokenizerOptions {
        &self.options
    }

    pub(crate) fn set_options(&mut self, options: TokenizerOptions) {
        self.options = options;
    }

    /// Points the tokenizer at a new document, clearing cursor and error.
    pub fn reset(&mut self, input: &'a [u8]) {
        self.input = input;
        self.reader = None;
        self.head = 0;
        self.tail = input.len();
        self.consumed = 0;
        self.depth = 0;
        self.error = None;
        self.scratch.clear();
        self.capture = None;
        self.capture_start = 0;
    }

    pub(crate) fn take_scratch(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.scratch)
    }

    /// Absolute offset of the cursor from the start of the input.
    #[inline]
    pub fn position(&self) -> usize {
        self.consumed + self.head
    }

    /// The first error recorded on this tokenizer, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Records `err` unless an earlier error is already set, and returns
    /// the sticky error.
    pub(crate) fn record(&mut self, err: Error) -> Error {
        match &self.error {
            Some(first) => first.clone(),
            None => {
                self.error = Some(err.clone());
                err
            }
        }
    }

    #[inline]
    pub(crate) fn fail(&mut self, code: ParseErrorCode) -> Error {
        let err = Error::Syntax(code, self.position());
        self.record(err)
    }

    /// Reports a failure at the current position with a custom message.
    pub fn report(&mut self, err: Error) -> Error {
        self.record(err)
    }

    #[inline]
    fn check(&self) -> Result<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    #[inline]
    pub(crate) fn window(&self) -> &[u8] {
        if self.reader.is_some() {
            &self.buf[..self.tail]
        } else {
            &self.input[..self.tail]
        }
    }

    #[inline]
    pub(crate) fn head(&self) -> usize {
        self.head
    }

    #[inline]
    pub(crate) fn set_head(&mut self, head: usize) {
        debug_assert!(head <= self.tail);
        self.head = head;
    }

    #[inline]
    pub(crate) fn is_streaming(&self) -> bool {
        self.reader.is_some()
    }

    /// Refills the window from the reader. Returns `false` at end of input.
    pub(crate) fn load_more(&mut self) -> Result<bool> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(false);
        };
        if let Some(captured) = self.capture.as_mut() {
            captured.extend_from_slice(&self.buf[self.capture_start..self.tail]);
            self.capture_start = 0;
        }
        self.consumed += self.tail;
        self.head = 0;
        self.tail = 0;
        if self.buf.len() < READ_BUFFER_SIZE {
            self.buf.resize(READ_BUFFER_SIZE, 0);
        }
        let err = loop {
            match reader.read(&mut self.buf[..]) {
                Ok(0) => return Ok(false),
                Ok(n) => {
                    self.tail = n;
                    return Ok(true);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => break e,
            }
        };
        Err(self.record(err.into()))
    }

    /// Returns the next byte and advances past it.
    #[inline]
    pub(crate) fn next_byte(&mut self) -> Result<u8> {
        if self.head == self.tail && !self.load_more()? {
            return Err(self.fail(ParseErrorCode::InvalidEOF));
        }
        let c = self.window()[self.head];
        self.head += 1;
        Ok(c)
    }

    /// Returns the next byte without consuming it, `None` at end of input.
    #[inline]
    pub(crate) fn peek_byte(&mut self) -> Result<Option<u8>> {
        if self.head == self.tail && !self.load_more()? {
            return Ok(None);
        }
        Ok(Some(self.window()[self.head]))
    }

    /// Skips whitespace and returns the next significant byte, consuming it.
    #[inline]
    pub fn next_token(&mut self) -> Result<u8> {
        self.check()?;
        match self.skip_whitespace()? {
            Some(c) => {
                self.head += 1;
                Ok(c)
            }
            None => Err(self.fail(ParseErrorCode::InvalidEOF)),
        }
    }

    /// Skips whitespace and peeks at the next significant byte.
    ///
    /// Reaching the end of input is not an error here: `None` is returned
    /// and no error is recorded.
    pub fn skip_whitespace(&mut self) -> Result<Option<u8>> {
        loop {
            let window = self.window();
            let start = self.head;
            if let Some(offset) = window[start..].iter().position(|c| !is_whitespace(*c)) {
                let c = window[start + offset];
                self.head = start + offset;
                return Ok(Some(c));
            }
            self.head = self.tail;
            if !self.load_more()? {
                return Ok(None);
            }
        }
    }

    /// Pushes back the byte returned by the previous read.
    #[inline]
    pub fn unread(&mut self) -> Result<()> {
        if self.head == 0 {
            return Err(self.fail(ParseErrorCode::UnreadUnderflow));
        }
        self.head -= 1;
        Ok(())
    }

    /// Classifies the next value without consuming it.
    pub fn what_is_next(&mut self) -> Result<ValueType> {
        let c = self.next_token()?;
        self.unread()?;
        Ok(value_type_of(c))
    }

    /// Consumes `expected` after optional whitespace.
    pub(crate) fn expect(&mut self, expected: u8, code: ParseErrorCode) -> Result<()> {
        let c = self.next_token()?;
        if c != expected {
            self.unread()?;
            return Err(self.fail(code));
        }
        Ok(())
    }

    /// Consumes the remaining bytes of a literal whose first byte was read.
    pub(crate) fn expect_literal(&mut self, rest: &[u8]) -> Result<()> {
        for expected in rest {
            let c = self.next_byte()?;
            if c != *expected {
                return Err(self.fail(ParseErrorCode::ExpectedSomeIdent));
            }
        }
        Ok(())
    }

    /// Consumes `null` if it is next. Anything else is left unread.
    pub fn read_nil(&mut self) -> Result<bool> {
        let c = self.next_token()?;
        if c == b'n' {
            self.expect_literal(b"ull")?;
            return Ok(true);
        }
        self.unread()?;
        Ok(false)
    }

    pub fn read_null(&mut self) -> Result<()> {
        let c = self.next_token()?;
        if c != b'n' {
            self.unread()?;
            return Err(self.fail(ParseErrorCode::ExpectedSomeIdent));
        }
        self.expect_literal(b"ull")
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        match self.next_token()? {
            b't' => {
                self.expect_literal(b"rue")?;
                Ok(true)
            }
            b'f' => {
                self.expect_literal(b"alse")?;
                Ok(false)
            }
            _ => {
                self.unread()?;
                Err(self.fail(ParseErrorCode::ExpectedSomeIdent))
            }
        }
    }

    pub(crate) fn incr_depth(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.options.max_depth {
            return Err(self.fail(ParseErrorCode::DepthLimitExceeded(self.options.max_depth)));
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn decr_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Consumes `[` and reports whether an element follows.
    ///
    /// An empty array is consumed entirely. The nesting depth is raised
    /// until the matching [`Tokenizer::read_array_more`] returns `false`.
    pub fn read_array_begin(&mut self) -> Result<bool> {
        self.expect(b'[', ParseErrorCode::ExpectedSomeValue)?;
        self.incr_depth()?;
        if self.next_token()? == b']' {
            self.decr_depth();
            return Ok(false);
        }
        self.unread()?;
        Ok(true)
    }

    /// Consumes the separator after an array element.
    pub fn read_array_more(&mut self) -> Result<bool> {
        match self.next_token()? {
            b',' => Ok(true),
            b']' => {
                self.decr_depth();
                Ok(false)
            }
            _ => {
                self.unread()?;
                Err(self.fail(ParseErrorCode::ExpectedArrayCommaOrEnd))
            }
        }
    }

    /// Consumes `{` and reports whether a field follows.
    pub fn read_object_begin(&mut self) -> Result<bool> {
        self.expect(b'{', ParseErrorCode::ExpectedSomeValue)?;
        self.incr_depth()?;
        if self.next_token()? == b'}' {
            self.decr_depth();
            return Ok(false);
        }
        self.unread()?;
        Ok(true)
    }

    /// Consumes the separator after an object member.
    pub fn read_object_more(&mut self) -> Result<bool> {
        match self.next_token()? {
            b',' => Ok(true),
            b'}' => {
                self.decr_depth();
                Ok(false)
            }
            _ => {
                self.unread()?;
                Err(self.fail(ParseErrorCode::ExpectedObjectCommaOrEnd))
            }
        }
    }

    /// Reads an object key and the `:` that follows it.
    pub fn read_field_name(&mut self) -> Result<&str> {
        let c = self.next_token()?;
        if c != b'"' {
            self.unread()?;
            return Err(self.fail(ParseErrorCode::KeyMustBeAString));
        }
        self.unread()?;
        let (mut start, mut end, mut escaped) = if self.options.object_field_simple_string {
            self.scan_simple_string()?
        } else {
            self.read_string_span()?
        };
        if !escaped && self.is_streaming() {
            (start, end, escaped) = self.detach_span(start, end);
        }
        self.expect(b':', ParseErrorCode::ExpectedColon)?;
        self.span_as_str(start, end, escaped)
    }

    /// Visits every element of an array with `f`. `null` counts as empty.
    pub fn read_array_cb<F>(&mut self, mut f: F) -> Result<()>
    where F: FnMut(&mut Tokenizer<'a>) -> Result<()> {
        if self.read_nil()? {
            return Ok(());
        }
        if !self.read_array_begin()? {
            return Ok(());
        }
        loop {
            f(self)?;
            if !self.read_array_more()? {
                return Ok(());
            }
        }
    }

    /// Visits every member of an object with `f(tokenizer, key)`.
    pub fn read_object_cb<F>(&mut self, mut f: F) -> Result<()>
    where F: FnMut(&mut Tokenizer<'a>, &str) -> Result<()> {
        if self.read_nil()? {
            return Ok(());
        }
        if !self.read_object_begin()? {
            return Ok(());
        }
        let mut key = String::new();
        loop {
            key.clear();
            key.push_str(self.read_field_name()?);
            f(self, &key)?;
            if !self.read_object_more()? {
                return Ok(());
            }
        }
    }

    /// Skips the next value and returns its raw bytes.
    pub fn skip_and_return_bytes(&mut self) -> Result<Cow<'_, [u8]>> {
        if self.skip_whitespace()?.is_none() {
            return Err(self.fail(ParseErrorCode::InvalidEOF));
        }
        let start = self.head;
        if self.reader.is_none() {
            self.skip()?;
            return Ok(Cow::Borrowed(&self.input[start..self.head]));
        }
        self.capture = Some(Vec::new());
        self.capture_start = start;
        let res = self.skip();
        let mut captured = self.capture.take().unwrap_or_default();
        res?;
        captured.extend_from_slice(&self.buf[self.capture_start..self.head]);
        Ok(Cow::Owned(captured))
    }

    /// Reads the next value into an owned dynamic [`Value`].
    pub fn read_value(&mut self) -> Result<Value> {
        match self.what_is_next()? {
            ValueType::Null => {
                self.read_null()?;
                Ok(Value::Null)
            }
            ValueType::Bool => Ok(Value::Bool(self.read_bool()?)),
            ValueType::Number => Ok(Value::Number(self.read_number()?)),
            ValueType::String => Ok(Value::String(self.read_string()?)),
            ValueType::Array => {
                let mut values = Vec::new();
                if self.read_array_begin()? {
                    loop {
                        values.push(self.read_value()?);
                        if !self.read_array_more()? {
                            break;
                        }
                    }
                }
                Ok(Value::Array(values))
            }
            ValueType::Object => {
                let mut obj = BTreeMap::new();
                if self.read_object_begin()? {
                    loop {
                        let key = self.read_field_name()?.to_string();
                        let value = self.read_value()?;
                        obj.insert(key, value);
                        if !self.read_object_more()? {
                            break;
                        }
                    }
                }
                Ok(Value::Object(obj))
            }
            ValueType::Invalid => Err(self.fail(ParseErrorCode::ExpectedSomeValue)),
        }
    }

    /// Reads a number keeping integers exact when they fit.
    pub fn read_number(&mut self) -> Result<Number> {
        let parsed = {
            let (text, is_float) = self.read_number_text()?;
            number::parse_number_text(text, is_float)
        };
        match parsed {
            Some(n) => Ok(n),
            None => Err(self.fail(ParseErrorCode::InvalidNumberValue)),
        }
    }

    /// Verifies that exactly one value remains and nothing follows it.
    pub fn expect_end(&mut self) -> Result<()> {
        match self.skip_whitespace()? {
            None => Ok(()),
            Some(_) => Err(self.fail(ParseErrorCode::UnexpectedTrailingCharacters)),
        }
    }
}
