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

//! Buffered JSON writer.
//!
//! A [`Writer`] either accumulates output in memory or flushes it to an
//! underlying [`Write`] whenever its buffer fills up. Write failures are
//! sticky like tokenizer errors: once a flush fails every later flush
//! returns the same error.

mod number;
mod string;

use std::io;
use std::io::Write;

use crate::constants::DEFAULT_MAX_DEPTH;
use crate::constants::WRITE_BUFFER_SIZE;
use crate::error::Error;
use crate::error::ParseErrorCode;
use crate::error::Result;
use crate::number::Number;
use crate::value::Value;

/// Options that change the text a [`Writer`] produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct WriterOptions {
    /// Spaces per nesting level. Zero writes compact output.
    pub indent: usize,
    /// Escape `<`, `>`, `&`, U+2028 and U+2029 inside strings.
    pub escape_html: bool,
    /// Write floats with at most six fraction digits.
    pub lossy_float: bool,
    /// Write non-finite floats as `NaN`, `Infinity` and `-Infinity`.
    pub permissive_numbers: bool,
}

pub struct Writer<'a> {
    buf: Vec<u8>,
    sink: Option<Box<dyn Write + 'a>>,
    indent: usize,
    options: WriterOptions,
    error: Option<Error>,
    depth: usize,
    max_depth: usize,
}

impl Default for Writer<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Writer<'static> {
    /// Creates a writer that keeps its output in memory.
    pub fn new() -> Writer<'static> {
        Self::from_buf(Vec::new())
    }

    pub fn with_capacity(capacity: usize) -> Writer<'static> {
        Self::from_buf(Vec::with_capacity(capacity))
    }

    /// Creates an in-memory writer that appends to `buf` after clearing it.
    pub fn from_buf(mut buf: Vec<u8>) -> Writer<'static> {
        buf.clear();
        Writer {
            buf,
            sink: None,
            indent: 0,
            options: WriterOptions::default(),
            error: None,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl<'a> Writer<'a> {
    /// Creates a writer that flushes to `sink` whenever its buffer is full.
    pub fn to_writer<W: Write + 'a>(sink: W) -> Writer<'a> {
        Writer {
            buf: Vec::with_capacity(WRITE_BUFFER_SIZE),
            sink: Some(Box::new(sink)),
            indent: 0,
            options: WriterOptions::default(),
            error: None,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub(crate) fn to_writer_with_buf<W: Write + 'a>(sink: W, mut buf: Vec<u8>) -> Writer<'a> {
        buf.clear();
        Writer {
            buf,
            sink: Some(Box::new(sink)),
            indent: 0,
            options: WriterOptions::default(),
            error: None,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_options(mut self, options: WriterOptions) -> Writer<'a> {
        self.options = options;
        self
    }

    pub fn options(&self) -> &WriterOptions {
        &self.options
    }

    pub(crate) fn set_options(&mut self, options: WriterOptions) {
        self.options = options;
    }

    /// Bytes written but not yet flushed.
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// The first error recorded on this writer, if any.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Records `err` unless an earlier error is set, returning the sticky one.
    pub fn report(&mut self, err: Error) -> Error {
        match &self.error {
            Some(first) => first.clone(),
            None => {
                self.error = Some(err.clone());
                err
            }
        }
    }

    /// Clears buffered output, indentation and error.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.indent = 0;
        self.error = None;
        self.depth = 0;
    }

    pub(crate) fn set_max_depth(&mut self, max_depth: usize) {
        self.max_depth = max_depth;
    }

    /// Enters one level of nesting, failing past the depth limit.
    pub fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            let err = Error::Syntax(ParseErrorCode::DepthLimitExceeded(self.max_depth), self.buf.len());
            return Err(self.report(err));
        }
        Ok(())
    }

    #[inline]
    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn take_buf(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }

    /// Truncates buffered output back to `len` bytes.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.buf.truncate(len);
    }

    /// Returns the in-memory output, flushing first when writing to a sink.
    pub fn into_inner(mut self) -> Result<Vec<u8>> {
        self.flush()?;
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        Ok(std::mem::take(&mut self.buf))
    }

    /// Pushes buffered bytes to the sink. A no-op for in-memory writers.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };
        let res = sink.write_all(&self.buf).and_then(|_| sink.flush());
        self.buf.clear();
        match res {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::WriteZero => Err(self.report(Error::ShortWrite)),
            Err(e) => Err(self.report(e.into())),
        }
    }

    #[inline]
    fn maybe_flush(&mut self) {
        if self.sink.is_some() && self.buf.len() >= WRITE_BUFFER_SIZE {
            // the error stays recorded and surfaces from the next flush
            let _ = self.flush();
        }
    }

    #[inline]
    pub(crate) fn write_byte(&mut self, b: u8) {
        self.buf.push(b);
    }

    #[inline]
    fn write_two_bytes(&mut self, b1: u8, b2: u8) {
        self.buf.extend_from_slice(&[b1, b2]);
    }

    /// Appends bytes verbatim.
    #[inline]
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        self.maybe_flush();
    }

    #[inline]
    pub fn write_raw_str(&mut self, s: &str) {
        self.write_raw(s.as_bytes());
    }

    pub fn write_null(&mut self) {
        self.write_raw(b"null");
    }

    pub fn write_true(&mut self) {
        self.write_raw(b"true");
    }

    pub fn write_false(&mut self) {
        self.write_raw(b"false");
    }

    pub fn write_bool(&mut self, v: bool) {
        if v {
            self.write_true();
        } else {
            self.write_false();
        }
    }

    fn write_indention(&mut self, delta: usize) {
        if self.indent == 0 {
            return;
        }
        self.write_byte(b'\n');
        let spaces = self.indent - delta;
        self.buf.resize(self.buf.len() + spaces, b' ');
    }

    pub fn write_object_start(&mut self) {
        self.indent += self.options.indent;
        self.write_byte(b'{');
        self.write_indention(0);
    }

    /// Writes a quoted key and the `:` after it.
    pub fn write_object_field(&mut self, name: &str) {
        self.write_string(name);
        if self.indent > 0 {
            self.write_two_bytes(b':', b' ');
        } else {
            self.write_byte(b':');
        }
    }

    pub fn write_object_end(&mut self) {
        self.write_indention(self.options.indent);
        self.indent -= self.options.indent;
        self.write_byte(b'}');
        self.maybe_flush();
    }

    pub fn write_empty_object(&mut self) {
        self.write_two_bytes(b'{', b'}');
    }

    pub fn write_array_start(&mut self) {
        self.indent += self.options.indent;
        self.write_byte(b'[');
        self.write_indention(0);
    }

    pub fn write_array_end(&mut self) {
        self.write_indention(self.options.indent);
        self.indent -= self.options.indent;
        self.write_byte(b']');
        self.maybe_flush();
    }

    pub fn write_empty_array(&mut self) {
        self.write_two_bytes(b'[', b']');
    }

    /// Writes the separator between two elements or members.
    pub fn write_more(&mut self) {
        self.write_byte(b',');
        self.write_indention(0);
        self.maybe_flush();
    }

    pub fn write_number(&mut self, n: &Number) -> Result<()> {
        match n {
            Number::Int64(v) => self.write_i64(*v),
            Number::UInt64(v) => self.write_u64(*v),
            Number::Float64(v) => return self.write_f64(*v),
        }
        Ok(())
    }

    /// Writes an owned dynamic value.
    pub fn write_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.write_null(),
            Value::Bool(v) => self.write_bool(*v),
            Value::Number(n) => self.write_number(n)?,
            Value::String(s) => self.write_string(s),
            Value::Array(values) => {
                if values.is_empty() {
                    self.write_empty_array();
                    return Ok(());
                }
                self.write_array_start();
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        self.write_more();
                    }
                    self.write_value(v)?;
                }
                self.write_array_end();
            }
            Value::Object(obj) => {
                if obj.is_empty() {
                    self.write_empty_object();
                    return Ok(());
                }
                self.write_object_start();
                for (i, (k, v)) in obj.iter().enumerate() {
                    if i > 0 {
                        self.write_more();
                    }
                    self.write_object_field(k);
                    self.write_value(v)?;
                }
                self.write_object_end();
            }
        }
        Ok(())
    }
}

impl Write for Writer<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_raw(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Writer::flush(self).map_err(io::Error::other)
    }
}
