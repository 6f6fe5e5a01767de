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

use crate::any::Any;
use crate::config::Api;
use crate::error::Result;
use crate::reflect::Reflect;
use crate::tokenizer::Tokenizer;
use crate::writer::Writer;

/// Decodes a sequence of whitespace separated values from a reader.
pub struct StreamDecoder<'a> {
    api: &'a Api,
    iter: Tokenizer<'a>,
}

impl<'a> StreamDecoder<'a> {
    pub(crate) fn new(api: &'a Api, iter: Tokenizer<'a>) -> StreamDecoder<'a> {
        StreamDecoder { api, iter }
    }

    /// Decodes the next value into `dst`.
    ///
    /// Returns `Ok(false)` when the input ended cleanly before another
    /// value started; `dst` is left untouched then.
    pub fn decode<T: Reflect>(&mut self, dst: &mut T) -> Result<bool> {
        if !self.more()? {
            return Ok(false);
        }
        self.api.decode_value(&mut self.iter, dst)?;
        Ok(true)
    }

    /// Reads the next value as a lazy [`Any`].
    pub fn decode_any(&mut self) -> Result<Option<Any>> {
        if !self.more()? {
            return Ok(None);
        }
        self.iter.read_any().map(Some)
    }

    /// Whether another value follows.
    pub fn more(&mut self) -> Result<bool> {
        Ok(self.iter.skip_whitespace()?.is_some())
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.iter.position()
    }
}

/// Encodes values to a sink, each followed by a newline.
pub struct StreamEncoder<'a> {
    api: &'a Api,
    writer: Writer<'a>,
}

impl<'a> StreamEncoder<'a> {
    pub(crate) fn new(api: &'a Api, writer: Writer<'a>) -> StreamEncoder<'a> {
        StreamEncoder { api, writer }
    }

    /// Encodes `v` and a trailing newline. Output reaches the sink once the
    /// buffer fills up or on [`StreamEncoder::flush`].
    pub fn encode<T: Reflect>(&mut self, v: &T) -> Result<()> {
        self.api.encode_value(&mut self.writer, v)?;
        self.writer.write_raw(b"\n");
        match self.writer.error() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }
}

impl Drop for StreamEncoder<'_> {
    fn drop(&mut self) {
        // unflushed output is discarded; callers flush explicitly
        self.api.recycle_buf(self.writer.take_buf());
    }
}
