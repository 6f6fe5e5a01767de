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

//! Codec configuration and the frozen [`Api`] handle.
//!
//! A [`Config`] is a plain set of options. Freezing it produces an [`Api`],
//! which owns everything that is derived from those options: the compiled
//! strategies, the registered extensions and the buffer pools. Two `Api`s
//! never share strategies, so options that change compilation can not leak
//! from one to the other.

use std::any::Any as StdAny;
use std::any::TypeId;
use std::collections::HashMap;
use std::io::Read;
use std::io::Write;
use std::ops::Deref;
use std::ops::DerefMut;
use std::sync::Arc;
use std::sync::Weak;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::trace;
use tracing::warn;

use crate::any::Any;
use crate::any::PathKey;
use crate::codec::ValDecoder;
use crate::codec::ValEncoder;
use crate::constants::DEFAULT_MAX_DEPTH;
use crate::constants::MAX_POOLED_BUFFERS;
use crate::constants::MAX_POOLED_CAPACITY;
use crate::error::Error;
use crate::error::ParseErrorCode;
use crate::error::Result;
use crate::extension::Extension;
use crate::reflect::Reflect;
use crate::stream::StreamDecoder;
use crate::stream::StreamEncoder;
use crate::tokenizer::Tokenizer;
use crate::tokenizer::TokenizerOptions;
use crate::writer::Writer;
use crate::writer::WriterOptions;

/// Options that parameterize compilation, decoding and encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Config {
    /// Spaces per nesting level when encoding. Zero writes compact output.
    pub indention_step: usize,
    pub escape_html: bool,
    /// Encode map entries sorted by key.
    pub sort_map_keys: bool,
    /// Match struct fields honoring case.
    pub case_sensitive: bool,
    pub disallow_unknown_fields: bool,
    /// Accept and emit `NaN`, `Infinity` and `-Infinity`.
    pub permissive_numbers: bool,
    /// Encode floats with at most six fraction digits.
    pub lossy_float: bool,
    /// Encode `None` lists and maps as `[]` and `{}`.
    pub nil_safe_collections: bool,
    /// Bind only fields that carry an explicit tag.
    pub only_tagged_fields: bool,
    /// Check `RawJson` values and custom marshal output before writing them.
    pub validate_raw_json: bool,
    /// Read object keys without unescaping them.
    pub object_field_simple_string: bool,
    /// Ignore whatever follows the top level value when decoding.
    pub allow_trailing_data: bool,
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            indention_step: 0,
            escape_html: true,
            sort_map_keys: false,
            case_sensitive: false,
            disallow_unknown_fields: false,
            permissive_numbers: false,
            lossy_float: false,
            nil_safe_collections: false,
            only_tagged_fields: false,
            validate_raw_json: false,
            object_field_simple_string: false,
            allow_trailing_data: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl Config {
    /// Output that matches conservative standard library encoders.
    pub fn standard() -> Config {
        Config {
            escape_html: true,
            sort_map_keys: true,
            validate_raw_json: true,
            ..Default::default()
        }
    }

    /// Trades exactness for speed.
    pub fn fastest() -> Config {
        Config {
            escape_html: false,
            lossy_float: true,
            object_field_simple_string: true,
            ..Default::default()
        }
    }

    /// Freezes the options into an [`Api`] with empty caches.
    pub fn froze(self) -> Api {
        let inner = Arc::new_cyclic(|this| ApiInner {
            config: self,
            extensions: RwLock::new(Vec::new()),
            decoders: RwLock::new(HashMap::new()),
            encoders: RwLock::new(HashMap::new()),
            this: this.clone(),
            scratch_pool: BufferPool::default(),
            buf_pool: BufferPool::default(),
        });
        Api { inner }
    }

    pub fn tokenizer_options(&self) -> TokenizerOptions {
        TokenizerOptions {
            max_depth: self.max_depth,
            permissive_numbers: self.permissive_numbers,
            object_field_simple_string: self.object_field_simple_string,
        }
    }

    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            indent: self.indention_step,
            escape_html: self.escape_html,
            lossy_float: self.lossy_float,
            permissive_numbers: self.permissive_numbers,
        }
    }
}

/// Idle byte buffers kept for reuse.
#[derive(Default)]
pub(crate) struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    fn take(&self) -> Vec<u8> {
        match self.buffers.lock().pop() {
            Some(buf) => {
                trace!(capacity = buf.capacity(), "reusing pooled buffer");
                buf
            }
            None => Vec::new(),
        }
    }

    fn put(&self, mut buf: Vec<u8>) {
        if buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        buf.clear();
        let mut buffers = self.buffers.lock();
        if buffers.len() < MAX_POOLED_BUFFERS {
            buffers.push(buf);
        }
    }

    #[cfg(test)]
    fn idle(&self) -> usize {
        self.buffers.lock().len()
    }
}

pub(crate) struct ApiInner {
    pub(crate) config: Config,
    pub(crate) extensions: RwLock<Vec<Arc<dyn Extension>>>,
    pub(crate) decoders: RwLock<HashMap<TypeId, Arc<ValDecoder>>>,
    pub(crate) encoders: RwLock<HashMap<TypeId, Arc<ValEncoder>>>,
    pub(crate) this: Weak<ApiInner>,
    scratch_pool: BufferPool,
    buf_pool: BufferPool,
}

/// A frozen configuration with its strategy caches.
///
/// Cloning is cheap and clones share caches and extensions.
#[derive(Clone)]
pub struct Api {
    inner: Arc<ApiInner>,
}

impl Api {
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Appends an extension and drops every strategy compiled so far.
    pub fn register_extension(&self, ext: Arc<dyn Extension>) {
        self.inner.extensions.write().push(ext);
        let mut decoders = self.inner.decoders.write();
        let mut encoders = self.inner.encoders.write();
        if !decoders.is_empty() || !encoders.is_empty() {
            warn!(
                decoders = decoders.len(),
                encoders = encoders.len(),
                "extension registered after compilation, dropping cached strategies"
            );
        }
        decoders.clear();
        encoders.clear();
    }

    /// The decoder compiled for `T`.
    pub fn decoder_of<T: Reflect>(&self) -> Arc<ValDecoder> {
        if let Some(dec) = self.inner.decoders.read().get(&TypeId::of::<T>()) {
            trace!(ty = std::any::type_name::<T>(), "decoder cache hit");
            return dec.clone();
        }
        self.inner.decoder_for(&T::type_info())
    }

    /// The encoder compiled for `T`.
    pub fn encoder_of<T: Reflect>(&self) -> Arc<ValEncoder> {
        if let Some(enc) = self.inner.encoders.read().get(&TypeId::of::<T>()) {
            trace!(ty = std::any::type_name::<T>(), "encoder cache hit");
            return enc.clone();
        }
        self.inner.encoder_for(&T::type_info())
    }

    /// Decodes the next value of `iter` into `dst`.
    pub fn decode_value<T: Reflect>(&self, iter: &mut Tokenizer<'_>, dst: &mut T) -> Result<()> {
        self.decoder_of::<T>().decode(dst as &mut dyn StdAny, iter)
    }

    /// Encodes `v` into `w`.
    pub fn encode_value<T: Reflect>(&self, w: &mut Writer<'_>, v: &T) -> Result<()> {
        self.encoder_of::<T>().encode(v as &dyn StdAny, w)
    }

    pub fn marshal<T: Reflect>(&self, v: &T) -> Result<Vec<u8>> {
        let mut w = self.borrow_writer();
        self.encode_value(&mut w, v)?;
        Ok(w.buffered().to_vec())
    }

    pub fn marshal_to_string<T: Reflect>(&self, v: &T) -> Result<String> {
        let bytes = self.marshal(v)?;
        String::from_utf8(bytes).map_err(|e| Error::Message(e.to_string()))
    }

    /// Encodes `v` with `step` spaces of indentation per level.
    pub fn marshal_indent<T: Reflect>(&self, v: &T, step: usize) -> Result<Vec<u8>> {
        let mut w = self.borrow_writer();
        w.set_options(WriterOptions {
            indent: step,
            ..self.inner.config.writer_options()
        });
        self.encode_value(&mut w, v)?;
        Ok(w.buffered().to_vec())
    }

    /// Decodes a single value from `data` into `dst`.
    ///
    /// Whitespace may surround the value. Anything else after it is an error
    /// unless `allow_trailing_data` is set.
    pub fn unmarshal<T: Reflect>(&self, data: &[u8], dst: &mut T) -> Result<()> {
        let mut iter = self.borrow_tokenizer(data);
        if iter.skip_whitespace()?.is_none() {
            return Err(iter.fail(ParseErrorCode::InvalidEOF));
        }
        self.decode_value(&mut iter, dst)?;
        if !self.inner.config.allow_trailing_data {
            iter.expect_end()?;
        }
        Ok(())
    }

    pub fn unmarshal_str<T: Reflect>(&self, data: &str, dst: &mut T) -> Result<()> {
        self.unmarshal(data.as_bytes(), dst)
    }

    /// Reads `data` as a lazy [`Any`]. Failures give an invalid `Any`.
    pub fn read_any(&self, data: &[u8]) -> Any {
        Any::from_bytes_with(data, self.inner.config.tokenizer_options())
    }

    /// Reads `data` and navigates to `path`.
    pub fn get(&self, data: &[u8], path: &[PathKey]) -> Any {
        self.read_any(data).get(path)
    }

    /// Whether `data` holds exactly one well formed JSON value.
    pub fn valid(&self, data: &[u8]) -> bool {
        let mut iter = self.borrow_tokenizer(data);
        match iter.skip_whitespace() {
            Ok(Some(_)) => {}
            _ => return false,
        }
        iter.validate().and_then(|_| iter.expect_end()).is_ok()
    }

    /// Decodes consecutive values from `reader`.
    pub fn new_decoder<'a, R: Read + 'a>(&'a self, reader: R) -> StreamDecoder<'a> {
        let iter = Tokenizer::from_reader(reader).with_options(self.inner.config.tokenizer_options());
        StreamDecoder::new(self, iter)
    }

    /// Encodes values to `sink`, one per line.
    pub fn new_encoder<'a, W: Write + 'a>(&'a self, sink: W) -> StreamEncoder<'a> {
        let buf = self.inner.buf_pool.take();
        let mut writer = Writer::to_writer_with_buf(sink, buf).with_options(self.inner.config.writer_options());
        writer.set_max_depth(self.inner.config.max_depth);
        StreamEncoder::new(self, writer)
    }

    pub(crate) fn recycle_buf(&self, buf: Vec<u8>) {
        self.inner.buf_pool.put(buf);
    }

    /// A tokenizer over `data` whose scratch buffer comes from the pool.
    pub fn borrow_tokenizer<'a>(&'a self, data: &'a [u8]) -> TokenizerGuard<'a> {
        let scratch = self.inner.scratch_pool.take();
        let iter = Tokenizer::with_scratch(data, scratch).with_options(self.inner.config.tokenizer_options());
        TokenizerGuard {
            iter,
            pool: &self.inner.scratch_pool,
        }
    }

    /// An in-memory writer whose buffer comes from the pool.
    pub fn borrow_writer(&self) -> WriterGuard<'_> {
        let mut writer = Writer::from_buf(self.inner.buf_pool.take()).with_options(self.inner.config.writer_options());
        writer.set_max_depth(self.inner.config.max_depth);
        WriterGuard {
            writer,
            pool: &self.inner.buf_pool,
        }
    }
}

/// A pooled [`Tokenizer`]; its scratch buffer goes back to the pool on drop.
pub struct TokenizerGuard<'a> {
    iter: Tokenizer<'a>,
    pool: &'a BufferPool,
}

impl<'a> Deref for TokenizerGuard<'a> {
    type Target = Tokenizer<'a>;

    fn deref(&self) -> &Self::Target {
        &self.iter
    }
}

impl DerefMut for TokenizerGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.iter
    }
}

impl Drop for TokenizerGuard<'_> {
    fn drop(&mut self) {
        self.pool.put(self.iter.take_scratch());
    }
}

/// A pooled in-memory [`Writer`]; its buffer goes back to the pool on drop.
pub struct WriterGuard<'a> {
    writer: Writer<'static>,
    pool: &'a BufferPool,
}

impl Deref for WriterGuard<'_> {
    type Target = Writer<'static>;

    fn deref(&self) -> &Self::Target {
        &self.writer
    }
}

impl DerefMut for WriterGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.writer
    }
}

impl Drop for WriterGuard<'_> {
    fn drop(&mut self) {
        self.pool.put(self.writer.take_buf());
    }
}

static DEFAULT_API: Lazy<Api> = Lazy::new(|| Config::default().froze());
static STANDARD_API: Lazy<Api> = Lazy::new(|| Config::standard().froze());
static FASTEST_API: Lazy<Api> = Lazy::new(|| Config::fastest().froze());

/// The process wide `Api` for [`Config::default`].
pub fn default_api() -> &'static Api {
    &DEFAULT_API
}

/// The process wide `Api` for [`Config::standard`].
pub fn standard_api() -> &'static Api {
    &STANDARD_API
}

/// The process wide `Api` for [`Config::fastest`].
pub fn fastest_api() -> &'static Api {
    &FASTEST_API
}

pub fn marshal<T: Reflect>(v: &T) -> Result<Vec<u8>> {
    default_api().marshal(v)
}

pub fn marshal_to_string<T: Reflect>(v: &T) -> Result<String> {
    default_api().marshal_to_string(v)
}

pub fn unmarshal<T: Reflect>(data: &[u8], dst: &mut T) -> Result<()> {
    default_api().unmarshal(data, dst)
}

pub fn get(data: &[u8], path: &[PathKey]) -> Any {
    default_api().get(data, path)
}

pub fn valid(data: &[u8]) -> bool {
    default_api().valid(data)
}
