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

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::Any;
use crate::error::Error;
use crate::error::ParseErrorCode;
use crate::error::Result;
use crate::number::Number;
use crate::tokenizer::Tokenizer;
use crate::tokenizer::TokenizerOptions;

/// The bytes of one top level value, shared by every node read from it.
pub(super) struct Doc {
    bytes: Vec<u8>,
    options: TokenizerOptions,
    // container scans started plus numbers parsed
    parses: AtomicUsize,
}

impl Doc {
    pub(super) fn new(bytes: Vec<u8>, options: TokenizerOptions) -> Doc {
        Doc {
            bytes,
            options,
            parses: AtomicUsize::new(0),
        }
    }

    pub(super) fn parses(&self) -> usize {
        self.parses.load(Ordering::Relaxed)
    }

    fn count_parse(&self) {
        self.parses.fetch_add(1, Ordering::Relaxed);
    }
}

/// The bytes of one value inside a [`Doc`].
#[derive(Clone)]
pub(super) struct Span {
    pub(super) doc: Arc<Doc>,
    start: usize,
    end: usize,
}

impl Span {
    pub(super) fn root(doc: Arc<Doc>) -> Span {
        let end = doc.bytes.len();
        Span { doc, start: 0, end }
    }

    pub(super) fn bytes(&self) -> &[u8] {
        &self.doc.bytes[self.start..self.end]
    }

    fn tokenizer(&self) -> Tokenizer<'_> {
        Tokenizer::new(self.bytes()).with_options(self.doc.options)
    }
}

pub(super) enum Node {
    Invalid(Error),
    Null,
    Bool(bool),
    String(String),
    Number(LazyNumber),
    Array(LazyContainer),
    Object(LazyContainer),
    /// Elements collected by a wildcard over an array.
    List(Vec<Any>),
    /// Members collected by a wildcard over an object.
    Map(Vec<(String, Any)>),
}

impl Node {
    /// Classifies a span holding exactly one value that was already skipped
    /// over. Strings are unescaped right away, containers and numbers wait.
    pub(super) fn from_span(span: Span) -> Node {
        match span.bytes().first() {
            Some(b'n') => Node::Null,
            Some(b't') => Node::Bool(true),
            Some(b'f') => Node::Bool(false),
            Some(b'"') => match span.tokenizer().read_string() {
                Ok(s) => Node::String(s),
                Err(e) => Node::Invalid(e),
            },
            Some(b'[') => Node::Array(LazyContainer::new(span)),
            Some(b'{') => Node::Object(LazyContainer::new(span)),
            Some(_) => Node::Number(LazyNumber::new(span)),
            None => Node::Invalid(Error::Syntax(ParseErrorCode::InvalidEOF, 0)),
        }
    }

    /// The span this node was read from, if any.
    pub(super) fn span(&self) -> Option<&Span> {
        match self {
            Node::Number(n) => Some(&n.span),
            Node::Array(c) | Node::Object(c) => Some(&c.span),
            _ => None,
        }
    }
}

pub(super) struct LazyNumber {
    span: Span,
    parsed: OnceCell<Result<Number>>,
}

impl LazyNumber {
    fn new(span: Span) -> LazyNumber {
        LazyNumber {
            span,
            parsed: OnceCell::new(),
        }
    }

    pub(super) fn text(&self) -> &str {
        // numbers are ASCII once skipped
        std::str::from_utf8(self.span.bytes()).unwrap_or_default()
    }

    pub(super) fn get(&self) -> Result<Number> {
        self.parsed
            .get_or_init(|| {
                self.span.doc.count_parse();
                let mut iter = self.span.tokenizer();
                iter.read_number().and_then(|n| iter.expect_end().map(|_| n))
            })
            .clone()
    }
}

#[derive(Default)]
struct ScanState {
    items: Vec<Any>,
    // parallel to `items` for objects
    keys: Vec<String>,
    // absolute offset of the next unread byte
    offset: usize,
    started: bool,
    done: bool,
    error: Option<Error>,
}

/// An array or object whose children are read on demand.
///
/// Children are appended in document order and never re-read, so the
/// state only ever moves forward.
pub(super) struct LazyContainer {
    span: Span,
    state: Mutex<ScanState>,
}

/// How far to scan a container.
#[derive(Clone, Copy)]
pub(super) enum Until<'a> {
    Index(usize),
    Key(&'a str),
    End,
}

impl LazyContainer {
    fn new(span: Span) -> LazyContainer {
        LazyContainer {
            span,
            state: Mutex::new(ScanState::default()),
        }
    }

    fn delimiters(&self) -> (u8, u8) {
        match self.span.bytes().first() {
            Some(b'{') => (b'{', b'}'),
            _ => (b'[', b']'),
        }
    }

    /// Scans forward until `until` is satisfied and returns the child found.
    pub(super) fn scan(&self, until: Until<'_>) -> Result<Option<Any>> {
        let mut state = self.state.lock();
        if let Until::Key(key) = until {
            if let Some(idx) = state.keys.iter().position(|k| k == key) {
                return Ok(state.items.get(idx).cloned());
            }
        }
        loop {
            match until {
                Until::Index(idx) if idx < state.items.len() => {
                    return Ok(Some(state.items[idx].clone()));
                }
                _ => {}
            }
            if state.done {
                return match state.error.clone() {
                    Some(err) => Err(err),
                    None => Ok(None),
                };
            }
            if let Err(err) = self.advance(&mut state) {
                state.done = true;
                state.error = Some(err.clone());
                return Err(err);
            }
            if let Until::Key(key) = until {
                if state.keys.last().is_some_and(|k| k == key) {
                    return Ok(state.items.last().cloned());
                }
            }
        }
    }

    /// All children, scanning the rest of the container first.
    pub(super) fn children(&self) -> Result<Vec<(String, Any)>> {
        self.scan(Until::End)?;
        let state = self.state.lock();
        let keys = state.keys.iter().cloned().chain(std::iter::repeat(String::new()));
        Ok(keys.zip(state.items.iter().cloned()).collect())
    }

    /// Reads one more child, or the closing delimiter.
    fn advance(&self, state: &mut ScanState) -> Result<()> {
        let doc = &self.span.doc;
        let (open, close) = self.delimiters();
        let object = open == b'{';
        if !state.started {
            state.started = true;
            state.offset = self.span.start + 1;
            doc.count_parse();
        }
        let base = state.offset;
        let mut iter = Tokenizer::new(&doc.bytes[base..self.span.end]).with_options(doc.options);
        if state.items.is_empty() && iter.skip_whitespace()? == Some(close) {
            state.done = true;
            return Ok(());
        }
        let key = if object {
            let key = iter.read_string()?;
            iter.expect(b':', ParseErrorCode::ExpectedColon)?;
            Some(key)
        } else {
            None
        };
        if iter.skip_whitespace()?.is_none() {
            return Err(iter.fail(ParseErrorCode::InvalidEOF));
        }
        let start = base + iter.position();
        iter.skip()?;
        let end = base + iter.position();
        let child = Node::from_span(Span {
            doc: doc.clone(),
            start,
            end,
        });
        // keys and items grow together, a failed child leaves neither behind
        state.keys.extend(key);
        state.items.push(Any::from_node(child));
        match iter.next_token()? {
            b',' => {}
            c if c == close => state.done = true,
            _ if object => return Err(iter.fail(ParseErrorCode::ExpectedObjectCommaOrEnd)),
            _ => return Err(iter.fail(ParseErrorCode::ExpectedArrayCommaOrEnd)),
        }
        state.offset = base + iter.position();
        Ok(())
    }

    #[cfg(test)]
    pub(super) fn is_started(&self) -> bool {
        self.state.lock().started
    }
}
