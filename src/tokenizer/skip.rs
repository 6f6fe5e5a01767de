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

use memchr::memchr2;
use smallvec::SmallVec;

use super::Tokenizer;
use super::ValueType;
use crate::constants::UNICODE_LEN;
use crate::error::ParseErrorCode;
use crate::error::Result;

impl<'a> Tokenizer<'a> {
    /// Skips the next value without materializing it.
    ///
    /// Separators, literals, numbers and escapes are checked on the way, so
    /// a skipped span is always well formed JSON. Strings are not unescaped
    /// and their UTF-8 is only checked when they are read.
    pub fn skip(&mut self) -> Result<()> {
        match self.next_token()? {
            b'[' => self.skip_container(b']'),
            b'{' => self.skip_container(b'}'),
            _ => {
                self.unread()?;
                self.skip_scalar()
            }
        }
    }

    fn skip_scalar(&mut self) -> Result<()> {
        match self.next_token()? {
            b'"' => self.skip_string(),
            b'-' | b'0'..=b'9' | b'N' | b'I' => {
                self.unread()?;
                self.read_number_text().map(|_| ())
            }
            b't' => self.expect_literal(b"rue"),
            b'f' => self.expect_literal(b"alse"),
            b'n' => self.expect_literal(b"ull"),
            _ => {
                self.unread()?;
                Err(self.fail(ParseErrorCode::ExpectedSomeValue))
            }
        }
    }

    /// Skips the rest of a string whose opening quote was consumed.
    fn skip_string(&mut self) -> Result<()> {
        loop {
            let start = self.head;
            let found = memchr2(b'"', b'\\', &self.window()[start..]).map(|i| start + i);
            let end = found.unwrap_or(self.tail);
            if let Some(i) = self.window()[start..end].iter().position(|c| *c < 0x20) {
                self.head = start + i;
                return Err(self.fail(ParseErrorCode::ControlCharacterWhileParsingString));
            }
            match found {
                Some(end) => {
                    let quote = self.window()[end] == b'"';
                    self.head = end + 1;
                    if quote {
                        return Ok(());
                    }
                    self.skip_escape()?;
                }
                None => {
                    self.head = self.tail;
                    if !self.load_more()? {
                        return Err(self.fail(ParseErrorCode::InvalidEOF));
                    }
                }
            }
        }
    }

    /// Checks the escape after a backslash, possibly in the next window.
    fn skip_escape(&mut self) -> Result<()> {
        match self.next_byte()? {
            b'"' | b'\\' | b'/' | b'b' | b'f' | b'n' | b'r' | b't' => Ok(()),
            b'u' => {
                for _ in 0..UNICODE_LEN {
                    let c = self.next_byte()?;
                    if !c.is_ascii_hexdigit() {
                        return Err(self.fail(ParseErrorCode::InvalidHex(c)));
                    }
                }
                Ok(())
            }
            c => Err(self.fail(ParseErrorCode::InvalidEscaped(c))),
        }
    }

    /// Skips a container whose opening bracket was consumed. `close` is
    /// the bracket that ends it.
    ///
    /// Nesting is tracked on an explicit stack, so deep input costs heap
    /// rather than call frames.
    fn skip_container(&mut self, close: u8) -> Result<()> {
        let mut stack: SmallVec<[u8; 32]> = SmallVec::new();
        stack.push(close);
        self.check_skip_depth(stack.len())?;
        let mut opened = true;
        loop {
            let close = stack[stack.len() - 1];
            let mut c = self.next_token()?;
            if opened && c == close {
                stack.pop();
                if stack.is_empty() {
                    return Ok(());
                }
            } else {
                if close == b'}' {
                    if c != b'"' {
                        self.unread()?;
                        return Err(self.fail(ParseErrorCode::KeyMustBeAString));
                    }
                    self.skip_string()?;
                    self.expect(b':', ParseErrorCode::ExpectedColon)?;
                    c = self.next_token()?;
                }
                match c {
                    b'[' | b'{' => {
                        stack.push(if c == b'[' { b']' } else { b'}' });
                        self.check_skip_depth(stack.len())?;
                        opened = true;
                        continue;
                    }
                    _ => {
                        self.unread()?;
                        self.skip_scalar()?;
                    }
                }
            }
            // a value just ended, close as many containers as follow it
            loop {
                let close = stack[stack.len() - 1];
                match self.next_token()? {
                    b',' => break,
                    c if c == close => {
                        stack.pop();
                        if stack.is_empty() {
                            return Ok(());
                        }
                    }
                    _ => {
                        self.unread()?;
                        let code = if close == b'}' {
                            ParseErrorCode::ExpectedObjectCommaOrEnd
                        } else {
                            ParseErrorCode::ExpectedArrayCommaOrEnd
                        };
                        return Err(self.fail(code));
                    }
                }
            }
            opened = false;
        }
    }

    /// Consumes the next value, checking the full grammar on the way.
    ///
    /// Unlike [`Tokenizer::skip`] this also decodes strings, so invalid
    /// UTF-8 is caught. It is what `valid` is built on.
    pub fn validate(&mut self) -> Result<()> {
        match self.what_is_next()? {
            ValueType::String => {
                self.read_str()?;
            }
            ValueType::Number => {
                self.read_number_text()?;
            }
            ValueType::Null => self.read_null()?,
            ValueType::Bool => {
                self.read_bool()?;
            }
            ValueType::Array => {
                if self.read_array_begin()? {
                    loop {
                        self.validate()?;
                        if !self.read_array_more()? {
                            break;
                        }
                    }
                }
            }
            ValueType::Object => {
                if self.read_object_begin()? {
                    loop {
                        self.read_field_name()?;
                        self.validate()?;
                        if !self.read_object_more()? {
                            break;
                        }
                    }
                }
            }
            ValueType::Invalid => {
                self.next_token()?;
                self.unread()?;
                return Err(self.fail(ParseErrorCode::ExpectedSomeValue));
            }
        }
        Ok(())
    }

    fn check_skip_depth(&mut self, nested: usize) -> Result<()> {
        let max_depth = self.options.max_depth;
        if self.depth + nested > max_depth {
            return Err(self.fail(ParseErrorCode::DepthLimitExceeded(max_depth)));
        }
        Ok(())
    }
}
