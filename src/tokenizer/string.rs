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

use memchr::memchr;
use memchr::memchr2;

use super::Tokenizer;
use crate::constants::*;
use crate::error::ParseErrorCode;
use crate::error::Result;

#[allow(clippy::zero_prefixed_literal)]
static HEX: [u8; 256] = {
    const __: u8 = 255; // not a hex digit
    [
        //   1   2   3   4   5   6   7   8   9   A   B   C   D   E   F
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // 0
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // 1
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // 2
        00, 01, 02, 03, 04, 05, 06, 07, 08, 09, __, __, __, __, __, __, // 3
        __, 10, 11, 12, 13, 14, 15, __, __, __, __, __, __, __, __, __, // 4
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // 5
        __, 10, 11, 12, 13, 14, 15, __, __, __, __, __, __, __, __, __, // 6
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // 7
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // 8
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // 9
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // A
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // B
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // C
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // D
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // E
        __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, __, // F
    ]
};

#[inline]
fn has_control(bytes: &[u8]) -> bool {
    bytes.iter().any(|c| *c < 0x20)
}

impl<'a> Tokenizer<'a> {
    /// Reads a string value, unescaping it when needed.
    ///
    /// The result borrows either the input or the tokenizer's scratch
    /// buffer and is valid until the next read.
    pub fn read_str(&mut self) -> Result<&str> {
        let (start, end, escaped) = self.read_string_span()?;
        self.span_as_str(start, end, escaped)
    }

    pub fn read_string(&mut self) -> Result<String> {
        self.read_str().map(|s| s.to_string())
    }

    /// Consumes a quoted string and returns where its content lives.
    ///
    /// `(start, end, false)` is a range of the current window holding the
    /// content verbatim. `(0, len, true)` means the unescaped content was
    /// written to the scratch buffer. The content is valid UTF-8 either way.
    pub(crate) fn read_string_span(&mut self) -> Result<(usize, usize, bool)> {
        let c = self.next_token()?;
        if c != b'"' {
            self.unread()?;
            return Err(self.fail(ParseErrorCode::InvalidStringValue));
        }
        let start = self.head;
        let found = memchr2(b'"', b'\\', &self.window()[start..]).map(|i| start + i);
        if let Some(end) = found {
            if self.window()[end] == b'"' {
                let content = &self.window()[start..end];
                if has_control(content) {
                    self.head = start + content.iter().position(|c| *c < 0x20).unwrap_or(0);
                    return Err(self.fail(ParseErrorCode::ControlCharacterWhileParsingString));
                }
                if std::str::from_utf8(content).is_err() {
                    return Err(self.fail(ParseErrorCode::InvalidStringValue));
                }
                self.head = end + 1;
                return Ok((start, end, false));
            }
        }
        self.scratch.clear();
        self.read_string_slow()?;
        if std::str::from_utf8(&self.scratch).is_err() {
            return Err(self.fail(ParseErrorCode::InvalidStringValue));
        }
        Ok((0, self.scratch.len(), true))
    }

    /// Scans an object key without unescaping it.
    pub(crate) fn scan_simple_string(&mut self) -> Result<(usize, usize, bool)> {
        let c = self.next_token()?;
        if c != b'"' {
            self.unread()?;
            return Err(self.fail(ParseErrorCode::KeyMustBeAString));
        }
        let start = self.head;
        match memchr(b'"', &self.window()[start..]) {
            Some(i) if std::str::from_utf8(&self.window()[start..start + i]).is_ok() => {
                self.head = start + i + 1;
                Ok((start, start + i, false))
            }
            _ => {
                self.head = start - 1;
                self.read_string_span()
            }
        }
    }

    pub(crate) fn span_as_str(&self, start: usize, end: usize, escaped: bool) -> Result<&str> {
        let bytes = if escaped {
            &self.scratch[start..end]
        } else {
            &self.window()[start..end]
        };
        // SAFETY: spans are validated as UTF-8 before they are handed out.
        Ok(unsafe { std::str::from_utf8_unchecked(bytes) })
    }

    /// Moves a window span into scratch so it survives a refill.
    pub(crate) fn detach_span(&mut self, start: usize, end: usize) -> (usize, usize, bool) {
        self.scratch.clear();
        if self.is_streaming() {
            self.scratch.extend_from_slice(&self.buf[start..end]);
        } else {
            self.scratch.extend_from_slice(&self.input[start..end]);
        }
        (0, self.scratch.len(), true)
    }

    fn read_string_slow(&mut self) -> Result<()> {
        loop {
            let start = self.head;
            let found = memchr2(b'"', b'\\', &self.window()[start..]).map(|i| start + i);
            let end = found.unwrap_or(self.tail);
            let chunk = if self.is_streaming() {
                &self.buf[start..end]
            } else {
                &self.input[start..end]
            };
            if let Some(offset) = chunk.iter().position(|c| *c < 0x20) {
                self.head = start + offset;
                return Err(self.fail(ParseErrorCode::ControlCharacterWhileParsingString));
            }
            self.scratch.extend_from_slice(chunk);
            self.head = end;
            match found {
                Some(_) => {
                    if self.next_byte()? == b'"' {
                        return Ok(());
                    }
                    self.read_escape()?;
                }
                None => {
                    if !self.load_more()? {
                        return Err(self.fail(ParseErrorCode::InvalidEOF));
                    }
                }
            }
        }
    }

    #[inline]
    fn push_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.scratch
            .extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
    }

    fn read_escape(&mut self) -> Result<()> {
        let c = self.next_byte()?;
        let ch = match c {
            b'\\' => BS,
            b'"' => QU,
            b'/' => SD,
            b'b' => BB,
            b'f' => FF,
            b'n' => NN,
            b'r' => RR,
            b't' => TT,
            b'u' => return self.read_unicode_escape(),
            other => return Err(self.fail(ParseErrorCode::InvalidEscaped(other))),
        };
        self.push_char(ch);
        Ok(())
    }

    fn read_hex4(&mut self) -> Result<u16> {
        let mut n = 0u16;
        for _ in 0..UNICODE_LEN {
            let c = match self.peek_byte()? {
                Some(c) => c,
                None => return Err(self.fail(ParseErrorCode::UnexpectedEndOfHexEscape)),
            };
            self.head += 1;
            let hex = HEX[c as usize];
            if hex == 255 {
                return Err(self.fail(ParseErrorCode::InvalidHex(c)));
            }
            n = (n << 4) + hex as u16;
        }
        Ok(n)
    }

    /// Decodes `XXXX` after `\u`, pairing UTF-16 surrogates.
    ///
    /// Unpaired or malformed surrogates decode to U+FFFD. A high surrogate
    /// followed by an escape that is not a low surrogate yields U+FFFD and
    /// the following escape is decoded on its own.
    fn read_unicode_escape(&mut self) -> Result<()> {
        let mut n1 = self.read_hex4()?;
        loop {
            match n1 {
                0xDC00..=0xDFFF => {
                    self.push_char(REPLACEMENT);
                    return Ok(());
                }
                0xD800..=0xDBFF => {
                    if self.peek_byte()? != Some(b'\\') {
                        self.push_char(REPLACEMENT);
                        return Ok(());
                    }
                    self.next_byte()?;
                    if self.peek_byte()? != Some(b'u') {
                        self.push_char(REPLACEMENT);
                        return self.read_escape();
                    }
                    self.next_byte()?;
                    let n2 = self.read_hex4()?;
                    if !(0xDC00..=0xDFFF).contains(&n2) {
                        self.push_char(REPLACEMENT);
                        n1 = n2;
                        continue;
                    }
                    let n = ((((n1 - 0xD800) as u32) << 10) | (n2 - 0xDC00) as u32) + 0x1_0000;
                    self.push_char(char::from_u32(n).unwrap_or(REPLACEMENT));
                    return Ok(());
                }
                n => {
                    self.push_char(char::from_u32(n as u32).unwrap_or(REPLACEMENT));
                    return Ok(());
                }
            }
        }
    }
}
