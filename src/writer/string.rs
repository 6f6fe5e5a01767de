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

use super::Writer;

const UU: u8 = b'u'; // \u00XX
const __: u8 = 0; // no escape

// Escape to write for each byte, 0 when the byte is copied as is.
static ESCAPE: [u8; 256] = {
    let mut table = [__; 256];
    let mut c = 0;
    while c < 0x20 {
        table[c] = UU;
        c += 1;
    }
    table[0x08] = b'b';
    table[0x09] = b't';
    table[0x0A] = b'n';
    table[0x0C] = b'f';
    table[0x0D] = b'r';
    table[b'"' as usize] = b'"';
    table[b'\\' as usize] = b'\\';
    table
};

// Like ESCAPE, plus `<`, `>`, `&` and the lead byte of U+2028/U+2029.
static ESCAPE_HTML: [u8; 256] = {
    let mut table = ESCAPE;
    table[b'<' as usize] = UU;
    table[b'>' as usize] = UU;
    table[b'&' as usize] = UU;
    table[0xE2] = 0xE2;
    table
};

static HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

impl Writer<'_> {
    /// Writes `s` as a quoted JSON string.
    ///
    /// Runs of bytes that need no escaping are copied in one go. Control
    /// characters use the short escapes where JSON has them and `\u00XX`
    /// otherwise.
    pub fn write_string(&mut self, s: &str) {
        let table = if self.options.escape_html {
            &ESCAPE_HTML
        } else {
            &ESCAPE
        };
        let bytes = s.as_bytes();
        self.buf.reserve(bytes.len() + 2);
        self.buf.push(b'"');
        let mut start = 0;
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            let escape = table[b as usize];
            if escape == __ {
                i += 1;
                continue;
            }
            if escape == 0xE2 {
                // only U+2028 and U+2029 are escaped, other E2 sequences are copied
                if !matches!(bytes.get(i + 1..i + 3), Some([0x80, 0xA8 | 0xA9])) {
                    i += 1;
                    continue;
                }
                self.buf.extend_from_slice(&bytes[start..i]);
                let last = if bytes[i + 2] == 0xA8 { b'8' } else { b'9' };
                self.buf.extend_from_slice(&[b'\\', b'u', b'2', b'0', b'2', last]);
                i += 3;
                start = i;
                continue;
            }
            self.buf.extend_from_slice(&bytes[start..i]);
            if escape == UU {
                self.buf.extend_from_slice(&[
                    b'\\',
                    b'u',
                    b'0',
                    b'0',
                    HEX_DIGITS[(b >> 4) as usize],
                    HEX_DIGITS[(b & 0xF) as usize],
                ]);
            } else {
                self.buf.extend_from_slice(&[b'\\', escape]);
            }
            i += 1;
            start = i;
        }
        self.buf.extend_from_slice(&bytes[start..]);
        self.buf.push(b'"');
        self.maybe_flush();
    }
}
