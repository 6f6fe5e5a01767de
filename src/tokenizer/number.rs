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

use super::Tokenizer;
use crate::error::ParseErrorCode;
use crate::error::Result;
use crate::number::Number;

const INVALID: u8 = 255;

// Accumulating one more digit below this bound can never overflow a u64.
const SAFE_U64: u64 = u64::MAX / 10 - 1;

// Largest mantissa that converts to f64 exactly.
const MAX_EXACT_MANTISSA: u64 = 1 << 53;

static DIGITS: [u8; 256] = {
    let mut table = [INVALID; 256];
    let mut c = b'0';
    while c <= b'9' {
        table[c as usize] = c - b'0';
        c += 1;
    }
    table
};

// Powers of ten that are exact in f64.
static POW10: [f64; 23] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15, 1e16,
    1e17, 1e18, 1e19, 1e20, 1e21, 1e22,
];

#[inline]
fn is_number_byte(c: u8) -> bool {
    matches!(c, b'0'..=b'9' | b'-' | b'+' | b'.' | b'e' | b'E')
}

/// Checks `s` against the JSON number grammar.
fn validate_number(s: &[u8]) -> bool {
    let digits = |s: &[u8], mut i: usize| {
        while i < s.len() && s[i].is_ascii_digit() {
            i += 1;
        }
        i
    };
    let mut i = 0;
    if s.first() == Some(&b'-') {
        i += 1;
    }
    match s.get(i) {
        Some(b'0') => i += 1,
        Some(b'1'..=b'9') => i = digits(s, i + 1),
        _ => return false,
    }
    if s.get(i) == Some(&b'.') {
        let start = i + 1;
        i = digits(s, start);
        if i == start {
            return false;
        }
    }
    if matches!(s.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(s.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let start = i;
        i = digits(s, start);
        if i == start {
            return false;
        }
    }
    i == s.len()
}

pub(crate) fn parse_float(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => fast_float2::parse::<f64, _>(text).ok(),
    }
}

pub(crate) fn parse_number_text(text: &str, is_float: bool) -> Option<Number> {
    if !is_float {
        if let Ok(v) = text.parse::<u64>() {
            return Some(Number::UInt64(v));
        }
        if let Ok(v) = text.parse::<i64>() {
            return Some(Number::Int64(v));
        }
    }
    parse_float(text).map(Number::Float64)
}

macro_rules! read_narrow_int {
    ($($name:ident => $ty:ty, $wide:ident;)*) => {
        $(
            pub fn $name(&mut self) -> Result<$ty> {
                let v = self.$wide()?;
                match <$ty>::try_from(v) {
                    Ok(v) => Ok(v),
                    Err(_) => Err(self.fail(ParseErrorCode::NumberOutOfRange)),
                }
            }
        )*
    };
}

impl<'a> Tokenizer<'a> {
    read_narrow_int! {
        read_i8 => i8, read_i64;
        read_i16 => i16, read_i64;
        read_i32 => i32, read_i64;
        read_isize => isize, read_i64;
        read_u8 => u8, read_u64;
        read_u16 => u16, read_u64;
        read_u32 => u32, read_u64;
        read_usize => usize, read_u64;
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let mut c = self.next_token()?;
        let negative = c == b'-';
        if negative {
            c = self.next_byte()?;
        }
        let v = self.read_positive(c)?;
        if negative {
            if v > i64::MAX as u64 + 1 {
                return Err(self.fail(ParseErrorCode::NumberOutOfRange));
            }
            Ok((v as i64).wrapping_neg())
        } else {
            if v > i64::MAX as u64 {
                return Err(self.fail(ParseErrorCode::NumberOutOfRange));
            }
            Ok(v as i64)
        }
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let c = self.next_token()?;
        if c == b'-' {
            self.unread()?;
            return Err(self.fail(ParseErrorCode::NumberOutOfRange));
        }
        self.read_positive(c)
    }

    pub fn read_i128(&mut self) -> Result<i128> {
        let parsed = {
            let (text, is_float) = self.read_number_text()?;
            (!is_float).then(|| text.parse::<i128>())
        };
        match parsed {
            Some(Ok(v)) => Ok(v),
            Some(Err(_)) => Err(self.fail(ParseErrorCode::NumberOutOfRange)),
            None => Err(self.fail(ParseErrorCode::ExpectedInteger)),
        }
    }

    pub fn read_u128(&mut self) -> Result<u128> {
        let parsed = {
            let (text, is_float) = self.read_number_text()?;
            (!is_float).then(|| text.parse::<u128>())
        };
        match parsed {
            Some(Ok(v)) => Ok(v),
            Some(Err(_)) => Err(self.fail(ParseErrorCode::NumberOutOfRange)),
            None => Err(self.fail(ParseErrorCode::ExpectedInteger)),
        }
    }

    /// Accumulates the digits of a non-negative integer whose first byte
    /// was already consumed.
    fn read_positive(&mut self, first: u8) -> Result<u64> {
        let d = DIGITS[first as usize];
        if d == INVALID {
            self.unread()?;
            return Err(self.fail(ParseErrorCode::InvalidNumberValue));
        }
        if d == 0 {
            self.assert_integer_end()?;
            return Ok(0);
        }
        let mut value = d as u64;
        loop {
            let window = self.window();
            let mut i = self.head;
            while i < window.len() {
                let d = DIGITS[window[i] as usize];
                if d == INVALID {
                    self.head = i;
                    self.assert_integer_end()?;
                    return Ok(value);
                }
                if value > SAFE_U64 {
                    match value.checked_mul(10).and_then(|v| v.checked_add(d as u64)) {
                        Some(v) => value = v,
                        None => {
                            self.head = i;
                            return Err(self.fail(ParseErrorCode::NumberOutOfRange));
                        }
                    }
                } else {
                    value = value * 10 + d as u64;
                }
                i += 1;
            }
            self.head = i;
            if !self.load_more()? {
                return Ok(value);
            }
        }
    }

    fn assert_integer_end(&mut self) -> Result<()> {
        match self.peek_byte()? {
            Some(b'.' | b'e' | b'E') => Err(self.fail(ParseErrorCode::ExpectedInteger)),
            Some(b'0'..=b'9') => Err(self.fail(ParseErrorCode::InvalidNumberValue)),
            _ => Ok(()),
        }
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        self.next_token()?;
        self.unread()?;
        if let Some(v) = self.read_f64_fast() {
            return Ok(v);
        }
        let parsed = {
            let (text, _) = self.read_number_text()?;
            parse_float(text)
        };
        match parsed {
            Some(v) => Ok(v),
            None => Err(self.fail(ParseErrorCode::InvalidNumberValue)),
        }
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let parsed = {
            let (text, _) = self.read_number_text()?;
            match text {
                "NaN" => Some(f32::NAN),
                "Infinity" => Some(f32::INFINITY),
                "-Infinity" => Some(f32::NEG_INFINITY),
                _ => fast_float2::parse::<f32, _>(text).ok(),
            }
        };
        match parsed {
            Some(v) => Ok(v),
            None => Err(self.fail(ParseErrorCode::InvalidNumberValue)),
        }
    }

    /// Parses a float held entirely in the current window whose mantissa
    /// and scale are exact in f64. Returns `None` without moving the
    /// cursor when the general path is needed.
    fn read_f64_fast(&mut self) -> Option<f64> {
        let window = self.window();
        let end = window.len();
        let mut i = self.head;
        let negative = window.get(i) == Some(&b'-');
        if negative {
            i += 1;
        }
        let d = DIGITS[*window.get(i)? as usize];
        if d == INVALID {
            return None;
        }
        i += 1;
        let mut mantissa = d as u64;
        if d == 0 {
            if i < end && window[i].is_ascii_digit() {
                return None;
            }
        } else {
            while i < end {
                let d = DIGITS[window[i] as usize];
                if d == INVALID {
                    break;
                }
                if mantissa > SAFE_U64 {
                    return None;
                }
                mantissa = mantissa * 10 + d as u64;
                i += 1;
            }
        }
        let mut places = 0;
        if i < end && window[i] == b'.' {
            i += 1;
            let start = i;
            while i < end {
                let d = DIGITS[window[i] as usize];
                if d == INVALID {
                    break;
                }
                if mantissa > SAFE_U64 {
                    return None;
                }
                mantissa = mantissa * 10 + d as u64;
                places += 1;
                i += 1;
            }
            if i == start {
                return None;
            }
        }
        if i == end && self.is_streaming() {
            return None;
        }
        if i < end && is_number_byte(window[i]) {
            return None;
        }
        if mantissa > MAX_EXACT_MANTISSA || places >= POW10.len() {
            return None;
        }
        let mut value = mantissa as f64;
        if places > 0 {
            value /= POW10[places];
        }
        if negative {
            value = -value;
        }
        self.head = i;
        Some(value)
    }

    /// Consumes the next number and returns its text, validated against
    /// the JSON grammar, and whether it has a fraction or exponent.
    pub(crate) fn read_number_text(&mut self) -> Result<(&str, bool)> {
        let c = self.next_token()?;
        if matches!(c, b'N' | b'I') || (c == b'-' && self.peek_byte()? == Some(b'I')) {
            let text = self.read_non_finite(c)?;
            return Ok((text, true));
        }
        if c != b'-' && DIGITS[c as usize] == INVALID {
            self.unread()?;
            return Err(self.fail(ParseErrorCode::InvalidNumberValue));
        }
        let mut from = self.head - 1;
        let mut in_scratch = false;
        loop {
            let window = self.window();
            let mut i = self.head;
            while i < window.len() && is_number_byte(window[i]) {
                i += 1;
            }
            if i < self.tail || !self.is_streaming() {
                if in_scratch {
                    self.scratch.extend_from_slice(&self.buf[from..i]);
                }
                self.head = i;
                break;
            }
            if !in_scratch {
                self.scratch.clear();
                in_scratch = true;
            }
            self.scratch.extend_from_slice(&self.buf[from..i]);
            self.head = i;
            from = 0;
            if !self.load_more()? {
                break;
            }
        }
        let (start, end) = if in_scratch {
            (0, self.scratch.len())
        } else {
            (from, self.head)
        };
        let (valid, is_float) = {
            let bytes = if in_scratch {
                &self.scratch[start..end]
            } else {
                &self.window()[start..end]
            };
            (
                validate_number(bytes),
                bytes.iter().any(|c| matches!(c, b'.' | b'e' | b'E')),
            )
        };
        if !valid {
            return Err(self.fail(ParseErrorCode::InvalidNumberValue));
        }
        let bytes = if in_scratch {
            &self.scratch[start..end]
        } else {
            &self.window()[start..end]
        };
        // SAFETY: the grammar check above only admits ASCII bytes.
        Ok((unsafe { std::str::from_utf8_unchecked(bytes) }, is_float))
    }

    fn read_non_finite(&mut self, c: u8) -> Result<&'static str> {
        if !self.options.permissive_numbers {
            self.unread()?;
            return Err(self.fail(ParseErrorCode::InvalidNumberValue));
        }
        match c {
            b'N' => {
                self.expect_literal(b"aN")?;
                Ok("NaN")
            }
            b'I' => {
                self.expect_literal(b"nfinity")?;
                Ok("Infinity")
            }
            _ => {
                self.next_byte()?;
                self.expect_literal(b"nfinity")?;
                Ok("-Infinity")
            }
        }
    }
}
