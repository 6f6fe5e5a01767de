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
use crate::error::Error;
use crate::error::Result;

/// Three ASCII digits per entry in bits 0..24, most significant first.
/// Bits 24.. hold how many leading zeros to drop when the chunk is the
/// first one written.
static DIGITS: [u32; 1000] = {
    let mut table = [0u32; 1000];
    let mut i = 0u32;
    while i < 1000 {
        table[i as usize] =
            (((i / 100) + b'0' as u32) << 16) + ((((i / 10) % 10) + b'0' as u32) << 8) + i % 10
                + b'0' as u32;
        if i < 10 {
            table[i as usize] += 2 << 24;
        } else if i < 100 {
            table[i as usize] += 1 << 24;
        }
        i += 1;
    }
    table
};

// Values above this are written with the shortest formatter even in lossy mode.
const LOSSY_LIMIT: f64 = 0x4_ffff_ffffu64 as f64;
const LOSSY_PRECISION: u64 = 1_000_000;

impl Writer<'_> {
    #[inline]
    fn write_first_chunk(&mut self, chunk: u32) {
        let v = DIGITS[chunk as usize];
        match v >> 24 {
            0 => self
                .buf
                .extend_from_slice(&[(v >> 16) as u8, (v >> 8) as u8, v as u8]),
            1 => self.buf.extend_from_slice(&[(v >> 8) as u8, v as u8]),
            _ => self.buf.push(v as u8),
        }
    }

    #[inline]
    fn write_chunk(&mut self, chunk: u32) {
        let v = DIGITS[chunk as usize];
        self.buf
            .extend_from_slice(&[(v >> 16) as u8, (v >> 8) as u8, v as u8]);
    }

    pub fn write_u64(&mut self, mut v: u64) {
        // u64::MAX has 20 digits, seven chunks of three
        let mut chunks = [0u32; 7];
        let mut n = 0;
        loop {
            let q = v / 1000;
            chunks[n] = (v - q * 1000) as u32;
            n += 1;
            if q == 0 {
                break;
            }
            v = q;
        }
        self.write_first_chunk(chunks[n - 1]);
        for chunk in chunks[..n - 1].iter().rev() {
            self.write_chunk(*chunk);
        }
    }

    pub fn write_i64(&mut self, v: i64) {
        if v < 0 {
            self.write_byte(b'-');
        }
        self.write_u64(v.unsigned_abs());
    }

    pub fn write_u8(&mut self, v: u8) {
        self.write_first_chunk(v as u32);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.write_u64(v as u64);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write_u64(v as u64);
    }

    pub fn write_i8(&mut self, v: i8) {
        self.write_i64(v as i64);
    }

    pub fn write_i16(&mut self, v: i16) {
        self.write_i64(v as i64);
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write_i64(v as i64);
    }

    pub fn write_i128(&mut self, v: i128) {
        let mut buffer = itoa::Buffer::new();
        self.write_raw(buffer.format(v).as_bytes());
    }

    pub fn write_u128(&mut self, v: u128) {
        let mut buffer = itoa::Buffer::new();
        self.write_raw(buffer.format(v).as_bytes());
    }

    fn write_non_finite(&mut self, negative: bool, nan: bool) -> Result<()> {
        let literal = if nan {
            "NaN"
        } else if negative {
            "-Infinity"
        } else {
            "Infinity"
        };
        if !self.options.permissive_numbers {
            return Err(self.report(Error::UnsupportedValue(literal.to_string())));
        }
        self.write_raw_str(literal);
        Ok(())
    }

    /// Writes the shortest text that reads back as the same `f64`, or the
    /// six digit form when lossy floats are enabled.
    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        if !v.is_finite() {
            return self.write_non_finite(v < 0.0, v.is_nan());
        }
        if self.options.lossy_float {
            self.write_f64_lossy(v);
            return Ok(());
        }
        let mut buffer = ryu::Buffer::new();
        let s = buffer.format_finite(v);
        self.write_raw_str(s.strip_suffix(".0").unwrap_or(s));
        Ok(())
    }

    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        if !v.is_finite() {
            return self.write_non_finite(v < 0.0, v.is_nan());
        }
        if self.options.lossy_float {
            self.write_f64_lossy(v as f64);
            return Ok(());
        }
        let mut buffer = ryu::Buffer::new();
        let s = buffer.format_finite(v);
        self.write_raw_str(s.strip_suffix(".0").unwrap_or(s));
        Ok(())
    }

    /// Rounds to six fraction digits and drops trailing zeros.
    fn write_f64_lossy(&mut self, mut v: f64) {
        if v < 0.0 {
            self.write_byte(b'-');
            v = -v;
        }
        if v > LOSSY_LIMIT {
            let mut buffer = ryu::Buffer::new();
            let s = buffer.format_finite(v);
            self.write_raw_str(s.strip_suffix(".0").unwrap_or(s));
            return;
        }
        let scaled = (v * LOSSY_PRECISION as f64 + 0.5) as u64;
        self.write_u64(scaled / LOSSY_PRECISION);
        let mut frac = scaled % LOSSY_PRECISION;
        if frac == 0 {
            return;
        }
        self.write_byte(b'.');
        let mut width = 6;
        while frac % 10 == 0 {
            frac /= 10;
            width -= 1;
        }
        let mut buffer = itoa::Buffer::new();
        let digits = buffer.format(frac);
        for _ in digits.len()..width {
            self.write_byte(b'0');
        }
        self.write_raw_str(digits);
    }
}
