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

use std::cmp::Ordering;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;

use ordered_float::OrderedFloat;
use serde::de;
use serde::de::Deserialize;
use serde::de::Deserializer;
use serde::de::Visitor;
use serde::ser::Serialize;
use serde::ser::Serializer;

/// A JSON number as held by the dynamic [`Value`](crate::Value).
///
/// Integers keep their exact value when they fit in 64 bits; everything
/// else is stored as a float.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    /// 64-bit signed integer, used for negative whole numbers
    Int64(i64),
    /// 64-bit unsigned integer, used for non-negative whole numbers
    UInt64(u64),
    /// 64-bit floating-point, for fractions, exponents and large values
    Float64(f64),
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where D: Deserializer<'de> {
        struct NumberVisitor;

        impl Visitor<'_> for NumberVisitor {
            type Value = Number;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a number (int64, uint64, or float64)")
            }

            fn visit_i64<E>(self, v: i64) -> std::result::Result<Self::Value, E>
            where E: de::Error {
                Ok(Number::Int64(v))
            }

            fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E>
            where E: de::Error {
                Ok(Number::UInt64(v))
            }

            fn visit_f64<E>(self, v: f64) -> std::result::Result<Self::Value, E>
            where E: de::Error {
                Ok(Number::Float64(v))
            }
        }
        deserializer.deserialize_any(NumberVisitor)
    }
}

impl Serialize for Number {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where S: Serializer {
        match self {
            Number::Int64(v) => serializer.serialize_i64(*v),
            Number::UInt64(v) => serializer.serialize_u64(*v),
            Number::Float64(v) => serializer.serialize_f64(*v),
        }
    }
}

impl Number {
    /// Returns the i64 representation of the number, if possible.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::Int64(v) => Some(*v),
            Number::UInt64(v) => i64::try_from(*v).ok(),
            Number::Float64(_) => None,
        }
    }

    /// Returns the u64 representation of the number, if possible.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Number::Int64(v) => u64::try_from(*v).ok(),
            Number::UInt64(v) => Some(*v),
            Number::Float64(_) => None,
        }
    }

    /// Returns the f64 representation of the number.
    ///
    /// This may lose precision for integers beyond 2^53.
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int64(v) => *v as f64,
            Number::UInt64(v) => *v as f64,
            Number::Float64(v) => *v,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Number::Float64(_))
    }
}

impl Default for Number {
    #[inline]
    fn default() -> Self {
        Number::UInt64(0)
    }
}

impl From<i64> for Number {
    fn from(v: i64) -> Self {
        if v >= 0 {
            Number::UInt64(v as u64)
        } else {
            Number::Int64(v)
        }
    }
}

impl From<u64> for Number {
    fn from(v: u64) -> Self {
        Number::UInt64(v)
    }
}

impl From<f64> for Number {
    fn from(v: f64) -> Self {
        Number::Float64(v)
    }
}

impl PartialEq for Number {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Number {}

impl PartialOrd for Number {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    /// Integers compare exactly across signedness; any comparison that
    /// involves a float falls back to a total float order.
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Number::Int64(l), Number::Int64(r)) => l.cmp(r),
            (Number::UInt64(l), Number::UInt64(r)) => l.cmp(r),
            (Number::Int64(l), Number::UInt64(r)) => {
                if *l < 0 {
                    Ordering::Less
                } else {
                    (*l as u64).cmp(r)
                }
            }
            (Number::UInt64(l), Number::Int64(r)) => {
                if *r < 0 {
                    Ordering::Greater
                } else {
                    l.cmp(&(*r as u64))
                }
            }
            (l, r) => OrderedFloat(l.as_f64()).cmp(&OrderedFloat(r.as_f64())),
        }
    }
}

impl Display for Number {
    /// Integral floats are printed without a fraction, like integers.
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Number::Int64(v) => {
                let mut buffer = itoa::Buffer::new();
                f.write_str(buffer.format(*v))
            }
            Number::UInt64(v) => {
                let mut buffer = itoa::Buffer::new();
                f.write_str(buffer.format(*v))
            }
            Number::Float64(v) => {
                if v.is_nan() {
                    return f.write_str("NaN");
                }
                if v.is_infinite() {
                    return f.write_str(if *v > 0.0 { "Infinity" } else { "-Infinity" });
                }
                let mut buffer = ryu::Buffer::new();
                let s = buffer.format_finite(*v);
                f.write_str(s.strip_suffix(".0").unwrap_or(s))
            }
        }
    }
}
