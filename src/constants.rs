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

// JSON text constants
pub(crate) const UNICODE_LEN: usize = 4;

// JSON text escape characters constants
pub(crate) const BS: char = '\x5C'; // \\ Backslash
pub(crate) const QU: char = '\x22'; // \" Double quotation mark
pub(crate) const SD: char = '\x2F'; // \/ Slash or divide
pub(crate) const BB: char = '\x08'; // \b Backspace
pub(crate) const FF: char = '\x0C'; // \f Formfeed Page Break
pub(crate) const NN: char = '\x0A'; // \n Newline
pub(crate) const RR: char = '\x0D'; // \r Carriage Return
pub(crate) const TT: char = '\x09'; // \t Horizontal Tab

// Replacement for unpaired or malformed UTF-16 surrogates.
pub(crate) const REPLACEMENT: char = '\u{FFFD}';

pub(crate) const DEFAULT_MAX_DEPTH: usize = 128;

// Reader refill size and writer flush threshold.
pub(crate) const READ_BUFFER_SIZE: usize = 4096;
pub(crate) const WRITE_BUFFER_SIZE: usize = 4096;

// Pools never keep more than this many idle buffers.
pub(crate) const MAX_POOLED_BUFFERS: usize = 64;
// Buffers that grew beyond this are not returned to a pool.
pub(crate) const MAX_POOLED_CAPACITY: usize = 1 << 20;

// Struct decoders use hash dispatch for at most this many fields.
pub(crate) const MAX_HASHED_FIELDS: usize = 10;
// Hash value reserved for "no field".
pub(crate) const SENTINEL_HASH: u32 = 0;

pub(crate) const TYPE_INVALID: &str = "invalid";
pub(crate) const TYPE_STRING: &str = "string";
pub(crate) const TYPE_NULL: &str = "null";
pub(crate) const TYPE_BOOLEAN: &str = "boolean";
pub(crate) const TYPE_NUMBER: &str = "number";
pub(crate) const TYPE_ARRAY: &str = "array";
pub(crate) const TYPE_OBJECT: &str = "object";
