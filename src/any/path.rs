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

use std::fmt::Display;
use std::fmt::Formatter;

use nom::branch::alt;
use nom::bytes::complete::escaped_transform;
use nom::bytes::complete::is_not;
use nom::bytes::complete::tag;
use nom::bytes::complete::take_while1;
use nom::character::complete::char;
use nom::character::complete::multispace0;
use nom::combinator::map;
use nom::combinator::map_res;
use nom::combinator::opt;
use nom::combinator::value;
use nom::multi::separated_list1;
use nom::sequence::delimited;
use nom::sequence::preceded;
use nom::sequence::terminated;
use nom::IResult;
use nom::Parser;

use crate::error::Error;
use crate::error::Result;

/// One step of a path into an [`Any`](crate::Any).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathKey {
    /// Member of an object.
    Key(String),
    /// Element of an array.
    Index(usize),
    /// Every element or member, recombined into a new array or object.
    Wildcard,
}

impl From<&str> for PathKey {
    fn from(key: &str) -> Self {
        PathKey::Key(key.to_string())
    }
}

impl From<usize> for PathKey {
    fn from(idx: usize) -> Self {
        PathKey::Index(idx)
    }
}

impl Display for PathKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PathKey::Key(key) if is_bare(key) && !key.bytes().all(|b| b.is_ascii_digit()) => {
                write!(f, "{key}")
            }
            PathKey::Key(key) => {
                write!(f, "\"")?;
                for c in key.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            PathKey::Index(idx) => write!(f, "{idx}"),
            PathKey::Wildcard => write!(f, "*"),
        }
    }
}

fn is_bare_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '$'
}

fn is_bare(key: &str) -> bool {
    !key.is_empty() && key.chars().all(is_bare_char)
}

/// Parses a key path such as `{users,0,*,"first name"}`.
///
/// Bare digits index arrays, `*` is a wildcard and anything else names an
/// object member. Quote a member name that is all digits or contains
/// punctuation.
pub fn parse_path(input: &str) -> Result<Vec<PathKey>> {
    match path(input) {
        Ok((rest, keys)) if rest.is_empty() => Ok(keys),
        _ => Err(Error::InvalidKeyPath),
    }
}

fn quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            opt(escaped_transform(
                is_not("\\\""),
                '\\',
                alt((
                    value("\\", tag("\\")),
                    value("\"", tag("\"")),
                    value("\n", tag("n")),
                )),
            )),
            Option::unwrap_or_default,
        ),
        char('"'),
    )
    .parse(input)
}

fn bare(input: &str) -> IResult<&str, PathKey> {
    map_res(take_while1(is_bare_char), |s: &str| {
        if s.bytes().all(|b| b.is_ascii_digit()) {
            s.parse::<usize>().map(PathKey::Index)
        } else {
            Ok(PathKey::Key(s.to_string()))
        }
    })
    .parse(input)
}

fn path_key(input: &str) -> IResult<&str, PathKey> {
    alt((
        value(PathKey::Wildcard, char('*')),
        map(quoted, PathKey::Key),
        bare,
    ))
    .parse(input)
}

fn path(input: &str) -> IResult<&str, Vec<PathKey>> {
    alt((
        delimited(
            preceded(multispace0, char('{')),
            separated_list1(char(','), delimited(multispace0, path_key, multispace0)),
            terminated(char('}'), multispace0),
        ),
        map(
            delimited(
                preceded(multispace0, char('{')),
                multispace0,
                terminated(char('}'), multispace0),
            ),
            |_| vec![],
        ),
    ))
    .parse(input)
}
