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

use std::io::Read;

use jsonbind::Error;
use jsonbind::ParseErrorCode;
use jsonbind::Tokenizer;
use jsonbind::TokenizerOptions;
use jsonbind::ValueType;

/// Hands out the input a few bytes at a time.
struct Chunked<'a> {
    data: &'a [u8],
    step: usize,
}

impl Read for Chunked<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.step.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

#[test]
fn test_read_string_unicode_escapes() {
    let test_cases = vec![
        (r#""\ud83d\ude04""#, "\u{1F604}"),
        (r#""\u4e2d\u6587""#, "中文"),
        (r#""\u00e9t\u00E9""#, "été"),
        (r#""\ud83d""#, "\u{FFFD}"),
        (r#""\ude04\ud83d""#, "\u{FFFD}\u{FFFD}"),
        (r#""\ud83dx""#, "\u{FFFD}x"),
        (r#""\ud83d\u0041""#, "\u{FFFD}A"),
        (r#""\ud83d\ud83d\ude04""#, "\u{FFFD}\u{1F604}"),
        (r#""a\/b""#, "a/b"),
    ];
    for (input, expected) in test_cases {
        let mut iter = Tokenizer::new(input.as_bytes());
        assert_eq!(iter.read_string().unwrap(), expected, "input: {input}");
        iter.expect_end().unwrap();
    }
}

#[test]
fn test_read_string_errors() {
    let test_cases = vec![
        "\"abc",
        "\"a\u{1}b\"",
        r#""\x""#,
        r#""\u12""#,
        r#""\u12g4""#,
        "abc",
    ];
    for input in test_cases {
        let mut iter = Tokenizer::new(input.as_bytes());
        assert!(iter.read_string().is_err(), "input: {input}");
        assert!(iter.error().is_some(), "input: {input}");
    }

    let mut iter = Tokenizer::new(b"\"a\nb\"");
    let err = iter.read_string().unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(ParseErrorCode::ControlCharacterWhileParsingString, 2)
    ));
}

#[test]
fn test_skip_nested_then_continue() {
    let data = br#"{"x":{"y":[1,2,{"z":3}]}} "next""#;
    let mut iter = Tokenizer::new(data);
    iter.skip().unwrap();
    assert_eq!(iter.read_string().unwrap(), "next");
    iter.expect_end().unwrap();

    // brackets and escaped quotes inside strings do not end a container
    let data = br#"["]\"}", {"k": "[["}, 1.5e3] true"#;
    let mut iter = Tokenizer::new(data);
    iter.skip().unwrap();
    assert!(iter.read_bool().unwrap());
}

#[test]
fn test_skip_mismatched_brackets() {
    for input in ["[1, 2}", "{\"a\": [1}", "[", "{\"a\": \"b"] {
        let mut iter = Tokenizer::new(input.as_bytes());
        assert!(iter.skip().is_err(), "input: {input}");
    }
}

#[test]
fn test_validate() {
    let valid = [
        "null",
        " [1, -2.5e3, \"x\", {\"a\": [true, false]}] ",
        "{}",
        "\"\\u00e9\"",
        "0",
    ];
    for input in valid {
        let mut iter = Tokenizer::new(input.as_bytes());
        iter.validate().unwrap();
        iter.expect_end().unwrap();
    }
    let invalid = ["[1,]", "{\"a\" 1}", "01", "1.", "-", "\"\\q\"", "[1 2]", "tru"];
    for input in invalid {
        let mut iter = Tokenizer::new(input.as_bytes());
        let ok = iter.validate().and_then(|_| iter.expect_end()).is_ok();
        assert!(!ok, "input: {input}");
    }
}

#[test]
fn test_what_is_next() {
    let test_cases = vec![
        (" null", ValueType::Null),
        ("true", ValueType::Bool),
        ("-1", ValueType::Number),
        ("\"s\"", ValueType::String),
        ("\n[", ValueType::Array),
        ("{", ValueType::Object),
        ("?", ValueType::Invalid),
    ];
    for (input, expected) in test_cases {
        let mut iter = Tokenizer::new(input.as_bytes());
        assert_eq!(iter.what_is_next().unwrap(), expected, "input: {input}");
        assert_eq!(iter.what_is_next().unwrap(), expected, "input: {input}");
    }
}

#[test]
fn test_read_array_and_object_callbacks() {
    let mut iter = Tokenizer::new(br#"{"a": [1, 2], "b": [], "c": null}"#);
    let mut seen = vec![];
    iter.read_object_cb(|iter, key| {
        let mut items = vec![];
        iter.read_array_cb(|iter| {
            items.push(iter.read_i64()?);
            Ok(())
        })?;
        seen.push((key.to_string(), items));
        Ok(())
    })
    .unwrap();
    assert_eq!(seen, vec![
        ("a".to_string(), vec![1, 2]),
        ("b".to_string(), vec![]),
        ("c".to_string(), vec![]),
    ]);
    assert_eq!(iter.depth(), 0);
}

#[test]
fn test_depth_limit() {
    let options = TokenizerOptions {
        max_depth: 2,
        ..Default::default()
    };
    let mut iter = Tokenizer::new(b"[[1]]").with_options(options);
    iter.read_value().unwrap();

    let mut iter = Tokenizer::new(b"[[[1]]]").with_options(options);
    let err = iter.read_value().unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(ParseErrorCode::DepthLimitExceeded(2), _)
    ));

    let mut iter = Tokenizer::new(b"[[[1]]]").with_options(options);
    assert!(iter.skip().is_err());
}

#[test]
fn test_numbers() {
    let mut iter = Tokenizer::new(b"[127, -128, 18446744073709551615, 1.5, 1e2]");
    assert!(iter.read_array_begin().unwrap());
    assert_eq!(iter.read_i8().unwrap(), 127);
    assert!(iter.read_array_more().unwrap());
    assert_eq!(iter.read_i8().unwrap(), -128);
    assert!(iter.read_array_more().unwrap());
    assert_eq!(iter.read_u64().unwrap(), u64::MAX);
    assert!(iter.read_array_more().unwrap());
    assert_eq!(iter.read_f64().unwrap(), 1.5);
    assert!(iter.read_array_more().unwrap());
    assert_eq!(iter.read_f32().unwrap(), 100.0);
    assert!(!iter.read_array_more().unwrap());

    for input in ["128", "-1", "1.5"] {
        let mut iter = Tokenizer::new(input.as_bytes());
        assert!(iter.read_u8().is_err(), "input: {input}");
    }

    let mut iter = Tokenizer::new(b"NaN");
    assert!(iter.read_f64().is_err());
    let options = TokenizerOptions {
        permissive_numbers: true,
        ..Default::default()
    };
    let mut iter = Tokenizer::new(b"NaN").with_options(options);
    assert!(iter.read_f64().unwrap().is_nan());
    let mut iter = Tokenizer::new(b"-Infinity").with_options(options);
    assert_eq!(iter.read_f64().unwrap(), f64::NEG_INFINITY);
}

#[test]
fn test_reader_refills() {
    let long = "x".repeat(20_000);
    let doc = format!(r#"{{"key": "{long}", "list": [1, 2, 3], "esc": "a\u00e9\n"}} 42"#);
    let reader = Chunked {
        data: doc.as_bytes(),
        step: 7,
    };
    let mut iter = Tokenizer::from_reader(reader);
    let mut fields = vec![];
    iter.read_object_cb(|iter, key| {
        match key {
            "key" => assert_eq!(iter.read_string()?, long),
            "list" => assert_eq!(iter.skip_and_return_bytes()?.as_ref(), b"[1, 2, 3]"),
            _ => assert_eq!(iter.read_string()?, "a\u{e9}\n"),
        }
        fields.push(key.to_string());
        Ok(())
    })
    .unwrap();
    assert_eq!(fields, vec!["key", "list", "esc"]);
    assert_eq!(iter.read_u32().unwrap(), 42);
    iter.expect_end().unwrap();
    assert_eq!(iter.position(), doc.len());
}

#[test]
fn test_error_position() {
    let mut iter = Tokenizer::new(b"[1, 2, x]");
    let err = iter.read_value().unwrap_err();
    match err {
        Error::Syntax(ParseErrorCode::ExpectedSomeValue, pos) => assert_eq!(pos, 7),
        other => panic!("unexpected error {other}"),
    }
}
