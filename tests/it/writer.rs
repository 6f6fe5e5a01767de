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

use jsonbind::Number;
use jsonbind::Tokenizer;
use jsonbind::Value;
use jsonbind::Writer;
use jsonbind::WriterOptions;
use proptest::prelude::*;

fn written(options: WriterOptions, f: impl FnOnce(&mut Writer<'static>)) -> String {
    let mut w = Writer::new().with_options(options);
    f(&mut w);
    String::from_utf8(w.into_inner().unwrap()).unwrap()
}

#[test]
fn test_control_bytes_round_trip() {
    for b in 0u8..0x20 {
        let s = format!("a{}b", b as char);
        let out = written(WriterOptions::default(), |w| w.write_string(&s));
        let expected = match b {
            0x08 => "\"a\\bb\"".to_string(),
            0x09 => "\"a\\tb\"".to_string(),
            0x0A => "\"a\\nb\"".to_string(),
            0x0C => "\"a\\fb\"".to_string(),
            0x0D => "\"a\\rb\"".to_string(),
            _ => format!("\"a\\u{:04x}b\"", b),
        };
        assert_eq!(out, expected, "byte {b:#04x}");
        let mut iter = Tokenizer::new(out.as_bytes());
        assert_eq!(iter.read_string().unwrap(), s, "byte {b:#04x}");
    }
}

#[test]
fn test_escape_html() {
    let html = WriterOptions {
        escape_html: true,
        ..Default::default()
    };
    let test_cases = vec![
        ("<b>&</b>", r#""\u003cb\u003e\u0026\u003c/b\u003e""#, r#""<b>&</b>""#),
        ("a\u{2028}b\u{2029}", r#""a\u2028b\u2029""#, "\"a\u{2028}b\u{2029}\""),
        ("\u{2026}", "\"\u{2026}\"", "\"\u{2026}\""),
    ];
    for (input, escaped, plain) in test_cases {
        assert_eq!(written(html, |w| w.write_string(input)), escaped);
        assert_eq!(
            written(WriterOptions::default(), |w| w.write_string(input)),
            plain
        );
    }
}

#[test]
fn test_write_floats() {
    let test_cases = vec![
        (1.0, "1"),
        (-0.5, "-0.5"),
        (1.5e300, "1.5e300"),
        (0.1, "0.1"),
        (123456.789, "123456.789"),
    ];
    for (v, expected) in test_cases {
        assert_eq!(
            written(WriterOptions::default(), |w| w.write_f64(v).unwrap()),
            expected
        );
    }

    let lossy = WriterOptions {
        lossy_float: true,
        ..Default::default()
    };
    assert_eq!(written(lossy, |w| w.write_f64(1.23456789).unwrap()), "1.234568");
    assert_eq!(written(lossy, |w| w.write_f64(-2.5).unwrap()), "-2.5");
    assert_eq!(written(lossy, |w| w.write_f64(3.0).unwrap()), "3");

    let mut w = Writer::new();
    assert!(w.write_f64(f64::NAN).is_err());
    assert!(w.error().is_some());

    let permissive = WriterOptions {
        permissive_numbers: true,
        ..Default::default()
    };
    assert_eq!(written(permissive, |w| w.write_f64(f64::NAN).unwrap()), "NaN");
    assert_eq!(
        written(permissive, |w| w.write_f64(f64::NEG_INFINITY).unwrap()),
        "-Infinity"
    );
}

#[test]
fn test_write_integers() {
    let out = written(WriterOptions::default(), |w| {
        w.write_array_start();
        w.write_i64(i64::MIN);
        w.write_more();
        w.write_u64(u64::MAX);
        w.write_more();
        w.write_i8(-7);
        w.write_more();
        w.write_u128(u128::MAX);
        w.write_array_end();
    });
    assert_eq!(
        out,
        "[-9223372036854775808,18446744073709551615,-7,340282366920938463463374607431768211455]"
    );
}

#[test]
fn test_write_indented() {
    let options = WriterOptions {
        indent: 2,
        ..Default::default()
    };
    let out = written(options, |w| {
        w.write_object_start();
        w.write_object_field("a");
        w.write_array_start();
        w.write_i64(1);
        w.write_more();
        w.write_i64(2);
        w.write_array_end();
        w.write_more();
        w.write_object_field("b");
        w.write_empty_object();
        w.write_object_end();
    });
    assert_eq!(out, "{\n  \"a\": [\n    1,\n    2\n  ],\n  \"b\": {}\n}");
}

#[test]
fn test_write_to_sink() {
    let mut out = Vec::new();
    {
        let mut w = Writer::to_writer(&mut out);
        w.write_value(&Value::Array(vec![
            Value::Null,
            Value::Bool(true),
            Value::Number(Number::Int64(-3)),
            Value::String("s".to_string()),
        ]))
        .unwrap();
        w.flush().unwrap();
    }
    assert_eq!(out, br#"[null,true,-3,"s"]"#);
}

proptest! {
    #[test]
    fn test_string_round_trip(s in "\\PC*|[\\x00-\\x1f\"\\\\<>&\u{2028}]*") {
        for escape_html in [false, true] {
            let options = WriterOptions {
                escape_html,
                ..Default::default()
            };
            let out = written(options, |w| w.write_string(&s));
            let mut iter = Tokenizer::new(out.as_bytes());
            prop_assert_eq!(iter.read_string().unwrap(), s.clone());
            prop_assert!(iter.expect_end().is_ok());
        }
    }

    #[test]
    fn test_f64_round_trip(v in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
        let out = written(WriterOptions::default(), |w| w.write_f64(v).unwrap());
        let mut iter = Tokenizer::new(out.as_bytes());
        prop_assert_eq!(iter.read_f64().unwrap(), v);
    }
}

#[test]
fn test_random_values_round_trip() {
    for _ in 0..200 {
        let value = Value::rand_value();
        let out = written(WriterOptions::default(), |w| w.write_value(&value).unwrap());
        let mut iter = Tokenizer::new(out.as_bytes());
        let back = iter.read_value().unwrap();
        assert_eq!(
            written(WriterOptions::default(), |w| w.write_value(&back).unwrap()),
            out
        );
    }
}
