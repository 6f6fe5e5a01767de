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

use std::collections::BTreeMap;
use std::collections::HashMap;

use jsonbind::reflect_struct;
use jsonbind::Any;
use jsonbind::Config;
use jsonbind::Error;
use jsonbind::ParseErrorCode;
use jsonbind::RawJson;
use jsonbind::Value;

#[derive(Debug, Default, PartialEq)]
struct Record {
    a: i32,
    b: Vec<i32>,
}

reflect_struct!(Record { a: i32, b: Vec<i32> });

#[derive(Debug, Default, PartialEq)]
struct Tagged {
    id: i64,
    name: String,
    ratio: f64,
    hidden: String,
    flag: bool,
}

reflect_struct!(Tagged {
    id: i64 => "id,string",
    name: String => "full_name",
    ratio: f64 => ",string",
    hidden: String => "-",
    flag: bool => ",omitempty",
});

#[derive(Debug, Default, PartialEq)]
struct Base {
    id: u64,
    name: String,
}

reflect_struct!(Base { id: u64, name: String });

#[derive(Debug, Default, PartialEq)]
struct Outer {
    base: Base,
    name: String,
}

reflect_struct!(Outer {
    #[embed]
    base: Base,
    name: String,
});

#[derive(Debug, Default, PartialEq)]
struct Left {
    x: i32,
    y: i32,
}

reflect_struct!(Left { x: i32, y: i32 => "y" });

#[derive(Debug, Default, PartialEq)]
struct Right {
    x: i32,
    y: i32,
}

reflect_struct!(Right { x: i32, y: i32 });

#[derive(Debug, Default, PartialEq)]
struct Both {
    left: Left,
    right: Option<Box<Right>>,
}

reflect_struct!(Both {
    #[embed]
    left: Left,
    #[embed]
    right: Option<Box<Right>>,
});

#[derive(Debug, Default, PartialEq)]
struct Node {
    value: i32,
    next: Option<Box<Node>>,
}

reflect_struct!(Node {
    value: i32,
    next: Option<Box<Node>>,
});

#[test]
fn test_decode_record() {
    let mut r = Record::default();
    jsonbind::unmarshal(br#"{"a":1,"b":[2,3]}"#, &mut r).unwrap();
    assert_eq!(r, Record { a: 1, b: vec![2, 3] });

    // keys match without regard to ASCII case, unknown keys are skipped
    let mut r = Record::default();
    jsonbind::unmarshal(br#" {"B":[4], "extra":{"deep":[1,{"x":"]"}]}, "A":5} "#, &mut r).unwrap();
    assert_eq!(r, Record { a: 5, b: vec![4] });
}

#[test]
fn test_decode_case_sensitive() {
    let api = Config {
        case_sensitive: true,
        ..Default::default()
    }
    .froze();
    let mut r = Record::default();
    api.unmarshal(br#"{"A":1,"a":2,"B":[9]}"#, &mut r).unwrap();
    assert_eq!(r, Record { a: 2, b: vec![] });
}

#[test]
fn test_decode_unknown_fields() {
    let api = Config {
        disallow_unknown_fields: true,
        ..Default::default()
    }
    .froze();
    let mut r = Record::default();
    let err = api.unmarshal(br#"{"a":1,"c":2}"#, &mut r).unwrap_err();
    assert!(matches!(err.root_cause(), Error::UnknownField(name) if name == "c"));
    assert_eq!(r.a, 1);
}

#[test]
fn test_decode_malformed_unknown_field() {
    let mut r = Record::default();
    let test_cases: Vec<&[u8]> = vec![
        br#"{"zz":[x y "q" :: ],"a":5}"#,
        br#"{"zz":{"k" 1},"a":5}"#,
        br#"{"zz":[1,],"a":5}"#,
        br#"{"zz":"\q","a":5}"#,
        br#"{"zz":01,"a":5}"#,
    ];
    for input in test_cases {
        for api in [jsonbind::standard_api(), jsonbind::default_api()] {
            assert!(
                api.unmarshal(input, &mut r).is_err(),
                "{}",
                String::from_utf8_lossy(input)
            );
        }
    }

    let mut m: BTreeMap<String, Any> = BTreeMap::new();
    assert!(jsonbind::unmarshal(br#"{"k":{"a" 1 2 3}}"#, &mut m).is_err());
    let mut raw = RawJson::default();
    assert!(jsonbind::unmarshal(br#"[1 2]"#, &mut raw).is_err());
}

#[test]
fn test_decode_tags() {
    let mut t = Tagged {
        hidden: "keep".to_string(),
        ..Default::default()
    };
    let data = br#"{"id":"42","full_name":"ann","name":"ignored","ratio":"0.5","hidden":"x","flag":true}"#;
    jsonbind::unmarshal(data, &mut t).unwrap();
    assert_eq!(t, Tagged {
        id: 42,
        name: "ann".to_string(),
        ratio: 0.5,
        hidden: "keep".to_string(),
        flag: true,
    });

    for bad in [&br#"{"id":42}"#[..], br#"{"id":"4x"}"#, br#"{"ratio":"1 2"}"#] {
        let mut t = Tagged::default();
        let err = jsonbind::unmarshal(bad, &mut t).unwrap_err();
        assert!(
            matches!(err, Error::Field { owner: "Tagged", .. }),
            "{}",
            String::from_utf8_lossy(bad)
        );
    }
}

#[test]
fn test_decode_field_error_context() {
    let mut r = Record::default();
    let err = jsonbind::unmarshal(br#"{"a":1,"b":[1,"x"]}"#, &mut r).unwrap_err();
    match &err {
        Error::Field { owner, field, .. } => {
            assert_eq!(*owner, "Record");
            assert_eq!(field, "b");
        }
        other => panic!("unexpected error {other}"),
    }
    assert!(err.to_string().starts_with("Record.b: "));
    assert!(matches!(err.root_cause(), Error::Syntax(..)));
}

#[test]
fn test_decode_null() {
    let mut r = Record { a: 7, b: vec![1] };
    jsonbind::unmarshal(br#"{"a":null,"b":null}"#, &mut r).unwrap();
    assert_eq!(r, Record { a: 7, b: vec![] });

    let mut r = Record { a: 7, b: vec![1] };
    jsonbind::unmarshal(b"null", &mut r).unwrap();
    assert_eq!(r, Record { a: 7, b: vec![1] });

    let mut opt = Some(3i32);
    jsonbind::unmarshal(b"null", &mut opt).unwrap();
    assert_eq!(opt, None);
    jsonbind::unmarshal(b"5", &mut opt).unwrap();
    assert_eq!(opt, Some(5));

    let mut s = "old".to_string();
    jsonbind::unmarshal(b"null", &mut s).unwrap();
    assert_eq!(s, "old");
}

#[test]
fn test_decode_type_mismatch() {
    let mut r = Record::default();
    let err = jsonbind::unmarshal(br#"[1,2]"#, &mut r).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch {
        expected: "object",
        found: "array"
    }));

    let mut list: Vec<i32> = vec![];
    let err = jsonbind::unmarshal(br#"{"a":1}"#, &mut list).unwrap_err();
    assert!(matches!(err, Error::TypeMismatch {
        expected: "array",
        ..
    }));
}

#[test]
fn test_decode_embedded() {
    let mut o = Outer::default();
    jsonbind::unmarshal(br#"{"id":3,"name":"outer"}"#, &mut o).unwrap();
    assert_eq!(o, Outer {
        base: Base {
            id: 3,
            name: String::new(),
        },
        name: "outer".to_string(),
    });

    // `y` is tagged only on Left, `x` is ambiguous and dropped
    let mut b = Both::default();
    jsonbind::unmarshal(br#"{"x":1,"y":2}"#, &mut b).unwrap();
    assert_eq!(b.left, Left { x: 0, y: 2 });
    assert!(b.right.is_none());
}

#[test]
fn test_decode_recursive() {
    let mut n = Node::default();
    jsonbind::unmarshal(br#"{"value":1,"next":{"value":2,"next":{"value":3}}}"#, &mut n).unwrap();
    assert_eq!(n.value, 1);
    let second = n.next.as_ref().unwrap();
    assert_eq!(second.value, 2);
    let third = second.next.as_ref().unwrap();
    assert_eq!(third.value, 3);
    assert!(third.next.is_none());
}

#[test]
fn test_decode_collections() {
    let mut arr = [9u8; 3];
    jsonbind::unmarshal(b"[1,2]", &mut arr).unwrap();
    assert_eq!(arr, [1, 2, 0]);
    jsonbind::unmarshal(b"[4,5,6,7]", &mut arr).unwrap();
    assert_eq!(arr, [4, 5, 6]);

    // maps merge into what is already there
    let mut map: HashMap<String, i32> = HashMap::from([("keep".to_string(), 1)]);
    jsonbind::unmarshal(br#"{"a":2,"keep":3}"#, &mut map).unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["keep"], 3);
    assert_eq!(map["a"], 2);

    let mut by_id: BTreeMap<u32, String> = BTreeMap::new();
    jsonbind::unmarshal(br#"{"10":"x","2":"y"}"#, &mut by_id).unwrap();
    assert_eq!(by_id, BTreeMap::from([(2, "y".to_string()), (10, "x".to_string())]));
    let err = jsonbind::unmarshal(br#"{"nope":"x"}"#, &mut by_id).unwrap_err();
    assert!(matches!(err, Error::InvalidMapKey(_)));

    let mut nested: Vec<Option<Vec<String>>> = vec![];
    jsonbind::unmarshal(br#"[["a"],null,[]]"#, &mut nested).unwrap();
    assert_eq!(nested, vec![Some(vec!["a".to_string()]), None, Some(vec![])]);
}

#[test]
fn test_decode_scalars() {
    let mut c = ' ';
    jsonbind::unmarshal(r#""é""#.as_bytes(), &mut c).unwrap();
    assert_eq!(c, 'é');
    assert!(jsonbind::unmarshal(br#""ab""#, &mut c).is_err());

    let mut v = 0u8;
    let err = jsonbind::unmarshal(b"256", &mut v).unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(ParseErrorCode::NumberOutOfRange, _)
    ));

    let mut big = 0i128;
    jsonbind::unmarshal(b"-170141183460469231731687303715884105728", &mut big).unwrap();
    assert_eq!(big, i128::MIN);

    let mut f = 0f32;
    jsonbind::unmarshal(b"1.5", &mut f).unwrap();
    assert_eq!(f, 1.5);
    assert!(jsonbind::unmarshal(b"NaN", &mut f).is_err());
    let api = Config {
        permissive_numbers: true,
        ..Default::default()
    }
    .froze();
    api.unmarshal(b"NaN", &mut f).unwrap();
    assert!(f.is_nan());
}

#[test]
fn test_decode_dynamic_and_raw() {
    let mut v = Value::Null;
    jsonbind::unmarshal(br#"{"a":[1,-2,3.5],"b":null}"#, &mut v).unwrap();
    let obj = v.as_object().unwrap();
    assert_eq!(obj["a"].as_array().unwrap().len(), 3);
    assert_eq!(obj["a"].as_array().unwrap()[1].as_i64(), Some(-2));
    assert!(obj["b"].is_null());

    let mut raw = RawJson::default();
    jsonbind::unmarshal(br#" {"keep": [1, 2]} "#, &mut raw).unwrap();
    assert_eq!(raw.as_bytes(), br#"{"keep": [1, 2]}"#);

    let mut any = Any::default();
    jsonbind::unmarshal(br#"{"k":[10,20]}"#, &mut any).unwrap();
    assert_eq!(any.get_key("k").get_index(1).to_i32(), 20);
}

#[test]
fn test_decode_input_errors() {
    let mut r = Record::default();
    let err = jsonbind::unmarshal(b"   ", &mut r).unwrap_err();
    assert!(err.is_eof());

    let err = jsonbind::unmarshal(br#"{"a":1"#, &mut r).unwrap_err();
    assert!(err.is_eof());

    let err = jsonbind::unmarshal(br#"{"a":1} x"#, &mut r).unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(ParseErrorCode::UnexpectedTrailingCharacters, 8)
    ));

    let api = Config {
        allow_trailing_data: true,
        ..Default::default()
    }
    .froze();
    api.unmarshal(br#"{"a":2} x"#, &mut r).unwrap();
    assert_eq!(r.a, 2);
}

#[test]
fn test_decode_depth_limit() {
    let api = Config {
        max_depth: 3,
        ..Default::default()
    }
    .froze();
    let mut v: Vec<Vec<Vec<i32>>> = vec![];
    api.unmarshal(b"[[[1]]]", &mut v).unwrap();
    let mut v: Vec<Vec<Vec<Vec<i32>>>> = vec![];
    let err = api.unmarshal(b"[[[[1]]]]", &mut v).unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(ParseErrorCode::DepthLimitExceeded(3), _)
    ));

    // skipped values count toward the limit too
    let mut r = Record::default();
    let err = api.unmarshal(br#"{"x":[[[1]]]}"#, &mut r).unwrap_err();
    assert!(matches!(
        err,
        Error::Syntax(ParseErrorCode::DepthLimitExceeded(3), _)
    ));
}

#[test]
fn test_decode_default_depth_on_thread() {
    let handle = std::thread::spawn(|| {
        let ok = "[".repeat(128) + &"]".repeat(128);
        let mut v = Value::Null;
        jsonbind::unmarshal(ok.as_bytes(), &mut v).unwrap();
        let mut list: Vec<Value> = vec![];
        jsonbind::unmarshal(ok.as_bytes(), &mut list).unwrap();
        let any = Any::from_bytes(ok.as_bytes());
        assert_eq!(any.to_json().unwrap(), ok);

        let deep = "[".repeat(129) + &"]".repeat(129);
        let err = jsonbind::unmarshal(deep.as_bytes(), &mut v).unwrap_err();
        assert!(matches!(
            err,
            Error::Syntax(ParseErrorCode::DepthLimitExceeded(128), _)
        ));
        let mut r = Record::default();
        let skipped = format!(r#"{{"x":{deep}}}"#);
        assert!(jsonbind::unmarshal(skipped.as_bytes(), &mut r).is_err());
    });
    handle.join().unwrap();
}

#[test]
fn test_stream_decoder() {
    let api = Config::default().froze();
    let data = br#"{"a":1,"b":[]} {"a":2,"b":[3]}
        [1, 2]"#;
    let mut dec = api.new_decoder(&data[..]);
    let mut r = Record::default();
    assert!(dec.decode(&mut r).unwrap());
    assert_eq!(r.a, 1);
    assert!(dec.decode(&mut r).unwrap());
    assert_eq!(r, Record { a: 2, b: vec![3] });
    let rest = dec.decode_any().unwrap().unwrap();
    assert_eq!(rest.to_string(), "[1, 2]");
    assert!(!dec.more().unwrap());
    assert!(dec.decode_any().unwrap().is_none());
}
