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

use jsonbind::parse_path;
use jsonbind::reflect_struct;
use jsonbind::Any;
use jsonbind::PathKey;
use jsonbind::ValueType;

#[derive(Debug, Default, PartialEq)]
struct User {
    name: String,
    age: u32,
}

reflect_struct!(User { name: String, age: u32 });

#[test]
fn test_lazy_parse_count() {
    let any = Any::from_bytes(b"[1,[2,3],4]");
    assert_eq!(any.value_type(), ValueType::Array);
    assert_eq!(any.parse_count(), 0);

    let last = any.get_index(2);
    // the outer array was scanned, the nested one was only skipped
    assert_eq!(any.parse_count(), 1);
    assert_eq!(last.to_i32(), 4);
    assert_eq!(any.parse_count(), 2);
    assert_eq!(last.to_i64(), 4);
    assert_eq!(any.parse_count(), 2);

    let nested = any.get_index(1);
    assert_eq!(any.parse_count(), 2);
    assert_eq!(nested.size(), 2);
    assert_eq!(any.parse_count(), 3);
    assert_eq!(nested.get_index(0).to_i32(), 2);
    assert_eq!(any.parse_count(), 4);

    // clones share what was scanned
    let copy = any.clone();
    assert_eq!(copy.size(), 3);
    assert_eq!(any.parse_count(), 4);
}

#[test]
fn test_get_path() {
    let data = br#"{"users":[{"name":"ann","age":31},{"name":"bob"}],"count":2,"weird key":{"7":true}}"#;
    let any = Any::from_bytes(data);
    assert_eq!(any.keys(), vec!["users", "count", "weird key"]);

    let path = parse_path("{users,1,name}").unwrap();
    assert_eq!(any.get(&path).to_string_value(), "bob");
    assert_eq!(jsonbind::get(data, &path).to_string_value(), "bob");

    let path = vec![PathKey::from("weird key"), PathKey::from("7")];
    assert!(any.get(&path).to_bool());
    assert!(any.get(&parse_path(r#"{"weird key","7"}"#).unwrap()).to_bool());

    let names = any.get(&parse_path("{users,*,name}").unwrap());
    assert_eq!(names.to_string(), r#"["ann","bob"]"#);
    let ages = any.get(&parse_path("{users,*,age}").unwrap());
    assert_eq!(ages.to_string(), "[31]");

    let missing = any.get(&parse_path("{users,5,name}").unwrap());
    assert!(!missing.is_valid());
    assert!(missing.last_error().is_some());
    assert_eq!(missing.to_i32(), 0);

    let scalar = any.get(&parse_path("{count,0}").unwrap());
    assert!(!scalar.is_valid());

    let empty = any.get(&[]);
    assert_eq!(empty.size(), 3);
}

#[test]
fn test_wildcard_over_object() {
    let any = Any::from_bytes(br#"{"a":{"n":1},"b":{"n":2},"c":{}}"#);
    let ns = any.get(&parse_path("{*,n}").unwrap());
    assert_eq!(ns.value_type(), ValueType::Object);
    assert_eq!(ns.keys(), vec!["a", "b"]);
    assert_eq!(ns.to_string(), r#"{"a":1,"b":2}"#);
    assert_eq!(ns.get_key("b").to_u64(), 2);
}

#[test]
fn test_duplicate_keys() {
    let any = Any::from_bytes(br#"{"k":1,"k":2}"#);
    assert_eq!(any.get_key("k").to_i32(), 1);
    assert_eq!(any.size(), 2);
    assert_eq!(any.keys(), vec!["k", "k"]);
}

#[test]
fn test_coercions() {
    let any = Any::from_bytes(
        br#"{"s":"12abc","f":"false","z":"0","neg":-5,"big":1e20,"arr":[0],"none":null,"t":true}"#,
    );
    assert_eq!(any.get_key("s").to_i32(), 12);
    assert!(!any.get_key("f").to_bool());
    assert!(!any.get_key("z").to_bool());
    assert!(any.get_key("s").to_bool());
    assert_eq!(any.get_key("neg").to_u32(), 0);
    assert_eq!(any.get_key("neg").to_i64(), -5);
    assert_eq!(any.get_key("neg").to_f64(), -5.0);
    assert_eq!(any.get_key("big").to_i32(), i32::MAX);
    assert_eq!(any.get_key("big").to_f32(), 1e20);
    assert!(any.get_key("arr").to_bool());
    assert_eq!(any.get_key("none").to_string_value(), "");
    assert_eq!(any.get_key("t").to_i32(), 1);
    assert_eq!(any.get_key("arr").to_string_value(), "[0]");

    let word = any.get_key("f");
    assert_eq!(word.to_i32(), 0);
    assert!(word.last_error().is_some());
}

#[test]
fn test_invalid_input() {
    let any = Any::from_bytes(b"[1, 2");
    assert!(!any.is_valid());
    assert!(any.last_error().unwrap().is_eof());
    assert!(any.to_string().starts_with("<invalid: "));

    let any = Any::from_bytes(b"1 2");
    assert!(!any.is_valid());

    // malformed members are rejected up front, however deep
    let test_cases: Vec<&[u8]> = vec![
        br#"[1, 2.5.1, 3]"#,
        br#"{"k":{"a" 1 2 3}}"#,
        br#"{"k":[x]}"#,
        br#"[{"a":"\x"}]"#,
    ];
    for input in test_cases {
        let any = Any::from_bytes(input);
        assert!(!any.is_valid(), "{}", String::from_utf8_lossy(input));
        assert!(any.get_key("k").get_index(0).last_error().is_some());
        assert!(any.to_json().is_err());
    }
}

#[test]
fn test_decode_into() {
    let data = br#"{"team":[{"name":"ann","age":31},{"name":"bob","age":27}]}"#;
    let any = jsonbind::default_api().read_any(data);
    let mut user = User::default();
    any.get(&parse_path("{team,1}").unwrap())
        .decode_into(jsonbind::default_api(), &mut user)
        .unwrap();
    assert_eq!(user, User {
        name: "bob".to_string(),
        age: 27,
    });

    let mut names: Vec<String> = vec![];
    any.get(&parse_path("{team,*,name}").unwrap())
        .decode_into(jsonbind::default_api(), &mut names)
        .unwrap();
    assert_eq!(names, vec!["ann", "bob"]);
}

#[test]
fn test_valid() {
    assert!(jsonbind::valid(br#" {"a":[1,2,{"b":null}]} "#));
    assert!(!jsonbind::valid(b""));
    assert!(!jsonbind::valid(b"{\"a\":}"));
    assert!(!jsonbind::valid(b"[1] [2]"));
    assert!(!jsonbind::valid(b"\"\\x\""));
}
