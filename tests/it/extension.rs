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

use std::any::TypeId;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use jsonbind::codec::field_hash;
use jsonbind::codec::DispatchKind;
use jsonbind::codec::ValDecoder;
use jsonbind::codec::ValEncoder;
use jsonbind::extension::decoder_fn;
use jsonbind::extension::encoder_fn;
use jsonbind::extension::KeyOrder;
use jsonbind::extension::StructDescriptor;
use jsonbind::extension::ValueDecoder;
use jsonbind::extension::ValueEncoder;
use jsonbind::reflect_struct;
use jsonbind::Config;
use jsonbind::Extension;
use jsonbind::Result;
use jsonbind::Tokenizer;
use jsonbind::TypeInfo;
use jsonbind::Writer;

#[derive(Debug, Default, PartialEq)]
struct Collide {
    a: i32,
    b: i32,
    c: i32,
}

reflect_struct!(Collide { a: i32, b: i32, c: i32 });

#[derive(Debug, Default, PartialEq)]
struct Single {
    v: i32,
}

reflect_struct!(Single { v: i32 });

#[derive(Debug, Default, PartialEq)]
struct Account {
    user: String,
    secret: String,
    internal: u64,
}

reflect_struct!(Account {
    user: String,
    secret: String,
    internal: u64,
});

/// Two distinct lowercase names with the same case-folded field hash.
fn colliding_names() -> (String, String) {
    let mut seen: HashMap<u32, String> = HashMap::new();
    for i in 0u32.. {
        let name = format!("k{i}");
        let hash = field_hash(&name, false);
        if let Some(other) = seen.insert(hash, name.clone()) {
            return (other, name);
        }
    }
    unreachable!()
}

/// Renames fields of one struct type.
struct Rename {
    ty: TypeId,
    names: Vec<(&'static str, String)>,
}

impl Extension for Rename {
    fn update_struct_descriptor(&self, desc: &mut StructDescriptor) {
        if desc.ty.id != self.ty {
            return;
        }
        for (field, name) in &self.names {
            if let Some(binding) = desc.binding_mut(field) {
                binding.rename(name.clone());
            }
        }
    }
}

#[test]
fn test_hash_collision_falls_back_to_map() {
    let (first, second) = colliding_names();
    assert_ne!(first, second);
    assert_eq!(field_hash(&first, false), field_hash(&second, false));

    let plain = Config::default().froze();
    let dec = plain.decoder_of::<Collide>();
    assert_eq!(dec.as_struct().unwrap().dispatch(), DispatchKind::Hashed);

    let api = Config::default().froze();
    api.register_extension(Arc::new(Rename {
        ty: TypeId::of::<Collide>(),
        names: vec![("a", first.clone()), ("b", second.clone())],
    }));
    let dec = api.decoder_of::<Collide>();
    assert_eq!(dec.as_struct().unwrap().dispatch(), DispatchKind::General);

    let mut v = Collide::default();
    let data = format!(r#"{{"{second}":2,"c":3,"{first}":1}}"#);
    api.unmarshal(data.as_bytes(), &mut v).unwrap();
    assert_eq!(v, Collide { a: 1, b: 2, c: 3 });
    assert_eq!(
        api.marshal_to_string(&v).unwrap(),
        format!(r#"{{"{first}":1,"{second}":2,"c":3}}"#)
    );
}

#[test]
fn test_hashed_lookup_confirms_name() {
    let (first, second) = colliding_names();
    let api = Config::default().froze();
    api.register_extension(Arc::new(Rename {
        ty: TypeId::of::<Single>(),
        names: vec![("v", first.clone())],
    }));
    assert_eq!(
        api.decoder_of::<Single>().as_struct().unwrap().dispatch(),
        DispatchKind::Hashed
    );

    let mut s = Single::default();
    let data = format!(r#"{{"{second}":9}}"#);
    api.unmarshal(data.as_bytes(), &mut s).unwrap();
    assert_eq!(s.v, 0);
    let data = format!(r#"{{"{}":9}}"#, first.to_uppercase());
    api.unmarshal(data.as_bytes(), &mut s).unwrap();
    assert_eq!(s.v, 9);
}

#[test]
fn test_dispatch_kinds() {
    let api = Config::default().froze();
    assert!(api.decoder_of::<i32>().as_struct().is_none());
    assert_eq!(
        api.decoder_of::<Account>().as_struct().unwrap().dispatch(),
        DispatchKind::Hashed
    );

    struct DropAll;
    impl Extension for DropAll {
        fn update_struct_descriptor(&self, desc: &mut StructDescriptor) {
            desc.bindings.clear();
        }
    }
    api.register_extension(Arc::new(DropAll));
    let dec = api.decoder_of::<Account>();
    assert_eq!(dec.as_struct().unwrap().dispatch(), DispatchKind::Empty);
    let mut acc = Account::default();
    api.unmarshal(br#"{"user":"x","more":[1,{"a":2}]}"#, &mut acc).unwrap();
    assert_eq!(acc, Account::default());
    assert_eq!(api.marshal_to_string(&acc).unwrap(), "{}");
}

/// Masks `secret`, hides `internal` from the output and accepts `login`
/// as another name for `user`.
struct AccountPolicy;

impl Extension for AccountPolicy {
    fn update_struct_descriptor(&self, desc: &mut StructDescriptor) {
        if desc.ty.id != TypeId::of::<Account>() {
            return;
        }
        if let Some(user) = desc.binding_mut("user") {
            user.from_names.push("login".to_string());
        }
        if let Some(secret) = desc.binding_mut("secret") {
            secret.encoder = Some(encoder_fn(|_, w| {
                w.write_string("***");
                Ok(())
            }));
        }
        if let Some(internal) = desc.binding_mut("internal") {
            internal.to_names.clear();
        }
    }
}

#[test]
fn test_binding_overrides() {
    let api = Config::default().froze();
    api.register_extension(Arc::new(AccountPolicy));

    let mut acc = Account::default();
    api.unmarshal(br#"{"login":"ann","secret":"pw","internal":7}"#, &mut acc)
        .unwrap();
    assert_eq!(acc, Account {
        user: "ann".to_string(),
        secret: "pw".to_string(),
        internal: 7,
    });
    assert_eq!(
        api.marshal_to_string(&acc).unwrap(),
        r#"{"user":"ann","secret":"***"}"#
    );
}

struct Writes(&'static str);

impl Extension for Writes {
    fn create_encoder(&self, ty: &TypeInfo) -> Option<Arc<dyn ValueEncoder>> {
        if ty.id != TypeId::of::<i32>() {
            return None;
        }
        let text = self.0;
        Some(encoder_fn(move |_, w| {
            w.write_string(text);
            Ok(())
        }))
    }

    fn create_decoder(&self, ty: &TypeInfo) -> Option<Arc<dyn ValueDecoder>> {
        if ty.id != TypeId::of::<String>() {
            return None;
        }
        let suffix = self.0;
        Some(decoder_fn(move |dst, iter| {
            let s = iter.read_string()?;
            *dst.downcast_mut::<String>().unwrap() = format!("{s}-{suffix}");
            Ok(())
        }))
    }
}

#[test]
fn test_last_create_wins() {
    let api = Config::default().froze();
    api.register_extension(Arc::new(Writes("first")));
    api.register_extension(Arc::new(Writes("second")));
    assert_eq!(api.marshal_to_string(&5i32).unwrap(), r#""second""#);
    assert_eq!(api.marshal_to_string(&vec![1i32, 2]).unwrap(), r#"["second","second"]"#);

    let mut s = String::new();
    api.unmarshal(br#""x""#, &mut s).unwrap();
    assert_eq!(s, "x-second");
}

/// Wraps the encoded value in a one member object.
struct WrapEncoder {
    key: &'static str,
    inner: Arc<ValEncoder>,
}

impl ValueEncoder for WrapEncoder {
    fn encode(&self, src: &dyn std::any::Any, w: &mut Writer<'_>) -> Result<()> {
        w.write_object_start();
        w.write_object_field(self.key);
        self.inner.encode(src, w)?;
        w.write_object_end();
        Ok(())
    }
}

/// Records that it ran, then decodes with the wrapped decoder.
struct SpyDecoder {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
    inner: Arc<ValDecoder>,
}

impl ValueDecoder for SpyDecoder {
    fn decode(&self, dst: &mut dyn std::any::Any, iter: &mut Tokenizer<'_>) -> Result<()> {
        self.log.lock().unwrap().push(self.name);
        self.inner.decode(dst, iter)
    }
}

struct Decorate {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Extension for Decorate {
    fn decorate_encoder(&self, ty: &TypeInfo, enc: Arc<ValEncoder>) -> Arc<ValEncoder> {
        if ty.id != TypeId::of::<i32>() {
            return enc;
        }
        Arc::new(ValEncoder::Extension(Arc::new(WrapEncoder {
            key: self.name,
            inner: enc,
        })))
    }

    fn decorate_decoder(&self, ty: &TypeInfo, dec: Arc<ValDecoder>) -> Arc<ValDecoder> {
        if ty.id != TypeId::of::<i32>() {
            return dec;
        }
        Arc::new(ValDecoder::Extension(Arc::new(SpyDecoder {
            name: self.name,
            log: self.log.clone(),
            inner: dec,
        })))
    }
}

#[test]
fn test_last_decorator_is_outermost() {
    let log = Arc::new(Mutex::new(vec![]));
    let api = Config::default().froze();
    api.register_extension(Arc::new(Decorate {
        name: "a",
        log: log.clone(),
    }));
    api.register_extension(Arc::new(Decorate {
        name: "b",
        log: log.clone(),
    }));

    assert_eq!(api.marshal_to_string(&5i32).unwrap(), r#"{"b":{"a":5}}"#);
    // types other than i32 are left alone
    assert_eq!(api.marshal_to_string(&5i64).unwrap(), "5");

    let mut v = 0i32;
    api.unmarshal(b"7", &mut v).unwrap();
    assert_eq!(v, 7);
    assert_eq!(*log.lock().unwrap(), vec!["b", "a"]);
}

struct Order(bool);

impl Extension for Order {
    fn map_key_order(&self, _ty: &TypeInfo) -> Option<KeyOrder> {
        if self.0 {
            Some(Arc::new(|a: &str, b: &str| b.cmp(a)))
        } else {
            Some(Arc::new(|a: &str, b: &str| a.len().cmp(&b.len()).then(a.cmp(b))))
        }
    }
}

#[test]
fn test_last_key_order_wins() {
    let map = BTreeMap::from([
        ("bb".to_string(), 1),
        ("a".to_string(), 2),
        ("ccc".to_string(), 3),
    ]);
    let api = Config::default().froze();
    api.register_extension(Arc::new(Order(false)));
    assert_eq!(
        api.marshal_to_string(&map).unwrap(),
        r#"{"a":2,"bb":1,"ccc":3}"#
    );
    api.register_extension(Arc::new(Order(true)));
    assert_eq!(
        api.marshal_to_string(&map).unwrap(),
        r#"{"ccc":3,"bb":1,"a":2}"#
    );

    // an extension order beats sort_map_keys
    let sorted = Config {
        sort_map_keys: true,
        ..Default::default()
    }
    .froze();
    sorted.register_extension(Arc::new(Order(true)));
    assert_eq!(
        sorted.marshal_to_string(&map).unwrap(),
        r#"{"ccc":3,"bb":1,"a":2}"#
    );
}

#[test]
fn test_register_invalidates_cache() {
    let api = Config::default().froze();
    let before = api.encoder_of::<Single>();
    assert!(Arc::ptr_eq(&before, &api.encoder_of::<Single>()));
    assert_eq!(api.marshal_to_string(&Single { v: 1 }).unwrap(), r#"{"v":1}"#);

    api.register_extension(Arc::new(Rename {
        ty: TypeId::of::<Single>(),
        names: vec![("v", "value".to_string())],
    }));
    let after = api.encoder_of::<Single>();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(api.marshal_to_string(&Single { v: 1 }).unwrap(), r#"{"value":1}"#);
}
