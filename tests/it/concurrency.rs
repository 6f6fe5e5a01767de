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
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;

use jsonbind::reflect_struct;
use jsonbind::Any;
use jsonbind::Config;

#[derive(Debug, Default, PartialEq)]
struct Item {
    id: u64,
    tags: Vec<String>,
    attrs: BTreeMap<String, f64>,
    child: Option<Box<Item>>,
}

reflect_struct!(Item {
    id: u64,
    tags: Vec<String>,
    attrs: BTreeMap<String, f64>,
    child: Option<Box<Item>> => "child,omitempty",
});

const THREADS: usize = 16;

#[test]
fn test_concurrent_compile() {
    for _ in 0..20 {
        let api = Config::default().froze();
        let barrier = Barrier::new(THREADS);
        let decoders = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|i| {
                    let api = &api;
                    let barrier = &barrier;
                    s.spawn(move || {
                        barrier.wait();
                        let data = format!(
                            r#"{{"id":{i},"tags":["t{i}"],"attrs":{{"w":1.5}},"child":{{"id":{},"tags":[],"attrs":{{}}}}}}"#,
                            i + 100
                        );
                        let mut item = Item::default();
                        api.unmarshal(data.as_bytes(), &mut item).unwrap();
                        assert_eq!(item.id, i as u64);
                        assert_eq!(item.tags, vec![format!("t{i}")]);
                        assert_eq!(item.attrs["w"], 1.5);
                        assert_eq!(item.child.as_ref().unwrap().id, i as u64 + 100);
                        assert_eq!(api.marshal_to_string(&item).unwrap(), data);
                        api.decoder_of::<Item>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .collect::<Vec<_>>()
        });
        // every thread ends up with the single published decoder
        for dec in &decoders {
            assert!(Arc::ptr_eq(dec, &decoders[0]));
        }
    }
}

#[test]
fn test_concurrent_lazy_access() {
    let text = format!(
        "[{}]",
        (0..200).map(|i| i.to_string()).collect::<Vec<_>>().join(",")
    );
    let any = Any::from_bytes(text.as_bytes());
    thread::scope(|s| {
        for t in 0..THREADS {
            let any = any.clone();
            s.spawn(move || {
                for i in (t..200).step_by(3) {
                    assert_eq!(any.get_index(i).to_i64(), i as i64);
                }
                assert_eq!(any.size(), 200);
            });
        }
    });
    // one scan of the array, and every number parsed once
    assert_eq!(any.parse_count(), 1 + 200);
}

#[test]
fn test_shared_api_across_threads() {
    let api = jsonbind::standard_api();
    thread::scope(|s| {
        for t in 0..THREADS {
            s.spawn(move || {
                for i in 0..100u64 {
                    let item = Item {
                        id: i * t as u64,
                        ..Default::default()
                    };
                    let text = api.marshal_to_string(&item).unwrap();
                    let mut back = Item::default();
                    api.unmarshal(text.as_bytes(), &mut back).unwrap();
                    assert_eq!(back, item);
                }
            });
        }
    });
}
