// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use archivist_core::archive::ArchiveExt;
use archivist_core::config::Config;
use archivist_core::in_place::{InPlaceBuffer, InPlaceIArchive, InPlaceOArchive};
use archivist_core::registry::Registry;
use archivist_core::serializer::{BinaryData, Owned};
use archivist_core::Archive;
use archivist_derive::Archived;
use std::collections::BTreeMap;

#[derive(Archived, Debug, Default, PartialEq)]
struct Greeting {
    text: String,
    count: i32,
}

#[test]
fn string_layout_after_load() {
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("greeting.inplace");
    let mut out = InPlaceOArchive::new(&registry);
    out.serialize(
        &mut Greeting {
            text: "hello".to_string(),
            count: 1,
        },
        "greeting",
        "",
    )
    .unwrap();
    out.save(&path).unwrap();

    let buffer = InPlaceBuffer::open(&registry, &path, false).unwrap();
    assert_eq!(buffer.string_at(0).unwrap(), "hello");
    let body = buffer.body();
    let word = |at: usize| u32::from_le_bytes(body[at..at + 4].try_into().unwrap()) as usize;
    let (start, end, cap) = (word(0), word(4), word(8));
    assert_eq!(end - start, 5);
    assert_eq!(cap, end);
    assert_eq!(&body[start..end], b"hello");
    assert_eq!(word(12), 1);
}

#[derive(Archived, Clone, Copy, Debug, Default, PartialEq)]
enum Layer {
    #[default]
    Ground = 0,
    Air = 1,
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Leaf {
    id: u16,
    name: String,
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Library {
    title: String,
    layer: Layer,
    leaves: Vec<Leaf>,
    index: BTreeMap<String, u32>,
    matrix: [[f32; 2]; 2],
    first: Owned<Leaf>,
    none: Owned<Leaf>,
    raw: BinaryData,
    words: Vec<Vec<String>>,
}

fn library() -> Library {
    Library {
        title: "lib".to_string(),
        layer: Layer::Air,
        leaves: (0..4)
            .map(|i| Leaf {
                id: i,
                name: format!("leaf {i}"),
            })
            .collect(),
        index: BTreeMap::from([("a".to_string(), 1), ("b".to_string(), 2)]),
        matrix: [[1.0, 2.0], [3.0, 4.0]],
        first: Owned::new(Leaf {
            id: 9,
            name: String::new(),
        }),
        none: Owned::null(),
        raw: BinaryData::new(vec![5; 17]),
        words: vec![vec![], vec!["x".to_string(), "yz".to_string()]],
    }
}

#[test]
fn nested_round_trip_from_file() {
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lib.inplace");
    let mut value = library();
    let mut out = InPlaceOArchive::new(&registry);
    out.serialize(&mut value, "library", "").unwrap();
    out.save(&path).unwrap();

    let mut input = InPlaceIArchive::open(&registry, &path, Config::default()).unwrap();
    assert!(input.in_place());
    assert_eq!(input.crc(), out.crc().unwrap());
    let mut back = Library::default();
    assert!(input.serialize(&mut back, "library", "").unwrap());
    assert_eq!(back, value);
}

#[test]
fn corrupt_relocation_is_structural() {
    let registry = Registry::new();
    let mut out = InPlaceOArchive::new(&registry);
    out.serialize(&mut library(), "library", "").unwrap();
    let mut bytes = out.to_bytes().unwrap();

    let body_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    let table = 8 + body_size;
    let count = u32::from_le_bytes(bytes[table..table + 4].try_into().unwrap());
    assert!(count > 0);
    bytes[table + 4..table + 8].copy_from_slice(&(body_size as u32).to_le_bytes());
    let err = InPlaceBuffer::load(&registry, &bytes, false).err().unwrap();
    assert!(err.is_structural(), "{err}");
}

#[test]
fn truncated_file_is_structural() {
    let registry = Registry::new();
    let mut out = InPlaceOArchive::new(&registry);
    out.serialize(&mut library(), "library", "").unwrap();
    let bytes = out.to_bytes().unwrap();
    let err = InPlaceBuffer::load(&registry, &bytes[..bytes.len() - 3], false)
        .err()
        .unwrap();
    assert!(err.is_structural());
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Ids {
    ids: Vec<u32>,
}

#[test]
fn oversized_element_count_is_structural() {
    let registry = Registry::new();
    let mut out = InPlaceOArchive::new(&registry);
    out.serialize(&mut Ids { ids: vec![1, 2, 3] }, "ids", "")
        .unwrap();
    let mut bytes = out.to_bytes().unwrap();

    // the range slot of `ids` opens the body; its block starts with the count
    let block = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
    bytes[8 + block..12 + block].copy_from_slice(&u32::MAX.to_le_bytes());
    let buffer = InPlaceBuffer::load(&registry, &bytes, false).unwrap();
    let mut back = Ids::default();
    let err = InPlaceIArchive::new(&registry, buffer)
        .serialize(&mut back, "ids", "")
        .unwrap_err();
    assert!(err.is_structural(), "{err}");
    assert!(back.ids.is_empty());
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Marker {}

#[test]
fn zero_width_elements_are_rejected() {
    let registry = Registry::new();
    let mut markers = vec![Marker {}, Marker {}];
    let mut out = InPlaceOArchive::new(&registry);
    let err = out.serialize(&mut markers, "markers", "").unwrap_err();
    assert!(err.is_structural(), "{err}");

    let mut none: Vec<Marker> = Vec::new();
    let mut out = InPlaceOArchive::new(&registry);
    assert!(out.serialize(&mut none, "markers", "").unwrap());
}

#[test]
fn type_slot_over_relocated_pair_is_structural() {
    let registry = Registry::new();
    let mut out = InPlaceOArchive::new(&registry);
    out.serialize(
        &mut Greeting {
            text: "hello".to_string(),
            count: 1,
        },
        "greeting",
        "",
    )
    .unwrap();
    let mut bytes = out.to_bytes().unwrap();

    // swap the empty type table for one aiming into the string slot at 0
    let tail = bytes.len() - 4;
    assert_eq!(&bytes[tail..], &0i32.to_le_bytes());
    bytes.truncate(tail);
    bytes.extend_from_slice(&1i32.to_le_bytes());
    bytes.extend_from_slice(&4i32.to_le_bytes());
    bytes.extend_from_slice(b"Greeting\0");
    let err = InPlaceBuffer::load(&registry, &bytes, true).err().unwrap();
    assert!(err.is_structural(), "{err}");
}
