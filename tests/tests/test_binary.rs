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

use archivist_core::archive::{ArchiveExt, ScalarMut};
use archivist_core::binary::{BinaryIArchive, BinaryOArchive};
use archivist_core::error::Error;
use archivist_core::registry::Registry;
use archivist_core::serializer::{serialize_struct, BinaryData, Owned, Serialize, SerializeFields};
use archivist_core::types::CONTAINER_SENTINEL;
use archivist_core::Archive;
use archivist_derive::Archived;
use std::collections::{HashMap, VecDeque};

#[test]
fn container_payload_starts_with_sentinel() {
    let registry = Registry::new();
    let mut values = vec![10i32, 20, 30];
    let mut out = BinaryOArchive::new(&registry);
    out.serialize(&mut values, "values", "").unwrap();
    let bytes = out.into_bytes().unwrap();

    // magic, "values\0", u16 size, then the payload
    let payload = &bytes[3 + 7 + 2..];
    assert_eq!(&payload[0..4], &CONTAINER_SENTINEL.to_le_bytes());
    assert_eq!(&payload[4..8], &3u32.to_le_bytes());

    let mut back: Vec<i32> = Vec::new();
    let mut input = BinaryIArchive::from_bytes(&registry, bytes).unwrap();
    assert!(input.serialize(&mut back, "values", "").unwrap());
    assert_eq!(back.len(), 3);
    assert_eq!(back, values);
}

#[derive(Archived, Clone, Copy, Debug, Default, PartialEq)]
enum Mode {
    #[default]
    Idle = 0,
    Run = 5,
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Node {
    label: String,
    weight: f32,
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Everything {
    flag: bool,
    small: i8,
    big: u64,
    size: usize,
    ratio: f64,
    mode: Mode,
    queue: VecDeque<i16>,
    lookup: HashMap<String, Node>,
    blob: BinaryData,
    child: Owned<Node>,
    missing: Owned<Node>,
    boxed: Option<Box<Node>>,
}

fn everything() -> Everything {
    Everything {
        flag: true,
        small: -3,
        big: u64::MAX,
        size: 12345,
        ratio: std::f64::consts::PI,
        mode: Mode::Run,
        queue: VecDeque::from([1, -2, 3]),
        lookup: HashMap::from([(
            "n".to_string(),
            Node {
                label: "leaf".to_string(),
                weight: 0.5,
            },
        )]),
        blob: BinaryData::new((0..=255).collect()),
        child: Owned::new(Node {
            label: "child".to_string(),
            weight: 2.0,
        }),
        missing: Owned::null(),
        boxed: Some(Box::new(Node::default())),
    }
}

#[test]
fn every_kind_round_trips() {
    let registry = Registry::new();
    let mut value = everything();
    let mut out = BinaryOArchive::new(&registry);
    out.serialize(&mut value, "all", "").unwrap();
    let crc = out.crc();
    let bytes = out.into_bytes().unwrap();

    let mut back = Everything {
        missing: Owned::new(Node::default()),
        ..Everything::default()
    };
    let mut input = BinaryIArchive::from_bytes(&registry, bytes).unwrap();
    assert_eq!(input.crc(), crc);
    assert!(input.serialize(&mut back, "all", "").unwrap());
    assert_eq!(back, value);
    assert!(back.missing.is_null());
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Wide {
    a: i32,
    b: Vec<Node>,
    c: String,
    trailing: Node,
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Narrow {
    c: String,
    a: i32,
}

#[test]
fn unknown_and_reordered_chunks_are_skipped() {
    let registry = Registry::new();
    let mut wide = Wide {
        a: 1,
        b: Vec::new(),
        c: "see".to_string(),
        trailing: Node {
            label: "skip me".to_string(),
            weight: 1.0,
        },
    };
    wide.b.push(Node {
        label: "x".repeat(70_000),
        weight: 3.0,
    });
    let mut out = BinaryOArchive::new(&registry);
    out.serialize(&mut wide, "w", "").unwrap();
    let bytes = out.into_bytes().unwrap();

    let mut narrow = Narrow::default();
    let mut input = BinaryIArchive::from_bytes(&registry, bytes.clone()).unwrap();
    assert!(input.serialize(&mut narrow, "w", "").unwrap());
    assert_eq!(narrow.a, 1);
    assert_eq!(narrow.c, "see");

    let mut back = Wide::default();
    BinaryIArchive::from_bytes(&registry, bytes)
        .unwrap()
        .serialize(&mut back, "w", "")
        .unwrap();
    assert_eq!(back, wide);
}

#[test]
fn truncated_input_is_structural() {
    let registry = Registry::new();
    let mut out = BinaryOArchive::new(&registry);
    out.serialize(&mut everything(), "all", "").unwrap();
    let mut bytes = out.into_bytes().unwrap();
    bytes.truncate(bytes.len() / 2);
    let mut input = BinaryIArchive::from_bytes(&registry, bytes).unwrap();
    let err = input
        .serialize(&mut Everything::default(), "all", "")
        .unwrap_err();
    assert!(err.is_structural());
}

#[test]
fn file_round_trip() {
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("values.bin");
    let mut out = BinaryOArchive::new(&registry);
    let mut n = 42u32;
    out.process_scalar(ScalarMut::U32(&mut n), "n", "").unwrap();
    out.save(&path).unwrap();

    let mut input = BinaryIArchive::open(&registry, &path).unwrap();
    let mut back = 0u32;
    assert!(input.serialize(&mut back, "n", "").unwrap());
    assert_eq!(back, 42);

    let err = BinaryIArchive::open(&registry, &dir.path().join("absent.bin"))
        .err()
        .unwrap();
    assert!(err.is_io());
    assert!(err.to_string().contains("absent.bin"));
}

#[test]
fn oversized_element_count_is_structural() {
    let registry = Registry::new();
    let mut names = vec!["a".to_string()];
    let mut out = BinaryOArchive::new(&registry);
    out.serialize(&mut names, "v", "").unwrap();
    let mut bytes = out.into_bytes().unwrap();

    // magic, "v\0", u16 size, sentinel, then the count
    bytes[11..15].copy_from_slice(&u32::MAX.to_le_bytes());
    let mut back: Vec<String> = Vec::new();
    let err = BinaryIArchive::from_bytes(&registry, bytes)
        .unwrap()
        .serialize(&mut back, "v", "")
        .unwrap_err();
    assert!(err.is_structural(), "{err}");
    assert!(back.is_empty());
}

const POSITION: u32 = 1 << 0;
const COLOR: u32 = 1 << 1;

#[derive(Debug, Default, PartialEq)]
struct Vertex {
    x: f32,
    rgba: u32,
}

impl SerializeFields for Vertex {
    fn serialize_fields(&mut self, ar: &mut dyn Archive) -> Result<(), Error> {
        if ar.filter(POSITION) {
            Serialize::serialize(&mut self.x, ar, "x", "")?;
        }
        if ar.filter(COLOR) {
            Serialize::serialize(&mut self.rgba, ar, "rgba", "")?;
        }
        Ok(())
    }
}

impl Serialize for Vertex {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str) -> Result<bool, Error> {
        serialize_struct(self, ar, name, name_alt)
    }
}

#[test]
fn filtered_fields_stay_untouched() {
    let registry = Registry::new();
    let mut vertices = vec![
        Vertex { x: 1.0, rgba: 0xff00ff00 },
        Vertex { x: 2.0, rgba: 0x00ff00ff },
    ];
    let mut out = BinaryOArchive::new(&registry).filter(POSITION);
    out.serialize(&mut vertices, "mesh", "").unwrap();
    let bytes = out.into_bytes().unwrap();

    let mut back = vec![Vertex { x: 0.0, rgba: 7 }];
    BinaryIArchive::from_bytes(&registry, bytes)
        .unwrap()
        .serialize(&mut back, "mesh", "")
        .unwrap();
    assert_eq!(
        back,
        vec![Vertex { x: 1.0, rgba: 7 }, Vertex { x: 2.0, rgba: 0 }]
    );
}

#[derive(Debug, Default, PartialEq)]
struct Stamp {
    author: String,
}

impl SerializeFields for Stamp {
    fn serialize_fields(&mut self, ar: &mut dyn Archive) -> Result<(), Error> {
        if ar.is_output() {
            if let Some(author) = ar.closure::<String>() {
                self.author = author.clone();
            }
        }
        Serialize::serialize(&mut self.author, ar, "author", "")?;
        Ok(())
    }
}

impl Serialize for Stamp {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str) -> Result<bool, Error> {
        serialize_struct(self, ar, name, name_alt)
    }
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Document {
    title: String,
    stamps: Vec<Stamp>,
    signed: Owned<Stamp>,
}

#[test]
fn closure_reaches_nested_objects() {
    let registry = Registry::new();
    let mut doc = Document {
        title: "notes".to_string(),
        stamps: vec![Stamp::default()],
        signed: Owned::new(Stamp::default()),
    };
    let mut out = BinaryOArchive::new(&registry);
    out.context_mut().set_closure(Box::new("ada".to_string()));
    out.serialize(&mut doc, "doc", "").unwrap();
    let bytes = out.into_bytes().unwrap();

    let mut back = Document::default();
    BinaryIArchive::from_bytes(&registry, bytes)
        .unwrap()
        .serialize(&mut back, "doc", "")
        .unwrap();
    assert_eq!(back.title, "notes");
    assert_eq!(back.stamps[0].author, "ada");
    assert_eq!(back.signed.get().map(|s| s.author.as_str()), Some("ada"));
}
