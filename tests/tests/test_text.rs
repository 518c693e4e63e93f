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

use archivist_core::archive::{Archive, ArchiveExt};
use archivist_core::error::Error;
use archivist_core::registry::Registry;
use archivist_core::serializer::{
    serialize_struct, BinaryData, ComboString, Serialize, SerializeFields,
};
use archivist_core::text::{TextIArchive, TextOArchive};
use archivist_derive::Archived;
use std::collections::BTreeMap;

#[derive(Archived, Debug, Default, PartialEq)]
struct Ring {
    name: String,
    #[archive(rename = "isSpecial")]
    is_special: bool,
    #[archive(rename = "ringIndex")]
    ring_index: i32,
}

fn write<T: Serialize>(registry: &Registry, value: &mut T) -> String {
    let mut out = TextOArchive::new(registry);
    out.serialize(value, "root", "").unwrap();
    out.into_string()
}

#[test]
fn ring_round_trip() {
    let registry = Registry::new();
    let mut ring = Ring {
        name: "Ring1".to_string(),
        is_special: false,
        ring_index: 3,
    };
    let text = write(&registry, &mut ring);
    assert!(text.contains("name = \"Ring1\";"), "{text}");
    assert!(text.contains("ringIndex = 3;"), "{text}");

    let mut back = Ring::default();
    let mut input = TextIArchive::from_str(&registry, &text).unwrap();
    assert!(input.serialize(&mut back, "root", "").unwrap());
    assert_eq!(back.name, "Ring1");
    assert!(!back.is_special);
    assert_eq!(back.ring_index, 3);
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Inner {
    x: f64,
    tags: Vec<String>,
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Full {
    a: i32,
    b: Inner,
    c: String,
    d: Vec<Inner>,
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Subset {
    c: String,
    a: i32,
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Newer {
    a: i32,
    c: String,
    added: u64,
}

fn full() -> Full {
    Full {
        a: 11,
        b: Inner {
            x: 0.25,
            tags: vec!["p".to_string(), "q; {r}".to_string()],
        },
        c: "kept".to_string(),
        d: vec![
            Inner::default(),
            Inner {
                x: -1.5,
                tags: vec![],
            },
        ],
    }
}

#[test]
fn full_round_trip() {
    let registry = Registry::new();
    let mut value = full();
    let text = write(&registry, &mut value);
    let mut back = Full::default();
    TextIArchive::from_str(&registry, &text)
        .unwrap()
        .serialize(&mut back, "root", "")
        .unwrap();
    assert_eq!(back, value);
}

#[test]
fn skipped_and_reordered_fields() {
    let registry = Registry::new();
    let text = write(&registry, &mut full());
    let mut subset = Subset::default();
    TextIArchive::from_str(&registry, &text)
        .unwrap()
        .serialize(&mut subset, "root", "")
        .unwrap();
    assert_eq!(
        subset,
        Subset {
            c: "kept".to_string(),
            a: 11,
        }
    );
}

#[test]
fn missing_field_keeps_default() {
    let registry = Registry::new();
    let mut old = Subset {
        c: "old".to_string(),
        a: 4,
    };
    let text = write(&registry, &mut old);
    let mut newer = Newer {
        added: 99,
        ..Newer::default()
    };
    TextIArchive::from_str(&registry, &text)
        .unwrap()
        .serialize(&mut newer, "root", "")
        .unwrap();
    assert_eq!(newer.a, 4);
    assert_eq!(newer.c, "old");
    assert_eq!(newer.added, 99);

    let mut absent = Newer::default();
    let found = TextIArchive::from_str(&registry, &text)
        .unwrap()
        .serialize(&mut absent, "other", "")
        .unwrap();
    assert!(!found);
}

#[test]
fn hand_edited_text() {
    let registry = Registry::new();
    let text = r#"
        // edited by hand
        __version = 2;
        root = {
            /* fields moved around */
            ringIndex = -7;
            unknown = { nested = { 1, 2 }; };
            name = "Edited \"ring\"";
        };
    "#;
    let mut input = TextIArchive::from_str(&registry, text).unwrap();
    assert_eq!(input.version(), Some(2));
    let mut ring = Ring::default();
    assert!(input.serialize(&mut ring, "root", "").unwrap());
    assert_eq!(ring.ring_index, -7);
    assert_eq!(ring.name, "Edited \"ring\"");
}

#[test]
fn structural_errors_carry_lines() {
    let registry = Registry::new();
    let err = TextIArchive::from_str(&registry, "root = {\n a = 1;\n")
        .err()
        .unwrap();
    assert!(err.is_structural());

    let mut ring = Ring::default();
    let err = TextIArchive::from_str(&registry, "root = {\n ringIndex = many;\n};")
        .unwrap()
        .serialize(&mut ring, "root", "")
        .unwrap_err();
    assert!(err.is_structural());
    assert!(err.to_string().contains(":2:"), "{err}");
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Assets {
    names: BTreeMap<String, i32>,
    pair: (i32, String),
    fixed: [u8; 3],
    icon: BinaryData,
    style: ComboString,
}

#[test]
fn file_with_sidecar_blobs() {
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assets.txt");
    let mut assets = Assets {
        names: BTreeMap::from([("one".to_string(), 1), ("two".to_string(), 2)]),
        pair: (5, "five".to_string()),
        fixed: [7, 8, 9],
        icon: BinaryData::new(vec![0, 1, 2, 3, 255]),
        style: ComboString::new("Solid|Dashed|Dotted", "Dashed"),
    };
    let mut out = TextOArchive::new(&registry);
    out.serialize(&mut assets, "assets", "").unwrap();
    out.save(&path).unwrap();
    assert!(dir.path().join("assets.bin").exists());

    let mut back = Assets {
        style: ComboString::first_of("Solid|Dashed|Dotted"),
        ..Assets::default()
    };
    TextIArchive::open(&registry, &path)
        .unwrap()
        .serialize(&mut back, "assets", "")
        .unwrap();
    assert_eq!(back, assets);
    assert!(back.style.is_valid());

    std::fs::write(dir.path().join("assets.bin"), [9, 9, 9, 9, 9]).unwrap();
    let err: Error = TextIArchive::open(&registry, &path)
        .unwrap()
        .serialize(&mut back, "assets", "")
        .unwrap_err();
    assert!(err.is_integrity());

    let sidecar = std::fs::File::options()
        .write(true)
        .open(dir.path().join("assets.bin"))
        .unwrap();
    sidecar.set_len(2).unwrap();
    drop(sidecar);
    let err = TextIArchive::open(&registry, &path)
        .unwrap()
        .serialize(&mut back, "assets", "")
        .unwrap_err();
    assert!(err.is_structural(), "{err}");
}

#[test]
fn invalid_names_are_rejected() {
    let registry = Registry::new();
    let mut out = TextOArchive::new(&registry);
    let err = out.serialize(&mut 1i32, "a;b", "").unwrap_err();
    assert!(matches!(err, Error::InvalidName(_)));
}

#[test]
fn oversized_element_count_is_structural() {
    let registry = Registry::new();
    let mut names: Vec<String> = Vec::new();
    let err = TextIArchive::from_str(&registry, "v = { 99999999999999999, \"a\", };")
        .unwrap()
        .serialize(&mut names, "v", "")
        .unwrap_err();
    assert!(err.is_structural(), "{err}");
    assert!(names.is_empty());
}

#[test]
fn extra_elements_are_rejected() {
    let registry = Registry::new();
    let mut names: Vec<String> = Vec::new();
    let err = TextIArchive::from_str(&registry, "v = { 1, \"a\", \"b\", };")
        .unwrap()
        .serialize(&mut names, "v", "")
        .unwrap_err();
    assert!(err.is_structural(), "{err}");

    // fixed arrays keep their length and ignore the surplus
    let mut fixed = [0u8; 2];
    assert!(TextIArchive::from_str(&registry, "v = { 3, 4, 5, 6, };")
        .unwrap()
        .serialize(&mut fixed, "v", "")
        .unwrap());
    assert_eq!(fixed, [4, 5]);
}

const GEOMETRY: u32 = 1;
const MATERIAL: u32 = 2;

#[derive(Debug, Default, PartialEq)]
struct Layered {
    mesh: String,
    shader: String,
}

impl SerializeFields for Layered {
    fn serialize_fields(&mut self, ar: &mut dyn Archive) -> Result<(), Error> {
        if ar.filter(GEOMETRY) {
            Serialize::serialize(&mut self.mesh, ar, "mesh", "")?;
        }
        if ar.filter(MATERIAL) {
            Serialize::serialize(&mut self.shader, ar, "shader", "")?;
        }
        Ok(())
    }
}

impl Serialize for Layered {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str) -> Result<bool, Error> {
        serialize_struct(self, ar, name, name_alt)
    }
}

#[test]
fn filtered_fields_stay_untouched() {
    let registry = Registry::new();
    let mut layered = Layered {
        mesh: "cube".to_string(),
        shader: "lit".to_string(),
    };
    let mut out = TextOArchive::new(&registry).filter(GEOMETRY);
    out.serialize(&mut layered, "layer", "").unwrap();
    let text = out.into_string();
    assert!(text.contains("mesh"), "{text}");
    assert!(!text.contains("shader"), "{text}");

    let mut back = Layered {
        shader: "unlit".to_string(),
        ..Layered::default()
    };
    TextIArchive::from_str(&registry, &text)
        .unwrap()
        .serialize(&mut back, "layer", "")
        .unwrap();
    assert_eq!(back.mesh, "cube");
    assert_eq!(back.shader, "unlit");

    let full = write(&registry, &mut layered);
    let mut partial = Layered::default();
    TextIArchive::from_str(&registry, &full)
        .unwrap()
        .filter(MATERIAL)
        .serialize(&mut partial, "layer", "")
        .unwrap();
    assert_eq!(partial.mesh, "");
    assert_eq!(partial.shader, "lit");
}

#[derive(Debug, Default, PartialEq)]
struct Length {
    meters: f64,
}

impl SerializeFields for Length {
    fn serialize_fields(&mut self, ar: &mut dyn Archive) -> Result<(), Error> {
        let scale = ar.closure::<f64>().copied();
        Serialize::serialize(&mut self.meters, ar, "meters", "")?;
        if let (true, Some(scale)) = (ar.is_input(), scale) {
            self.meters *= scale;
        }
        Ok(())
    }
}

impl Serialize for Length {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str) -> Result<bool, Error> {
        serialize_struct(self, ar, name, name_alt)
    }
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Track {
    label: String,
    lengths: Vec<Length>,
}

#[test]
fn closure_reaches_nested_objects() {
    let registry = Registry::new();
    let mut track = Track {
        label: "loop".to_string(),
        lengths: vec![Length { meters: 1.5 }, Length { meters: 2.0 }],
    };
    let text = write(&registry, &mut track);

    let mut input = TextIArchive::from_str(&registry, &text).unwrap();
    input.context_mut().set_closure(Box::new(100.0f64));
    let mut back = Track::default();
    assert!(input.serialize(&mut back, "root", "").unwrap());
    assert_eq!(back.label, "loop");
    assert_eq!(
        back.lengths,
        vec![Length { meters: 150.0 }, Length { meters: 200.0 }]
    );
}
