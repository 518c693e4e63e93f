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

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use archivist_core::archive::ArchiveExt;
use archivist_core::config::Config;
use archivist_core::error::Error;
use archivist_core::multi::{self, Companion, MultiIArchive, MultiOArchive, MultiPaths, Source};
use archivist_core::registry::Registry;
use archivist_core::serializer::{serialize_struct, Owned, Serialize, SerializeFields};
use archivist_core::text::TextIArchive;
use archivist_core::Archive;
use archivist_derive::Archived;

#[derive(Archived, Debug, Default, PartialEq)]
struct Settings {
    title: String,
    level: i32,
    scales: Vec<f32>,
}

#[derive(Archived, Debug, Default)]
struct WideSettings {
    title: String,
    level: i64,
}

fn settings() -> Settings {
    Settings {
        title: "main".to_string(),
        level: 4,
        scales: vec![0.5, 1.0, 2.0],
    }
}

fn write(registry: &Registry, base: &Path, kind: Companion) -> MultiPaths {
    let mut out = MultiOArchive::open(registry, base, "cache", "cfg", kind);
    out.serialize(&mut settings(), "settings", "").unwrap();
    let paths = out.paths().clone();
    out.close().unwrap();
    paths
}

fn read(registry: &Registry, paths: &MultiPaths) -> (Settings, Source, Option<u32>) {
    let mut ar = MultiIArchive::with_paths(registry, paths.clone(), Config::default()).unwrap();
    let mut value = Settings::default();
    assert!(ar.serialize(&mut value, "settings", "").unwrap());
    (value, ar.source(), ar.crc())
}

fn age(path: &Path) {
    let hour_ago = SystemTime::now() - Duration::from_secs(3600);
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(hour_ago)
        .unwrap();
}

#[test]
fn companion_is_preferred() {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    for (kind, source) in [
        (Companion::Binary, Source::Binary),
        (Companion::InPlace, Source::InPlace),
    ] {
        let paths = write(&registry, &dir.path().join("settings"), kind);
        assert!(paths.text.exists());
        assert!(paths.companion.exists());
        assert!(paths.companion.starts_with(dir.path().join("cache")));

        let (value, read_from, crc) = read(&registry, &paths);
        assert_eq!(value, settings());
        assert_eq!(read_from, source);
        assert!(crc.is_some());
    }
}

#[test]
fn text_is_written_alongside() {
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    let paths = write(&registry, &dir.path().join("settings"), Companion::Binary);
    let mut text = TextIArchive::open(&registry, &paths.text).unwrap();
    let mut value = Settings::default();
    assert!(text.serialize(&mut value, "settings", "").unwrap());
    assert_eq!(value, settings());
}

#[test]
fn missing_companion_falls_back_to_text() {
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    let paths = write(&registry, &dir.path().join("settings"), Companion::InPlace);
    fs::remove_file(&paths.companion).unwrap();
    let (value, source, crc) = read(&registry, &paths);
    assert_eq!(value, settings());
    assert_eq!(source, Source::Text);
    assert_eq!(crc, None);
}

#[test]
fn corrupt_companion_falls_back_to_text() {
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    for kind in [Companion::Binary, Companion::InPlace] {
        let paths = write(&registry, &dir.path().join("settings"), kind);
        fs::write(&paths.companion, b"garbage").unwrap();
        let (value, source, _) = read(&registry, &paths);
        assert_eq!(value, settings());
        assert_eq!(source, Source::Text);
    }
}

#[test]
fn corrupt_companion_without_text_is_an_error() {
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    let paths = write(&registry, &dir.path().join("settings"), Companion::Binary);
    fs::write(&paths.companion, b"garbage").unwrap();
    fs::remove_file(&paths.text).unwrap();
    let err = MultiIArchive::with_paths(&registry, paths, Config::default())
        .err()
        .unwrap();
    assert!(err.is_structural(), "{err}");
}

#[test]
fn stale_companion_falls_back_to_text() {
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    let paths = write(&registry, &dir.path().join("settings"), Companion::Binary);
    age(&paths.companion);
    let (_, source, _) = read(&registry, &paths);
    assert_eq!(source, Source::Text);
}

#[test]
fn load_regenerates_companion() {
    let _ = env_logger::builder().is_test(true).try_init();
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    let paths = write(&registry, &dir.path().join("settings"), Companion::InPlace);
    fs::remove_file(&paths.companion).unwrap();

    let mut value = Settings::default();
    assert!(multi::load(&registry, &paths, Config::default(), &mut value, "settings").unwrap());
    assert_eq!(value, settings());
    assert!(paths.companion.exists());

    let (again, source, _) = read(&registry, &paths);
    assert_eq!(again, settings());
    assert_eq!(source, Source::InPlace);
}

#[test]
fn load_recovers_from_mid_read_failure() {
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    let paths = write(&registry, &dir.path().join("settings"), Companion::Binary);

    // A companion whose `level` chunk is eight bytes wide.
    let mut wide = WideSettings {
        title: "stale".to_string(),
        level: 1,
    };
    let mut out = archivist_core::binary::BinaryOArchive::new(&registry);
    out.serialize(&mut wide, "settings", "").unwrap();
    out.save(&paths.companion).unwrap();

    let mut value = Settings::default();
    assert!(multi::load(&registry, &paths, Config::default(), &mut value, "settings").unwrap());
    assert_eq!(value, settings());

    let (again, source, _) = read(&registry, &paths);
    assert_eq!(again, settings());
    assert_eq!(source, Source::Binary);
}

#[derive(Debug, Default, PartialEq)]
struct Stamp {
    unit: String,
}

impl SerializeFields for Stamp {
    fn serialize_fields(&mut self, ar: &mut dyn Archive) -> Result<(), Error> {
        if ar.is_output() {
            if let Some(unit) = ar.closure::<String>() {
                self.unit = unit.clone();
            }
        }
        Serialize::serialize(&mut self.unit, ar, "unit", "")?;
        Ok(())
    }
}

impl Serialize for Stamp {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str) -> Result<bool, Error> {
        serialize_struct(self, ar, name, name_alt)
    }
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Measured {
    stamp: Owned<Stamp>,
}

#[test]
fn closure_reaches_pointees_in_both_outputs() {
    let registry = Registry::new();
    let dir = tempfile::tempdir().unwrap();
    for kind in [Companion::Binary, Companion::InPlace] {
        let mut out = MultiOArchive::open(&registry, &dir.path().join("measured"), "cache", "cfg", kind);
        out.context_mut().set_closure(Box::new("mm".to_string()));
        let mut measured = Measured {
            stamp: Owned::new(Stamp::default()),
        };
        out.serialize(&mut measured, "measured", "").unwrap();
        let paths = out.paths().clone();
        out.close().unwrap();

        let mut from_text = Measured::default();
        TextIArchive::open(&registry, &paths.text)
            .unwrap()
            .serialize(&mut from_text, "measured", "")
            .unwrap();
        assert_eq!(from_text.stamp.get().map(|s| s.unit.as_str()), Some("mm"));

        let mut ar = MultiIArchive::with_paths(&registry, paths, Config::default()).unwrap();
        assert_ne!(ar.source(), Source::Text);
        let mut from_companion = Measured::default();
        assert!(ar.serialize(&mut from_companion, "measured", "").unwrap());
        assert_eq!(from_companion, from_text);
    }
}
