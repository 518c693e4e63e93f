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
use archivist_core::binary::{BinaryIArchive, BinaryOArchive};
use archivist_core::config::Config;
use archivist_core::error::Error;
use archivist_core::in_place::{InPlaceBuffer, InPlaceIArchive, InPlaceOArchive};
use archivist_core::register_class;
use archivist_core::registry::Registry;
use archivist_core::serializer::{Owned, PolyPtr, Polymorphic};
use archivist_core::text::{TextIArchive, TextOArchive};
use archivist_derive::Archived;

trait Shape: Polymorphic {
    fn area(&self) -> f64;
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Circle {
    radius: f64,
}

impl Shape for Circle {
    fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Square {
    side: f64,
    label: String,
}

impl Shape for Square {
    fn area(&self) -> f64 {
        self.side * self.side
    }
}

#[derive(Archived, Debug, Default, PartialEq)]
struct Triangle {
    base: f64,
}

impl Shape for Triangle {
    fn area(&self) -> f64 {
        self.base * self.base / 2.0
    }
}

#[derive(Archived, Default)]
struct Scene {
    main: PolyPtr<dyn Shape>,
    others: Vec<PolyPtr<dyn Shape>>,
    empty: PolyPtr<dyn Shape>,
}

fn downcast<T: 'static>(ptr: &PolyPtr<dyn Shape>) -> Option<&T> {
    ptr.get()
        .and_then(|shape| Polymorphic::as_any(shape).downcast_ref::<T>())
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    register_class!(registry, dyn Shape, Circle, "Circle").unwrap();
    register_class!(registry, dyn Shape, Square, "Square", "Box").unwrap();
    registry
}

fn scene() -> Scene {
    Scene {
        main: PolyPtr::new(Box::new(Circle { radius: 1.5 })),
        others: vec![
            PolyPtr::new(Box::new(Square {
                side: 2.0,
                label: "sq".to_string(),
            })),
            PolyPtr::new(Box::new(Circle { radius: 0.5 })),
        ],
        empty: PolyPtr::null(),
    }
}

#[derive(Clone, Copy, Debug)]
enum Backend {
    Text,
    Binary,
    InPlace,
}

const BACKENDS: [Backend; 3] = [Backend::Text, Backend::Binary, Backend::InPlace];

fn config(ignore: bool) -> Config {
    Config {
        ignore_unregistered_classes: ignore,
        ..Config::default()
    }
}

fn write(
    backend: Backend,
    registry: &Registry,
    scene: &mut Scene,
    ignore: bool,
) -> Result<Vec<u8>, Error> {
    match backend {
        Backend::Text => {
            let mut out = TextOArchive::new(registry).config(config(ignore));
            out.serialize(scene, "scene", "")?;
            Ok(out.into_string().into_bytes())
        }
        Backend::Binary => {
            let mut out = BinaryOArchive::new(registry).config(config(ignore));
            out.serialize(scene, "scene", "")?;
            out.into_bytes()
        }
        Backend::InPlace => {
            let mut out = InPlaceOArchive::new(registry).config(config(ignore));
            out.serialize(scene, "scene", "")?;
            out.to_bytes()
        }
    }
}

fn read(
    backend: Backend,
    registry: &Registry,
    bytes: Vec<u8>,
    scene: &mut Scene,
    ignore: bool,
) -> Result<bool, Error> {
    match backend {
        Backend::Text => {
            let text = String::from_utf8(bytes).unwrap();
            TextIArchive::from_str(registry, &text)?
                .config(config(ignore))
                .serialize(scene, "scene", "")
        }
        Backend::Binary => BinaryIArchive::from_bytes(registry, bytes)?
            .config(config(ignore))
            .serialize(scene, "scene", ""),
        Backend::InPlace => {
            let buffer = InPlaceBuffer::load(registry, &bytes, ignore)?;
            InPlaceIArchive::new(registry, buffer)
                .config(config(ignore))
                .serialize(scene, "scene", "")
        }
    }
}

#[test]
fn dynamic_types_are_reconstructed() {
    let registry = registry();
    for backend in BACKENDS {
        let bytes = write(backend, &registry, &mut scene(), false).unwrap();
        let mut back = Scene::default();
        assert!(read(backend, &registry, bytes, &mut back, false).unwrap());

        assert_eq!(
            downcast::<Circle>(&back.main),
            Some(&Circle { radius: 1.5 }),
            "{backend:?}"
        );
        assert_eq!(back.others.len(), 2);
        let square = downcast::<Square>(&back.others[0]).unwrap();
        assert_eq!(square.label, "sq");
        assert_eq!(back.others[0].get().unwrap().area(), 4.0);
        assert_eq!(
            downcast::<Circle>(&back.others[1]).map(|c| c.radius),
            Some(0.5)
        );
        assert!(back.empty.is_null());
    }
}

#[test]
fn matching_pointee_is_reused() {
    let registry = registry();
    for backend in BACKENDS {
        let bytes = write(backend, &registry, &mut scene(), false).unwrap();
        let mut back = Scene {
            main: PolyPtr::new(Box::new(Circle { radius: 9.0 })),
            empty: PolyPtr::new(Box::new(Square::default())),
            ..Scene::default()
        };
        let before = back.main.get().unwrap() as *const dyn Shape as *const u8;
        read(backend, &registry, bytes, &mut back, false).unwrap();
        let after = back.main.get().unwrap() as *const dyn Shape as *const u8;
        assert_eq!(before, after, "{backend:?}");
        assert_eq!(downcast::<Circle>(&back.main).unwrap().radius, 1.5);
        assert!(back.empty.is_null());
    }
}

#[test]
fn unregistered_type_on_write() {
    let registry = registry();
    for backend in BACKENDS {
        let mut bad = scene();
        bad.main.set(Box::new(Triangle { base: 1.0 }));
        let err = write(backend, &registry, &mut bad, false).unwrap_err();
        assert!(err.is_unregistered(), "{backend:?}: {err}");

        let bytes = write(backend, &registry, &mut bad, true).unwrap();
        let mut back = Scene {
            main: PolyPtr::new(Box::new(Circle::default())),
            ..Scene::default()
        };
        read(backend, &registry, bytes, &mut back, false).unwrap();
        assert!(back.main.is_null(), "{backend:?}");
        assert_eq!(back.others.len(), 2);
    }
}

#[test]
fn unregistered_type_on_read() {
    let writer = registry();
    let mut reader = Registry::new();
    register_class!(reader, dyn Shape, Square, "Square").unwrap();
    for backend in BACKENDS {
        let bytes = write(backend, &writer, &mut scene(), false).unwrap();
        let err = read(backend, &reader, bytes.clone(), &mut Scene::default(), false)
            .unwrap_err();
        assert!(err.is_unregistered(), "{backend:?}: {err}");

        let mut back = Scene::default();
        read(backend, &reader, bytes, &mut back, true).unwrap();
        assert!(back.main.is_null(), "{backend:?}");
        assert!(downcast::<Square>(&back.others[0]).is_some());
        assert!(back.others[1].is_null());
    }
}

#[test]
fn alternate_names_resolve() {
    let registry = registry();
    let text = r#"scene = { main = "Box" { side = 3; label = "old"; }; others = { 0, }; empty = 0; };"#;
    let mut back = Scene::default();
    TextIArchive::from_str(&registry, text)
        .unwrap()
        .serialize(&mut back, "scene", "")
        .unwrap();
    assert_eq!(downcast::<Square>(&back.main).unwrap().side, 3.0);
}

#[test]
fn registry_queries() {
    let mut registry = registry();
    let err = register_class!(registry, dyn Shape, Circle, "Round").unwrap_err();
    assert!(matches!(err, Error::DuplicateRegistration(_)));
    let err = register_class!(registry, dyn Shape, Triangle, "Circle").unwrap_err();
    assert!(matches!(err, Error::DuplicateRegistration(_)));

    assert_eq!(registry.choice_list::<dyn Shape>("|"), "Circle|Square");
    let square = registry.create::<dyn Shape>("Box", false).unwrap().unwrap();
    assert_eq!(registry.name_of::<dyn Shape>(&*square), Some("Square"));
    assert!(registry.create::<dyn Shape>("Hexagon", true).unwrap().is_none());
    assert!(registry
        .create::<dyn Shape>("Hexagon", false)
        .err()
        .unwrap()
        .is_unregistered());
}

#[derive(Archived, Default)]
struct PlainScene {
    main: Owned<Circle>,
}

#[test]
fn untyped_tag_on_polymorphic_pointer_is_structural() {
    let registry = registry();
    let mut plain = PlainScene {
        main: Owned::new(Circle { radius: 1.0 }),
    };
    let mut out = BinaryOArchive::new(&registry);
    out.serialize(&mut plain, "scene", "").unwrap();
    let bytes = out.into_bytes().unwrap();

    let mut scene = Scene::default();
    let err = BinaryIArchive::from_bytes(&registry, bytes)
        .unwrap()
        .serialize(&mut scene, "scene", "")
        .unwrap_err();
    assert!(err.is_structural(), "{err}");
    assert!(scene.main.is_null());
}
