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

//! Named-type and enum registries.
//!
//! A [`Registry`] is built once at startup, then shared by reference with every
//! archive. It maps type names recorded in files back to factories for
//! polymorphic bases, and enum values to names for the text backend.
//!
//! ```
//! use archivist_core::archive::Archive;
//! use archivist_core::error::Error;
//! use archivist_core::registry::Registry;
//! use archivist_core::serializer::{Polymorphic, SerializeFields};
//! use archivist_core::register_class;
//!
//! trait Shape: Polymorphic {}
//!
//! #[derive(Default)]
//! struct Circle {
//!     radius: f32,
//! }
//!
//! impl SerializeFields for Circle {
//!     fn serialize_fields(&mut self, ar: &mut dyn Archive) -> Result<(), Error> {
//!         archivist_core::Serialize::serialize(&mut self.radius, ar, "radius", "")?;
//!         Ok(())
//!     }
//! }
//! impl Shape for Circle {}
//!
//! let mut registry = Registry::new();
//! register_class!(registry, dyn Shape, Circle, "Circle").unwrap();
//! assert!(register_class!(registry, dyn Shape, Circle, "Disk").is_err());
//! assert_eq!(registry.choice_list::<dyn Shape>("|"), "Circle");
//! ```

mod class_registry;
mod enum_registry;

pub use class_registry::{ClassEntry, ClassTable, CreateFn};
pub use enum_registry::{EnumDescriptor, EnumEntry};

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::archive::EnumKey;
use crate::error::Error;
use crate::serializer::enum_::ArchiveEnum;
use crate::serializer::Polymorphic;

/// Process-wide type information, populated before the first archive pass.
#[derive(Default)]
pub struct Registry {
    tables: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    class_names: Vec<String>,
    class_index: HashMap<String, usize>,
    enums: HashMap<TypeId, Arc<EnumDescriptor>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Registers `T` as a concrete subtype of the base `B`.
    ///
    /// Fails when `name`, `alt_name` or `T` itself is already registered
    /// under `B`.
    pub fn register_class<B, T>(
        &mut self,
        name: &str,
        alt_name: &str,
        create: CreateFn<B>,
    ) -> Result<(), Error>
    where
        B: ?Sized + Polymorphic,
        T: Polymorphic,
    {
        let table = self
            .tables
            .entry(TypeId::of::<B>())
            .or_insert_with(|| Box::new(ClassTable::<B>::new()) as Box<dyn Any + Send + Sync>);
        let Some(table) = table.downcast_mut::<ClassTable<B>>() else {
            return Err(Error::unknown(format!(
                "class table for {} has an unexpected type",
                std::any::type_name::<B>()
            )));
        };
        table.insert::<T>(name, alt_name, create)?;
        if !self.class_index.contains_key(name) {
            self.class_index
                .insert(name.to_string(), self.class_names.len());
            self.class_names.push(name.to_string());
        }
        log::debug!(
            "registered {} as '{}' under {}",
            std::any::type_name::<T>(),
            name,
            std::any::type_name::<B>()
        );
        Ok(())
    }

    pub fn class_table<B: ?Sized + Polymorphic>(&self) -> Option<&ClassTable<B>> {
        self.tables
            .get(&TypeId::of::<B>())
            .and_then(|table| table.downcast_ref::<ClassTable<B>>())
    }

    /// Creates an instance of the type registered as `name` under `B`.
    ///
    /// Unknown names yield `Ok(None)` when `ignore_unregistered` is set and an
    /// [`Error::UnregisteredType`] otherwise.
    pub fn create<B: ?Sized + Polymorphic>(
        &self,
        name: &str,
        ignore_unregistered: bool,
    ) -> Result<Option<Box<B>>, Error> {
        match self.class_table::<B>().and_then(|t| t.find(name)) {
            Some(entry) => Ok(Some(entry.create())),
            None if ignore_unregistered => Ok(None),
            None => Err(self.unregistered::<B>(name)),
        }
    }

    pub fn entry_of<B: ?Sized + Polymorphic>(&self, instance: &B) -> Option<&ClassEntry<B>> {
        self.class_table::<B>()?.entry_of(instance)
    }

    /// Canonical name of the dynamic type of `instance`.
    pub fn name_of<B: ?Sized + Polymorphic>(&self, instance: &B) -> Option<&str> {
        self.entry_of(instance).map(|e| e.name())
    }

    /// Every name registered under `B`, joined by `separator`.
    pub fn choice_list<B: ?Sized + Polymorphic>(&self, separator: &str) -> String {
        self.class_table::<B>()
            .map(|t| t.choice_list(separator))
            .unwrap_or_default()
    }

    pub(crate) fn unregistered<B: ?Sized + Polymorphic>(&self, name: &str) -> Error {
        Error::unregistered_type(format!(
            "'{}' is not registered under {} (known: {})",
            name,
            std::any::type_name::<B>(),
            self.choice_list::<B>("|")
        ))
    }

    /// Process-wide index of a class name, across all bases.
    pub fn class_index(&self, name: &str) -> Option<usize> {
        self.class_index.get(name).copied()
    }

    pub fn class_at(&self, index: usize) -> Option<&str> {
        self.class_names.get(index).map(String::as_str)
    }

    /// Registers the descriptor generated for `E`.
    pub fn register_enum<E: ArchiveEnum>(&mut self) -> Result<(), Error> {
        self.register_enum_descriptor::<E>(E::descriptor())
    }

    pub fn register_enum_descriptor<E: ArchiveEnum>(
        &mut self,
        descriptor: EnumDescriptor,
    ) -> Result<(), Error> {
        let type_id = TypeId::of::<E>();
        if self.enums.contains_key(&type_id) {
            return Err(Error::duplicate_registration(format!(
                "enum {} is already registered",
                std::any::type_name::<E>()
            )));
        }
        self.enums.insert(type_id, Arc::new(descriptor));
        Ok(())
    }

    pub fn enum_descriptor<E: ArchiveEnum>(&self) -> Option<&EnumDescriptor> {
        self.enums.get(&TypeId::of::<E>()).map(|d| d.as_ref())
    }

    /// Descriptor for `key`, built from the type's defaults when not registered.
    pub fn descriptor_for(&self, key: &EnumKey) -> Arc<EnumDescriptor> {
        match self.enums.get(&key.type_id) {
            Some(descriptor) => descriptor.clone(),
            None => Arc::new((key.describe)()),
        }
    }
}

/// Registers a `Default`-constructible concrete type under a polymorphic base.
///
/// ```ignore
/// register_class!(registry, dyn Shape, Circle, "Circle")?;
/// register_class!(registry, dyn Shape, Square, "Square", "Square (legacy)")?;
/// ```
#[macro_export]
macro_rules! register_class {
    ($registry:expr, $base:ty, $concrete:ty, $name:expr) => {
        $crate::register_class!($registry, $base, $concrete, $name, "")
    };
    ($registry:expr, $base:ty, $concrete:ty, $name:expr, $alt:expr) => {{
        fn create() -> ::std::boxed::Box<$base> {
            ::std::boxed::Box::new(<$concrete as ::std::default::Default>::default())
        }
        $registry.register_class::<$base, $concrete>($name, $alt, create)
    }};
}
