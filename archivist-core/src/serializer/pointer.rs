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

//! Owning pointer adapters.
//!
//! [`Owned`] (and `Option<Box<T>>`) owns at most one object of a statically
//! known type. [`PolyPtr`] owns at most one object behind a polymorphic base
//! trait; its dynamic type is recorded by name and resolved through the
//! [`Registry`] when reading.

use crate::archive::{Archive, PointerSlot, TypeTag};
use crate::error::Error;
use crate::registry::Registry;
use crate::serializer::{Polymorphic, Serialize, SerializeFields};

struct PlainSlot<'a, T>(&'a mut Option<Box<T>>);

impl<T: SerializeFields + Default> PointerSlot for PlainSlot<'_, T> {
    fn is_polymorphic(&self) -> bool {
        false
    }

    fn base_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn is_null(&self) -> bool {
        self.0.is_none()
    }

    fn type_tag(&self, _registry: &Registry) -> Result<Option<TypeTag>, Error> {
        Ok(self.0.as_ref().map(|_| TypeTag {
            name: String::new(),
        }))
    }

    fn set_null(&mut self) {
        *self.0 = None;
    }

    fn prepare(&mut self, _registry: &Registry, _type_name: &str) -> Result<bool, Error> {
        if self.0.is_none() {
            *self.0 = Some(Box::default());
        }
        Ok(true)
    }

    fn serialize_pointee(&mut self, ar: &mut dyn Archive) -> Result<(), Error> {
        match self.0.as_mut() {
            Some(value) => value.serialize_fields(ar),
            None => Ok(()),
        }
    }
}

struct PolySlot<'a, B: ?Sized>(&'a mut Option<Box<B>>);

impl<B: ?Sized + Polymorphic> PointerSlot for PolySlot<'_, B> {
    fn is_polymorphic(&self) -> bool {
        true
    }

    fn base_name(&self) -> &'static str {
        std::any::type_name::<B>()
    }

    fn is_null(&self) -> bool {
        self.0.is_none()
    }

    fn type_tag(&self, registry: &Registry) -> Result<Option<TypeTag>, Error> {
        let Some(object) = self.0.as_ref() else {
            return Ok(None);
        };
        match registry.entry_of::<B>(&**object) {
            Some(entry) => Ok(Some(TypeTag {
                name: entry.name().to_string(),
            })),
            None => Err(Error::unregistered_type(format!(
                "dynamic type of the pointee is not registered under {} (known: {})",
                std::any::type_name::<B>(),
                registry.choice_list::<B>("|")
            ))),
        }
    }

    fn set_null(&mut self) {
        *self.0 = None;
    }

    fn prepare(&mut self, registry: &Registry, type_name: &str) -> Result<bool, Error> {
        let Some(entry) = registry.class_table::<B>().and_then(|t| t.find(type_name)) else {
            return Ok(false);
        };
        let reuse = match self.0.as_ref() {
            Some(object) => Polymorphic::as_any(&**object).type_id() == entry.type_id(),
            None => false,
        };
        if !reuse {
            *self.0 = Some(entry.create());
        }
        Ok(true)
    }

    fn serialize_pointee(&mut self, ar: &mut dyn Archive) -> Result<(), Error> {
        match self.0.as_mut() {
            Some(object) => Polymorphic::serialize_dyn(&mut **object, ar),
            None => Ok(()),
        }
    }
}

/// Owns at most one `T`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Owned<T>(Option<Box<T>>);

impl<T> Owned<T> {
    pub fn new(value: T) -> Owned<T> {
        Owned(Some(Box::new(value)))
    }

    pub fn null() -> Owned<T> {
        Owned(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.0.as_deref_mut()
    }

    pub fn set(&mut self, value: T) {
        self.0 = Some(Box::new(value));
    }

    pub fn take(&mut self) -> Option<Box<T>> {
        self.0.take()
    }
}

impl<T> Default for Owned<T> {
    fn default() -> Self {
        Owned(None)
    }
}

impl<T: SerializeFields + Default> Serialize for Owned<T> {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str) -> Result<bool, Error> {
        ar.process_pointer(&mut PlainSlot(&mut self.0), name, name_alt)
    }
}

impl<T: SerializeFields + Default> Serialize for Option<Box<T>> {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str) -> Result<bool, Error> {
        ar.process_pointer(&mut PlainSlot(self), name, name_alt)
    }
}

/// Owns at most one object implementing the base trait `B`.
///
/// On read, the recorded type name is resolved under `B`; a current pointee
/// of the same dynamic type is reused, any other is replaced by a fresh one
/// from the registry's factory.
pub struct PolyPtr<B: ?Sized>(Option<Box<B>>);

impl<B: ?Sized> PolyPtr<B> {
    pub fn new(value: Box<B>) -> PolyPtr<B> {
        PolyPtr(Some(value))
    }

    pub fn null() -> PolyPtr<B> {
        PolyPtr(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn get(&self) -> Option<&B> {
        self.0.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut B> {
        self.0.as_deref_mut()
    }

    pub fn set(&mut self, value: Box<B>) {
        self.0 = Some(value);
    }

    pub fn take(&mut self) -> Option<Box<B>> {
        self.0.take()
    }
}

impl<B: ?Sized> Default for PolyPtr<B> {
    fn default() -> Self {
        PolyPtr(None)
    }
}

impl<B: ?Sized> From<Box<B>> for PolyPtr<B> {
    fn from(value: Box<B>) -> Self {
        PolyPtr(Some(value))
    }
}

impl<B: ?Sized + Polymorphic> Serialize for PolyPtr<B> {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str) -> Result<bool, Error> {
        ar.process_pointer(&mut PolySlot(&mut self.0), name, name_alt)
    }
}
