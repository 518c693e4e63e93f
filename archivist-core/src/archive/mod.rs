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

//! The archive protocol every backend implements.
//!
//! Values never talk to a backend directly. A [`Serialize`] impl calls the
//! typed hooks of [`Archive`] (`process_scalar`, `open_struct`, ...) through a
//! `&mut dyn Archive`, and each backend decides whether that means printing,
//! chunking, laying out an in-place block, or reading any of those back.
//!
//! Every hook takes a field `name` and an alternate (display) name and returns
//! `Ok(false)` when reading and the field is not present, so callers can keep
//! their defaults.

mod scalar;

pub use scalar::ScalarMut;

use std::any::{Any, TypeId};
use std::rc::Rc;

use crate::config::Config;
use crate::error::Error;
use crate::registry::{EnumDescriptor, Registry};
use crate::serializer::enum_::ArchiveEnum;
use crate::serializer::Serialize;

/// Per-pass session state: configuration, the caller's closure and the nesting depth.
pub struct ArchiveContext {
    config: Config,
    closure: Option<Rc<dyn Any>>,
    depth: u32,
}

impl ArchiveContext {
    pub fn new(config: Config) -> ArchiveContext {
        ArchiveContext {
            config,
            closure: None,
            depth: 0,
        }
    }

    #[inline(always)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    #[inline(always)]
    pub fn ignore_unregistered(&self) -> bool {
        self.config.ignore_unregistered_classes
    }

    /// Attaches an opaque object that format-aware values can look up.
    pub fn set_closure(&mut self, closure: Box<dyn Any>) {
        self.closure = Some(Rc::from(closure));
    }

    /// The closure as a shared handle, for archives that delegate to others.
    pub fn shared_closure(&self) -> Option<Rc<dyn Any>> {
        self.closure.clone()
    }

    pub fn set_shared_closure(&mut self, closure: Option<Rc<dyn Any>>) {
        self.closure = closure;
    }

    pub fn closure<T: Any>(&self) -> Option<&T> {
        self.closure.as_ref().and_then(|c| c.downcast_ref::<T>())
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Enters one nesting level, failing past `max_depth`.
    pub fn enter(&mut self, name: &str) -> Result<(), Error> {
        if self.depth >= self.config.max_depth {
            return Err(Error::structural(format!(
                "nesting deeper than {} at '{}'",
                self.config.max_depth, name
            )));
        }
        self.depth += 1;
        Ok(())
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }
}

impl Default for ArchiveContext {
    fn default() -> Self {
        ArchiveContext::new(Config::default())
    }
}

/// Identity of an enum type as seen by a backend.
#[derive(Clone, Copy, Debug)]
pub struct EnumKey {
    pub type_id: TypeId,
    pub type_name: &'static str,
    /// Builds the type's default descriptor when the registry has none.
    pub describe: fn() -> EnumDescriptor,
}

impl EnumKey {
    pub fn of<E: ArchiveEnum>() -> EnumKey {
        EnumKey {
            type_id: TypeId::of::<E>(),
            type_name: std::any::type_name::<E>(),
            describe: E::descriptor,
        }
    }
}

/// Registered name of a pointee's dynamic type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeTag {
    pub name: String,
}

/// Type-erased access to a pointer field, implemented by the pointer adapters.
pub trait PointerSlot {
    /// Whether the pointee type is resolved through the registry.
    fn is_polymorphic(&self) -> bool;

    fn base_name(&self) -> &'static str;

    fn is_null(&self) -> bool;

    /// Tag of the current pointee; `None` when null. Polymorphic slots fail
    /// with [`Error::UnregisteredType`] when the dynamic type is unknown.
    fn type_tag(&self, registry: &Registry) -> Result<Option<TypeTag>, Error>;

    fn set_null(&mut self);

    /// Makes the slot hold an instance of `type_name`, reusing the current
    /// pointee when it already has that dynamic type. Returns `false` when the
    /// name is not registered.
    fn prepare(&mut self, registry: &Registry, type_name: &str) -> Result<bool, Error>;

    /// Visits the pointee's fields. A null slot is left untouched.
    fn serialize_pointee(&mut self, ar: &mut dyn Archive) -> Result<(), Error>;
}

/// The visitor protocol shared by the text, binary and in-place backends.
pub trait Archive {
    fn is_input(&self) -> bool;

    fn is_output(&self) -> bool {
        !self.is_input()
    }

    /// True when the backend rebuilds memory directly, so values may skip
    /// non-essential re-initialization.
    fn in_place(&self) -> bool {
        false
    }

    fn registry(&self) -> &Registry;

    fn context(&self) -> &ArchiveContext;

    fn context_mut(&mut self) -> &mut ArchiveContext;

    fn process_scalar(
        &mut self,
        value: ScalarMut<'_>,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error>;

    fn process_string(&mut self, value: &mut String, name: &str, name_alt: &str)
        -> Result<bool, Error>;

    fn process_enum(
        &mut self,
        value: &mut i32,
        key: &EnumKey,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error>;

    fn process_bit_vector(
        &mut self,
        bits: &mut i32,
        key: &EnumKey,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error>;

    fn process_binary(&mut self, data: &mut Vec<u8>, name: &str, name_alt: &str)
        -> Result<bool, Error>;

    fn open_struct(&mut self, type_name: &str, name: &str, name_alt: &str) -> Result<bool, Error>;

    fn close_struct(&mut self, name: &str) -> Result<(), Error>;

    /// Opens a container. On output `len` is the element count; on input it
    /// receives the stored count. `fixed` marks fixed-size arrays.
    fn open_container(
        &mut self,
        len: &mut usize,
        fixed: bool,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error>;

    fn close_container(&mut self, name: &str) -> Result<(), Error>;

    fn process_pointer(
        &mut self,
        ptr: &mut dyn PointerSlot,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error>;
}

/// Generic conveniences on top of [`Archive`].
pub trait ArchiveExt: Archive {
    /// Serializes `value` as the field `name`.
    fn serialize<T: Serialize + ?Sized>(
        &mut self,
        value: &mut T,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error>;

    /// True when the archive's filter is zero or shares a bit with `mask`.
    fn filter(&self, mask: u32) -> bool {
        let filter = self.context().config().filter();
        filter == 0 || filter & mask != 0
    }

    fn closure<T: Any>(&self) -> Option<&T> {
        self.context().closure::<T>()
    }
}

impl<A: Archive> ArchiveExt for A {
    fn serialize<T: Serialize + ?Sized>(
        &mut self,
        value: &mut T,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        Serialize::serialize(value, self, name, name_alt)
    }
}

impl<'a> ArchiveExt for dyn Archive + 'a {
    fn serialize<T: Serialize + ?Sized>(
        &mut self,
        value: &mut T,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        Serialize::serialize(value, self, name, name_alt)
    }
}

/// Output side of the polymorphic protocol: the tag to record, or `None` for
/// null. Unknown dynamic types are written as null when unregistered classes
/// are ignored.
pub(crate) fn output_tag(
    ptr: &dyn PointerSlot,
    registry: &Registry,
    context: &ArchiveContext,
    name: &str,
) -> Result<Option<TypeTag>, Error> {
    match ptr.type_tag(registry) {
        Err(err) if err.is_unregistered() && context.ignore_unregistered() => {
            log::warn!("writing '{}' as null: {}", name, err);
            Ok(None)
        }
        other => other,
    }
}

/// Input side of the polymorphic protocol: instantiate `tag`, or report the
/// field as absent (null) when it is unknown and unregistered classes are ignored.
pub(crate) fn input_prepare(
    ptr: &mut dyn PointerSlot,
    registry: &Registry,
    context: &ArchiveContext,
    tag: &str,
    name: &str,
) -> Result<bool, Error> {
    if ptr.prepare(registry, tag)? {
        return Ok(true);
    }
    if context.ignore_unregistered() {
        log::warn!(
            "'{}': type '{}' is not registered under {}, reading as null",
            name,
            tag,
            ptr.base_name()
        );
        ptr.set_null();
        return Ok(false);
    }
    Err(Error::unregistered_type(format!(
        "'{}': type '{}' is not registered under {}",
        name,
        tag,
        ptr.base_name()
    )))
}
