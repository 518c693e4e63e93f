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

//! `Serialize` impls for every value kind an archive understands.

use std::any::Any;

use crate::archive::Archive;
use crate::error::Error;

mod array;
mod binary;
mod collection;
mod combo;
pub mod enum_;
mod number;
pub mod pointer;
mod string;
mod tuple;

pub use binary::BinaryData;
pub use combo::ComboString;
pub use enum_::{ArchiveEnum, BitVector};
pub use pointer::{Owned, PolyPtr};

/// A value that can pass through an [`Archive`] as a named field.
///
/// The same method reads and writes: on output the archive consumes
/// `self`, on input it overwrites it. Returns `Ok(false)` when reading and
/// `name` is absent, leaving `self` untouched.
pub trait Serialize {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str)
        -> Result<bool, Error>;
}

/// A struct whose fields are visited inside a node opened by its caller.
///
/// `#[derive(Archived)]` generates this together with a [`Serialize`] impl
/// that wraps the fields in [`serialize_struct`].
pub trait SerializeFields {
    fn serialize_fields(&mut self, ar: &mut dyn Archive) -> Result<(), Error>;
}

/// Runtime-typed object that can live behind a [`PolyPtr`].
///
/// Implemented for every `SerializeFields + 'static` type; polymorphic base
/// traits name it as a supertrait:
///
/// ```ignore
/// trait Shape: Polymorphic {
///     fn area(&self) -> f64;
/// }
/// ```
pub trait Polymorphic: Any {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn serialize_dyn(&mut self, ar: &mut dyn Archive) -> Result<(), Error>;
}

impl<T: SerializeFields + Any> Polymorphic for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn serialize_dyn(&mut self, ar: &mut dyn Archive) -> Result<(), Error> {
        self.serialize_fields(ar)
    }
}

/// Opens a struct node named `name`, visits the fields of `value`, closes it.
pub fn serialize_struct<T: SerializeFields + ?Sized>(
    value: &mut T,
    ar: &mut dyn Archive,
    name: &str,
    name_alt: &str,
) -> Result<bool, Error> {
    if !ar.open_struct(std::any::type_name::<T>(), name, name_alt)? {
        return Ok(false);
    }
    value.serialize_fields(ar)?;
    ar.close_struct(name)?;
    Ok(true)
}
