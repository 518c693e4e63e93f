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

//! # Archivist Core
//!
//! Core of the Archivist serialization framework: one visitor protocol
//! ([`Archive`]) and three interchangeable backends behind it.
//!
//! ## Architecture
//!
//! - **`archive`**: the [`Archive`] protocol, scalar views and pointer slots
//! - **`serializer`**: [`Serialize`] impls for primitives, strings, enums, bit
//!   vectors, containers, arrays, pairs, blobs and pointer adapters
//! - **`registry`**: named-type factories for polymorphic bases and enum names
//! - **`text`**: human-editable, brace-delimited text archive
//! - **`binary`**: named-chunk binary archive
//! - **`in_place`**: zero-parse binary archive with relocation tables
//! - **`multi`**: text plus binary or in-place companion, with fallback
//! - **`buffer`**, **`config`**, **`error`**, **`types`**: plumbing
//!
//! ## Schema evolution
//!
//! The text and binary backends look fields up by name and skip whatever they
//! do not ask for, so adding, removing or reordering fields keeps old files
//! readable. A missing field is reported as `Ok(false)` and the value keeps its
//! default. The in-place backend is positional and only reads files written by
//! the same struct definitions.
//!
//! ## Example
//!
//! ```
//! use archivist_core::archive::{Archive, ArchiveExt};
//! use archivist_core::error::Error;
//! use archivist_core::registry::Registry;
//! use archivist_core::serializer::{serialize_struct, Serialize, SerializeFields};
//! use archivist_core::text::{TextIArchive, TextOArchive};
//!
//! #[derive(Default, Debug, PartialEq)]
//! struct Ring {
//!     name: String,
//!     is_special: bool,
//!     ring_index: i32,
//! }
//!
//! impl SerializeFields for Ring {
//!     fn serialize_fields(&mut self, ar: &mut dyn Archive) -> Result<(), Error> {
//!         self.name.serialize(ar, "name", "")?;
//!         self.is_special.serialize(ar, "isSpecial", "")?;
//!         self.ring_index.serialize(ar, "ringIndex", "")?;
//!         Ok(())
//!     }
//! }
//!
//! impl Serialize for Ring {
//!     fn serialize(&mut self, ar: &mut dyn Archive, name: &str, alt: &str) -> Result<bool, Error> {
//!         serialize_struct(self, ar, name, alt)
//!     }
//! }
//!
//! let registry = Registry::new();
//! let mut ring = Ring { name: "Ring1".into(), is_special: false, ring_index: 3 };
//! let mut out = TextOArchive::new(&registry);
//! out.serialize(&mut ring, "ring", "").unwrap();
//! let text = out.into_string();
//! assert!(text.contains("name = \"Ring1\";"));
//!
//! let mut back = Ring::default();
//! let mut input = TextIArchive::from_str(&registry, &text).unwrap();
//! assert!(input.serialize(&mut back, "ring", "").unwrap());
//! assert_eq!(back, ring);
//! ```

pub mod archive;
pub mod binary;
pub mod buffer;
pub mod config;
pub mod error;
pub mod in_place;
pub mod multi;
pub mod registry;
pub mod serializer;
pub mod text;
pub mod types;
pub mod util;

pub use crate::archive::{Archive, ArchiveExt, PointerSlot, ScalarMut};
pub use crate::config::Config;
pub use crate::error::Error;
pub use crate::registry::{EnumDescriptor, Registry};
pub use crate::serializer::enum_::serialize_enum;
pub use crate::serializer::{
    serialize_struct, ArchiveEnum, BinaryData, BitVector, ComboString, Owned, PolyPtr,
    Polymorphic, Serialize, SerializeFields,
};
