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

//! # Archivist
//!
//! One visitor protocol, three archive formats:
//!
//! - **text**: brace-delimited, hand-editable, tolerant of added, removed and
//!   reordered fields
//! - **binary**: named chunks skipped by size, equally tolerant
//! - **in-place**: a positional image loaded with two table passes and no parsing
//!
//! plus a multi-archive that keeps a binary or in-place cache next to a text
//! file and falls back to the text when the cache is missing or stale.
//!
//! ```rust
//! use archivist::{Archived, ArchiveExt, Registry, TextIArchive, TextOArchive};
//!
//! #[derive(Archived, Clone, Copy, Debug, Default, PartialEq)]
//! enum Kind {
//!     #[default]
//!     Plain = 0,
//!     Special = 1,
//! }
//!
//! #[derive(Archived, Debug, Default, PartialEq)]
//! struct Ring {
//!     name: String,
//!     kind: Kind,
//!     #[archive(rename = "ringIndex")]
//!     ring_index: i32,
//!     values: Vec<i32>,
//! }
//!
//! # fn main() -> Result<(), archivist::Error> {
//! let registry = Registry::new();
//! let mut ring = Ring {
//!     name: "Ring1".into(),
//!     kind: Kind::Special,
//!     ring_index: 3,
//!     values: vec![10, 20],
//! };
//! let mut out = TextOArchive::new(&registry);
//! out.serialize(&mut ring, "ring", "")?;
//! let text = out.into_string();
//!
//! let mut back = Ring::default();
//! TextIArchive::from_str(&registry, &text)?.serialize(&mut back, "ring", "")?;
//! assert_eq!(back, ring);
//! # Ok(())
//! # }
//! ```

pub use archivist_core::archive::{Archive, ArchiveContext, ArchiveExt, PointerSlot, ScalarMut};
pub use archivist_core::binary::{BinaryIArchive, BinaryOArchive};
pub use archivist_core::config::Config;
pub use archivist_core::error::Error;
pub use archivist_core::in_place::{InPlaceBuffer, InPlaceIArchive, InPlaceOArchive};
pub use archivist_core::multi::{self, Companion, MultiIArchive, MultiOArchive, MultiPaths, Source};
pub use archivist_core::register_class;
pub use archivist_core::registry::{EnumDescriptor, Registry};
pub use archivist_core::serializer::{
    serialize_struct, ArchiveEnum, BinaryData, BitVector, ComboString, Owned, PolyPtr,
    Polymorphic, Serialize, SerializeFields,
};
pub use archivist_core::text::{TextIArchive, TextOArchive};
pub use archivist_derive::Archived;
