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

//! Format constants shared by the backends.

/// Field holding the format version at the top of a text archive.
pub const TEXT_VERSION_FIELD: &str = "__version";

/// Extension appended to a text archive's path for its blob sidecar.
pub const SIDECAR_EXTENSION: &str = "bin";

/// Leading bytes of every binary archive.
pub const BINARY_MAGIC: [u8; 3] = *b"bin";

/// A chunk size of this value is followed by the real size as a `u32`.
pub const CHUNK_SIZE_ESCAPE: u16 = 0xFFFF;

/// First word of every container chunk payload.
pub const CONTAINER_SENTINEL: u32 = 0xC0FF_EE00;

/// Type tag of a non-null, non-polymorphic pointee in a binary archive.
pub const PLAIN_POINTER_TAG: &str = "*";

pub const IN_PLACE_VERSION: i32 = 1;

/// Offset stored in the slot of a null pointer in an in-place archive.
pub const NULL_OFFSET: u32 = u32::MAX;

/// Slot widths of the in-place format, in bytes.
pub const STRING_SLOT_SIZE: usize = 12;
pub const RANGE_SLOT_SIZE: usize = 8;
pub const POINTER_SLOT_SIZE: usize = 12;

/// Extensions of the companion files written by the multi-archive.
pub const BINARY_CACHE_EXTENSION: &str = "bin-cache";
pub const IN_PLACE_CACHE_EXTENSION: &str = "inplace";

/// Kind of an open node, used to check that opens and closes nest.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    Struct,
    Container,
    Pointer,
}
