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

//! Zero-parse binary backend.
//!
//! ```text
//! file        := version:i32 body_size:i32 body relocations types
//! relocations := count:i32 pair_offset:i32*
//! types       := count:i32 (slot_offset:i32 name NUL)*
//!
//! string slot  := start:u32 end:u32 cap:u32
//! range slot   := start:u32 end:u32               (containers, blobs)
//! pointer slot := type:u32 start:u32 end:u32      (start 0xFFFFFFFF is null)
//! ```
//!
//! Offsets are relative to the body. Container ranges begin with `count:u32`.
//! The layout is positional: files are only readable by the struct
//! definitions that wrote them.

mod reader;
mod writer;

pub use reader::{InPlaceBuffer, InPlaceIArchive};
pub use writer::InPlaceOArchive;
