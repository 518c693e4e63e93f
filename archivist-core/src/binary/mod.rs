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

//! Named-chunk binary backend.
//!
//! A file is the magic `bin` followed by chunks:
//!
//! ```text
//! chunk   := name NUL size:u16 [size:u32 when size == 0xFFFF] payload
//! struct  := chunk*
//! vector  := 0xC0FFEE00:u32 count:u32 chunk*      (element names are empty)
//! pointer := tag NUL chunk*                       (tag "" is null, "*" is plain)
//! blob    := crc32:u32 bytes
//! ```
//!
//! Integers are little endian.

mod reader;
mod writer;

pub use reader::BinaryIArchive;
pub use writer::BinaryOArchive;
