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

//! # Archivist Derive Macros
//!
//! `#[derive(Archived)]` generates the archive visitors for plain data types.
//!
//! **Structs with named fields** get `SerializeFields`, visiting every field
//! in declaration order, and `Serialize`, which wraps the fields in a struct
//! node. Every field type must implement `Serialize`.
//!
//! **Fieldless enums** get `ArchiveEnum`, with a descriptor naming every
//! variant, and `Serialize`. The enum must also derive `Clone` and `Copy`.
//!
//! ```ignore
//! use archivist_derive::Archived;
//!
//! #[derive(Archived, Clone, Copy, Debug, PartialEq)]
//! #[archive(ignore_errors)]
//! enum Color {
//!     Red = 1,
//!     #[archive(alt = "Light green")]
//!     Green = 2,
//!     Blue = 4,
//! }
//!
//! #[derive(Archived, Default)]
//! struct Ring {
//!     name: String,
//!     #[archive(rename = "isSpecial")]
//!     is_special: bool,
//!     #[archive(skip)]
//!     cached_area: f64,
//! }
//! ```
//!
//! Generated code refers to `::archivist_core`, so crates using the derive
//! depend on `archivist-core` directly.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod attrs;
mod object;

#[proc_macro_derive(Archived, attributes(archive))]
pub fn proc_macro_derive_archived(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    object::derive_archived(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
