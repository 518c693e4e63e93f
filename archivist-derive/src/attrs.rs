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

//! Parsing of `#[archive(...)]` attributes.
//!
//! - `rename = "..."`: serialized name of a field or variant
//! - `alt = "..."`: alternate name, accepted on read and used for display
//! - `skip`: leave a field out of the archive
//! - `ignore_errors`: on an enum, tolerate unknown values and names

use syn::{Attribute, LitStr};

#[derive(Debug, Default)]
pub struct ArchiveMeta {
    pub rename: Option<String>,
    pub alt: Option<String>,
    pub skip: bool,
    pub ignore_errors: bool,
}

impl ArchiveMeta {
    /// Serialized name, falling back to the Rust identifier.
    pub fn name_or(&self, ident: &syn::Ident) -> String {
        self.rename
            .clone()
            .unwrap_or_else(|| ident.to_string().trim_start_matches("r#").to_string())
    }

    pub fn alt_or_empty(&self) -> String {
        self.alt.clone().unwrap_or_default()
    }
}

pub fn parse_archive_meta(attrs: &[Attribute]) -> syn::Result<ArchiveMeta> {
    let mut meta = ArchiveMeta::default();
    for attr in attrs {
        if !attr.path().is_ident("archive") {
            continue;
        }
        attr.parse_nested_meta(|nested| {
            if nested.path.is_ident("rename") {
                let lit: LitStr = nested.value()?.parse()?;
                meta.rename = Some(lit.value());
            } else if nested.path.is_ident("alt") {
                let lit: LitStr = nested.value()?.parse()?;
                meta.alt = Some(lit.value());
            } else if nested.path.is_ident("skip") {
                meta.skip = true;
            } else if nested.path.is_ident("ignore_errors") {
                meta.ignore_errors = true;
            } else {
                return Err(nested.error("unknown archive attribute"));
            }
            Ok(())
        })?;
    }
    Ok(meta)
}
