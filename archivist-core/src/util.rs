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

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Error;
use crate::types::SIDECAR_EXTENSION;

#[inline(always)]
pub fn crc32(bytes: &[u8]) -> u32 {
    crc32fast::hash(bytes)
}

/// `path` with its extension replaced by `.bin`; a path already ending in
/// `.bin` gets a second one.
pub fn sidecar_path(path: &Path) -> PathBuf {
    let sidecar = path.with_extension(SIDECAR_EXTENSION);
    if sidecar != path {
        return sidecar;
    }
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(SIDECAR_EXTENSION);
    PathBuf::from(name)
}

/// Identifiers as the text lexer reads them: a letter or `_`, then letters,
/// digits or `_`.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn read_file(path: &Path) -> Result<Vec<u8>, Error> {
    fs::read(path).map_err(|e| Error::from(e).at_path(path))
}

/// Writes `bytes`, creating missing parent directories.
pub fn write_file(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| Error::from(e).at_path(parent))?;
        }
    }
    fs::write(path, bytes).map_err(|e| Error::from(e).at_path(path))
}

/// True when `path` exists and was modified no earlier than `reference`.
pub fn is_up_to_date(path: &Path, reference: &Path) -> bool {
    let modified = |p: &Path| fs::metadata(p).and_then(|m| m.modified()).ok();
    match (modified(path), modified(reference)) {
        (Some(cache), Some(source)) => cache >= source,
        (Some(_), None) => true,
        _ => false,
    }
}
