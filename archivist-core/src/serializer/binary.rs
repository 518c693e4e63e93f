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

use std::ops::{Deref, DerefMut};

use crate::archive::Archive;
use crate::error::Error;
use crate::serializer::Serialize;

/// Opaque byte blob.
///
/// The text backend moves blobs into a sidecar file; the binary and in-place
/// backends keep them inline.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BinaryData(Vec<u8>);

impl BinaryData {
    pub fn new(bytes: Vec<u8>) -> BinaryData {
        BinaryData(bytes)
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for BinaryData {
    fn from(bytes: Vec<u8>) -> Self {
        BinaryData(bytes)
    }
}

impl Deref for BinaryData {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.0
    }
}

impl DerefMut for BinaryData {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.0
    }
}

impl Serialize for BinaryData {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str) -> Result<bool, Error> {
        ar.process_binary(&mut self.0, name, name_alt)
    }
}
