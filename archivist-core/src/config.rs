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

/// Characters that may not appear in a text field name by default.
pub const DEFAULT_NAME_DENYLIST: &str = " \t\r\n=;,{}\"|/*()[]";

/// Configuration shared by every archive backend.
///
/// Each archive owns a copy inside its [`ArchiveContext`](crate::archive::ArchiveContext);
/// the builder methods on the archives mutate that copy.
#[derive(Clone, Debug)]
pub struct Config {
    /// Treat polymorphic tags naming unknown types as absent fields instead of failing.
    pub ignore_unregistered_classes: bool,
    /// Bitmask consulted by [`filter`](crate::archive::ArchiveExt::filter); zero accepts everything.
    pub filter: u32,
    /// Characters rejected in text field names at write time.
    pub name_denylist: String,
    /// Indentation width of the text backend, in tab characters.
    pub indent: usize,
    /// Version number written at the top of text files.
    pub version: i32,
    /// Maximum nesting of structs, containers and pointees.
    pub max_depth: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ignore_unregistered_classes: false,
            filter: 0,
            name_denylist: DEFAULT_NAME_DENYLIST.to_string(),
            indent: 1,
            version: 1,
            max_depth: 256,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline(always)]
    pub fn is_ignore_unregistered_classes(&self) -> bool {
        self.ignore_unregistered_classes
    }

    #[inline(always)]
    pub fn filter(&self) -> u32 {
        self.filter
    }

    #[inline(always)]
    pub fn version(&self) -> i32 {
        self.version
    }

    #[inline(always)]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Returns the first denylisted character in `name`, if any.
    pub fn denied_char(&self, name: &str) -> Option<char> {
        name.chars().find(|c| self.name_denylist.contains(*c))
    }
}
