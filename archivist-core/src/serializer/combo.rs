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

use crate::archive::Archive;
use crate::error::Error;
use crate::serializer::Serialize;

pub const COMBO_SEPARATOR: char = '|';

/// A string restricted to one entry of a `|`-separated list of choices.
///
/// Only the value is archived; the list belongs to the program. A value read
/// back that is not in the list is kept as is and reported with `warn!`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ComboString {
    value: String,
    combo_list: String,
}

impl ComboString {
    pub fn new(combo_list: impl Into<String>, value: impl Into<String>) -> ComboString {
        ComboString {
            value: value.into(),
            combo_list: combo_list.into(),
        }
    }

    /// A combo string holding the first choice of `combo_list`.
    pub fn first_of(combo_list: impl Into<String>) -> ComboString {
        let combo_list = combo_list.into();
        let value = combo_list
            .split(COMBO_SEPARATOR)
            .next()
            .unwrap_or_default()
            .to_string();
        ComboString { value, combo_list }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn combo_list(&self) -> &str {
        &self.combo_list
    }

    pub fn set_combo_list(&mut self, combo_list: impl Into<String>) {
        self.combo_list = combo_list.into();
    }

    pub fn options(&self) -> impl Iterator<Item = &str> {
        self.combo_list
            .split(COMBO_SEPARATOR)
            .filter(|option| !option.is_empty())
    }

    pub fn is_valid(&self) -> bool {
        self.options().any(|option| option == self.value)
    }
}

impl Serialize for ComboString {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str) -> Result<bool, Error> {
        let found = ar.process_string(&mut self.value, name, name_alt)?;
        if found && ar.is_input() && !self.combo_list.is_empty() && !self.is_valid() {
            log::warn!(
                "'{}' = '{}' is not one of '{}'",
                name,
                self.value,
                self.combo_list
            );
        }
        Ok(found)
    }
}
