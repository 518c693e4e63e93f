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

use std::collections::HashMap;

use crate::error::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnumEntry {
    pub value: i32,
    pub name: String,
    pub alt_name: String,
}

/// Bidirectional value/name table for one enum type.
///
/// Entries are kept ordered by the population count of their value,
/// descending, so that combinations of flags render the widest masks first.
#[derive(Clone, Debug)]
pub struct EnumDescriptor {
    type_name: String,
    entries: Vec<EnumEntry>,
    by_value: HashMap<i32, usize>,
    by_name: HashMap<String, usize>,
    ignore_errors: bool,
}

impl EnumDescriptor {
    pub fn new(type_name: impl Into<String>) -> EnumDescriptor {
        EnumDescriptor {
            type_name: type_name.into(),
            entries: Vec::new(),
            by_value: HashMap::new(),
            by_name: HashMap::new(),
            ignore_errors: false,
        }
    }

    /// Unknown values and names resolve to sentinels instead of failing.
    pub fn ignore_errors(mut self, ignore: bool) -> Self {
        self.ignore_errors = ignore;
        self
    }

    pub fn is_ignore_errors(&self) -> bool {
        self.ignore_errors
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn entries(&self) -> &[EnumEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds an entry. The first entry registered for a value wins on
    /// value-to-name lookups; every name and alternate name stays resolvable.
    pub fn add(&mut self, value: i32, name: &str, alt_name: &str) -> &mut Self {
        let ones = value.count_ones();
        let position = self
            .entries
            .iter()
            .position(|e| e.value.count_ones() < ones)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            position,
            EnumEntry {
                value,
                name: name.to_string(),
                alt_name: alt_name.to_string(),
            },
        );
        self.reindex();
        self
    }

    pub fn with(mut self, value: i32, name: &str, alt_name: &str) -> Self {
        self.add(value, name, alt_name);
        self
    }

    fn reindex(&mut self) {
        self.by_value.clear();
        self.by_name.clear();
        for (i, entry) in self.entries.iter().enumerate() {
            self.by_value.entry(entry.value).or_insert(i);
            self.by_name.entry(entry.name.clone()).or_insert(i);
            if !entry.alt_name.is_empty() {
                self.by_name.entry(entry.alt_name.clone()).or_insert(i);
            }
        }
    }

    pub fn find_name(&self, value: i32) -> Option<&EnumEntry> {
        self.by_value.get(&value).map(|i| &self.entries[*i])
    }

    pub fn find_value(&self, name: &str) -> Option<i32> {
        self.by_name.get(name).map(|i| self.entries[*i].value)
    }

    /// Canonical name of `value`; `""` for unknown values when errors are ignored.
    pub fn name_of(&self, value: i32) -> Result<&str, Error> {
        match self.find_name(value) {
            Some(entry) => Ok(&entry.name),
            None if self.ignore_errors => Ok(""),
            None => Err(Error::unknown_enum(format!(
                "value {} is not a member of {}",
                value, self.type_name
            ))),
        }
    }

    /// Alternate (display) name of `value`, falling back to the canonical one.
    pub fn alt_name_of(&self, value: i32) -> Result<&str, Error> {
        match self.find_name(value) {
            Some(entry) if !entry.alt_name.is_empty() => Ok(&entry.alt_name),
            _ => self.name_of(value),
        }
    }

    /// Value named `name`; `0` for unknown names when errors are ignored.
    pub fn value_of(&self, name: &str) -> Result<i32, Error> {
        match self.find_value(name) {
            Some(value) => Ok(value),
            None if self.ignore_errors => Ok(0),
            None => Err(Error::unknown_enum(format!(
                "'{}' is not a member of {}",
                name, self.type_name
            ))),
        }
    }

    /// Renders the flags set in `bits` as names joined by `separator`.
    pub fn combination_name(&self, bits: i32, separator: &str) -> Result<String, Error> {
        let mut remaining = bits;
        let mut names: Vec<&str> = Vec::new();
        for entry in &self.entries {
            if entry.value != 0 && remaining & entry.value == entry.value {
                names.push(&entry.name);
                remaining &= !entry.value;
            }
        }
        if remaining != 0 && !self.ignore_errors {
            return Err(Error::unknown_enum(format!(
                "bits {:#x} of {:#x} have no name in {}",
                remaining, bits, self.type_name
            )));
        }
        if names.is_empty() {
            if let Some(zero) = self.find_name(0) {
                return Ok(zero.name.clone());
            }
        }
        Ok(names.join(separator))
    }

    /// Parses names joined by `separator` back into bits, stopping at `;`.
    pub fn combination_value(&self, text: &str, separator: &str) -> Result<i32, Error> {
        let text = text.split(';').next().unwrap_or_default();
        let mut bits = 0;
        for token in text.split(separator) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            bits |= self.value_of(token)?;
        }
        Ok(bits)
    }
}
