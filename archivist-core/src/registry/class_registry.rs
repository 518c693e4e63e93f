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

use std::any::TypeId;
use std::collections::HashMap;

use crate::bail;
use crate::error::Error;
use crate::serializer::Polymorphic;

pub type CreateFn<B> = fn() -> Box<B>;

/// One registered concrete type under a polymorphic base.
pub struct ClassEntry<B: ?Sized> {
    name: String,
    alt_name: String,
    size: usize,
    type_id: TypeId,
    type_name: &'static str,
    create: CreateFn<B>,
}

impl<B: ?Sized> ClassEntry<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Display name, falling back to the canonical name.
    pub fn alt_name(&self) -> &str {
        if self.alt_name.is_empty() {
            &self.name
        } else {
            &self.alt_name
        }
    }

    /// In-memory size of the concrete type.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn create(&self) -> Box<B> {
        (self.create)()
    }
}

/// Registered subtypes of one base type `B`.
pub struct ClassTable<B: ?Sized> {
    base_name: &'static str,
    entries: Vec<ClassEntry<B>>,
    by_name: HashMap<String, usize>,
    by_type: HashMap<TypeId, usize>,
}

impl<B: ?Sized + Polymorphic> ClassTable<B> {
    pub(crate) fn new() -> ClassTable<B> {
        ClassTable {
            base_name: std::any::type_name::<B>(),
            entries: Vec::new(),
            by_name: HashMap::new(),
            by_type: HashMap::new(),
        }
    }

    pub(crate) fn insert<T: Polymorphic>(
        &mut self,
        name: &str,
        alt_name: &str,
        create: CreateFn<B>,
    ) -> Result<(), Error> {
        let type_id = TypeId::of::<T>();
        if name.is_empty() {
            return Err(Error::duplicate_registration(format!(
                "empty name for {} under {}",
                std::any::type_name::<T>(),
                self.base_name
            )));
        }
        for key in [name, alt_name] {
            if let Some(existing) = self.by_name.get(key) {
                return Err(Error::duplicate_registration(format!(
                    "'{}' already names {} under {}",
                    key, self.entries[*existing].type_name, self.base_name
                )));
            }
        }
        if self.by_type.contains_key(&type_id) {
            return Err(Error::duplicate_registration(format!(
                "{} is already registered under {}",
                std::any::type_name::<T>(),
                self.base_name
            )));
        }
        let sample = create();
        if Polymorphic::as_any(&*sample).type_id() != type_id {
            bail!(
                "factory for '{}' does not build a {}",
                name,
                std::any::type_name::<T>()
            );
        }

        let index = self.entries.len();
        self.entries.push(ClassEntry {
            name: name.to_string(),
            alt_name: alt_name.to_string(),
            size: std::mem::size_of::<T>(),
            type_id,
            type_name: std::any::type_name::<T>(),
            create,
        });
        self.by_name.insert(name.to_string(), index);
        if !alt_name.is_empty() {
            self.by_name.insert(alt_name.to_string(), index);
        }
        self.by_type.insert(type_id, index);
        Ok(())
    }

    pub fn base_name(&self) -> &'static str {
        self.base_name
    }

    pub fn entries(&self) -> &[ClassEntry<B>] {
        &self.entries
    }

    /// Looks a type up by canonical or alternate name.
    pub fn find(&self, name: &str) -> Option<&ClassEntry<B>> {
        self.by_name.get(name).map(|i| &self.entries[*i])
    }

    pub fn find_by_type(&self, type_id: TypeId) -> Option<&ClassEntry<B>> {
        self.by_type.get(&type_id).map(|i| &self.entries[*i])
    }

    /// Entry matching the dynamic type of `instance`.
    pub fn entry_of(&self, instance: &B) -> Option<&ClassEntry<B>> {
        self.find_by_type(Polymorphic::as_any(instance).type_id())
    }

    pub fn choice_list(&self, separator: &str) -> String {
        let names: Vec<&str> = self.entries.iter().map(|e| e.name.as_str()).collect();
        names.join(separator)
    }
}
