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

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::Hash;

use crate::archive::Archive;
use crate::error::Error;
use crate::serializer::Serialize;

/// On input a sequence is truncated to the stored count; elements in the kept
/// prefix are read in place, so their allocations (and the dynamic types
/// behind polymorphic pointers) are reused. Further elements are appended one
/// at a time as they are read.
macro_rules! impl_sequence_serializer {
    ($($seq:ident => $push:ident),+) => {
        $(
            impl<T: Serialize + Default> Serialize for $seq<T> {
                fn serialize(
                    &mut self,
                    ar: &mut dyn Archive,
                    name: &str,
                    name_alt: &str,
                ) -> Result<bool, Error> {
                    let mut len = self.len();
                    if !ar.open_container(&mut len, false, name, name_alt)? {
                        return Ok(false);
                    }
                    if ar.is_input() {
                        self.truncate(len);
                    }
                    for item in self.iter_mut() {
                        item.serialize(ar, "", "")?;
                    }
                    while self.len() < len {
                        let mut item = T::default();
                        item.serialize(ar, "", "")?;
                        self.$push(item);
                    }
                    ar.close_container(name)?;
                    Ok(true)
                }
            }
        )+
    };
}

impl_sequence_serializer!(Vec => push, VecDeque => push_back);

/// Key/value entries are written as `{ first = ..; second = ..; }` pairs.
fn serialize_entry<K: Serialize, V: Serialize>(
    ar: &mut dyn Archive,
    key: &mut K,
    value: &mut V,
) -> Result<(), Error> {
    ar.open_struct("pair", "", "")?;
    key.serialize(ar, "first", "")?;
    value.serialize(ar, "second", "")?;
    ar.close_struct("")
}

macro_rules! impl_map_serializer {
    ($map:ident, $($key_bound:ident),+) => {
        impl<K, V> Serialize for $map<K, V>
        where
            K: Serialize + Default + Clone $(+ $key_bound)+,
            V: Serialize + Default,
        {
            fn serialize(
                &mut self,
                ar: &mut dyn Archive,
                name: &str,
                name_alt: &str,
            ) -> Result<bool, Error> {
                let mut len = self.len();
                if !ar.open_container(&mut len, false, name, name_alt)? {
                    return Ok(false);
                }
                if ar.is_input() {
                    self.clear();
                    for _ in 0..len {
                        let mut key = K::default();
                        let mut value = V::default();
                        serialize_entry(ar, &mut key, &mut value)?;
                        self.insert(key, value);
                    }
                } else {
                    for (key, value) in self.iter_mut() {
                        let mut key = key.clone();
                        serialize_entry(ar, &mut key, value)?;
                    }
                }
                ar.close_container(name)?;
                Ok(true)
            }
        }
    };
}

impl_map_serializer!(BTreeMap, Ord);
impl_map_serializer!(HashMap, Eq, Hash);

macro_rules! impl_set_serializer {
    ($set:ident, $($bound:ident),+) => {
        impl<T> Serialize for $set<T>
        where
            T: Serialize + Default + Clone $(+ $bound)+,
        {
            fn serialize(
                &mut self,
                ar: &mut dyn Archive,
                name: &str,
                name_alt: &str,
            ) -> Result<bool, Error> {
                let mut len = self.len();
                if !ar.open_container(&mut len, false, name, name_alt)? {
                    return Ok(false);
                }
                if ar.is_input() {
                    self.clear();
                    for _ in 0..len {
                        let mut item = T::default();
                        item.serialize(ar, "", "")?;
                        self.insert(item);
                    }
                } else {
                    for item in self.iter() {
                        item.clone().serialize(ar, "", "")?;
                    }
                }
                ar.close_container(name)?;
                Ok(true)
            }
        }
    };
}

impl_set_serializer!(BTreeSet, Ord);
impl_set_serializer!(HashSet, Eq, Hash);
