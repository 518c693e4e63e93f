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

use std::fmt;
use std::marker::PhantomData;
use std::ops::BitOr;

use crate::archive::{Archive, EnumKey};
use crate::error::Error;
use crate::registry::EnumDescriptor;

/// A fieldless enum that archives as an `i32` value or a symbolic name.
///
/// `#[derive(Archived)]` on a fieldless enum implements this trait and
/// [`Serialize`](crate::serializer::Serialize) through [`serialize_enum`].
pub trait ArchiveEnum: Copy + 'static {
    fn to_value(self) -> i32;

    fn from_value(value: i32) -> Option<Self>;

    /// Default names for every variant.
    fn descriptor() -> EnumDescriptor;
}

pub fn serialize_enum<E: ArchiveEnum>(
    value: &mut E,
    ar: &mut dyn Archive,
    name: &str,
    name_alt: &str,
) -> Result<bool, Error> {
    let key = EnumKey::of::<E>();
    let mut raw = value.to_value();
    if !ar.process_enum(&mut raw, &key, name, name_alt)? {
        return Ok(false);
    }
    if ar.is_input() {
        match E::from_value(raw) {
            Some(v) => *value = v,
            None if ar.registry().descriptor_for(&key).is_ignore_errors() => {
                log::warn!("'{}': {} has no variant {}", name, key.type_name, raw);
            }
            None => {
                return Err(Error::unknown_enum(format!(
                    "'{}': {} has no variant {}",
                    name, key.type_name, raw
                )))
            }
        }
    }
    Ok(true)
}

/// A set of flags of the enum `E`, archived as names joined by `|`.
pub struct BitVector<E> {
    bits: i32,
    _marker: PhantomData<E>,
}

impl<E: ArchiveEnum> BitVector<E> {
    pub fn new() -> Self {
        Self::from_bits(0)
    }

    pub fn from_bits(bits: i32) -> Self {
        BitVector {
            bits,
            _marker: PhantomData,
        }
    }

    pub fn bits(&self) -> i32 {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    pub fn contains(&self, flag: E) -> bool {
        let mask = flag.to_value();
        self.bits & mask == mask
    }

    pub fn insert(&mut self, flag: E) {
        self.bits |= flag.to_value();
    }

    pub fn remove(&mut self, flag: E) {
        self.bits &= !flag.to_value();
    }

    pub fn with(mut self, flag: E) -> Self {
        self.insert(flag);
        self
    }
}

impl<E: ArchiveEnum> Default for BitVector<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for BitVector<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for BitVector<E> {}

impl<E> PartialEq for BitVector<E> {
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<E> Eq for BitVector<E> {}

impl<E> fmt::Debug for BitVector<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitVector({:#x})", self.bits)
    }
}

impl<E: ArchiveEnum> From<E> for BitVector<E> {
    fn from(flag: E) -> Self {
        Self::from_bits(flag.to_value())
    }
}

impl<E: ArchiveEnum> BitOr<E> for BitVector<E> {
    type Output = BitVector<E>;

    fn bitor(self, flag: E) -> BitVector<E> {
        self.with(flag)
    }
}

impl<E: ArchiveEnum> crate::serializer::Serialize for BitVector<E> {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str) -> Result<bool, Error> {
        ar.process_bit_vector(&mut self.bits, &EnumKey::of::<E>(), name, name_alt)
    }
}
