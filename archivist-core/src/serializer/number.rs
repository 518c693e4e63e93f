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

use paste::paste;

use crate::archive::{Archive, ScalarMut};
use crate::error::Error;
use crate::serializer::Serialize;

macro_rules! impl_scalar_serializer {
    ($($ty:ident),+ $(,)?) => {
        paste! {
            $(
                impl Serialize for $ty {
                    #[inline(always)]
                    fn serialize(
                        &mut self,
                        ar: &mut dyn Archive,
                        name: &str,
                        name_alt: &str,
                    ) -> Result<bool, Error> {
                        ar.process_scalar(ScalarMut::[<$ty:camel>](self), name, name_alt)
                    }
                }
            )+
        }
    };
}

impl_scalar_serializer!(bool, i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

// Pointer-sized integers travel as their 64-bit counterparts.
macro_rules! impl_widened_serializer {
    ($ty:ty, $wide:ty, $variant:ident) => {
        impl Serialize for $ty {
            fn serialize(
                &mut self,
                ar: &mut dyn Archive,
                name: &str,
                name_alt: &str,
            ) -> Result<bool, Error> {
                let mut wide = *self as $wide;
                if !ar.process_scalar(ScalarMut::$variant(&mut wide), name, name_alt)? {
                    return Ok(false);
                }
                if ar.is_input() {
                    *self = <$ty>::try_from(wide).map_err(|_| {
                        Error::structural(format!(
                            "'{}' value {} does not fit in {}",
                            name,
                            wide,
                            stringify!($ty)
                        ))
                    })?;
                }
                Ok(true)
            }
        }
    };
}

impl_widened_serializer!(usize, u64, U64);
impl_widened_serializer!(isize, i64, I64);
