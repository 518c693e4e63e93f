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

/// Name/value pairs are structs with the fields `first` and `second`.
impl<A: Serialize, B: Serialize> Serialize for (A, B) {
    fn serialize(&mut self, ar: &mut dyn Archive, name: &str, name_alt: &str) -> Result<bool, Error> {
        if !ar.open_struct(std::any::type_name::<Self>(), name, name_alt)? {
            return Ok(false);
        }
        self.0.serialize(ar, "first", "")?;
        self.1.serialize(ar, "second", "")?;
        ar.close_struct(name)?;
        Ok(true)
    }
}
