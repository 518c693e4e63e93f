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

use crate::buffer::{Reader, Writer};
use crate::error::Error;

/// Mutable view of one primitive value passed through an archive.
#[derive(Debug)]
pub enum ScalarMut<'a> {
    Bool(&'a mut bool),
    I8(&'a mut i8),
    U8(&'a mut u8),
    I16(&'a mut i16),
    U16(&'a mut u16),
    I32(&'a mut i32),
    U32(&'a mut u32),
    I64(&'a mut i64),
    U64(&'a mut u64),
    F32(&'a mut f32),
    F64(&'a mut f64),
}

macro_rules! each_scalar {
    ($value:expr, $v:ident => $body:expr) => {
        match $value {
            ScalarMut::Bool($v) => $body,
            ScalarMut::I8($v) => $body,
            ScalarMut::U8($v) => $body,
            ScalarMut::I16($v) => $body,
            ScalarMut::U16($v) => $body,
            ScalarMut::I32($v) => $body,
            ScalarMut::U32($v) => $body,
            ScalarMut::I64($v) => $body,
            ScalarMut::U64($v) => $body,
            ScalarMut::F32($v) => $body,
            ScalarMut::F64($v) => $body,
        }
    };
}

impl ScalarMut<'_> {
    /// A shorter-lived view of the same value, for passing one scalar to
    /// several archives in turn.
    pub fn reborrow(&mut self) -> ScalarMut<'_> {
        match self {
            ScalarMut::Bool(v) => ScalarMut::Bool(&mut **v),
            ScalarMut::I8(v) => ScalarMut::I8(&mut **v),
            ScalarMut::U8(v) => ScalarMut::U8(&mut **v),
            ScalarMut::I16(v) => ScalarMut::I16(&mut **v),
            ScalarMut::U16(v) => ScalarMut::U16(&mut **v),
            ScalarMut::I32(v) => ScalarMut::I32(&mut **v),
            ScalarMut::U32(v) => ScalarMut::U32(&mut **v),
            ScalarMut::I64(v) => ScalarMut::I64(&mut **v),
            ScalarMut::U64(v) => ScalarMut::U64(&mut **v),
            ScalarMut::F32(v) => ScalarMut::F32(&mut **v),
            ScalarMut::F64(v) => ScalarMut::F64(&mut **v),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ScalarMut::Bool(_) => "bool",
            ScalarMut::I8(_) => "i8",
            ScalarMut::U8(_) => "u8",
            ScalarMut::I16(_) => "i16",
            ScalarMut::U16(_) => "u16",
            ScalarMut::I32(_) => "i32",
            ScalarMut::U32(_) => "u32",
            ScalarMut::I64(_) => "i64",
            ScalarMut::U64(_) => "u64",
            ScalarMut::F32(_) => "f32",
            ScalarMut::F64(_) => "f64",
        }
    }

    /// Encoded width in bytes.
    pub fn width(&self) -> usize {
        each_scalar!(self, v => std::mem::size_of_val(&**v))
    }

    /// Shortest text form that parses back to the same value.
    pub fn to_text(&self) -> String {
        each_scalar!(self, v => format!("{:?}", v))
    }

    pub fn parse_text(&mut self, text: &str) -> Result<(), Error> {
        let kind = self.kind_name();
        let invalid = |e: &dyn std::fmt::Display| {
            Error::structural(format!("cannot read '{}' as {}: {}", text, kind, e))
        };
        if let ScalarMut::Bool(v) = self {
            **v = match text {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(invalid(&"expected true or false")),
            };
            return Ok(());
        }
        each_scalar!(self, v => {
            **v = text.parse().map_err(|e| invalid(&e))?;
        });
        Ok(())
    }

    pub fn write_le(&self, writer: &mut Writer) {
        match self {
            ScalarMut::Bool(v) => writer.write_bool(**v),
            ScalarMut::I8(v) => writer.write_i8(**v),
            ScalarMut::U8(v) => writer.write_u8(**v),
            ScalarMut::I16(v) => writer.write_i16(**v),
            ScalarMut::U16(v) => writer.write_u16(**v),
            ScalarMut::I32(v) => writer.write_i32(**v),
            ScalarMut::U32(v) => writer.write_u32(**v),
            ScalarMut::I64(v) => writer.write_i64(**v),
            ScalarMut::U64(v) => writer.write_u64(**v),
            ScalarMut::F32(v) => writer.write_f32(**v),
            ScalarMut::F64(v) => writer.write_f64(**v),
        }
    }

    pub fn read_le(&mut self, reader: &mut Reader) -> Result<(), Error> {
        match self {
            ScalarMut::Bool(v) => **v = reader.read_bool()?,
            ScalarMut::I8(v) => **v = reader.read_i8()?,
            ScalarMut::U8(v) => **v = reader.read_u8()?,
            ScalarMut::I16(v) => **v = reader.read_i16()?,
            ScalarMut::U16(v) => **v = reader.read_u16()?,
            ScalarMut::I32(v) => **v = reader.read_i32()?,
            ScalarMut::U32(v) => **v = reader.read_u32()?,
            ScalarMut::I64(v) => **v = reader.read_i64()?,
            ScalarMut::U64(v) => **v = reader.read_u64()?,
            ScalarMut::F32(v) => **v = reader.read_f32()?,
            ScalarMut::F64(v) => **v = reader.read_f64()?,
        }
        Ok(())
    }
}
