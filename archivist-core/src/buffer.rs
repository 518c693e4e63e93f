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

use byteorder::{ByteOrder, LittleEndian};

use crate::error::Error;

macro_rules! write_le {
    ($($name:ident: $ty:ty => $width:expr, $encode:ident;)*) => {
        $(
            pub fn $name(&mut self, value: $ty) {
                let mut bytes = [0u8; $width];
                LittleEndian::$encode(&mut bytes, value);
                self.bf.extend_from_slice(&bytes);
            }
        )*
    };
}

macro_rules! read_le {
    ($($name:ident: $ty:ty => $width:expr, $decode:ident;)*) => {
        $(
            pub fn $name(&mut self) -> Result<$ty, Error> {
                let bytes = self.read_bytes($width)?;
                Ok(LittleEndian::$decode(bytes))
            }
        )*
    };
}

/// Growable little-endian output buffer.
#[derive(Default)]
pub struct Writer {
    pub(crate) bf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Writer {
        Writer::default()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.bf
    }

    pub fn len(&self) -> usize {
        self.bf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bf.is_empty()
    }

    /// Appends `len` zero bytes, returning the offset of the first one.
    pub fn skip(&mut self, len: usize) -> usize {
        let offset = self.bf.len();
        self.bf.resize(offset + len, 0);
        offset
    }

    /// Overwrites already written bytes, typically a reserved size or offset slot.
    pub fn set_bytes(&mut self, offset: usize, data: &[u8]) -> Result<(), Error> {
        let capacity = self.bf.len();
        match self.bf.get_mut(offset..offset + data.len()) {
            Some(slot) => {
                slot.copy_from_slice(data);
                Ok(())
            }
            None => Err(Error::buffer_out_of_bound(offset, data.len(), capacity)),
        }
    }

    pub fn set_u16(&mut self, offset: usize, value: u16) -> Result<(), Error> {
        self.set_bytes(offset, &value.to_le_bytes())
    }

    pub fn set_u32(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        self.set_bytes(offset, &value.to_le_bytes())
    }

    /// Inserts bytes in the middle of the buffer, shifting everything after `offset`.
    pub fn insert_bytes(&mut self, offset: usize, data: &[u8]) -> Result<(), Error> {
        if offset > self.bf.len() {
            return Err(Error::buffer_out_of_bound(offset, data.len(), self.bf.len()));
        }
        self.bf.splice(offset..offset, data.iter().copied());
        Ok(())
    }

    pub fn write_bytes(&mut self, v: &[u8]) -> usize {
        self.bf.extend_from_slice(v);
        v.len()
    }

    /// Writes the UTF-8 bytes of `s` followed by a NUL terminator.
    pub fn write_c_str(&mut self, s: &str) {
        self.bf.extend_from_slice(s.as_bytes());
        self.bf.push(0);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bf.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.bf.push(value as u8);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.bf.push(value as u8);
    }

    write_le! {
        write_u16: u16 => 2, write_u16;
        write_i16: i16 => 2, write_i16;
        write_u32: u32 => 4, write_u32;
        write_i32: i32 => 4, write_i32;
        write_u64: u64 => 8, write_u64;
        write_i64: i64 => 8, write_i64;
        write_f32: f32 => 4, write_f32;
        write_f64: f64 => 8, write_f64;
    }
}

/// Bounds-checked little-endian cursor over a borrowed byte slice.
pub struct Reader<'a> {
    bf: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    pub fn new(bf: &'a [u8]) -> Reader<'a> {
        Reader { bf, cursor: 0 }
    }

    /// Creates a reader positioned at `cursor`.
    pub fn at(bf: &'a [u8], cursor: usize) -> Reader<'a> {
        Reader { bf, cursor }
    }

    pub fn len(&self) -> usize {
        self.bf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bf.is_empty()
    }

    pub fn get_cursor(&self) -> usize {
        self.cursor
    }

    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor;
    }

    pub fn remaining(&self) -> usize {
        self.bf.len().saturating_sub(self.cursor)
    }

    pub fn slice_after_cursor(&self) -> &'a [u8] {
        self.bf.get(self.cursor..).unwrap_or(&[])
    }

    #[inline(always)]
    fn check_bound(&self, n: usize) -> Result<(), Error> {
        match self.cursor.checked_add(n) {
            Some(end) if end <= self.bf.len() => Ok(()),
            _ => Err(Error::buffer_out_of_bound(self.cursor, n, self.bf.len())),
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], Error> {
        self.check_bound(len)?;
        let bytes = &self.bf[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<(), Error> {
        self.check_bound(len)?;
        self.cursor += len;
        Ok(())
    }

    /// Reads bytes up to the next NUL and consumes the terminator.
    pub fn read_c_str(&mut self) -> Result<&'a str, Error> {
        let rest = self.slice_after_cursor();
        let Some(nul) = rest.iter().position(|b| *b == 0) else {
            return Err(Error::structural(format!(
                "unterminated name at offset {}",
                self.cursor
            )));
        };
        let text = std::str::from_utf8(&rest[..nul])
            .map_err(|e| Error::structural(format!("invalid UTF-8 name: {e}")))?;
        self.cursor += nul + 1;
        Ok(text)
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.read_u8()? as i8)
    }

    pub fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.read_u8()? != 0)
    }

    read_le! {
        read_u16: u16 => 2, read_u16;
        read_i16: i16 => 2, read_i16;
        read_u32: u32 => 4, read_u32;
        read_i32: i32 => 4, read_i32;
        read_u64: u64 => 8, read_u64;
        read_i64: i64 => 8, read_i64;
        read_f32: f32 => 4, read_f32;
        read_f64: f64 => 8, read_f64;
    }
}
