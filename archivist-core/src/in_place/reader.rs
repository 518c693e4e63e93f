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

use std::collections::HashSet;
use std::path::Path;

use crate::archive::{input_prepare, Archive, ArchiveContext, EnumKey, PointerSlot, ScalarMut};
use crate::buffer::{Reader, Writer};
use crate::config::Config;
use crate::error::Error;
use crate::registry::Registry;
use crate::types::{
    NodeKind, IN_PLACE_VERSION, NULL_OFFSET, POINTER_SLOT_SIZE, RANGE_SLOT_SIZE, STRING_SLOT_SIZE,
};
use crate::util::{crc32, read_file};
use crate::{ensure, structural};

/// A loaded in-place image with its relocation and type tables applied.
///
/// Every `(start, end)` pair listed in the relocation table has been checked
/// to lie inside the body; reads only follow pairs from that set. Each
/// polymorphic type slot holds `class_index + 1`, or `0` when its type was
/// unknown and ignored.
pub struct InPlaceBuffer {
    body: Vec<u8>,
    relocated: HashSet<usize>,
    crc: u32,
}

impl InPlaceBuffer {
    pub fn load(
        registry: &Registry,
        bytes: &[u8],
        ignore_unregistered: bool,
    ) -> Result<InPlaceBuffer, Error> {
        let mut reader = Reader::new(bytes);
        let version = reader.read_i32()?;
        if version != IN_PLACE_VERSION {
            structural!("unsupported in-place version {}", version);
        }
        let body_size = usize::try_from(reader.read_i32()?)
            .map_err(|_| Error::structural("negative in-place body size"))?;
        let mut body = Writer::new();
        body.write_bytes(reader.read_bytes(body_size)?);

        let count = table_len(&mut reader)?;
        let mut relocated = HashSet::with_capacity(count);
        for _ in 0..count {
            let pair = table_offset(&mut reader)?;
            let (start, end) = read_pair(body.as_slice(), pair)?;
            ensure!(
                start <= end && end <= body_size,
                Error::structural(format!(
                    "relocation at {} points to {}..{} outside a body of {} bytes",
                    pair, start, end, body_size
                ))
            );
            relocated.insert(pair);
        }

        let fixups = table_len(&mut reader)?;
        for _ in 0..fixups {
            let slot = table_offset(&mut reader)?;
            let name = reader.read_c_str()?;
            ensure!(
                slot + 4 <= body_size,
                Error::structural(format!("type slot {} is outside the body", slot))
            );
            // a pair is 8 bytes, a type slot 4
            if let Some(pair) = (slot.saturating_sub(7)..slot + 4).find(|p| relocated.contains(p)) {
                structural!("type slot {} overlaps the relocated pair at {}", slot, pair);
            }
            match registry.class_index(name) {
                Some(index) => body.set_u32(slot, index as u32 + 1)?,
                None if ignore_unregistered => {
                    log::warn!(
                        "type '{}' at slot {} is not registered, reading as null",
                        name,
                        slot
                    );
                    body.set_u32(slot, 0)?;
                }
                None => {
                    return Err(Error::unregistered_type(format!(
                        "type '{}' at slot {} is not registered",
                        name, slot
                    )))
                }
            }
        }
        if reader.remaining() != 0 {
            structural!("{} trailing bytes after the in-place tables", reader.remaining());
        }
        log::trace!("in-place load: {} relocations, {} type fixups", count, fixups);
        Ok(InPlaceBuffer {
            body: body.into_inner(),
            relocated,
            crc: crc32(bytes),
        })
    }

    pub fn open(
        registry: &Registry,
        path: &Path,
        ignore_unregistered: bool,
    ) -> Result<InPlaceBuffer, Error> {
        let bytes = read_file(path)?;
        log::debug!("opened in-place archive {} ({} bytes)", path.display(), bytes.len());
        Self::load(registry, &bytes, ignore_unregistered).map_err(|e| e.at_path(path))
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// CRC-32 of the file image as loaded.
    pub fn crc(&self) -> u32 {
        self.crc
    }

    pub fn is_relocated(&self, pair: usize) -> bool {
        self.relocated.contains(&pair)
    }

    /// The `(start, end)` body range stored at `pair`.
    pub fn slot(&self, pair: usize) -> Result<(usize, usize), Error> {
        if !self.is_relocated(pair) {
            structural!("offset {} is not a relocated slot", pair);
        }
        read_pair(&self.body, pair)
    }

    /// Contents of the string whose slot starts at `slot`.
    pub fn string_at(&self, slot: usize) -> Result<&str, Error> {
        let bytes = self.range(slot)?;
        std::str::from_utf8(bytes)
            .map_err(|e| Error::structural(format!("string at {} is not UTF-8: {e}", slot)))
    }

    /// Body bytes covered by the relocated pair at `pair`.
    pub fn range(&self, pair: usize) -> Result<&[u8], Error> {
        let (start, end) = self.slot(pair)?;
        match self.body.get(start..end) {
            Some(bytes) => Ok(bytes),
            None => structural!("slot {} covers {}..{} outside the body", pair, start, end),
        }
    }

    fn u32_at(&self, offset: usize) -> Result<u32, Error> {
        Reader::at(&self.body, offset).read_u32()
    }
}

fn table_len(reader: &mut Reader) -> Result<usize, Error> {
    usize::try_from(reader.read_i32()?).map_err(|_| Error::structural("negative table length"))
}

fn table_offset(reader: &mut Reader) -> Result<usize, Error> {
    usize::try_from(reader.read_i32()?).map_err(|_| Error::structural("negative table offset"))
}

fn read_pair(body: &[u8], pair: usize) -> Result<(usize, usize), Error> {
    let mut reader = Reader::at(body, pair);
    let start = reader.read_u32()? as usize;
    let end = reader.read_u32()? as usize;
    Ok((start, end))
}

struct Frame {
    kind: NodeKind,
    name: String,
    cursor: usize,
    end: usize,
}

/// Reads an [`InPlaceBuffer`] positionally. Field names are ignored.
pub struct InPlaceIArchive<'r> {
    registry: &'r Registry,
    context: ArchiveContext,
    buffer: InPlaceBuffer,
    stack: Vec<Frame>,
}

impl<'r> InPlaceIArchive<'r> {
    pub fn new(registry: &'r Registry, buffer: InPlaceBuffer) -> InPlaceIArchive<'r> {
        let end = buffer.body.len();
        InPlaceIArchive {
            registry,
            context: ArchiveContext::default(),
            buffer,
            stack: vec![Frame {
                kind: NodeKind::Struct,
                name: String::new(),
                cursor: 0,
                end,
            }],
        }
    }

    /// Loads `path` with the type pass honoring `config`.
    pub fn open(
        registry: &'r Registry,
        path: &Path,
        config: Config,
    ) -> Result<InPlaceIArchive<'r>, Error> {
        let buffer = InPlaceBuffer::open(registry, path, config.is_ignore_unregistered_classes())?;
        let mut archive = Self::new(registry, buffer);
        archive.context.set_config(config);
        Ok(archive)
    }

    pub fn config(mut self, config: Config) -> Self {
        self.context.set_config(config);
        self
    }

    pub fn filter(mut self, filter: u32) -> Self {
        self.context.config_mut().filter = filter;
        self
    }

    pub fn buffer(&self) -> &InPlaceBuffer {
        &self.buffer
    }

    pub fn crc(&self) -> u32 {
        self.buffer.crc()
    }

    /// Claims `len` bytes at the cursor of the innermost node.
    fn take(&mut self, len: usize) -> Result<usize, Error> {
        let frame = self
            .stack
            .last_mut()
            .ok_or_else(|| Error::structural("no open node"))?;
        let at = frame.cursor;
        match at.checked_add(len) {
            Some(next) if next <= frame.end => {
                frame.cursor = next;
                Ok(at)
            }
            _ => Err(Error::buffer_out_of_bound(at, len, frame.end)),
        }
    }

    fn push(&mut self, kind: NodeKind, name: &str, cursor: usize, end: usize) -> Result<(), Error> {
        self.context.enter(name)?;
        self.stack.push(Frame {
            kind,
            name: name.to_string(),
            cursor,
            end,
        });
        Ok(())
    }

    fn pop(&mut self, kind: NodeKind, name: &str) -> Result<Frame, Error> {
        if self.stack.len() <= 1 {
            structural!("closing {:?} '{}' with nothing open", kind, name);
        }
        match self.stack.pop() {
            Some(frame) if frame.kind == kind && frame.name == name => {
                self.context.leave();
                Ok(frame)
            }
            Some(frame) => Err(Error::structural(format!(
                "closing {:?} '{}' while {:?} '{}' is open",
                kind, name, frame.kind, frame.name
            ))),
            None => Err(Error::structural("no open node")),
        }
    }

    fn read_i32(&mut self) -> Result<i32, Error> {
        let at = self.take(4)?;
        Reader::at(&self.buffer.body, at).read_i32()
    }
}

impl Archive for InPlaceIArchive<'_> {
    fn is_input(&self) -> bool {
        true
    }

    fn in_place(&self) -> bool {
        true
    }

    fn registry(&self) -> &Registry {
        self.registry
    }

    fn context(&self) -> &ArchiveContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut ArchiveContext {
        &mut self.context
    }

    fn process_scalar(
        &mut self,
        mut value: ScalarMut<'_>,
        _: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let at = self.take(value.width())?;
        value.read_le(&mut Reader::at(&self.buffer.body, at))?;
        Ok(true)
    }

    fn process_string(&mut self, value: &mut String, _: &str, _: &str) -> Result<bool, Error> {
        let at = self.take(STRING_SLOT_SIZE)?;
        let text = self.buffer.string_at(at)?;
        value.clear();
        value.push_str(text);
        Ok(true)
    }

    fn process_enum(
        &mut self,
        value: &mut i32,
        _key: &EnumKey,
        _: &str,
        _: &str,
    ) -> Result<bool, Error> {
        *value = self.read_i32()?;
        Ok(true)
    }

    fn process_bit_vector(
        &mut self,
        bits: &mut i32,
        _key: &EnumKey,
        _: &str,
        _: &str,
    ) -> Result<bool, Error> {
        *bits = self.read_i32()?;
        Ok(true)
    }

    fn process_binary(&mut self, data: &mut Vec<u8>, _: &str, _: &str) -> Result<bool, Error> {
        let at = self.take(RANGE_SLOT_SIZE)?;
        let blob = self.buffer.range(at)?;
        data.clear();
        data.extend_from_slice(blob);
        Ok(true)
    }

    fn open_struct(&mut self, _type_name: &str, name: &str, _: &str) -> Result<bool, Error> {
        let (cursor, end) = match self.stack.last() {
            Some(frame) => (frame.cursor, frame.end),
            None => structural!("no open node"),
        };
        self.push(NodeKind::Struct, name, cursor, end)?;
        Ok(true)
    }

    fn close_struct(&mut self, name: &str) -> Result<(), Error> {
        let frame = self.pop(NodeKind::Struct, name)?;
        if let Some(parent) = self.stack.last_mut() {
            parent.cursor = frame.cursor;
        }
        Ok(())
    }

    fn open_container(
        &mut self,
        len: &mut usize,
        _fixed: bool,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let at = self.take(RANGE_SLOT_SIZE)?;
        let (start, end) = self.buffer.slot(at)?;
        let mut reader = Reader::new(self.buffer.range(at)?);
        let count = reader.read_u32()? as usize;
        // the writer never lets an element take zero bytes
        if count > reader.remaining() {
            structural!(
                "'{}' declares {} elements in {} bytes",
                name,
                count,
                reader.remaining()
            );
        }
        *len = count;
        self.push(NodeKind::Container, name, start + 4, end)?;
        Ok(true)
    }

    fn close_container(&mut self, name: &str) -> Result<(), Error> {
        self.pop(NodeKind::Container, name).map(|_| ())
    }

    fn process_pointer(
        &mut self,
        ptr: &mut dyn PointerSlot,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let at = self.take(POINTER_SLOT_SIZE)?;
        if self.buffer.u32_at(at + 4)? == NULL_OFFSET {
            ptr.set_null();
            return Ok(true);
        }
        let (start, end) = self.buffer.slot(at + 4)?;
        if ptr.is_polymorphic() {
            let type_slot = self.buffer.u32_at(at)?;
            if type_slot == 0 {
                ptr.set_null();
                return Ok(true);
            }
            let Some(type_name) = self.registry.class_at(type_slot as usize - 1) else {
                return Err(Error::unregistered_type(format!(
                    "'{}': class index {} is unknown",
                    name,
                    type_slot - 1
                )));
            };
            if !input_prepare(ptr, self.registry, &self.context, type_name, name)? {
                return Ok(false);
            }
        } else {
            ptr.prepare(self.registry, "")?;
        }
        self.push(NodeKind::Pointer, name, start, end)?;
        ptr.serialize_pointee(self)?;
        self.pop(NodeKind::Pointer, name)?;
        Ok(true)
    }
}
