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

use std::path::Path;

use crate::archive::{input_prepare, Archive, ArchiveContext, EnumKey, PointerSlot, ScalarMut};
use crate::buffer::Reader;
use crate::config::Config;
use crate::error::Error;
use crate::registry::Registry;
use crate::types::{
    NodeKind, BINARY_MAGIC, CHUNK_SIZE_ESCAPE, CONTAINER_SENTINEL, PLAIN_POINTER_TAG,
};
use crate::util::{crc32, read_file};

/// An empty name, its NUL and a `u16` size.
const MIN_CHUNK_SIZE: usize = 3;

/// Byte range of an open chunk's payload.
struct Frame {
    kind: NodeKind,
    name: String,
    start: usize,
    end: usize,
    cursor: usize,
    fixed: bool,
}

struct ChunkHeader {
    matches: bool,
    payload: usize,
    end: usize,
}

/// Reads the chunk format written by [`BinaryOArchive`](super::BinaryOArchive).
///
/// Non-matching chunks are skipped by their recorded size. A lookup scans to
/// the end of the enclosing chunk and then once more from its start.
pub struct BinaryIArchive<'r> {
    registry: &'r Registry,
    context: ArchiveContext,
    data: Vec<u8>,
    stack: Vec<Frame>,
}

impl<'r> BinaryIArchive<'r> {
    pub fn from_bytes(registry: &'r Registry, data: Vec<u8>) -> Result<BinaryIArchive<'r>, Error> {
        if data.len() < BINARY_MAGIC.len() || data[..BINARY_MAGIC.len()] != BINARY_MAGIC {
            return Err(Error::structural("missing binary archive magic"));
        }
        let root = Frame {
            kind: NodeKind::Struct,
            name: String::new(),
            start: BINARY_MAGIC.len(),
            end: data.len(),
            cursor: BINARY_MAGIC.len(),
            fixed: false,
        };
        Ok(BinaryIArchive {
            registry,
            context: ArchiveContext::default(),
            data,
            stack: vec![root],
        })
    }

    pub fn open(registry: &'r Registry, path: &Path) -> Result<BinaryIArchive<'r>, Error> {
        let data = read_file(path)?;
        log::debug!("opened binary archive {} ({} bytes)", path.display(), data.len());
        Self::from_bytes(registry, data).map_err(|e| e.at_path(path))
    }

    pub fn config(mut self, config: Config) -> Self {
        self.context.set_config(config);
        self
    }

    pub fn ignore_unregistered_classes(mut self, ignore: bool) -> Self {
        self.context.config_mut().ignore_unregistered_classes = ignore;
        self
    }

    pub fn filter(mut self, filter: u32) -> Self {
        self.context.config_mut().filter = filter;
        self
    }

    /// CRC-32 of the whole buffer, magic included.
    pub fn crc(&self) -> u32 {
        crc32(&self.data)
    }

    fn top(&self) -> Result<&Frame, Error> {
        self.stack
            .last()
            .ok_or_else(|| Error::structural("no open chunk"))
    }

    fn top_mut(&mut self) -> Result<&mut Frame, Error> {
        self.stack
            .last_mut()
            .ok_or_else(|| Error::structural("no open chunk"))
    }

    fn header_at(&self, pos: usize, limit: usize, name: &str) -> Result<ChunkHeader, Error> {
        let mut reader = Reader::at(&self.data[..limit], pos);
        let matches = reader.read_c_str()? == name;
        let mut size = reader.read_u16()? as usize;
        if size == CHUNK_SIZE_ESCAPE as usize {
            size = reader.read_u32()? as usize;
        }
        let payload = reader.get_cursor();
        match payload.checked_add(size) {
            Some(end) if end <= limit => Ok(ChunkHeader {
                matches,
                payload,
                end,
            }),
            _ => Err(Error::structural(format!(
                "chunk at offset {} overruns its parent ({} bytes, {} available)",
                pos,
                size,
                limit - payload
            ))),
        }
    }

    fn find_chunk(&mut self, name: &str) -> Result<Option<(usize, usize)>, Error> {
        let frame = self.top()?;
        let (start, end, origin) = (frame.start, frame.end, frame.cursor);
        let mut pos = origin;
        let mut wrapped = false;
        loop {
            if wrapped && pos >= origin {
                return Ok(None);
            }
            if pos >= end {
                if wrapped || origin == start {
                    return Ok(None);
                }
                wrapped = true;
                pos = start;
                continue;
            }
            let header = self.header_at(pos, end, name)?;
            if header.matches {
                self.top_mut()?.cursor = header.end;
                return Ok(Some((header.payload, header.end)));
            }
            pos = header.end;
        }
    }

    fn next_element(&mut self) -> Result<(usize, usize), Error> {
        let frame = self.top()?;
        let (cursor, end) = (frame.cursor, frame.end);
        if cursor >= end {
            return Err(Error::structural(format!(
                "'{}' has fewer elements than declared",
                frame.name
            )));
        }
        let header = self.header_at(cursor, end, "")?;
        self.top_mut()?.cursor = header.end;
        Ok((header.payload, header.end))
    }

    fn locate(&mut self, name: &str) -> Result<Option<(usize, usize)>, Error> {
        if self.top()?.kind == NodeKind::Container {
            self.next_element().map(Some)
        } else {
            self.find_chunk(name)
        }
    }

    fn push_frame(
        &mut self,
        kind: NodeKind,
        name: &str,
        start: usize,
        end: usize,
        fixed: bool,
    ) -> Result<(), Error> {
        self.context.enter(name)?;
        self.stack.push(Frame {
            kind,
            name: name.to_string(),
            start,
            end,
            cursor: start,
            fixed,
        });
        Ok(())
    }

    fn pop_frame(&mut self, kind: NodeKind, name: &str) -> Result<(), Error> {
        if self.stack.len() <= 1 {
            return Err(Error::structural(format!(
                "closing {:?} '{}' with nothing open",
                kind, name
            )));
        }
        let frame = self.top()?;
        if frame.kind != kind || frame.name != name {
            return Err(Error::structural(format!(
                "closing {:?} '{}' while {:?} '{}' is open",
                kind, name, frame.kind, frame.name
            )));
        }
        if kind == NodeKind::Container && !frame.fixed && frame.cursor != frame.end {
            return Err(Error::structural(format!(
                "container '{}' closed with {} unread bytes",
                name,
                frame.end - frame.cursor
            )));
        }
        self.stack.pop();
        self.context.leave();
        Ok(())
    }

    fn read_i32(&self, name: &str, start: usize, end: usize) -> Result<i32, Error> {
        if end - start != 4 {
            return Err(Error::structural(format!(
                "'{}' holds {} bytes, expected 4",
                name,
                end - start
            )));
        }
        Reader::new(&self.data[start..end]).read_i32()
    }
}

impl Archive for BinaryIArchive<'_> {
    fn is_input(&self) -> bool {
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
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        if end - start != value.width() {
            return Err(Error::structural(format!(
                "'{}' holds {} bytes, a {} needs {}",
                name,
                end - start,
                value.kind_name(),
                value.width()
            )));
        }
        value.read_le(&mut Reader::new(&self.data[start..end]))?;
        Ok(true)
    }

    fn process_string(&mut self, value: &mut String, name: &str, _: &str) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        let text = std::str::from_utf8(&self.data[start..end])
            .map_err(|e| Error::structural(format!("'{}' is not UTF-8: {e}", name)))?;
        value.clear();
        value.push_str(text);
        Ok(true)
    }

    fn process_enum(
        &mut self,
        value: &mut i32,
        _key: &EnumKey,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        *value = self.read_i32(name, start, end)?;
        Ok(true)
    }

    fn process_bit_vector(
        &mut self,
        bits: &mut i32,
        _key: &EnumKey,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        *bits = self.read_i32(name, start, end)?;
        Ok(true)
    }

    fn process_binary(&mut self, data: &mut Vec<u8>, name: &str, _: &str) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        let mut reader = Reader::new(&self.data[start..end]);
        let expected = reader.read_u32()?;
        let blob = reader.slice_after_cursor();
        let actual = crc32(blob);
        if actual != expected {
            return Err(Error::integrity(format!(
                "blob '{}' has crc {:#010x}, expected {:#010x}",
                name, actual, expected
            )));
        }
        data.clear();
        data.extend_from_slice(blob);
        Ok(true)
    }

    fn open_struct(&mut self, _type_name: &str, name: &str, _: &str) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        self.push_frame(NodeKind::Struct, name, start, end, false)?;
        Ok(true)
    }

    fn close_struct(&mut self, name: &str) -> Result<(), Error> {
        self.pop_frame(NodeKind::Struct, name)
    }

    fn open_container(
        &mut self,
        len: &mut usize,
        fixed: bool,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        let mut reader = Reader::new(&self.data[start..end]);
        let sentinel = reader.read_u32()?;
        if sentinel != CONTAINER_SENTINEL {
            return Err(Error::structural(format!(
                "'{}' is not a container (found {:#010x})",
                name, sentinel
            )));
        }
        let count = reader.read_u32()? as usize;
        let room = end - (start + 8);
        if count.saturating_mul(MIN_CHUNK_SIZE) > room {
            return Err(Error::structural(format!(
                "'{}' declares {} elements in {} bytes",
                name, count, room
            )));
        }
        *len = count;
        self.push_frame(NodeKind::Container, name, start + 8, end, fixed)?;
        Ok(true)
    }

    fn close_container(&mut self, name: &str) -> Result<(), Error> {
        self.pop_frame(NodeKind::Container, name)
    }

    fn process_pointer(
        &mut self,
        ptr: &mut dyn PointerSlot,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        let mut reader = Reader::new(&self.data[start..end]);
        let tag = reader.read_c_str()?.to_string();
        let body = start + reader.get_cursor();
        if tag.is_empty() {
            ptr.set_null();
            return Ok(true);
        }
        if !ptr.is_polymorphic() {
            ptr.prepare(self.registry, "")?;
        } else if tag == PLAIN_POINTER_TAG {
            return Err(Error::structural(format!(
                "'{}' points to a {} but records no type name",
                name,
                ptr.base_name()
            )));
        } else if !input_prepare(ptr, self.registry, &self.context, &tag, name)? {
            return Ok(false);
        }
        self.push_frame(NodeKind::Pointer, name, body, end, false)?;
        ptr.serialize_pointee(self)?;
        self.pop_frame(NodeKind::Pointer, name)?;
        Ok(true)
    }
}
