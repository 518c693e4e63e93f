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

use crate::archive::{output_tag, Archive, ArchiveContext, EnumKey, PointerSlot, ScalarMut};
use crate::buffer::Writer;
use crate::config::Config;
use crate::error::Error;
use crate::registry::Registry;
use crate::types::{
    NodeKind, BINARY_MAGIC, CHUNK_SIZE_ESCAPE, CONTAINER_SENTINEL, PLAIN_POINTER_TAG,
};
use crate::util::{crc32, write_file};

struct OpenChunk {
    kind: NodeKind,
    name: String,
    size_slot: usize,
}

/// Writes values as nested `name NUL size payload` chunks.
pub struct BinaryOArchive<'r> {
    registry: &'r Registry,
    context: ArchiveContext,
    writer: Writer,
    stack: Vec<OpenChunk>,
}

impl<'r> BinaryOArchive<'r> {
    pub fn new(registry: &'r Registry) -> BinaryOArchive<'r> {
        let mut writer = Writer::new();
        writer.write_bytes(&BINARY_MAGIC);
        BinaryOArchive {
            registry,
            context: ArchiveContext::default(),
            writer,
            stack: Vec::new(),
        }
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

    pub fn as_bytes(&self) -> &[u8] {
        self.writer.as_slice()
    }

    /// CRC-32 of everything written so far, magic included.
    pub fn crc(&self) -> u32 {
        crc32(self.writer.as_slice())
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, Error> {
        self.check_closed()?;
        Ok(self.writer.into_inner())
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        self.check_closed().map_err(|e| e.at_path(path))?;
        write_file(path, self.writer.as_slice())?;
        log::debug!(
            "saved binary archive {} ({} bytes)",
            path.display(),
            self.writer.len()
        );
        Ok(())
    }

    fn check_closed(&self) -> Result<(), Error> {
        match self.stack.last() {
            Some(open) => Err(Error::structural(format!(
                "{:?} '{}' is still open",
                open.kind, open.name
            ))),
            None => Ok(()),
        }
    }

    /// Writes the chunk header and returns the offset of its size slot.
    fn begin_chunk(&mut self, name: &str) -> Result<usize, Error> {
        let in_container = matches!(
            self.stack.last(),
            Some(OpenChunk {
                kind: NodeKind::Container,
                ..
            })
        );
        if in_container {
            self.writer.write_u8(0);
        } else {
            if name.contains('\0') {
                return Err(Error::invalid_name(format!(
                    "'{}' contains a NUL byte",
                    name.escape_debug()
                )));
            }
            self.writer.write_c_str(name);
        }
        Ok(self.writer.skip(2))
    }

    /// Patches the size slot now that the payload is complete.
    fn end_chunk(&mut self, size_slot: usize) -> Result<(), Error> {
        let size = self.writer.len() - size_slot - 2;
        if size < CHUNK_SIZE_ESCAPE as usize {
            return self.writer.set_u16(size_slot, size as u16);
        }
        let size = u32::try_from(size)
            .map_err(|_| Error::structural(format!("chunk of {} bytes is too large", size)))?;
        self.writer.set_u16(size_slot, CHUNK_SIZE_ESCAPE)?;
        self.writer.insert_bytes(size_slot + 2, &size.to_le_bytes())
    }

    fn write_chunk(&mut self, name: &str, payload: &[u8]) -> Result<bool, Error> {
        let slot = self.begin_chunk(name)?;
        self.writer.write_bytes(payload);
        self.end_chunk(slot)?;
        Ok(true)
    }

    fn open_chunk(&mut self, kind: NodeKind, name: &str) -> Result<(), Error> {
        self.context.enter(name)?;
        let size_slot = self.begin_chunk(name)?;
        self.stack.push(OpenChunk {
            kind,
            name: name.to_string(),
            size_slot,
        });
        Ok(())
    }

    fn close_chunk(&mut self, kind: NodeKind, name: &str) -> Result<(), Error> {
        let open = match self.stack.pop() {
            Some(open) if open.kind == kind && open.name == name => open,
            Some(open) => {
                return Err(Error::structural(format!(
                    "closing {:?} '{}' while {:?} '{}' is open",
                    kind, name, open.kind, open.name
                )))
            }
            None => {
                return Err(Error::structural(format!(
                    "closing {:?} '{}' with nothing open",
                    kind, name
                )))
            }
        };
        self.context.leave();
        self.end_chunk(open.size_slot)
    }
}

impl Archive for BinaryOArchive<'_> {
    fn is_input(&self) -> bool {
        false
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

    fn process_scalar(&mut self, value: ScalarMut<'_>, name: &str, _: &str) -> Result<bool, Error> {
        let slot = self.begin_chunk(name)?;
        value.write_le(&mut self.writer);
        self.end_chunk(slot)?;
        Ok(true)
    }

    fn process_string(&mut self, value: &mut String, name: &str, _: &str) -> Result<bool, Error> {
        self.write_chunk(name, value.as_bytes())
    }

    fn process_enum(
        &mut self,
        value: &mut i32,
        _key: &EnumKey,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        self.write_chunk(name, &value.to_le_bytes())
    }

    fn process_bit_vector(
        &mut self,
        bits: &mut i32,
        _key: &EnumKey,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        self.write_chunk(name, &bits.to_le_bytes())
    }

    fn process_binary(&mut self, data: &mut Vec<u8>, name: &str, _: &str) -> Result<bool, Error> {
        let slot = self.begin_chunk(name)?;
        self.writer.write_u32(crc32(data));
        self.writer.write_bytes(data);
        self.end_chunk(slot)?;
        Ok(true)
    }

    fn open_struct(&mut self, _type_name: &str, name: &str, _: &str) -> Result<bool, Error> {
        self.open_chunk(NodeKind::Struct, name)?;
        Ok(true)
    }

    fn close_struct(&mut self, name: &str) -> Result<(), Error> {
        self.close_chunk(NodeKind::Struct, name)
    }

    fn open_container(
        &mut self,
        len: &mut usize,
        _fixed: bool,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let count = u32::try_from(*len)
            .map_err(|_| Error::structural(format!("'{}' has too many elements", name)))?;
        self.open_chunk(NodeKind::Container, name)?;
        self.writer.write_u32(CONTAINER_SENTINEL);
        self.writer.write_u32(count);
        Ok(true)
    }

    fn close_container(&mut self, name: &str) -> Result<(), Error> {
        self.close_chunk(NodeKind::Container, name)
    }

    fn process_pointer(
        &mut self,
        ptr: &mut dyn PointerSlot,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let Some(tag) = output_tag(ptr, self.registry, &self.context, name)? else {
            return self.write_chunk(name, &[0]);
        };
        self.open_chunk(NodeKind::Pointer, name)?;
        if ptr.is_polymorphic() {
            self.writer.write_c_str(&tag.name);
        } else {
            self.writer.write_c_str(PLAIN_POINTER_TAG);
        }
        ptr.serialize_pointee(self)?;
        self.close_chunk(NodeKind::Pointer, name)?;
        Ok(true)
    }
}
