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
use crate::buffer::{Reader, Writer};
use crate::config::Config;
use crate::error::Error;
use crate::registry::Registry;
use crate::structural;
use crate::types::{
    NodeKind, IN_PLACE_VERSION, NULL_OFFSET, POINTER_SLOT_SIZE, RANGE_SLOT_SIZE, STRING_SLOT_SIZE,
};
use crate::util::{crc32, write_file};

/// A `(start, end)` pair to be filled in once blocks have their final offsets.
struct Link {
    block: usize,
    pair: usize,
    target: usize,
    with_capacity: bool,
}

struct TypeFixup {
    block: usize,
    slot: usize,
    name: String,
}

struct OpenNode {
    kind: NodeKind,
    name: String,
    block: usize,
}

/// Writes a positional image that loads with two table passes and no parsing.
///
/// Values are appended to the block of the innermost open node. Strings,
/// containers, blobs and pointees get a block of their own, referenced from a
/// fixed-size slot in the parent. Blocks are laid out in creation order, so
/// every block follows its parent.
pub struct InPlaceOArchive<'r> {
    registry: &'r Registry,
    context: ArchiveContext,
    blocks: Vec<Writer>,
    links: Vec<Link>,
    fixups: Vec<TypeFixup>,
    stack: Vec<OpenNode>,
}

impl<'r> InPlaceOArchive<'r> {
    pub fn new(registry: &'r Registry) -> InPlaceOArchive<'r> {
        InPlaceOArchive {
            registry,
            context: ArchiveContext::default(),
            blocks: vec![Writer::new()],
            links: Vec::new(),
            fixups: Vec::new(),
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

    fn current(&self) -> usize {
        self.stack.last().map(|node| node.block).unwrap_or(0)
    }

    fn current_writer(&mut self) -> &mut Writer {
        let block = self.current();
        &mut self.blocks[block]
    }

    fn new_block(&mut self) -> usize {
        self.blocks.push(Writer::new());
        self.blocks.len() - 1
    }

    /// Reserves a slot in the current block and links its range to a new block.
    fn linked_slot(
        &mut self,
        slot_size: usize,
        pair_offset: usize,
        with_capacity: bool,
    ) -> (usize, usize) {
        let block = self.current();
        let slot = self.blocks[block].skip(slot_size);
        let target = self.new_block();
        self.links.push(Link {
            block,
            pair: slot + pair_offset,
            target,
            with_capacity,
        });
        (slot, target)
    }

    fn push(&mut self, kind: NodeKind, name: &str, block: usize) -> Result<(), Error> {
        self.context.enter(name)?;
        self.stack.push(OpenNode {
            kind,
            name: name.to_string(),
            block,
        });
        Ok(())
    }

    fn pop(&mut self, kind: NodeKind, name: &str) -> Result<(), Error> {
        match self.stack.pop() {
            Some(open) if open.kind == kind && open.name == name => {
                self.context.leave();
                Ok(())
            }
            Some(open) => Err(Error::structural(format!(
                "closing {:?} '{}' while {:?} '{}' is open",
                kind, name, open.kind, open.name
            ))),
            None => Err(Error::structural(format!(
                "closing {:?} '{}' with nothing open",
                kind, name
            ))),
        }
    }

    /// Lays out the blocks and serializes body and tables.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        if let Some(open) = self.stack.last() {
            structural!("{:?} '{}' is still open", open.kind, open.name);
        }
        let mut offsets = Vec::with_capacity(self.blocks.len());
        let mut body = Writer::new();
        for block in &self.blocks {
            offsets.push(body.len());
            body.write_bytes(block.as_slice());
        }
        if body.len() >= NULL_OFFSET as usize || body.len() > i32::MAX as usize {
            structural!("in-place body of {} bytes is too large", body.len());
        }

        let mut relocations = Vec::with_capacity(self.links.len());
        for link in &self.links {
            let pair = offsets[link.block] + link.pair;
            let start = offsets[link.target];
            let end = start + self.blocks[link.target].len();
            body.set_u32(pair, start as u32)?;
            body.set_u32(pair + 4, end as u32)?;
            if link.with_capacity {
                body.set_u32(pair + 8, end as u32)?;
            }
            relocations.push(pair as i32);
        }

        let mut file = Writer::new();
        file.write_i32(IN_PLACE_VERSION);
        file.write_i32(body.len() as i32);
        file.write_bytes(body.as_slice());
        file.write_i32(relocations.len() as i32);
        for offset in relocations {
            file.write_i32(offset);
        }
        file.write_i32(self.fixups.len() as i32);
        for fixup in &self.fixups {
            file.write_i32((offsets[fixup.block] + fixup.slot) as i32);
            file.write_c_str(&fixup.name);
        }
        Ok(file.into_inner())
    }

    /// CRC-32 of the image [`to_bytes`](Self::to_bytes) produces.
    pub fn crc(&self) -> Result<u32, Error> {
        Ok(crc32(&self.to_bytes()?))
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let bytes = self.to_bytes().map_err(|e| e.at_path(path))?;
        write_file(path, &bytes)?;
        log::debug!(
            "saved in-place archive {} ({} bytes, {} relocations, {} type fixups)",
            path.display(),
            bytes.len(),
            self.links.len(),
            self.fixups.len()
        );
        Ok(())
    }
}

impl Archive for InPlaceOArchive<'_> {
    fn is_input(&self) -> bool {
        false
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

    fn process_scalar(&mut self, value: ScalarMut<'_>, _: &str, _: &str) -> Result<bool, Error> {
        value.write_le(self.current_writer());
        Ok(true)
    }

    fn process_string(&mut self, value: &mut String, _: &str, _: &str) -> Result<bool, Error> {
        let (_, target) = self.linked_slot(STRING_SLOT_SIZE, 0, true);
        self.blocks[target].write_bytes(value.as_bytes());
        Ok(true)
    }

    fn process_enum(
        &mut self,
        value: &mut i32,
        _key: &EnumKey,
        _: &str,
        _: &str,
    ) -> Result<bool, Error> {
        self.current_writer().write_i32(*value);
        Ok(true)
    }

    fn process_bit_vector(
        &mut self,
        bits: &mut i32,
        _key: &EnumKey,
        _: &str,
        _: &str,
    ) -> Result<bool, Error> {
        self.current_writer().write_i32(*bits);
        Ok(true)
    }

    fn process_binary(&mut self, data: &mut Vec<u8>, _: &str, _: &str) -> Result<bool, Error> {
        let (_, target) = self.linked_slot(RANGE_SLOT_SIZE, 0, false);
        self.blocks[target].write_bytes(data);
        Ok(true)
    }

    fn open_struct(&mut self, _type_name: &str, name: &str, _: &str) -> Result<bool, Error> {
        let block = self.current();
        self.push(NodeKind::Struct, name, block)?;
        Ok(true)
    }

    fn close_struct(&mut self, name: &str) -> Result<(), Error> {
        self.pop(NodeKind::Struct, name)
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
        let (_, target) = self.linked_slot(RANGE_SLOT_SIZE, 0, false);
        self.blocks[target].write_u32(count);
        self.push(NodeKind::Container, name, target)?;
        Ok(true)
    }

    fn close_container(&mut self, name: &str) -> Result<(), Error> {
        if let Some(open) = self.stack.last().filter(|n| n.kind == NodeKind::Container) {
            let block = &self.blocks[open.block];
            let count = Reader::new(block.as_slice()).read_u32()? as usize;
            // readers bound the element count by the block size
            if block.len() - 4 < count {
                structural!("elements of '{}' take no space in an in-place image", name);
            }
        }
        self.pop(NodeKind::Container, name)
    }

    fn process_pointer(
        &mut self,
        ptr: &mut dyn PointerSlot,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let Some(tag) = output_tag(ptr, self.registry, &self.context, name)? else {
            let writer = self.current_writer();
            writer.write_u32(0);
            writer.write_u32(NULL_OFFSET);
            writer.write_u32(NULL_OFFSET);
            return Ok(true);
        };
        let block = self.current();
        let (slot, target) = self.linked_slot(POINTER_SLOT_SIZE, 4, false);
        if ptr.is_polymorphic() {
            self.fixups.push(TypeFixup {
                block,
                slot,
                name: tag.name,
            });
        }
        self.push(NodeKind::Pointer, name, target)?;
        ptr.serialize_pointee(self)?;
        self.pop(NodeKind::Pointer, name)?;
        Ok(true)
    }
}
