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

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::archive::{input_prepare, Archive, ArchiveContext, EnumKey, PointerSlot, ScalarMut};
use crate::config::Config;
use crate::error::Error;
use crate::registry::Registry;
use crate::text::lexer::{tokenize, TokenKind, TokenStream};
use crate::types::{NodeKind, TEXT_VERSION_FIELD};
use crate::util::{crc32, read_file, sidecar_path};

/// Token range of one open node; `end` is the closing brace (or the token
/// count for the document root).
struct Frame {
    kind: NodeKind,
    name: String,
    start: usize,
    end: usize,
    cursor: usize,
    fixed: bool,
}

enum Sidecar {
    Missing,
    Memory(Vec<u8>),
    File { path: PathBuf, file: Option<File> },
}

impl Sidecar {
    fn read(&mut self, offset: u64, size: usize) -> Result<Vec<u8>, Error> {
        match self {
            Sidecar::Missing => Err(Error::structural(
                "blob referenced but no sidecar data is available",
            )),
            Sidecar::Memory(bytes) => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX);
                match start.checked_add(size).and_then(|end| bytes.get(start..end)) {
                    Some(blob) => Ok(blob.to_vec()),
                    None => Err(Error::buffer_out_of_bound(start, size, bytes.len())),
                }
            }
            Sidecar::File { path, file } => {
                if file.is_none() {
                    let opened = File::open(&*path).map_err(|e| Error::from(e).at_path(path))?;
                    *file = Some(opened);
                }
                let Some(handle) = file.as_mut() else {
                    return Err(Error::unknown("sidecar handle missing"));
                };
                let available = handle
                    .metadata()
                    .map_err(|e| Error::from(e).at_path(path))?
                    .len();
                let fits = u64::try_from(size)
                    .ok()
                    .and_then(|size| offset.checked_add(size))
                    .is_some_and(|end| end <= available);
                if !fits {
                    return Err(Error::structural(format!(
                        "blob of {} bytes at {} overruns a sidecar of {} bytes",
                        size, offset, available
                    ))
                    .at_path(path));
                }
                log::trace!("reading {} blob bytes at {} from {}", size, offset, path.display());
                let mut blob = vec![0u8; size];
                handle
                    .seek(SeekFrom::Start(offset))
                    .and_then(|_| handle.read_exact(&mut blob))
                    .map_err(|e| Error::from(e).at_path(path))?;
                Ok(blob)
            }
        }
    }
}

/// Reads the text format written by [`TextOArchive`](super::TextOArchive).
///
/// A field is looked up by scanning its enclosing block from the cursor,
/// skipping every other value whole, and wrapping to the block start once.
/// Fields the reader never asks for are never parsed beyond brace matching.
pub struct TextIArchive<'r> {
    registry: &'r Registry,
    context: ArchiveContext,
    stream: TokenStream,
    stack: Vec<Frame>,
    sidecar: Sidecar,
    source: String,
    version: Option<i32>,
}

impl<'r> TextIArchive<'r> {
    /// Parses an in-memory document. Blobs need [`with_sidecar`](Self::with_sidecar).
    pub fn from_str(registry: &'r Registry, text: &str) -> Result<TextIArchive<'r>, Error> {
        Self::build(registry, text, "<memory>".to_string(), Sidecar::Missing)
    }

    /// Opens `path`; blobs are read lazily from the `.bin` file beside it.
    pub fn open(registry: &'r Registry, path: &Path) -> Result<TextIArchive<'r>, Error> {
        let bytes = read_file(path)?;
        let text = String::from_utf8(bytes)
            .map_err(|e| Error::structural(format!("invalid UTF-8: {e}")).at_path(path))?;
        let sidecar = Sidecar::File {
            path: sidecar_path(path),
            file: None,
        };
        log::debug!("opened text archive {}", path.display());
        Self::build(registry, &text, path.display().to_string(), sidecar)
            .map_err(|e| e.at_path(path))
    }

    fn build(
        registry: &'r Registry,
        text: &str,
        source: String,
        sidecar: Sidecar,
    ) -> Result<TextIArchive<'r>, Error> {
        let stream = tokenize(text)?;
        let root = Frame {
            kind: NodeKind::Struct,
            name: String::new(),
            start: 0,
            end: stream.len(),
            cursor: 0,
            fixed: false,
        };
        let mut archive = TextIArchive {
            registry,
            context: ArchiveContext::default(),
            stream,
            stack: vec![root],
            sidecar,
            source,
            version: None,
        };
        if let Some((start, end)) = archive.find_field(TEXT_VERSION_FIELD)? {
            let mut version = 0i32;
            ScalarMut::I32(&mut version).parse_text(&archive.joined(start, end))?;
            archive.version = Some(version);
        }
        Ok(archive)
    }

    pub fn with_sidecar(mut self, bytes: Vec<u8>) -> Self {
        self.sidecar = Sidecar::Memory(bytes);
        self
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

    /// Version recorded at the top of the document, if any.
    pub fn version(&self) -> Option<i32> {
        self.version
    }

    fn error_at(&self, index: usize, msg: impl std::fmt::Display) -> Error {
        Error::structural(format!(
            "{}:{}: {}",
            self.source,
            self.stream.line(index),
            msg
        ))
    }

    fn top(&self) -> Result<&Frame, Error> {
        self.stack
            .last()
            .ok_or_else(|| Error::structural("no open node"))
    }

    fn top_mut(&mut self) -> Result<&mut Frame, Error> {
        self.stack
            .last_mut()
            .ok_or_else(|| Error::structural("no open node"))
    }

    /// End of the value starting at `pos`: the index of its terminator or `end`.
    fn skip_value(&self, pos: usize, end: usize) -> Result<usize, Error> {
        let mut i = pos;
        while i < end {
            let Some(token) = self.stream.get(i) else {
                break;
            };
            if token.is_op("{") {
                match self.stream.matching(i) {
                    Some(close) => i = close + 1,
                    None => return Err(self.error_at(i, "unmatched '{'")),
                }
                continue;
            }
            if token.is_op(";") || token.is_op(",") || token.is_op("}") {
                break;
            }
            i += 1;
        }
        if i == pos {
            return Err(self.error_at(pos, "missing value"));
        }
        Ok(i)
    }

    /// Index just past the terminator following a value.
    fn after_terminator(&self, value_end: usize, end: usize) -> Result<usize, Error> {
        if value_end >= end {
            return Ok(end);
        }
        match self.stream.get(value_end) {
            Some(t) if t.is_op(";") || t.is_op(",") => Ok(value_end + 1),
            Some(t) => Err(self.error_at(
                value_end,
                format!("expected ';' after value, found '{}'", t.source_text()),
            )),
            None => Ok(end),
        }
    }

    /// Parses `name = value ;` at `pos`, returning the name and value range.
    fn field_at(&self, pos: usize, end: usize) -> Result<(&str, usize, usize, usize), Error> {
        let name = match self.stream.get(pos) {
            Some(t) if matches!(t.kind, TokenKind::Ident | TokenKind::Str) => t.text.as_str(),
            Some(t) => {
                return Err(self.error_at(pos, format!("expected a field name, found '{}'", t.source_text())))
            }
            None => return Err(self.error_at(pos, "expected a field name")),
        };
        match self.stream.get(pos + 1) {
            Some(t) if pos + 1 < end && t.is_op("=") => {}
            _ => return Err(self.error_at(pos, format!("expected '=' after '{}'", name))),
        }
        let value_start = pos + 2;
        let value_end = self.skip_value(value_start, end)?;
        let next = self.after_terminator(value_end, end)?;
        Ok((name, value_start, value_end, next))
    }

    /// Finds `name` in the open block, scanning from the cursor and wrapping
    /// once. The cursor moves past the field when found and stays put otherwise.
    fn find_field(&mut self, name: &str) -> Result<Option<(usize, usize)>, Error> {
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
            let (field, value_start, value_end, next) = self.field_at(pos, end)?;
            if field == name {
                self.top_mut()?.cursor = next;
                return Ok(Some((value_start, value_end)));
            }
            pos = next;
        }
    }

    fn next_element(&mut self) -> Result<(usize, usize), Error> {
        let frame = self.top()?;
        let (cursor, end, name) = (frame.cursor, frame.end, frame.name.clone());
        if cursor >= end {
            return Err(self.error_at(
                cursor,
                format!("'{}' has fewer elements than declared", name),
            ));
        }
        let value_end = self.skip_value(cursor, end)?;
        let next = self.after_terminator(value_end, end)?;
        self.top_mut()?.cursor = next;
        Ok((cursor, value_end))
    }

    /// Locates the value for `name`: the next element inside a container,
    /// a field lookup anywhere else.
    fn locate(&mut self, name: &str) -> Result<Option<(usize, usize)>, Error> {
        if self.top()?.kind == NodeKind::Container {
            self.next_element().map(Some)
        } else {
            self.find_field(name)
        }
    }

    fn joined(&self, start: usize, end: usize) -> String {
        (start..end)
            .filter_map(|i| self.stream.get(i))
            .map(|t| t.text.as_str())
            .collect()
    }

    fn single(&self, start: usize, end: usize, what: &str) -> Result<(TokenKind, &str), Error> {
        match self.stream.get(start) {
            Some(t) if end == start + 1 => Ok((t.kind, t.text.as_str())),
            _ => Err(self.error_at(start, format!("expected a single {} token", what))),
        }
    }

    fn push_block(
        &mut self,
        kind: NodeKind,
        name: &str,
        brace: usize,
        value_end: usize,
    ) -> Result<(), Error> {
        match self.stream.get(brace) {
            Some(t) if t.is_op("{") => {}
            _ => return Err(self.error_at(brace, format!("expected '{{' to open '{}'", name))),
        }
        let close = match self.stream.matching(brace) {
            Some(close) if close + 1 == value_end => close,
            _ => {
                return Err(self.error_at(
                    brace,
                    format!("unexpected tokens after the block of '{}'", name),
                ))
            }
        };
        self.context.enter(name)?;
        self.stack.push(Frame {
            kind,
            name: name.to_string(),
            start: brace + 1,
            end: close,
            cursor: brace + 1,
            fixed: false,
        });
        Ok(())
    }

    fn pop_block(&mut self, kind: NodeKind, name: &str) -> Result<(), Error> {
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
        if kind == NodeKind::Container && !frame.fixed && frame.cursor < frame.end {
            return Err(self.error_at(
                frame.cursor,
                format!("'{}' has more elements than declared", name),
            ));
        }
        self.stack.pop();
        self.context.leave();
        Ok(())
    }

    fn read_blob(&mut self, name: &str, start: usize, end: usize) -> Result<Vec<u8>, Error> {
        self.push_block(NodeKind::Struct, name, start, end)?;
        let mut fields = [0u64; 3];
        for (slot, field) in fields.iter_mut().zip(["offset", "size", "crc"]) {
            let Some((s, e)) = self.find_field(field)? else {
                return Err(self.error_at(start, format!("blob '{}' has no {}", name, field)));
            };
            ScalarMut::U64(slot).parse_text(&self.joined(s, e))?;
        }
        self.pop_block(NodeKind::Struct, name)?;
        let [offset, size, crc] = fields;
        let size = usize::try_from(size)
            .map_err(|_| self.error_at(start, format!("blob '{}' is too large", name)))?;
        let blob = self.sidecar.read(offset, size)?;
        let actual = crc32(&blob);
        if u64::from(actual) != crc {
            return Err(Error::integrity(format!(
                "{}: blob '{}' has crc {:#010x}, expected {:#010x}",
                self.source, name, actual, crc
            )));
        }
        Ok(blob)
    }
}

impl Archive for TextIArchive<'_> {
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
        value
            .parse_text(&self.joined(start, end))
            .map_err(|e| self.error_at(start, format!("'{}': {}", name, e)))?;
        Ok(true)
    }

    fn process_string(&mut self, value: &mut String, name: &str, _: &str) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        match self.single(start, end, "string")? {
            (TokenKind::Str | TokenKind::Ident, text) => *value = text.to_string(),
            _ => return Err(self.error_at(start, format!("'{}' is not a string", name))),
        }
        Ok(true)
    }

    fn process_enum(
        &mut self,
        value: &mut i32,
        key: &EnumKey,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        let text = self.joined(start, end);
        *value = match self.stream.get(start).map(|t| t.kind) {
            Some(TokenKind::Number) | Some(TokenKind::Op) => {
                let mut raw = 0i32;
                ScalarMut::I32(&mut raw).parse_text(&text)?;
                raw
            }
            _ => {
                let descriptor = self.registry.descriptor_for(key);
                if descriptor.find_value(&text).is_none() && descriptor.is_ignore_errors() {
                    log::warn!("'{}': '{}' is not a member of {}", name, text, key.type_name);
                    return Ok(true);
                }
                descriptor.value_of(&text)?
            }
        };
        Ok(true)
    }

    fn process_bit_vector(
        &mut self,
        bits: &mut i32,
        key: &EnumKey,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        *bits = match self.single(start, end, "number") {
            Ok((TokenKind::Number, text)) => {
                let mut raw = 0i32;
                ScalarMut::I32(&mut raw).parse_text(text)?;
                raw
            }
            _ => self
                .registry
                .descriptor_for(key)
                .combination_value(&self.joined(start, end), "|")?,
        };
        Ok(true)
    }

    fn process_binary(&mut self, data: &mut Vec<u8>, name: &str, _: &str) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        *data = self.read_blob(name, start, end)?;
        Ok(true)
    }

    fn open_struct(&mut self, _type_name: &str, name: &str, _: &str) -> Result<bool, Error> {
        let Some((start, end)) = self.locate(name)? else {
            return Ok(false);
        };
        self.push_block(NodeKind::Struct, name, start, end)?;
        Ok(true)
    }

    fn close_struct(&mut self, name: &str) -> Result<(), Error> {
        self.pop_block(NodeKind::Struct, name)
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
        self.push_block(NodeKind::Container, name, start, end)?;
        self.top_mut()?.fixed = fixed;
        let frame = self.top()?;
        let (first, close) = (frame.start, frame.end);
        if first >= close {
            *len = 0;
            return Ok(true);
        }
        let count_end = self.skip_value(first, close)?;
        let count: usize = self
            .joined(first, count_end)
            .parse()
            .map_err(|_| self.error_at(first, format!("'{}' has no element count", name)))?;
        let next = self.after_terminator(count_end, close)?;
        // every element takes at least one token
        if count > close - next {
            return Err(self.error_at(
                first,
                format!("'{}' declares {} elements in {} tokens", name, count, close - next),
            ));
        }
        *len = count;
        self.top_mut()?.cursor = next;
        Ok(true)
    }

    fn close_container(&mut self, name: &str) -> Result<(), Error> {
        self.pop_block(NodeKind::Container, name)
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
        let Some(first) = self.stream.get(start) else {
            return Err(self.error_at(start, "missing value"));
        };
        if first.kind == TokenKind::Number && end == start + 1 {
            if first.text != "0" {
                return Err(self.error_at(start, format!("'{}': pointer must be 0 or a block", name)));
            }
            ptr.set_null();
            return Ok(true);
        }
        let brace = if first.kind == TokenKind::Str {
            let tag = first.text.clone();
            if ptr.is_polymorphic()
                && !input_prepare(ptr, self.registry, &self.context, &tag, name)?
            {
                return Ok(false);
            }
            start + 1
        } else {
            if ptr.is_polymorphic() {
                return Err(self.error_at(start, format!("'{}' has no type name", name)));
            }
            start
        };
        if !ptr.is_polymorphic() {
            ptr.prepare(self.registry, "")?;
        }
        self.push_block(NodeKind::Pointer, name, brace, end)?;
        ptr.serialize_pointee(self)?;
        self.pop_block(NodeKind::Pointer, name)?;
        Ok(true)
    }
}
