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
use crate::config::Config;
use crate::error::Error;
use crate::registry::Registry;
use crate::types::{NodeKind, TEXT_VERSION_FIELD};
use crate::util::{crc32, is_identifier, sidecar_path, write_file};

pub(crate) fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            '\0' => quoted.push_str("\\0"),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn symbol(name: &str) -> String {
    if is_identifier(name) {
        name.to_string()
    } else {
        quote(name)
    }
}

/// Writes values as the brace-delimited, human-editable text format.
///
/// ```text
/// __version = 1;
/// ring = {
///     name = "Ring1";
///     values = {
///         2,
///         10,
///         20,
///     };
///     shape = "Circle" {
///         radius = 1.5;
///     };
/// };
/// ```
///
/// Blobs are appended to a sidecar buffer saved next to the text under the
/// same base name with the extension `.bin`.
pub struct TextOArchive<'r> {
    registry: &'r Registry,
    context: ArchiveContext,
    buffer: String,
    sidecar: Vec<u8>,
    stack: Vec<(NodeKind, String)>,
}

impl<'r> TextOArchive<'r> {
    pub fn new(registry: &'r Registry) -> TextOArchive<'r> {
        let mut archive = TextOArchive {
            registry,
            context: ArchiveContext::default(),
            buffer: String::new(),
            sidecar: Vec::new(),
            stack: Vec::new(),
        };
        archive.write_header();
        archive
    }

    /// Replaces the configuration. Call before serializing anything.
    pub fn config(mut self, config: Config) -> Self {
        self.context.set_config(config);
        self.write_header();
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

    pub fn version(mut self, version: i32) -> Self {
        self.context.config_mut().version = version;
        self.write_header();
        self
    }

    fn write_header(&mut self) {
        self.buffer.clear();
        self.buffer.push_str(TEXT_VERSION_FIELD);
        self.buffer.push_str(" = ");
        self.buffer.push_str(&self.context.config().version().to_string());
        self.buffer.push_str(";\n");
    }

    pub fn as_str(&self) -> &str {
        &self.buffer
    }

    pub fn into_string(self) -> String {
        self.buffer
    }

    /// Blob bytes referenced by the text.
    pub fn sidecar(&self) -> &[u8] {
        &self.sidecar
    }

    /// Text and sidecar bytes, once every node has been closed.
    pub fn finish(self) -> Result<(String, Vec<u8>), Error> {
        self.check_closed()?;
        Ok((self.buffer, self.sidecar))
    }

    /// Writes the text to `path` and, when blobs were written, the `.bin`
    /// sidecar beside it.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        self.check_closed().map_err(|e| e.at_path(path))?;
        write_file(path, self.buffer.as_bytes())?;
        if !self.sidecar.is_empty() {
            write_file(&sidecar_path(path), &self.sidecar)?;
        }
        log::debug!(
            "saved text archive {} ({} bytes, {} blob bytes)",
            path.display(),
            self.buffer.len(),
            self.sidecar.len()
        );
        Ok(())
    }

    fn check_closed(&self) -> Result<(), Error> {
        match self.stack.last() {
            Some((kind, name)) => Err(Error::structural(format!(
                "{:?} '{}' is still open",
                kind, name
            ))),
            None => Ok(()),
        }
    }

    fn in_container(&self) -> bool {
        matches!(self.stack.last(), Some((NodeKind::Container, _)))
    }

    fn write_indent(&mut self) {
        let width = self.stack.len() * self.context.config().indent;
        for _ in 0..width {
            self.buffer.push('\t');
        }
    }

    fn begin_field(&mut self, name: &str) -> Result<(), Error> {
        let in_container = self.in_container();
        if !in_container {
            if name.is_empty() {
                return Err(Error::invalid_name("empty field name outside a container"));
            }
            if let Some(c) = self.context.config().denied_char(name) {
                return Err(Error::invalid_name(format!(
                    "'{}' contains the character {:?}",
                    name, c
                )));
            }
        }
        self.write_indent();
        if !in_container {
            self.buffer.push_str(&symbol(name));
            self.buffer.push_str(" = ");
        }
        Ok(())
    }

    fn end_field(&mut self) {
        if self.in_container() {
            self.buffer.push_str(",\n");
        } else {
            self.buffer.push_str(";\n");
        }
    }

    fn write_field(&mut self, name: &str, value: &str) -> Result<bool, Error> {
        self.begin_field(name)?;
        self.buffer.push_str(value);
        self.end_field();
        Ok(true)
    }

    fn open_node(&mut self, kind: NodeKind, name: &str) -> Result<(), Error> {
        self.context.enter(name)?;
        self.buffer.push_str("{\n");
        self.stack.push((kind, name.to_string()));
        Ok(())
    }

    fn close_node(&mut self, kind: NodeKind, name: &str) -> Result<(), Error> {
        match self.stack.pop() {
            Some((open_kind, open_name)) if open_kind == kind && open_name == name => {}
            Some((open_kind, open_name)) => {
                return Err(Error::structural(format!(
                    "closing {:?} '{}' while {:?} '{}' is open",
                    kind, name, open_kind, open_name
                )))
            }
            None => {
                return Err(Error::structural(format!(
                    "closing {:?} '{}' with nothing open",
                    kind, name
                )))
            }
        }
        self.context.leave();
        self.write_indent();
        self.buffer.push('}');
        self.end_field();
        Ok(())
    }
}

impl Archive for TextOArchive<'_> {
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
        self.write_field(name, &value.to_text())
    }

    fn process_string(&mut self, value: &mut String, name: &str, _: &str) -> Result<bool, Error> {
        self.write_field(name, &quote(value))
    }

    fn process_enum(
        &mut self,
        value: &mut i32,
        key: &EnumKey,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let descriptor = self.registry.descriptor_for(key);
        let text = match descriptor.name_of(*value)? {
            "" => value.to_string(),
            symbol_name => symbol(symbol_name),
        };
        self.write_field(name, &text)
    }

    fn process_bit_vector(
        &mut self,
        bits: &mut i32,
        key: &EnumKey,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let descriptor = self.registry.descriptor_for(key);
        let combination = descriptor.combination_name(*bits, "|")?;
        let text = if combination.is_empty() {
            "0".to_string()
        } else {
            combination
                .split('|')
                .map(symbol)
                .collect::<Vec<_>>()
                .join(" | ")
        };
        self.write_field(name, &text)
    }

    fn process_binary(&mut self, data: &mut Vec<u8>, name: &str, _: &str) -> Result<bool, Error> {
        let offset = self.sidecar.len();
        self.sidecar.extend_from_slice(data);
        let text = format!(
            "{{ offset = {}; size = {}; crc = {}; }}",
            offset,
            data.len(),
            crc32(data)
        );
        self.write_field(name, &text)
    }

    fn open_struct(&mut self, _type_name: &str, name: &str, _: &str) -> Result<bool, Error> {
        self.begin_field(name)?;
        self.open_node(NodeKind::Struct, name)?;
        Ok(true)
    }

    fn close_struct(&mut self, name: &str) -> Result<(), Error> {
        self.close_node(NodeKind::Struct, name)
    }

    fn open_container(
        &mut self,
        len: &mut usize,
        _fixed: bool,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        self.begin_field(name)?;
        self.open_node(NodeKind::Container, name)?;
        self.write_indent();
        self.buffer.push_str(&len.to_string());
        self.buffer.push_str(",\n");
        Ok(true)
    }

    fn close_container(&mut self, name: &str) -> Result<(), Error> {
        self.close_node(NodeKind::Container, name)
    }

    fn process_pointer(
        &mut self,
        ptr: &mut dyn PointerSlot,
        name: &str,
        _: &str,
    ) -> Result<bool, Error> {
        let Some(tag) = output_tag(ptr, self.registry, &self.context, name)? else {
            return self.write_field(name, "0");
        };
        self.begin_field(name)?;
        if ptr.is_polymorphic() {
            self.buffer.push_str(&quote(&tag.name));
            self.buffer.push(' ');
        }
        self.open_node(NodeKind::Pointer, name)?;
        ptr.serialize_pointee(self)?;
        self.close_node(NodeKind::Pointer, name)?;
        Ok(true)
    }
}
