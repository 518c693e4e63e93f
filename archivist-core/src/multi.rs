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

//! Text archive with a binary or in-place companion file.
//!
//! Writing fans every call out to the text archive and then to the
//! companion, so both files describe the same values. Reading prefers the
//! companion and falls back to the text file when the companion is missing,
//! older than the text, or fails to load. [`load`] also regenerates the
//! companion after a read from text.

use std::path::{Path, PathBuf};

use crate::archive::{Archive, ArchiveContext, ArchiveExt, EnumKey, PointerSlot, ScalarMut};
use crate::binary::{BinaryIArchive, BinaryOArchive};
use crate::config::Config;
use crate::error::Error;
use crate::in_place::{InPlaceIArchive, InPlaceOArchive};
use crate::registry::Registry;
use crate::serializer::Serialize;
use crate::text::{TextIArchive, TextOArchive};
use crate::types::{BINARY_CACHE_EXTENSION, IN_PLACE_CACHE_EXTENSION};
use crate::util::is_up_to_date;

/// Format of the companion file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Companion {
    Binary,
    InPlace,
}

impl Companion {
    pub fn extension(self) -> &'static str {
        match self {
            Companion::Binary => BINARY_CACHE_EXTENSION,
            Companion::InPlace => IN_PLACE_CACHE_EXTENSION,
        }
    }
}

/// File a [`MultiIArchive`] is reading from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Text,
    Binary,
    InPlace,
}

/// Paths of a text file and its companion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiPaths {
    pub text: PathBuf,
    pub companion: PathBuf,
    pub kind: Companion,
}

impl MultiPaths {
    /// `base.<extension>` and `<dir of base>/<subdirectory>/<stem>.<bin-cache|inplace>`.
    pub fn new(base: &Path, subdirectory: &str, extension: &str, kind: Companion) -> MultiPaths {
        let text = base.with_extension(extension);
        let stem = base.file_stem().unwrap_or_default();
        let mut companion = base.parent().map(Path::to_path_buf).unwrap_or_default();
        if !subdirectory.is_empty() {
            companion.push(subdirectory);
        }
        companion.push(stem);
        companion.set_extension(kind.extension());
        MultiPaths {
            text,
            companion,
            kind,
        }
    }
}

enum CompanionWriter<'r> {
    Binary(BinaryOArchive<'r>),
    InPlace(InPlaceOArchive<'r>),
}

/// Writes a text file and its companion in one pass.
pub struct MultiOArchive<'r> {
    registry: &'r Registry,
    context: ArchiveContext,
    text: TextOArchive<'r>,
    companion: CompanionWriter<'r>,
    paths: MultiPaths,
}

impl<'r> MultiOArchive<'r> {
    pub fn open(
        registry: &'r Registry,
        base: &Path,
        subdirectory: &str,
        extension: &str,
        companion: Companion,
    ) -> MultiOArchive<'r> {
        Self::with_paths(registry, MultiPaths::new(base, subdirectory, extension, companion))
    }

    pub fn with_paths(registry: &'r Registry, paths: MultiPaths) -> MultiOArchive<'r> {
        let companion = match paths.kind {
            Companion::Binary => CompanionWriter::Binary(BinaryOArchive::new(registry)),
            Companion::InPlace => CompanionWriter::InPlace(InPlaceOArchive::new(registry)),
        };
        MultiOArchive {
            registry,
            context: ArchiveContext::default(),
            text: TextOArchive::new(registry),
            companion,
            paths,
        }
    }

    /// Applies `config` to this archive and both backends.
    pub fn config(self, config: Config) -> Self {
        let MultiOArchive {
            registry,
            mut context,
            text,
            companion,
            paths,
        } = self;
        context.set_config(config.clone());
        let companion = match companion {
            CompanionWriter::Binary(ar) => CompanionWriter::Binary(ar.config(config.clone())),
            CompanionWriter::InPlace(ar) => CompanionWriter::InPlace(ar.config(config.clone())),
        };
        MultiOArchive {
            registry,
            context,
            text: text.config(config),
            companion,
            paths,
        }
    }

    pub fn ignore_unregistered_classes(self, ignore: bool) -> Self {
        let mut config = self.context.config().clone();
        config.ignore_unregistered_classes = ignore;
        self.config(config)
    }

    pub fn filter(self, filter: u32) -> Self {
        let mut config = self.context.config().clone();
        config.filter = filter;
        self.config(config)
    }

    pub fn paths(&self) -> &MultiPaths {
        &self.paths
    }

    /// CRC-32 of the companion image written so far.
    pub fn crc(&self) -> Result<u32, Error> {
        match &self.companion {
            CompanionWriter::Binary(ar) => Ok(ar.crc()),
            CompanionWriter::InPlace(ar) => ar.crc(),
        }
    }

    /// Saves the text file, then the companion.
    pub fn close(self) -> Result<(), Error> {
        self.text.save(&self.paths.text)?;
        match &self.companion {
            CompanionWriter::Binary(ar) => ar.save(&self.paths.companion),
            CompanionWriter::InPlace(ar) => ar.save(&self.paths.companion),
        }
    }

    fn companion(&mut self) -> &mut dyn Archive {
        match &mut self.companion {
            CompanionWriter::Binary(ar) => ar,
            CompanionWriter::InPlace(ar) => ar,
        }
    }

    /// Pointees are visited by the inner archives, which need the caller's closure.
    fn share_closure(&mut self) {
        let closure = self.context.shared_closure();
        self.text.context_mut().set_shared_closure(closure.clone());
        self.companion().context_mut().set_shared_closure(closure);
    }
}

impl Archive for MultiOArchive<'_> {
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

    fn process_scalar(
        &mut self,
        mut value: ScalarMut<'_>,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.text.process_scalar(value.reborrow(), name, name_alt)?;
        self.companion().process_scalar(value, name, name_alt)
    }

    fn process_string(
        &mut self,
        value: &mut String,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.text.process_string(value, name, name_alt)?;
        self.companion().process_string(value, name, name_alt)
    }

    fn process_enum(
        &mut self,
        value: &mut i32,
        key: &EnumKey,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.text.process_enum(value, key, name, name_alt)?;
        self.companion().process_enum(value, key, name, name_alt)
    }

    fn process_bit_vector(
        &mut self,
        bits: &mut i32,
        key: &EnumKey,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.text.process_bit_vector(bits, key, name, name_alt)?;
        self.companion().process_bit_vector(bits, key, name, name_alt)
    }

    fn process_binary(
        &mut self,
        data: &mut Vec<u8>,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.text.process_binary(data, name, name_alt)?;
        self.companion().process_binary(data, name, name_alt)
    }

    fn open_struct(&mut self, type_name: &str, name: &str, name_alt: &str) -> Result<bool, Error> {
        self.context.enter(name)?;
        self.text.open_struct(type_name, name, name_alt)?;
        self.companion().open_struct(type_name, name, name_alt)
    }

    fn close_struct(&mut self, name: &str) -> Result<(), Error> {
        self.context.leave();
        self.text.close_struct(name)?;
        self.companion().close_struct(name)
    }

    fn open_container(
        &mut self,
        len: &mut usize,
        fixed: bool,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.context.enter(name)?;
        self.text.open_container(len, fixed, name, name_alt)?;
        self.companion().open_container(len, fixed, name, name_alt)
    }

    fn close_container(&mut self, name: &str) -> Result<(), Error> {
        self.context.leave();
        self.text.close_container(name)?;
        self.companion().close_container(name)
    }

    fn process_pointer(
        &mut self,
        ptr: &mut dyn PointerSlot,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.share_closure();
        self.text.process_pointer(ptr, name, name_alt)?;
        self.companion().process_pointer(ptr, name, name_alt)
    }
}

enum Reading<'r> {
    Text(TextIArchive<'r>),
    Binary(BinaryIArchive<'r>),
    InPlace(InPlaceIArchive<'r>),
}

/// Reads the companion when it is usable, the text file otherwise.
pub struct MultiIArchive<'r> {
    reading: Reading<'r>,
    paths: MultiPaths,
    crc: Option<u32>,
}

impl<'r> MultiIArchive<'r> {
    pub fn open(
        registry: &'r Registry,
        base: &Path,
        subdirectory: &str,
        extension: &str,
        companion: Companion,
        config: Config,
    ) -> Result<MultiIArchive<'r>, Error> {
        Self::with_paths(
            registry,
            MultiPaths::new(base, subdirectory, extension, companion),
            config,
        )
    }

    pub fn with_paths(
        registry: &'r Registry,
        paths: MultiPaths,
        config: Config,
    ) -> Result<MultiIArchive<'r>, Error> {
        if let Some(reading) = open_companion(registry, &paths, &config)? {
            let crc = match &reading {
                Reading::Binary(ar) => Some(ar.crc()),
                Reading::InPlace(ar) => Some(ar.crc()),
                Reading::Text(_) => None,
            };
            log::debug!("reading companion {}", paths.companion.display());
            return Ok(MultiIArchive {
                reading,
                paths,
                crc,
            });
        }
        log::debug!("reading text {}", paths.text.display());
        let text = TextIArchive::open(registry, &paths.text)?.config(config);
        Ok(MultiIArchive {
            reading: Reading::Text(text),
            paths,
            crc: None,
        })
    }

    pub fn source(&self) -> Source {
        match self.reading {
            Reading::Text(_) => Source::Text,
            Reading::Binary(_) => Source::Binary,
            Reading::InPlace(_) => Source::InPlace,
        }
    }

    /// CRC-32 of the companion file, when it is the source.
    pub fn crc(&self) -> Option<u32> {
        self.crc
    }

    pub fn paths(&self) -> &MultiPaths {
        &self.paths
    }

    fn inner(&self) -> &dyn Archive {
        match &self.reading {
            Reading::Text(ar) => ar,
            Reading::Binary(ar) => ar,
            Reading::InPlace(ar) => ar,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Archive {
        match &mut self.reading {
            Reading::Text(ar) => ar,
            Reading::Binary(ar) => ar,
            Reading::InPlace(ar) => ar,
        }
    }
}

fn is_recoverable(err: &Error) -> bool {
    err.is_unregistered() || err.is_integrity() || err.is_structural() || err.is_io()
}

/// `None` when the text file should be read instead.
fn open_companion<'r>(
    registry: &'r Registry,
    paths: &MultiPaths,
    config: &Config,
) -> Result<Option<Reading<'r>>, Error> {
    if !paths.companion.exists() {
        log::debug!("companion {} does not exist", paths.companion.display());
        return Ok(None);
    }
    if paths.text.exists() && !is_up_to_date(&paths.companion, &paths.text) {
        log::warn!(
            "companion {} is older than {}, reading text",
            paths.companion.display(),
            paths.text.display()
        );
        return Ok(None);
    }
    let opened = match paths.kind {
        Companion::Binary => BinaryIArchive::open(registry, &paths.companion)
            .map(|ar| Reading::Binary(ar.config(config.clone()))),
        Companion::InPlace => {
            InPlaceIArchive::open(registry, &paths.companion, config.clone()).map(Reading::InPlace)
        }
    };
    match opened {
        Ok(reading) => Ok(Some(reading)),
        Err(err) if is_recoverable(&err) && paths.text.exists() => {
            log::warn!("falling back to text: {}", err);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

impl Archive for MultiIArchive<'_> {
    fn is_input(&self) -> bool {
        true
    }

    fn in_place(&self) -> bool {
        self.inner().in_place()
    }

    fn registry(&self) -> &Registry {
        self.inner().registry()
    }

    fn context(&self) -> &ArchiveContext {
        self.inner().context()
    }

    fn context_mut(&mut self) -> &mut ArchiveContext {
        self.inner_mut().context_mut()
    }

    fn process_scalar(
        &mut self,
        value: ScalarMut<'_>,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.inner_mut().process_scalar(value, name, name_alt)
    }

    fn process_string(
        &mut self,
        value: &mut String,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.inner_mut().process_string(value, name, name_alt)
    }

    fn process_enum(
        &mut self,
        value: &mut i32,
        key: &EnumKey,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.inner_mut().process_enum(value, key, name, name_alt)
    }

    fn process_bit_vector(
        &mut self,
        bits: &mut i32,
        key: &EnumKey,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.inner_mut().process_bit_vector(bits, key, name, name_alt)
    }

    fn process_binary(
        &mut self,
        data: &mut Vec<u8>,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.inner_mut().process_binary(data, name, name_alt)
    }

    fn open_struct(&mut self, type_name: &str, name: &str, name_alt: &str) -> Result<bool, Error> {
        self.inner_mut().open_struct(type_name, name, name_alt)
    }

    fn close_struct(&mut self, name: &str) -> Result<(), Error> {
        self.inner_mut().close_struct(name)
    }

    fn open_container(
        &mut self,
        len: &mut usize,
        fixed: bool,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.inner_mut().open_container(len, fixed, name, name_alt)
    }

    fn close_container(&mut self, name: &str) -> Result<(), Error> {
        self.inner_mut().close_container(name)
    }

    fn process_pointer(
        &mut self,
        ptr: &mut dyn PointerSlot,
        name: &str,
        name_alt: &str,
    ) -> Result<bool, Error> {
        self.inner_mut().process_pointer(ptr, name, name_alt)
    }
}

/// Reads `value` from the companion or the text file.
///
/// A companion that fails part way through the read is abandoned and the
/// value is read again from text. After a read from text the companion is
/// rewritten; failing to rewrite it is logged and otherwise ignored.
pub fn load<T: Serialize + ?Sized>(
    registry: &Registry,
    paths: &MultiPaths,
    config: Config,
    value: &mut T,
    name: &str,
) -> Result<bool, Error> {
    let mut ar = MultiIArchive::with_paths(registry, paths.clone(), config.clone())?;
    let found = match ar.serialize(value, name, "") {
        Ok(found) if ar.source() != Source::Text => return Ok(found),
        Ok(found) => found,
        Err(err) if ar.source() != Source::Text && is_recoverable(&err) && paths.text.exists() => {
            log::warn!(
                "companion {} failed mid-read, reading text: {}",
                paths.companion.display(),
                err
            );
            let mut text = TextIArchive::open(registry, &paths.text)?.config(config.clone());
            text.serialize(value, name, "")?
        }
        Err(err) => return Err(err),
    };
    if let Err(err) = regenerate(registry, paths, config, value, name) {
        log::warn!(
            "could not regenerate {}: {}",
            paths.companion.display(),
            err
        );
    }
    Ok(found)
}

fn regenerate<T: Serialize + ?Sized>(
    registry: &Registry,
    paths: &MultiPaths,
    config: Config,
    value: &mut T,
    name: &str,
) -> Result<(), Error> {
    log::warn!("regenerating {}", paths.companion.display());
    match paths.kind {
        Companion::Binary => {
            let mut out = BinaryOArchive::new(registry).config(config);
            out.serialize(value, name, "")?;
            out.save(&paths.companion)
        }
        Companion::InPlace => {
            let mut out = InPlaceOArchive::new(registry).config(config);
            out.serialize(value, name, "")?;
            out.save(&paths.companion)
        }
    }
}
