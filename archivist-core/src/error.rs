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

//! Error type shared by every archive backend.
//!
//! Errors fall into the groups a caller reacts to differently:
//!
//! - **structural** errors mean the input is malformed (unbalanced braces, an
//!   unterminated string, a chunk overrunning its parent, a relocation outside
//!   the buffer). Continuing would operate on an inconsistent object graph.
//! - **unregistered type** errors mean a polymorphic tag names a type that the
//!   [`Registry`](crate::registry::Registry) does not know.
//! - **integrity** errors mean a CRC-32 check failed.
//!
//! A field that is missing from the input is *not* an error: every archive hook
//! returns `Ok(false)` for it.

use std::borrow::Cow;
use std::path::Path;

use thiserror::Error;

/// Set ARCHIVIST_PANIC_ON_ERROR at compile time to make every error constructor panic.
pub const PANIC_ON_ERROR: bool = option_env!("ARCHIVIST_PANIC_ON_ERROR").is_some();

/// Error type for archive reads and writes.
///
/// Do not construct variants directly; use the snake_case constructors
/// ([`Error::structural`], [`Error::unregistered_type`], ...). They accept
/// anything convertible into a `Cow<'static, str>` and honour
/// `ARCHIVIST_PANIC_ON_ERROR`:
///
/// ```bash
/// RUST_BACKTRACE=1 ARCHIVIST_PANIC_ON_ERROR=1 cargo test
/// ```
///
/// With the flag set, a structural problem aborts at the exact place it was
/// detected.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Malformed input: nesting, tokens, chunk sizes, relocations.
    #[error("Structural error: {0}")]
    Structural(Cow<'static, str>),

    #[error("Buffer out of bound: {0} + {1} > {2}")]
    BufferOutOfBound(usize, usize, usize),

    #[error("Unregistered type: {0}")]
    UnregisteredType(Cow<'static, str>),

    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(Cow<'static, str>),

    #[error("Unknown enum: {0}")]
    UnknownEnum(Cow<'static, str>),

    /// CRC-32 mismatch on a blob or a whole file.
    #[error("Integrity check failed: {0}")]
    Integrity(Cow<'static, str>),

    /// A field name contains a denylisted character.
    #[error("Invalid field name: {0}")]
    InvalidName(Cow<'static, str>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Another error qualified with the file it came from.
    #[error("{path}: {source}")]
    AtPath { path: String, source: Box<Error> },

    #[error("{0}")]
    Unknown(Cow<'static, str>),
}

macro_rules! constructor {
    ($(#[$meta:meta])* $fn_name:ident => $variant:ident) => {
        $(#[$meta])*
        #[inline(always)]
        #[cold]
        #[track_caller]
        pub fn $fn_name<S: Into<Cow<'static, str>>>(s: S) -> Self {
            let err = Error::$variant(s.into());
            if PANIC_ON_ERROR {
                panic!("ARCHIVIST_PANIC_ON_ERROR: {}", err);
            }
            err
        }
    };
}

impl Error {
    constructor!(
        /// Creates a new [`Error::Structural`].
        ///
        /// ```
        /// use archivist_core::error::Error;
        ///
        /// let err = Error::structural(format!("unbalanced '{{' at line {}", 3));
        /// assert!(err.is_structural());
        /// ```
        structural => Structural
    );
    constructor!(unregistered_type => UnregisteredType);
    constructor!(duplicate_registration => DuplicateRegistration);
    constructor!(unknown_enum => UnknownEnum);
    constructor!(integrity => Integrity);
    constructor!(invalid_name => InvalidName);
    constructor!(
        /// Creates a new [`Error::Unknown`] from a literal, `String`, or any
        /// type that converts into a [`Cow<'static, str>`].
        unknown => Unknown
    );

    #[inline(always)]
    #[cold]
    #[track_caller]
    pub fn buffer_out_of_bound(offset: usize, length: usize, capacity: usize) -> Self {
        let err = Error::BufferOutOfBound(offset, length, capacity);
        if PANIC_ON_ERROR {
            panic!("ARCHIVIST_PANIC_ON_ERROR: {}", err);
        }
        err
    }

    /// Qualifies this error with the path of the file being processed.
    ///
    /// Already qualified errors are returned unchanged.
    #[inline(never)]
    pub fn at_path(self, path: &Path) -> Error {
        match self {
            Error::AtPath { .. } => self,
            other => Error::AtPath {
                path: path.display().to_string(),
                source: Box::new(other),
            },
        }
    }

    fn root(&self) -> &Error {
        match self {
            Error::AtPath { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_structural(&self) -> bool {
        matches!(
            self.root(),
            Error::Structural(_) | Error::BufferOutOfBound(..)
        )
    }

    pub fn is_unregistered(&self) -> bool {
        matches!(self.root(), Error::UnregisteredType(_))
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self.root(), Error::Integrity(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self.root(), Error::Io(_))
    }
}

/// Ensures a condition is true; otherwise returns an [`enum@Error`].
///
/// # Examples
/// ```
/// use archivist_core::ensure;
/// use archivist_core::error::Error;
///
/// fn check_count(n: u32) -> Result<(), Error> {
///     ensure!(n < 1024, "count {} too large", n);
///     ensure!(n > 0, Error::structural("empty container"));
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $msg:literal) => {
        if !$cond {
            return Err($crate::error::Error::unknown($msg));
        }
    };
    ($cond:expr, $err:expr) => {
        if !$cond {
            return Err($err);
        }
    };
    ($cond:expr, $fmt:expr, $($arg:tt)*) => {
        if !$cond {
            return Err($crate::error::Error::unknown(format!($fmt, $($arg)*)));
        }
    };
}

/// Returns early with an [`enum@Error`].
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($crate::error::Error::unknown($err))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::unknown(format!($fmt, $($arg)*)))
    };
}

/// Returns early with an [`Error::Structural`].
///
/// # Examples
/// ```
/// use archivist_core::structural;
/// use archivist_core::error::Error;
///
/// fn check_magic(magic: &[u8]) -> Result<(), Error> {
///     if magic != b"bin" {
///         structural!("bad magic {:?}", magic);
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! structural {
    ($err:expr) => {
        return Err($crate::error::Error::structural($err))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::structural(format!($fmt, $($arg)*)))
    };
}
