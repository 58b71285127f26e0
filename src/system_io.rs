// This file is part of helloaccel, a host-side driver for OpenCAPI accelerator card actions.
//
// Copyright 2025 The helloaccel authors.
//
// SPDX-License-Identifier: GPL-3.0-only
//
// helloaccel is free software: you can redistribute it and/or modify it under the terms of the GNU General Public License version 3, as published by the Free Software Foundation.
//
// helloaccel is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY; without even the implied warranties of MERCHANTABILITY, SATISFACTORY QUALITY, or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with this program.  If not, see http://www.gnu.org/licenses/.

//! Error Wrapping File System I/O Helpers
//!
//! Thin wrappers around the standard library file operations used to stage job data,
//! with trace logging and automatic conversion to [`HelloAccelError`] variants that carry the
//! offending path.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use helloaccel::system_io::{fs_file_size, fs_read_into, fs_write_bytes};
//! # use std::path::Path;
//! # fn example() -> Result<(), helloaccel::error::HelloAccelError> {
//! let input = Path::new("/tmp/t1");
//! let mut buf = vec![0u8; fs_file_size(input)? as usize];
//! fs_read_into(input, &mut buf)?;
//! fs_write_bytes(Path::new("/tmp/t2"), &buf)?;
//! # Ok(())
//! # }
//! ```

use crate::error::HelloAccelError;
use log::trace;
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::Path;

/// Size in bytes of a regular file.
///
/// # Returns: `Result<u64, HelloAccelError>`
/// * `Ok(u64)` - Length of the file
/// * `Err(HelloAccelError::IOSize)` - The file is missing, unreadable or not a regular file
pub fn fs_file_size(file_path: &Path) -> Result<u64, HelloAccelError> {
    trace!("Attempting to size {file_path:?}");
    let result = std::fs::metadata(file_path).and_then(|m| {
        if m.is_file() {
            Ok(m.len())
        } else {
            Err(std::io::Error::other("not a regular file"))
        }
    });
    match result {
        Ok(len) => {
            trace!("{file_path:?} is {len} bytes");
            Ok(len)
        }
        Err(e) => Err(HelloAccelError::IOSize {
            file: file_path.into(),
            e,
        }),
    }
}

/// Fill `buf` completely from the start of a file.
///
/// A file shorter than `buf` is an error; bytes past `buf.len()` are ignored.
///
/// # Returns: `Result<(), HelloAccelError>`
/// * `Ok(())` - `buf` holds the first `buf.len()` bytes of the file
/// * `Err(HelloAccelError::IORead)` - Open failed or the file ended early
pub fn fs_read_into(file_path: &Path, buf: &mut [u8]) -> Result<(), HelloAccelError> {
    trace!("Attempting to read {} bytes from {file_path:?}", buf.len());
    let result = OpenOptions::new()
        .read(true)
        .open(file_path)
        .and_then(|mut f| f.read_exact(buf));

    match result {
        Ok(_) => {
            trace!("Reading done");
            Ok(())
        }
        Err(e) => Err(HelloAccelError::IORead {
            file: file_path.into(),
            e,
        }),
    }
}

/// Write binary data to a file, creating it or truncating old content.
///
/// # Returns: `Result<(), HelloAccelError>`
/// * `Ok(())` - Write succeeded
/// * `Err(HelloAccelError::IOWrite)` - If the write fails
pub fn fs_write_bytes(file_path: &Path, data: &[u8]) -> Result<(), HelloAccelError> {
    trace!("Attempting to write {} bytes to {file_path:?}", data.len());
    let result = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(file_path)
        .and_then(|mut f| f.write_all(data));

    match result {
        Ok(_) => {
            trace!("Write done.");
            Ok(())
        }
        Err(e) => Err(HelloAccelError::IOWrite {
            len: data.len(),
            file: file_path.into(),
            e,
        }),
    }
}
