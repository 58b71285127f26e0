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

use log::error;
use std::path::PathBuf;

/// Exit status for a run whose job succeeded but whose `--verify` comparison failed.
pub const EXIT_VERIFY_FAILED: u8 = 65;

#[derive(Debug, thiserror::Error)]
pub enum HelloAccelError {
    #[error("HelloAccelError::Usage: {0}")]
    Usage(String),
    #[error("HelloAccelError::Argument: {0}")]
    Argument(String),
    #[error("HelloAccelError::IOSize: An IO error occurred when sizing {file:?}: {e}")]
    IOSize { file: PathBuf, e: std::io::Error },
    #[error("HelloAccelError::IORead: An IO error occurred when reading from {file:?}: {e}")]
    IORead { file: PathBuf, e: std::io::Error },
    #[error("HelloAccelError::IOWrite: An IO error occurred when writing {len} bytes to {file:?}: {e}")]
    IOWrite {
        len: usize,
        file: PathBuf,
        e: std::io::Error,
    },
    #[error("HelloAccelError::Alloc: Failed to allocate {size} bytes of host memory: {reason}")]
    Alloc { size: usize, reason: String },
    #[error("HelloAccelError::CardOpen: Failed to open card {device:?}: {reason}")]
    CardOpen { device: String, reason: String },
    #[error("HelloAccelError::ActionAttach: Failed to attach action 0x{action_type:08x} on {device:?}: {reason}")]
    ActionAttach {
        device: String,
        action_type: u32,
        reason: String,
    },
    #[error("HelloAccelError::Execute: Job execution failed with rc {rc}: {reason}")]
    Execute { rc: i32, reason: String },
    #[error("HelloAccelError::Retc: Unexpected RETC=0x{0:x}")]
    Retc(u32),
    #[error("HelloAccelError::Internal: An Internal error occurred: {0}")]
    Internal(String),
}

impl HelloAccelError {
    /// Process exit status for a fatal error. Every fatal kind maps to the generic failure
    /// code; verification mismatches are not errors and never reach this.
    pub fn exit_code(&self) -> u8 {
        error!("{self}");
        1
    }
}
