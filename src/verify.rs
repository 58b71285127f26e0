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

//! Output verification for host-to-host runs.
//!
//! Two independent checks: the first `size` output bytes must equal the input, and the
//! guard region after them must still be zero. Each failing check is logged with a hex dump
//! of the offending bytes and both checks always run.

use log::error;
use std::fmt::Write;

/// Result of comparing the output buffer against the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Data matched and the guard region is clean.
    Passed,
    /// At least one check failed.
    Mismatch {
        /// Offset of the first differing data byte, if the data differed.
        first_difference: Option<usize>,
        /// Whether anything was written into the guard region.
        guard_dirty: bool,
    },
    /// Verification needs both ends in host memory; nothing was compared.
    Skipped,
}

impl VerifyOutcome {
    pub fn failed(self) -> bool {
        matches!(self, VerifyOutcome::Mismatch { .. })
    }
}

/// Compare `output[..input.len()]` with `input` and check `output[input.len()..]` is zero.
///
/// `output` must be at least as long as `input`; any extra bytes form the guard region.
pub fn compare(input: &[u8], output: &[u8]) -> VerifyOutcome {
    let size = input.len().min(output.len());
    let data = &output[..size];
    let guard = &output[size..];

    let first_difference = input[..size].iter().zip(data).position(|(a, b)| a != b);
    if let Some(first) = first_difference {
        let last = input[..size]
            .iter()
            .zip(data)
            .rposition(|(a, b)| a != b)
            .unwrap_or(first);
        let (start, end) = dump_window(first, last, size);
        error!(
            "data verification failed at offset {first:#x}, expected:\n{}",
            hexdump(&input[start..end], start)
        );
        error!("got:\n{}", hexdump(&data[start..end], start));
    }

    let guard_dirty = guard.iter().any(|&b| b != 0);
    if guard_dirty {
        error!(
            "trailing zero verification failed!\n{}",
            hexdump(guard, size)
        );
    }

    match (first_difference, guard_dirty) {
        (None, false) => VerifyOutcome::Passed,
        (first_difference, guard_dirty) => VerifyOutcome::Mismatch {
            first_difference,
            guard_dirty,
        },
    }
}

/// Most bytes shown around a data mismatch.
const MAX_DUMP: usize = 256;

/// Line-aligned `[start, end)` covering the differing bytes, capped at [`MAX_DUMP`].
fn dump_window(first: usize, last: usize, size: usize) -> (usize, usize) {
    let start = first & !0xf;
    let end = ((last | 0xf) + 1).min(size).min(start + MAX_DUMP);
    (start, end)
}

/// Format `bytes` as 16-byte hex lines with an ASCII column, offsets starting at `base`.
pub fn hexdump(bytes: &[u8], base: usize) -> String {
    let mut out = String::new();
    for (i, line) in bytes.chunks(16).enumerate() {
        let _ = write!(out, "{:08x}:", base + i * 16);
        for b in line {
            let _ = write!(out, " {b:02x}");
        }
        for _ in line.len()..16 {
            out.push_str("   ");
        }
        out.push_str(" | ");
        out.extend(line.iter().map(|&b| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '.'
            }
        }));
        out.push('\n');
    }
    out
}
