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

//! helloaccel - host-side driver for the OpenCAPI changecase accelerator action.
//!
//! The library stages a source and a destination buffer, hands their addresses to the
//! changecase action in a fixed-layout job descriptor, waits for the action to finish and
//! optionally verifies the result. The card and its actions are reached through a backend:
//! - **FPGA** (feature `ocaccel`) - The vendor `libocaccel` driving a real card
//! - **CPU** - A software emulation of the action, selected with `OCACCEL_CONFIG=CPU`
//!
//! # Environment Variables
//!
//! - `OCACCEL_CONFIG` - `CPU` runs actions in software, anything else uses the FPGA
//! - `OCACCEL_TRACE` - Trace mask of the vendor library (`0x0` off, `0xF` full)
//! - `RUST_LOG` - Log level of the binary (`trace`, `debug`, `info`, `warn`, `error` or `off`)
//!
//! See [`client`] for the job life cycle and [`platforms`] for the backend traits.

pub mod client;
pub mod config;
pub mod error;
pub mod job;
pub mod memory;
pub mod platforms;
pub mod system_io;
pub mod verify;

#[cfg(feature = "ocaccel")]
use crate::platforms::ocaccel::OcaccelCard;
use crate::platforms::software::SoftwareCard;

/// Register all available backends.
///
/// 1. FPGA through libocaccel (if feature enabled)
/// 2. CPU emulation, always available
pub fn register_backends() {
    #[cfg(feature = "ocaccel")]
    OcaccelCard::register_backend();
    SoftwareCard::register_backend();
}
