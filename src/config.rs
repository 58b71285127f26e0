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

use std::time::Duration;

/// Card identifier handed to the framework for card number 0. The library resolves it to the
/// first OpenCAPI accelerator it finds.
pub static DEFAULT_DEVICE: &str = "IBM,oc-accel";

/// Device node prefix for explicitly numbered cards, completed as
/// `/dev/ocxl/IBM,oc-accel.000<n>:00:00.1.0`.
pub static DEVICE_NODE_PREFIX: &str = "/dev/ocxl/IBM,oc-accel.000";

/// Device node suffix for explicitly numbered cards.
pub static DEVICE_NODE_SUFFIX: &str = ":00:00.1.0";

/// PCI vendor id the card is opened with (IBM).
pub const VENDOR_ID_IBM: u16 = 0x1014;

/// PCI device id of an OpenCAPI accelerator card.
pub const DEVICE_ID_OCACCEL: u16 = 0x062b;

/// Action type register value of the changecase (helloworld) action.
pub const ACTION_TYPE_CHANGECASE: u32 = 0x1014_1008;

/// Interrupt source the action raises on completion.
pub const ACTION_IRQ_SRC_LO: u32 = 0x104;

/// How long attaching an action may wait for the card to become free.
pub const ATTACH_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time to wait for the action to finish.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Transfer size used when no input file is given.
pub const DEFAULT_SIZE: usize = 1024 * 1024;

/// Zeroed bytes appended to the output buffer when verifying, to catch an action writing
/// past the authorised length.
pub const VERIFY_GUARD_LEN: usize = 1024;

/// Alignment of every host buffer handed to the card.
pub const HOST_BUFFER_ALIGN: usize = 64;

/// Largest card-local memory the software backend will emulate.
pub const SOFTWARE_CARD_DRAM_LIMIT: u64 = 256 * 1024 * 1024;

/// Environment variable selecting how actions are executed.
pub static CONFIG_ENV: &str = "OCACCEL_CONFIG";

/// Environment variable read by the vendor library to enable tracing.
pub static TRACE_ENV: &str = "OCACCEL_TRACE";

/// Backend name for actions executed by the FPGA.
pub static BACKEND_FPGA: &str = "FPGA";

/// Backend name for actions emulated on the CPU.
pub static BACKEND_CPU: &str = "CPU";

/// Resolve the device identifier for a card number.
pub fn device_for_card(card_no: u32) -> String {
    match card_no {
        0 => DEFAULT_DEVICE.to_string(),
        n => format!("{DEVICE_NODE_PREFIX}{n}{DEVICE_NODE_SUFFIX}"),
    }
}

/// Pick the backend from `OCACCEL_CONFIG`. Only `CPU` selects software execution; an unset
/// or any other value means the FPGA.
pub fn backend_from_env() -> &'static str {
    backend_from_value(std::env::var(CONFIG_ENV).ok().as_deref())
}

pub(crate) fn backend_from_value(value: Option<&str>) -> &'static str {
    match value {
        Some(v) if v.trim().eq_ignore_ascii_case(BACKEND_CPU) => BACKEND_CPU,
        _ => BACKEND_FPGA,
    }
}
