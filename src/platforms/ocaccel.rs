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

//! FPGA backend on top of the vendor `libocaccel`.
//!
//! Only compiled with the `ocaccel` feature, which links the vendor library. The card and
//! action handles are opaque pointers owned by [`OcaccelCard`] and [`OcaccelAction`]; each
//! is released exactly once from `Drop`.
//!
//! Tracing inside the library is controlled by `OCACCEL_TRACE` (`0x0` off, `0xF` full).

use crate::config::{BACKEND_FPGA, DEVICE_ID_OCACCEL, VENDOR_ID_IBM};
use crate::error::HelloAccelError;
use crate::job::{ChangecaseJob, JobDescriptor};
use crate::platforms::platform::{Action, ActionFlags, Card, register_backend};
use log::{info, trace};
use std::ffi::{CString, c_char, c_int, c_uint, c_void};
use std::ptr::NonNull;
use std::time::Duration;

#[repr(C)]
struct RawCard {
    _private: [u8; 0],
}

#[repr(C)]
struct RawAction {
    _private: [u8; 0],
}

/// `struct ocaccel_job`: the library copies `win_size` bytes from `win_addr` into the job
/// registers before starting the action and copies them back afterwards.
#[repr(C)]
struct RawJob {
    retc: u32,
    win_addr: u64,
    win_size: u32,
    wout_addr: u64,
    wout_size: u32,
}

#[link(name = "ocaccel")]
unsafe extern "C" {
    fn ocaccel_card_alloc_dev(path: *const c_char, vendor_id: u16, device_id: u16)
    -> *mut RawCard;
    fn ocaccel_card_free(card: *mut RawCard);
    fn ocaccel_attach_action(
        card: *mut RawCard,
        action_type: u32,
        flags: c_int,
        timeout_sec: c_int,
    ) -> *mut RawAction;
    fn ocaccel_detach_action(action: *mut RawAction) -> c_int;
    fn ocaccel_action_assign_irq(action: *mut RawAction, irq_src_offset: u32) -> c_int;
    fn ocaccel_action_sync_execute_job(
        action: *mut RawAction,
        job: *mut RawJob,
        timeout_sec: c_uint,
    ) -> c_int;
}

fn last_os_error() -> String {
    std::io::Error::last_os_error().to_string()
}

/// A card opened through `libocaccel`.
#[derive(Debug)]
pub struct OcaccelCard {
    device: String,
    handle: NonNull<RawCard>,
}

impl OcaccelCard {
    pub fn open(device: &str) -> Result<Box<dyn Card>, HelloAccelError> {
        let path = CString::new(device).map_err(|e| HelloAccelError::CardOpen {
            device: device.to_string(),
            reason: e.to_string(),
        })?;
        // SAFETY: path is a valid NUL-terminated string for the duration of the call.
        let raw = unsafe { ocaccel_card_alloc_dev(path.as_ptr(), VENDOR_ID_IBM, DEVICE_ID_OCACCEL) };
        let handle = NonNull::new(raw).ok_or_else(|| HelloAccelError::CardOpen {
            device: device.to_string(),
            reason: last_os_error(),
        })?;
        info!("opened card {device:?}");
        Ok(Box::new(OcaccelCard {
            device: device.to_string(),
            handle,
        }))
    }

    /// Register this backend as `"FPGA"`.
    pub fn register_backend() {
        register_backend(BACKEND_FPGA, OcaccelCard::open);
    }
}

impl Card for OcaccelCard {
    fn device(&self) -> &str {
        &self.device
    }

    fn attach_action(
        &mut self,
        action_type: u32,
        flags: ActionFlags,
        attach_timeout: Duration,
    ) -> Result<Box<dyn Action>, HelloAccelError> {
        let timeout = c_int::try_from(attach_timeout.as_secs()).unwrap_or(c_int::MAX);
        // SAFETY: handle is a live card for as long as self exists.
        let raw = unsafe {
            ocaccel_attach_action(self.handle.as_ptr(), action_type, flags.bits() as c_int, timeout)
        };
        let handle = NonNull::new(raw).ok_or_else(|| HelloAccelError::ActionAttach {
            device: self.device.clone(),
            action_type,
            reason: last_os_error(),
        })?;
        Ok(Box::new(OcaccelAction { handle }))
    }
}

impl Drop for OcaccelCard {
    fn drop(&mut self) {
        trace!("freeing card {:?}", self.device);
        // SAFETY: handle came from ocaccel_card_alloc_dev and is freed only here.
        unsafe { ocaccel_card_free(self.handle.as_ptr()) }
    }
}

/// An action attached through `libocaccel`.
///
/// Must be dropped before the card it was attached to.
#[derive(Debug)]
pub struct OcaccelAction {
    handle: NonNull<RawAction>,
}

impl Action for OcaccelAction {
    fn assign_irq(&mut self, irq_source: u32) -> Result<(), HelloAccelError> {
        // SAFETY: handle is a live attached action.
        let rc = unsafe { ocaccel_action_assign_irq(self.handle.as_ptr(), irq_source) };
        match rc {
            0 => Ok(()),
            rc => Err(HelloAccelError::Execute {
                rc,
                reason: format!("assigning irq {irq_source:#x}: {}", last_os_error()),
            }),
        }
    }

    fn sync_execute_job(
        &mut self,
        job: &mut JobDescriptor,
        timeout: Duration,
    ) -> Result<(), HelloAccelError> {
        let mut params: ChangecaseJob = job.params;
        let mut raw = RawJob {
            retc: 0,
            win_addr: &mut params as *mut ChangecaseJob as *mut c_void as u64,
            win_size: size_of::<ChangecaseJob>() as u32,
            wout_addr: 0,
            wout_size: 0,
        };
        let timeout = c_uint::try_from(timeout.as_secs()).unwrap_or(c_uint::MAX);
        // SAFETY: raw and the parameter window it points at outlive the blocking call.
        let rc = unsafe { ocaccel_action_sync_execute_job(self.handle.as_ptr(), &mut raw, timeout) };
        job.retc = raw.retc;
        match rc {
            0 => Ok(()),
            rc => Err(HelloAccelError::Execute {
                rc,
                reason: last_os_error(),
            }),
        }
    }
}

impl Drop for OcaccelAction {
    fn drop(&mut self) {
        trace!("detaching action");
        // SAFETY: handle came from ocaccel_attach_action and is detached only here.
        unsafe {
            ocaccel_detach_action(self.handle.as_ptr());
        }
    }
}
