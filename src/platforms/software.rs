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

//! Software (CPU mode) backend.
//!
//! Executes the changecase action on the host instead of the FPGA, the way the framework
//! does when `OCACCEL_CONFIG=CPU` is set. The action reads the source region, upper-cases
//! ASCII letters and writes the result to the destination region.
//!
//! Address resolution follows the descriptor's address space:
//! - `HOST_DRAM` - must fall inside a live [`HostBuffer`](crate::memory::HostBuffer)
//! - `CARD_DRAM` - a zero-initialised emulated card memory owned by the card
//! - `TYPE_NVME` - not available in software
//!
//! Anything the action cannot resolve is reported through the job's return code, the same
//! way the hardware action would report it, not as a transport error.

use crate::config::{ACTION_TYPE_CHANGECASE, BACKEND_CPU, SOFTWARE_CARD_DRAM_LIMIT};
use crate::error::HelloAccelError;
use crate::job::{AddrFlags, AddressDescriptor, AddressSpace, JobDescriptor, RETC_FAILURE, RETC_SUCCESS};
use crate::memory::{with_host_range, write_host_range};
use crate::platforms::platform::{Action, ActionFlags, Card, register_backend};
use log::{debug, info, trace, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Card-local memory shared between a card and its attached action.
type CardDram = Arc<Mutex<Vec<u8>>>;

/// An emulated accelerator card.
#[derive(Debug)]
pub struct SoftwareCard {
    device: String,
    dram: CardDram,
}

impl SoftwareCard {
    /// Open an emulated card. Any device identifier is accepted.
    pub fn open(device: &str) -> Result<Box<dyn Card>, HelloAccelError> {
        info!("opened {device:?} in CPU mode");
        Ok(Box::new(SoftwareCard {
            device: device.to_string(),
            dram: Arc::new(Mutex::new(Vec::new())),
        }))
    }

    /// Register this backend as `"CPU"`.
    pub fn register_backend() {
        register_backend(BACKEND_CPU, SoftwareCard::open);
    }
}

impl Card for SoftwareCard {
    fn device(&self) -> &str {
        &self.device
    }

    fn attach_action(
        &mut self,
        action_type: u32,
        flags: ActionFlags,
        _attach_timeout: Duration,
    ) -> Result<Box<dyn Action>, HelloAccelError> {
        if action_type != ACTION_TYPE_CHANGECASE {
            return Err(HelloAccelError::ActionAttach {
                device: self.device.clone(),
                action_type,
                reason: "the CPU backend only provides the changecase action".into(),
            });
        }
        debug!("attached changecase action with flags {flags:?}");
        Ok(Box::new(ChangecaseAction {
            dram: Arc::clone(&self.dram),
            flags,
            irq_source: None,
        }))
    }
}

impl Drop for SoftwareCard {
    fn drop(&mut self) {
        trace!("releasing {:?}", self.device);
    }
}

/// The changecase action running on the CPU.
#[derive(Debug)]
pub struct ChangecaseAction {
    dram: CardDram,
    flags: ActionFlags,
    irq_source: Option<u32>,
}

impl ChangecaseAction {
    fn read(&self, desc: &AddressDescriptor, len: usize) -> Option<Vec<u8>> {
        match desc.space {
            AddressSpace::HostDram => with_host_range(desc.addr, len, <[u8]>::to_vec),
            AddressSpace::CardDram => {
                let dram = self.dram.lock().ok()?;
                let start = usize::try_from(desc.addr).ok()?;
                let end = start.checked_add(len)?;
                if end as u64 > SOFTWARE_CARD_DRAM_LIMIT {
                    return None;
                }
                // Card memory that was never written reads back as zeroes.
                let mut out = vec![0u8; len];
                if start < dram.len() {
                    let avail = dram.len().min(end) - start;
                    out[..avail].copy_from_slice(&dram[start..start + avail]);
                }
                Some(out)
            }
            AddressSpace::Nvme => None,
        }
    }

    fn write(&self, desc: &AddressDescriptor, data: &[u8]) -> bool {
        match desc.space {
            AddressSpace::HostDram => write_host_range(desc.addr, data),
            AddressSpace::CardDram => {
                let Ok(mut dram) = self.dram.lock() else {
                    return false;
                };
                let Some(end) = usize::try_from(desc.addr)
                    .ok()
                    .and_then(|start| start.checked_add(data.len()))
                else {
                    return false;
                };
                if end as u64 > SOFTWARE_CARD_DRAM_LIMIT {
                    return false;
                }
                if dram.len() < end {
                    dram.resize(end, 0);
                }
                dram[end - data.len()..end].copy_from_slice(data);
                true
            }
            AddressSpace::Nvme => false,
        }
    }

    /// Run the job and return the code the action reports.
    fn run(&self, job: &JobDescriptor) -> u32 {
        let input = &job.params.input;
        let output = &job.params.output;
        if !input.flags.contains(AddrFlags::ADDR | AddrFlags::SRC)
            || !output.flags.contains(AddrFlags::ADDR | AddrFlags::DST)
        {
            warn!("changecase job is missing source or destination flags");
            return RETC_FAILURE;
        }

        let len = input.size.min(output.size) as usize;
        let Some(mut data) = self.read(input, len) else {
            warn!(
                "cannot read {len} bytes at {:#018x} in {}",
                input.addr,
                input.space.name()
            );
            return RETC_FAILURE;
        };
        data.make_ascii_uppercase();
        if !self.write(output, &data) {
            warn!(
                "cannot write {len} bytes at {:#018x} in {}",
                output.addr,
                output.space.name()
            );
            return RETC_FAILURE;
        }
        debug!("changecase converted {len} bytes");
        RETC_SUCCESS
    }
}

impl Action for ChangecaseAction {
    fn assign_irq(&mut self, irq_source: u32) -> Result<(), HelloAccelError> {
        trace!("completion interrupt source set to {irq_source:#x}");
        self.irq_source = Some(irq_source);
        Ok(())
    }

    fn sync_execute_job(
        &mut self,
        job: &mut JobDescriptor,
        timeout: Duration,
    ) -> Result<(), HelloAccelError> {
        let completion = match (self.flags.contains(ActionFlags::DONE_IRQ), self.irq_source) {
            (true, Some(src)) => format!("interrupt {src:#x}"),
            _ => "polling".to_string(),
        };
        debug!("executing changecase job ({completion}, timeout {timeout:?})");
        job.retc = self.run(job);
        Ok(())
    }
}

impl Drop for ChangecaseAction {
    fn drop(&mut self) {
        trace!("detaching changecase action");
    }
}
