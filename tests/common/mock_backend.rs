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

//! A scripted backend that counts every acquire and release.
//!
//! The card number picks the behaviour:
//! - `0` - copy source to destination verbatim (a memcpy action)
//! - `1` - opening the card fails
//! - `2` - attaching the action fails
//! - `3` - the execute call fails
//! - `4` - the action reports `RETC_FAILURE`
//! - `5` - copy, then scribble one byte past the authorised length
//!
//! Counters are thread local so tests running in parallel do not see each other.

use helloaccel::config::{DEFAULT_DEVICE, DEVICE_NODE_PREFIX};
use helloaccel::error::HelloAccelError;
use helloaccel::job::{AddressSpace, JobDescriptor, RETC_FAILURE, RETC_SUCCESS};
use helloaccel::memory::host_range_is_staged;
use helloaccel::platforms::platform::{Action, ActionFlags, Card, register_backend};
use std::cell::Cell;
use std::time::Duration;

pub static MOCK_BACKEND: &str = "MOCK";

thread_local! {
    static CARDS_OPENED: Cell<u32> = const { Cell::new(0) };
    static CARDS_RELEASED: Cell<u32> = const { Cell::new(0) };
    static ACTIONS_ATTACHED: Cell<u32> = const { Cell::new(0) };
    static ACTIONS_DETACHED: Cell<u32> = const { Cell::new(0) };
    static JOBS_EXECUTED: Cell<u32> = const { Cell::new(0) };
    static ATTACH_FLAGS: Cell<Option<ActionFlags>> = const { Cell::new(None) };
    static ARMED_IRQ: Cell<Option<u32>> = const { Cell::new(None) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counts {
    pub cards_opened: u32,
    pub cards_released: u32,
    pub actions_attached: u32,
    pub actions_detached: u32,
    pub jobs_executed: u32,
}

pub fn counts() -> Counts {
    Counts {
        cards_opened: CARDS_OPENED.get(),
        cards_released: CARDS_RELEASED.get(),
        actions_attached: ACTIONS_ATTACHED.get(),
        actions_detached: ACTIONS_DETACHED.get(),
        jobs_executed: JOBS_EXECUTED.get(),
    }
}

/// How the last action on this thread was set up for completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IrqSetup {
    pub attach_flags: Option<ActionFlags>,
    pub armed_irq_source: Option<u32>,
}

pub fn irq_setup() -> IrqSetup {
    IrqSetup {
        attach_flags: ATTACH_FLAGS.get(),
        armed_irq_source: ARMED_IRQ.get(),
    }
}

/// Register the mock backend and zero this thread's counters.
pub fn setup_mock_backend() {
    register_backend(MOCK_BACKEND, MockCard::open);
    for counter in [
        &CARDS_OPENED,
        &CARDS_RELEASED,
        &ACTIONS_ATTACHED,
        &ACTIONS_DETACHED,
        &JOBS_EXECUTED,
    ] {
        counter.set(0);
    }
    ATTACH_FLAGS.set(None);
    ARMED_IRQ.set(None);
}

fn bump(counter: &'static std::thread::LocalKey<Cell<u32>>) {
    counter.set(counter.get() + 1);
}

fn card_no(device: &str) -> u32 {
    if device == DEFAULT_DEVICE {
        return 0;
    }
    device
        .strip_prefix(DEVICE_NODE_PREFIX)
        .and_then(|rest| rest.split(':').next())
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

pub struct MockCard {
    device: String,
    card_no: u32,
}

impl MockCard {
    pub fn open(device: &str) -> Result<Box<dyn Card>, HelloAccelError> {
        let card_no = card_no(device);
        if card_no == 1 {
            return Err(HelloAccelError::CardOpen {
                device: device.to_string(),
                reason: "scripted open failure".into(),
            });
        }
        bump(&CARDS_OPENED);
        Ok(Box::new(MockCard {
            device: device.to_string(),
            card_no,
        }))
    }
}

impl Card for MockCard {
    fn device(&self) -> &str {
        &self.device
    }

    fn attach_action(
        &mut self,
        action_type: u32,
        flags: ActionFlags,
        _attach_timeout: Duration,
    ) -> Result<Box<dyn Action>, HelloAccelError> {
        ATTACH_FLAGS.set(Some(flags));
        if self.card_no == 2 {
            return Err(HelloAccelError::ActionAttach {
                device: self.device.clone(),
                action_type,
                reason: "scripted attach failure".into(),
            });
        }
        bump(&ACTIONS_ATTACHED);
        Ok(Box::new(MockAction {
            card_no: self.card_no,
        }))
    }
}

impl Drop for MockCard {
    fn drop(&mut self) {
        bump(&CARDS_RELEASED);
    }
}

pub struct MockAction {
    card_no: u32,
}

impl MockAction {
    fn copy(job: &JobDescriptor, overrun: bool) -> u32 {
        let input = &job.params.input;
        let output = &job.params.output;
        let len = input.size.min(output.size) as usize;
        let written = len + usize::from(overrun);
        let host = input.space == AddressSpace::HostDram && output.space == AddressSpace::HostDram;
        if !host || !host_range_is_staged(input.addr, len) || !host_range_is_staged(output.addr, written)
        {
            return RETC_FAILURE;
        }
        // SAFETY: both ranges were just checked to lie inside live buffers staged by the
        // client, which holds no borrow of them while the job executes.
        unsafe {
            std::ptr::copy(input.addr as *const u8, output.addr as *mut u8, len);
            if overrun {
                *(output.addr as *mut u8).add(len) = 0xff;
            }
        }
        RETC_SUCCESS
    }
}

impl Action for MockAction {
    fn assign_irq(&mut self, irq_source: u32) -> Result<(), HelloAccelError> {
        ARMED_IRQ.set(Some(irq_source));
        Ok(())
    }

    fn sync_execute_job(
        &mut self,
        job: &mut JobDescriptor,
        _timeout: Duration,
    ) -> Result<(), HelloAccelError> {
        bump(&JOBS_EXECUTED);
        job.retc = match self.card_no {
            3 => {
                return Err(HelloAccelError::Execute {
                    rc: -110,
                    reason: "scripted timeout".into(),
                });
            }
            4 => RETC_FAILURE,
            5 => MockAction::copy(job, true),
            _ => MockAction::copy(job, false),
        };
        Ok(())
    }
}

impl Drop for MockAction {
    fn drop(&mut self) {
        bump(&ACTIONS_DETACHED);
    }
}
