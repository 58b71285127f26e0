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

//! Backend abstraction for accelerator cards.
//!
//! A backend knows how to open a card and attach actions to it. Two traits form the seam:
//! - [`Card`] - An opened accelerator card. Dropping it releases the card.
//! - [`Action`] - An action attached to a card. Dropping it detaches the action.
//!
//! Backends register a constructor under a name (`"FPGA"`, `"CPU"`) in a process-wide
//! registry, and [`open_card`] looks the name up at runtime. This keeps the job client
//! independent of whether the vendor library was compiled in.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use helloaccel::config;
//! # use helloaccel::platforms::platform::{ActionFlags, open_card};
//! # fn example() -> Result<(), helloaccel::error::HelloAccelError> {
//! helloaccel::register_backends();
//! let mut card = open_card(config::BACKEND_CPU, &config::device_for_card(0))?;
//! let action = card.attach_action(
//!     config::ACTION_TYPE_CHANGECASE,
//!     ActionFlags::DONE_IRQ,
//!     config::ATTACH_TIMEOUT,
//! )?;
//! # Ok(())
//! # }
//! ```

use crate::error::HelloAccelError;
use crate::job::JobDescriptor;
use bitflags::bitflags;
use log::{error, trace};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Duration;

/// Type alias for card constructor functions.
///
/// A constructor receives the device identifier and either opens the card or reports why it
/// could not.
type CardConstructor = fn(&str) -> Result<Box<dyn Card>, HelloAccelError>;

/// Global registry of backends, keyed by backend name.
pub static BACKEND_REGISTRY: OnceLock<Mutex<HashMap<&'static str, CardConstructor>>> =
    OnceLock::new();

bitflags! {
    /// How an action signals completion.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActionFlags: u32 {
        /// Raise an interrupt when the job is done instead of being polled.
        const DONE_IRQ = 0x01;
    }
}

/// Trait for an opened accelerator card.
pub trait Card: Any {
    /// Identifier the card was opened with.
    fn device(&self) -> &str;

    /// Attach one action instance of `action_type`.
    ///
    /// # Arguments
    ///
    /// * `action_type` - Action type register value the action must report
    /// * `flags` - Completion signalling for the attached action
    /// * `attach_timeout` - How long to wait for the action to become free
    ///
    /// # Returns: `Result<Box<dyn Action>, HelloAccelError>`
    /// * `Ok(Box<dyn Action>)` - Attached action, detached again on drop
    /// * `Err(HelloAccelError::ActionAttach)` - No such action or it stayed busy
    fn attach_action(
        &mut self,
        action_type: u32,
        flags: ActionFlags,
        attach_timeout: Duration,
    ) -> Result<Box<dyn Action>, HelloAccelError>;
}

/// Trait for an action attached to a card.
pub trait Action {
    /// Route completion interrupts from `irq_source` to this process.
    fn assign_irq(&mut self, irq_source: u32) -> Result<(), HelloAccelError>;

    /// Write the job to the action, start it, wait for completion and read the job back.
    ///
    /// On return `job.retc` holds the action's return code. The timeout is passed through
    /// to the backend.
    ///
    /// # Returns: `Result<(), HelloAccelError>`
    /// * `Ok(())` - The action ran to completion (check `job.retc`)
    /// * `Err(HelloAccelError::Execute)` - Submission failed or the wait timed out
    fn sync_execute_job(
        &mut self,
        job: &mut JobDescriptor,
        timeout: Duration,
    ) -> Result<(), HelloAccelError>;
}

/// Initialize the backend registry.
pub fn init_backend_registry() -> Mutex<HashMap<&'static str, CardConstructor>> {
    Mutex::new(HashMap::new())
}

/// Register a backend under `name`, replacing any earlier registration.
///
/// A poisoned registry is recovered: the map only ever holds complete entries.
pub fn register_backend(name: &'static str, constructor: CardConstructor) {
    let mut registry = BACKEND_REGISTRY
        .get_or_init(init_backend_registry)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);

    registry.insert(name, constructor);
}

/// Open `device` with the backend registered as `backend`.
///
/// # Returns: `Result<Box<dyn Card>, HelloAccelError>`
/// * `Ok(Box<dyn Card>)` - Opened card
/// * `Err(HelloAccelError::CardOpen)` - Unknown backend or the backend failed to open
/// * `Err(HelloAccelError::Internal)` - Registry not initialized
pub fn open_card(backend: &str, device: &str) -> Result<Box<dyn Card>, HelloAccelError> {
    let constructor = {
        let registry = BACKEND_REGISTRY
            .get()
            .ok_or(HelloAccelError::Internal(String::from(
                "couldn't get BACKEND_REGISTRY",
            )))?
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        registry.get(backend).copied()
    };
    trace!("opening {device:?} with backend {backend:?}");

    let result = match constructor {
        Some(constructor) => constructor(device),
        None => Err(HelloAccelError::CardOpen {
            device: device.to_string(),
            reason: format!("no {backend} backend in this build"),
        }),
    };
    if result.is_err() {
        error!("Default mode is FPGA mode.");
        error!("Did you want to run CPU mode ? => add OCACCEL_CONFIG=CPU before your command.");
        error!("Otherwise make sure you ran ocaccel_find_card and ocaccel_maint for your selected card.");
    }
    result
}
