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

//! The offload job client.
//!
//! Drives one changecase job from start to finish:
//!
//! ```text
//! Unconfigured -> InputStaged -> Staged -> SessionOpen -> Executed -> Verified | Skipped -> TornDown
//!       \______________\____________\___________\______________\_____________> Failed
//! ```
//!
//! Any step may fail. A failure moves the client to `Failed` and releases everything that was
//! acquired so far. The action is detached before the card is freed, and the buffers are
//! freed last. Every resource sits in an `Option` that teardown takes, so each is released
//! exactly once, whether teardown runs from a failing step, from [`OffloadClient::teardown`]
//! or from `Drop`.
//!
//! # Examples
//!
//! ```rust,no_run
//! # use helloaccel::client::{OffloadClient, OffloadOptions};
//! # fn example() -> Result<(), helloaccel::error::HelloAccelError> {
//! helloaccel::register_backends();
//! let options = OffloadOptions {
//!     input: Some("/tmp/t1".into()),
//!     output: Some("/tmp/t2".into()),
//!     verify: true,
//!     ..OffloadOptions::default()
//! };
//! let report = OffloadClient::new(options).run()?;
//! println!("took {} usec", report.elapsed.as_micros());
//! # Ok(())
//! # }
//! ```

use crate::config;
use crate::error::{EXIT_VERIFY_FAILED, HelloAccelError};
use crate::job::{AddressSpace, JobDescriptor, descriptor_len};
use crate::memory::HostBuffer;
use crate::platforms::platform::{Action, ActionFlags, Card, open_card};
use crate::system_io::{fs_file_size, fs_read_into, fs_write_bytes};
use crate::verify::{self, VerifyOutcome};
use log::{debug, error, info, warn};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Everything a run is configured with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffloadOptions {
    /// Card number; 0 is the framework's default card.
    pub card_no: u32,
    /// File to read the source data from. Forces the source into host memory.
    pub input: Option<PathBuf>,
    /// File to write the result to. Forces the destination into host memory.
    pub output: Option<PathBuf>,
    pub src_space: AddressSpace,
    pub src_addr: Option<u64>,
    pub dst_space: AddressSpace,
    pub dst_addr: Option<u64>,
    /// Transfer size when there is no input file; an input file's length always wins.
    pub size: Option<usize>,
    pub timeout: Duration,
    pub verify: bool,
    /// Wait for completion by interrupt instead of polling.
    pub irq: bool,
    /// Registered backend name, `"FPGA"` or `"CPU"`.
    pub backend: String,
}

impl Default for OffloadOptions {
    fn default() -> Self {
        OffloadOptions {
            card_no: 0,
            input: None,
            output: None,
            src_space: AddressSpace::HostDram,
            src_addr: None,
            dst_space: AddressSpace::HostDram,
            dst_addr: None,
            size: None,
            timeout: Duration::from_secs(config::DEFAULT_TIMEOUT_SECS),
            verify: false,
            irq: true,
            backend: config::backend_from_env().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Unconfigured,
    InputStaged,
    Staged,
    SessionOpen,
    Executed,
    Verified,
    Skipped,
    TornDown,
    Failed,
}

/// What a successful run produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub retc: u32,
    /// Wall-clock time spent in the blocking execute call.
    pub elapsed: Duration,
    pub verify: VerifyOutcome,
}

impl RunReport {
    /// 0, or [`EXIT_VERIFY_FAILED`] if verification found a mismatch.
    pub fn exit_code(&self) -> u8 {
        match self.verify.failed() {
            true => EXIT_VERIFY_FAILED,
            false => 0,
        }
    }
}

/// A card with one attached action, held for exactly one job.
pub struct Session {
    action: Option<Box<dyn Action>>,
    card: Option<Box<dyn Card>>,
}

impl Session {
    /// Open the card for `card_no` on `backend` and attach the changecase action.
    ///
    /// If attaching fails the card is released before the error is returned.
    ///
    /// # Returns: `Result<Session, HelloAccelError>`
    /// * `Ok(Session)` - Card open, action attached, completion interrupt armed if asked for
    /// * `Err(HelloAccelError::CardOpen)` - The card could not be opened
    /// * `Err(HelloAccelError::ActionAttach)` - The action could not be attached
    pub fn acquire(backend: &str, card_no: u32, irq: bool) -> Result<Self, HelloAccelError> {
        let device = config::device_for_card(card_no);
        let mut card = open_card(backend, &device)?;
        let flags = match irq {
            true => ActionFlags::DONE_IRQ,
            false => ActionFlags::empty(),
        };
        let mut action =
            card.attach_action(config::ACTION_TYPE_CHANGECASE, flags, config::ATTACH_TIMEOUT)?;
        if irq {
            if let Err(e) = action.assign_irq(config::ACTION_IRQ_SRC_LO) {
                warn!("could not arm the completion interrupt, falling back to polling: {e}");
            }
        }
        info!("attached action 0x{:08x} on {device:?}", config::ACTION_TYPE_CHANGECASE);
        Ok(Session {
            action: Some(action),
            card: Some(card),
        })
    }

    fn action(&mut self) -> Result<&mut Box<dyn Action>, HelloAccelError> {
        self.action
            .as_mut()
            .ok_or_else(|| HelloAccelError::Internal("session has no attached action".into()))
    }

    /// Detach the action, then free the card. Safe to call more than once.
    pub fn release(&mut self) {
        if let Some(action) = self.action.take() {
            debug!("detaching action");
            drop(action);
        }
        if let Some(card) = self.card.take() {
            debug!("releasing card {:?}", card.device());
            drop(card);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.release();
    }
}

/// The addresses and sizes a job will be submitted with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameters {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub type_in: AddressSpace,
    pub addr_in: u64,
    pub type_out: AddressSpace,
    pub addr_out: u64,
    pub size: usize,
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = |p: &Option<PathBuf>| {
            p.as_ref()
                .map_or_else(|| "unknown".to_string(), |p| p.display().to_string())
        };
        writeln!(f, "PARAMETERS:")?;
        writeln!(f, "  input:       {}", name(&self.input))?;
        writeln!(f, "  output:      {}", name(&self.output))?;
        writeln!(f, "  type_in:     {}", self.type_in)?;
        writeln!(f, "  addr_in:     {:016x}", self.addr_in)?;
        writeln!(f, "  type_out:    {}", self.type_out)?;
        writeln!(f, "  addr_out:    {:016x}", self.addr_out)?;
        write!(f, "  size_in/out: {:08x}", self.size)
    }
}

/// Runs one changecase job. See the module documentation for the state machine.
pub struct OffloadClient {
    options: OffloadOptions,
    state: ClientState,
    params: Parameters,
    input: Option<HostBuffer>,
    output: Option<HostBuffer>,
    session: Option<Session>,
    job: Option<JobDescriptor>,
    elapsed: Duration,
}

impl OffloadClient {
    /// Configure a client. Nothing is allocated or opened yet.
    pub fn new(options: OffloadOptions) -> Self {
        let params = Parameters {
            input: options.input.clone(),
            output: options.output.clone(),
            type_in: options.src_space,
            addr_in: options.src_addr.unwrap_or(0),
            type_out: options.dst_space,
            addr_out: options.dst_addr.unwrap_or(0),
            size: options.size.unwrap_or(config::DEFAULT_SIZE),
        };
        OffloadClient {
            options,
            state: ClientState::Unconfigured,
            params,
            input: None,
            output: None,
            session: None,
            job: None,
            elapsed: Duration::ZERO,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    /// The staged input bytes, if an input file was read.
    pub fn input(&self) -> Option<&[u8]> {
        self.input.as_ref().map(HostBuffer::as_slice)
    }

    /// The staged output buffer including any guard region.
    pub fn output(&self) -> Option<&[u8]> {
        self.output.as_ref().map(HostBuffer::as_slice)
    }

    /// Stage both buffers, then [`Self::complete`].
    pub fn run(mut self) -> Result<RunReport, HelloAccelError> {
        self.stage_input()?;
        self.stage_output()?;
        self.complete()
    }

    /// Everything after staging: acquire, execute, write the output file, check the return
    /// code, verify. The client is torn down whatever the outcome.
    pub fn complete(&mut self) -> Result<RunReport, HelloAccelError> {
        let result = self.complete_inner();
        self.teardown();
        result
    }

    fn complete_inner(&mut self) -> Result<RunReport, HelloAccelError> {
        self.acquire_session()?;
        self.execute()?;
        self.write_output()?;
        let retc = self.check_retc()?;
        let verify = self.verify()?;
        Ok(RunReport {
            retc,
            elapsed: self.elapsed,
            verify,
        })
    }

    /// Read the input file, if any, into an aligned host buffer.
    ///
    /// The transfer size becomes the file size and the source becomes host memory at the
    /// buffer. Without an input file the configured source is used verbatim.
    ///
    /// # Returns: `Result<(), HelloAccelError>`
    /// * `Err(HelloAccelError::IOSize)` / `Err(HelloAccelError::IORead)` - The file could not be read
    /// * `Err(HelloAccelError::Argument)` - The file is too large for a job descriptor
    /// * `Err(HelloAccelError::Alloc)` - The buffer could not be allocated (including empty files)
    pub fn stage_input(&mut self) -> Result<(), HelloAccelError> {
        self.expect_state(ClientState::Unconfigured, "stage input")?;
        if let Some(path) = self.options.input.clone() {
            let result = fs_file_size(&path)
                .and_then(|len| {
                    usize::try_from(len).map_err(|_| HelloAccelError::Alloc {
                        size: usize::MAX,
                        reason: format!("{path:?} is larger than the address space"),
                    })
                })
                .and_then(|len| {
                    descriptor_len(len)?;
                    let mut buf = HostBuffer::zeroed(len)?;
                    info!("reading input data {len} bytes from {path:?}");
                    fs_read_into(&path, buf.as_mut_slice())?;
                    Ok(buf)
                });
            let buf = result.map_err(|e| self.fail(e))?;
            self.params.size = buf.len();
            self.params.type_in = AddressSpace::HostDram;
            self.params.addr_in = buf.addr();
            self.input = Some(buf);
        }
        self.state = ClientState::InputStaged;
        Ok(())
    }

    /// Allocate the zeroed output buffer: the transfer size plus the verify guard region when
    /// verification is on.
    ///
    /// Staged when an output file is given, or when the destination is host memory and no
    /// destination address was supplied. The transfer size is checked against the descriptor
    /// length field before anything is allocated.
    ///
    /// # Returns: `Result<(), HelloAccelError>`
    /// * `Err(HelloAccelError::Argument)` - The size does not fit a job descriptor
    /// * `Err(HelloAccelError::Alloc)` - The buffer could not be allocated
    pub fn stage_output(&mut self) -> Result<(), HelloAccelError> {
        self.expect_state(ClientState::InputStaged, "stage output")?;
        descriptor_len(self.params.size).map_err(|e| self.fail(e))?;
        let wanted = self.options.output.is_some()
            || (self.options.dst_space == AddressSpace::HostDram && self.options.dst_addr.is_none());
        if wanted {
            let guard = match self.options.verify {
                true => config::VERIFY_GUARD_LEN,
                false => 0,
            };
            let size = self.params.size;
            let buf = size
                .checked_add(guard)
                .ok_or_else(|| {
                    HelloAccelError::Argument(format!("{size} bytes plus the verify guard overflows"))
                })
                .and_then(HostBuffer::zeroed)
                .map_err(|e| self.fail(e))?;
            self.params.type_out = AddressSpace::HostDram;
            self.params.addr_out = buf.addr();
            self.output = Some(buf);
        }
        self.state = ClientState::Staged;
        Ok(())
    }

    /// Open the card and attach the action.
    pub fn acquire_session(&mut self) -> Result<(), HelloAccelError> {
        self.expect_state(ClientState::Staged, "acquire a session")?;
        let session = Session::acquire(&self.options.backend, self.options.card_no, self.options.irq)
            .map_err(|e| self.fail(e))?;
        self.session = Some(session);
        self.state = ClientState::SessionOpen;
        Ok(())
    }

    /// Fill the job descriptor and run it synchronously, timing the call.
    ///
    /// # Returns: `Result<(), HelloAccelError>`
    /// * `Ok(())` - The action completed; its return code is checked by [`Self::check_retc`]
    /// * `Err(HelloAccelError::Execute)` - Submission failed or timed out
    pub fn execute(&mut self) -> Result<(), HelloAccelError> {
        self.expect_state(ClientState::SessionOpen, "execute")?;
        let p = &self.params;
        let mut job = JobDescriptor::changecase(
            p.addr_in, p.size, p.type_in, p.addr_out, p.size, p.type_out,
        )
        .map_err(|e| self.fail(e))?;
        let timeout = self.options.timeout;

        let started = Instant::now();
        let result = match self.session.as_mut() {
            Some(session) => session
                .action()
                .and_then(|action| action.sync_execute_job(&mut job, timeout)),
            None => Err(HelloAccelError::Internal("no session to execute on".into())),
        };
        self.elapsed = started.elapsed();
        result.map_err(|e| self.fail(e))?;

        debug!("job finished with retc 0x{:x} after {:?}", job.retc, self.elapsed);
        self.job = Some(job);
        self.state = ClientState::Executed;
        Ok(())
    }

    /// Write exactly `size` result bytes to the output file, if there is one.
    pub fn write_output(&mut self) -> Result<(), HelloAccelError> {
        self.expect_state(ClientState::Executed, "write output")?;
        let size = self.params.size;
        let result = match (&self.options.output, &self.output) {
            (Some(path), Some(buf)) => {
                info!("writing output data {:#018x} {size} bytes to {path:?}", buf.addr());
                fs_write_bytes(path, &buf.as_slice()[..size])
            }
            _ => Ok(()),
        };
        result.map_err(|e| self.fail(e))
    }

    /// Fail unless the action reported success.
    pub fn check_retc(&mut self) -> Result<u32, HelloAccelError> {
        self.expect_state(ClientState::Executed, "check the return code")?;
        let retc = self.job.as_ref().map_or(0, |job| job.retc);
        match self.job.as_ref().is_some_and(JobDescriptor::succeeded) {
            true => Ok(retc),
            false => Err(self.fail(HelloAccelError::Retc(retc))),
        }
    }

    /// Compare output against input when asked to and both ends are staged host buffers.
    ///
    /// A mismatch is not an error: it is reported through the returned outcome so the run can
    /// finish normally.
    pub fn verify(&mut self) -> Result<VerifyOutcome, HelloAccelError> {
        self.expect_state(ClientState::Executed, "verify")?;
        if !self.options.verify {
            self.state = ClientState::Skipped;
            return Ok(VerifyOutcome::Skipped);
        }
        let both_host = self.params.type_in == AddressSpace::HostDram
            && self.params.type_out == AddressSpace::HostDram;
        let outcome = match (both_host, &self.input, &self.output) {
            (true, Some(input), Some(output)) => verify::compare(input.as_slice(), output.as_slice()),
            _ => {
                warn!("Verification works currently only with HOST_DRAM");
                VerifyOutcome::Skipped
            }
        };
        self.state = match outcome {
            VerifyOutcome::Skipped => ClientState::Skipped,
            _ => ClientState::Verified,
        };
        if outcome.failed() {
            error!("verification failed");
        }
        Ok(outcome)
    }

    /// Release the action, the card and both buffers, in that order. Idempotent.
    pub fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.release();
        }
        if let Some(output) = self.output.take() {
            debug!("freeing output buffer");
            drop(output);
        }
        if let Some(input) = self.input.take() {
            debug!("freeing input buffer");
            drop(input);
        }
        if self.state != ClientState::Failed {
            self.state = ClientState::TornDown;
        }
    }

    fn fail(&mut self, e: HelloAccelError) -> HelloAccelError {
        self.state = ClientState::Failed;
        self.teardown();
        e
    }

    fn expect_state(&self, expected: ClientState, step: &str) -> Result<(), HelloAccelError> {
        match self.state == expected {
            true => Ok(()),
            false => Err(HelloAccelError::Internal(format!(
                "cannot {step} in state {:?}, expected {expected:?}",
                self.state
            ))),
        }
    }
}

impl Drop for OffloadClient {
    fn drop(&mut self) {
        self.teardown();
    }
}
