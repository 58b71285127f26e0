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

//! Job descriptors exchanged with an attached action.
//!
//! The layout is fixed by the action's register map: every region is described by a
//! 16 byte [`AddressDescriptor`] and the changecase action takes one source and one
//! destination region. The whole payload must fit the [`JOB_SIZE`] bytes of MMIO job space.

use crate::error::HelloAccelError;
use bitflags::bitflags;
use log::debug;
use std::fmt;
use std::str::FromStr;

/// Bytes of job space available to an action's parameters.
pub const JOB_SIZE: usize = 112;

/// Return code an action writes back on success.
pub const RETC_SUCCESS: u32 = 0x102;

/// Return code an action writes back on failure.
pub const RETC_FAILURE: u32 = 0x104;

/// Where the memory behind an address lives.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressSpace {
    #[default]
    HostDram = 0,
    CardDram = 1,
    Nvme = 2,
}

impl AddressSpace {
    pub fn name(self) -> &'static str {
        match self {
            AddressSpace::HostDram => "HOST_DRAM",
            AddressSpace::CardDram => "CARD_DRAM",
            AddressSpace::Nvme => "TYPE_NVME",
        }
    }
}

impl fmt::Display for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x} {}", *self as u16, self.name())
    }
}

impl FromStr for AddressSpace {
    type Err = HelloAccelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HOST_DRAM" => Ok(AddressSpace::HostDram),
            "CARD_DRAM" => Ok(AddressSpace::CardDram),
            "TYPE_NVME" => Ok(AddressSpace::Nvme),
            other => Err(HelloAccelError::Usage(format!(
                "{other:?} is not an address space, expected HOST_DRAM, CARD_DRAM or TYPE_NVME"
            ))),
        }
    }
}

bitflags! {
    /// Role of an address descriptor within a job.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AddrFlags: u16 {
        const ADDR = 0x01;
        const SRC = 0x02;
        const DST = 0x04;
        const EXT = 0x08;
        const END = 0x10;
    }
}

/// One memory region as the action sees it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddressDescriptor {
    pub addr: u64,
    pub size: u32,
    pub space: AddressSpace,
    pub flags: AddrFlags,
}

impl AddressDescriptor {
    pub fn new(addr: u64, size: u32, space: AddressSpace, flags: AddrFlags) -> Self {
        AddressDescriptor {
            addr,
            size,
            space,
            flags,
        }
    }
}

/// Parameters of the changecase action: read `input`, write the converted text to `output`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangecaseJob {
    pub input: AddressDescriptor,
    pub output: AddressDescriptor,
}

const _: () = assert!(size_of::<AddressDescriptor>() == 16);
const _: () = assert!(size_of::<ChangecaseJob>() <= JOB_SIZE);

/// A job as submitted to an action: the action parameters plus the return code the action
/// reports back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobDescriptor {
    pub retc: u32,
    pub params: ChangecaseJob,
}

impl JobDescriptor {
    /// Build a zeroed job describing a source and a destination region.
    ///
    /// The source is tagged `ADDR | SRC` and the destination `ADDR | DST | END`.
    ///
    /// # Returns: `Result<JobDescriptor, HelloAccelError>`
    /// * `Ok(JobDescriptor)` - Ready to submit
    /// * `Err(HelloAccelError::Argument)` - A size does not fit the 32 bit length field
    pub fn changecase(
        addr_in: u64,
        size_in: usize,
        space_in: AddressSpace,
        addr_out: u64,
        size_out: usize,
        space_out: AddressSpace,
    ) -> Result<Self, HelloAccelError> {
        debug!("prepare changecase job of {} bytes size", size_of::<ChangecaseJob>());
        let mut job = JobDescriptor::default();
        job.params.input = AddressDescriptor::new(
            addr_in,
            descriptor_len(size_in)?,
            space_in,
            AddrFlags::ADDR | AddrFlags::SRC,
        );
        job.params.output = AddressDescriptor::new(
            addr_out,
            descriptor_len(size_out)?,
            space_out,
            AddrFlags::ADDR | AddrFlags::DST | AddrFlags::END,
        );
        Ok(job)
    }

    pub fn succeeded(&self) -> bool {
        self.retc == RETC_SUCCESS
    }
}

/// Check that `size` fits the 32 bit length field of an address descriptor.
pub fn descriptor_len(size: usize) -> Result<u32, HelloAccelError> {
    u32::try_from(size).map_err(|_| {
        HelloAccelError::Argument(format!("{size} bytes does not fit a job descriptor"))
    })
}
