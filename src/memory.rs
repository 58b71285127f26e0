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

//! Aligned host memory for job buffers.
//!
//! A [`HostBuffer`] is a zero-initialised, [`HOST_BUFFER_ALIGN`]-aligned allocation whose
//! address is handed to the card inside a job descriptor. While a buffer is alive its address
//! range is recorded in a process-wide registry, which lets a backend that touches host memory
//! from software check that a descriptor points at memory this process actually staged.

use crate::config::HOST_BUFFER_ALIGN;
use crate::error::HelloAccelError;
use log::trace;
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::collections::BTreeMap;
use std::ptr::NonNull;
use std::sync::{Mutex, OnceLock};

/// Live host buffers, keyed by start address, valued by length.
static HOST_REGIONS: OnceLock<Mutex<BTreeMap<u64, usize>>> = OnceLock::new();

fn host_regions() -> &'static Mutex<BTreeMap<u64, usize>> {
    HOST_REGIONS.get_or_init(|| Mutex::new(BTreeMap::new()))
}

/// An owned, aligned, zero-filled block of host memory.
#[derive(Debug)]
pub struct HostBuffer {
    ptr: NonNull<u8>,
    layout: Layout,
}

// The buffer owns its allocation exclusively, the same as a `Box<[u8]>`.
unsafe impl Send for HostBuffer {}

impl HostBuffer {
    /// Allocate `size` zeroed bytes aligned to [`HOST_BUFFER_ALIGN`].
    ///
    /// # Returns: `Result<HostBuffer, HelloAccelError>`
    /// * `Ok(HostBuffer)` - Registered, zero-filled buffer
    /// * `Err(HelloAccelError::Alloc)` - `size` is zero, too large, or the allocator failed
    pub fn zeroed(size: usize) -> Result<Self, HelloAccelError> {
        if size == 0 {
            return Err(HelloAccelError::Alloc {
                size,
                reason: "cannot stage an empty buffer".into(),
            });
        }
        let layout =
            Layout::from_size_align(size, HOST_BUFFER_ALIGN).map_err(|e| HelloAccelError::Alloc {
                size,
                reason: e.to_string(),
            })?;
        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or_else(|| HelloAccelError::Alloc {
            size,
            reason: "allocator returned null".into(),
        })?;
        let buffer = HostBuffer { ptr, layout };
        host_regions()
            .lock()
            .map_err(|_| HelloAccelError::Internal("couldn't lock HOST_REGIONS".into()))?
            .insert(buffer.addr(), size);
        trace!("allocated {size} bytes of host memory at {:#018x}", buffer.addr());
        Ok(buffer)
    }

    /// Address of the first byte as the card sees it.
    pub fn addr(&self) -> u64 {
        self.ptr.as_ptr() as u64
    }

    pub fn len(&self) -> usize {
        self.layout.size()
    }

    pub fn is_empty(&self) -> bool {
        self.layout.size() == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr is valid for len() initialised bytes for the lifetime of self.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above, and &mut self guarantees exclusive access.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len()) }
    }
}

impl Drop for HostBuffer {
    fn drop(&mut self) {
        if let Ok(mut regions) = host_regions().lock() {
            regions.remove(&self.addr());
        }
        trace!("freeing {} bytes of host memory at {:#018x}", self.len(), self.addr());
        // SAFETY: ptr was returned by alloc_zeroed with this exact layout.
        unsafe { dealloc(self.ptr.as_ptr(), self.layout) }
    }
}

fn covers(regions: &BTreeMap<u64, usize>, addr: u64, len: usize) -> bool {
    let Some(end) = addr.checked_add(len as u64) else {
        return false;
    };
    match regions.range(..=addr).next_back() {
        Some((&start, &size)) => end <= start + size as u64,
        None => false,
    }
}

/// Check that `[addr, addr + len)` lies entirely inside one live [`HostBuffer`].
pub fn host_range_is_staged(addr: u64, len: usize) -> bool {
    host_regions()
        .lock()
        .map(|regions| covers(&regions, addr, len))
        .unwrap_or(false)
}

/// Run `f` over the staged host bytes at `[addr, addr + len)`.
///
/// Returns `None` if the range is not inside a live buffer. The registry lock is held while
/// `f` runs, so the buffer cannot be freed underneath it.
pub(crate) fn with_host_range<R>(addr: u64, len: usize, f: impl FnOnce(&[u8]) -> R) -> Option<R> {
    let regions = host_regions().lock().ok()?;
    if !covers(&regions, addr, len) {
        return None;
    }
    // SAFETY: the range lies inside a live allocation that stays registered (and therefore
    // allocated) while the lock is held. No exclusive borrow of the owning HostBuffer exists
    // while a job executes.
    let bytes = unsafe { std::slice::from_raw_parts(addr as *const u8, len) };
    Some(f(bytes))
}

/// Copy `data` into the staged host bytes starting at `addr`.
///
/// Returns `false` without writing anything if the destination is not inside a live buffer.
pub(crate) fn write_host_range(addr: u64, data: &[u8]) -> bool {
    let Ok(regions) = host_regions().lock() else {
        return false;
    };
    if !covers(&regions, addr, data.len()) {
        return false;
    }
    // SAFETY: see with_host_range. `data` is an owned copy, never an alias of the destination.
    unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), addr as *mut u8, data.len()) };
    true
}
