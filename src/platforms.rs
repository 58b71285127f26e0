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

//! Accelerator card backends.
//!
//! [`platform`] defines the [`Card`](platform::Card) and [`Action`](platform::Action) traits
//! and the backend registry. [`software`] emulates the changecase action on the CPU and
//! `ocaccel` (feature-gated) binds the vendor library.

#[cfg(feature = "ocaccel")]
pub mod ocaccel;
pub mod platform;
pub mod software;
