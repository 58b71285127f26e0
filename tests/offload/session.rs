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

use crate::common::mock_backend::{IrqSetup, MOCK_BACKEND, counts, irq_setup, setup_mock_backend};
use crate::common::test_functions::{file_options, scratch_with_input};
use googletest::prelude::*;
use helloaccel::client::{OffloadClient, OffloadOptions, Session};
use helloaccel::config::ACTION_IRQ_SRC_LO;
use helloaccel::platforms::platform::ActionFlags;
use rstest::*;

#[gtest]
#[rstest]
#[case::interrupt(true, ActionFlags::DONE_IRQ, Some(ACTION_IRQ_SRC_LO))]
#[case::polling(false, ActionFlags::empty(), None)]
fn completion_mode_follows_irq_option(
    #[case] irq: bool,
    #[case] flags: ActionFlags,
    #[case] armed: Option<u32>,
) {
    setup_mock_backend();
    let scratch = scratch_with_input(b"abc");
    let report = OffloadClient::new(OffloadOptions {
        irq,
        ..file_options(&scratch, MOCK_BACKEND)
    })
    .run()
    .expect("mock copy run");

    expect_that!(report.retc, eq(helloaccel::job::RETC_SUCCESS));
    expect_that!(
        irq_setup(),
        eq(IrqSetup {
            attach_flags: Some(flags),
            armed_irq_source: armed,
        })
    );
}

#[gtest]
#[rstest]
#[case::interrupt(true, ActionFlags::DONE_IRQ, Some(ACTION_IRQ_SRC_LO))]
#[case::polling(false, ActionFlags::empty(), None)]
fn session_acquire_sets_up_completion(
    #[case] irq: bool,
    #[case] flags: ActionFlags,
    #[case] armed: Option<u32>,
) {
    setup_mock_backend();
    let mut session = Session::acquire(MOCK_BACKEND, 0, irq).expect("mock card 0 opens");
    expect_that!(irq_setup().attach_flags, eq(Some(flags)));
    expect_that!(irq_setup().armed_irq_source, eq(armed));
    session.release();
    expect_that!(counts().actions_detached, eq(1));
    expect_that!(counts().cards_released, eq(1));
}
