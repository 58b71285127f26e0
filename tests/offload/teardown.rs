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

use crate::common::mock_backend::{Counts, MOCK_BACKEND, counts, setup_mock_backend};
use crate::common::test_functions::{file_options, scratch_with_input};
use googletest::prelude::*;
use helloaccel::client::{ClientState, OffloadClient, OffloadOptions};
use helloaccel::error::HelloAccelError;
use rstest::*;

fn mock_client(card_no: u32, input: &[u8]) -> (OffloadClient, crate::common::test_functions::Scratch) {
    setup_mock_backend();
    let scratch = scratch_with_input(input);
    let client = OffloadClient::new(OffloadOptions {
        card_no,
        verify: true,
        ..file_options(&scratch, MOCK_BACKEND)
    });
    (client, scratch)
}

#[gtest]
#[rstest]
#[case::copy(0, true, 1, 1)]
#[case::open_fails(1, false, 0, 0)]
#[case::attach_fails(2, false, 1, 0)]
#[case::execute_fails(3, false, 1, 1)]
#[case::retc_failure(4, false, 1, 1)]
#[case::guard_overrun(5, true, 1, 1)]
fn every_resource_is_released_once(
    #[case] card_no: u32,
    #[case] succeeds: bool,
    #[case] cards: u32,
    #[case] actions: u32,
) {
    let (mut client, _scratch) = mock_client(card_no, b"some input");
    client.stage_input().unwrap();
    client.stage_output().unwrap();
    let res = client.complete();

    expect_that!(res.is_ok(), eq(succeeds));
    let c = counts();
    expect_that!(c.cards_opened, eq(cards));
    expect_that!(c.cards_released, eq(cards));
    expect_that!(c.actions_attached, eq(actions));
    expect_that!(c.actions_detached, eq(actions));
    expect_true!(client.input().is_none());
    expect_true!(client.output().is_none());
    let expected_state = match succeeds {
        true => ClientState::TornDown,
        false => ClientState::Failed,
    };
    expect_that!(client.state(), eq(expected_state));

    // a second teardown releases nothing more
    client.teardown();
    expect_that!(counts().cards_released, eq(cards));
    expect_that!(counts().actions_detached, eq(actions));
}

#[gtest]
#[rstest]
#[case::open(1)]
#[case::attach(2)]
#[case::execute(3)]
#[case::retc(4)]
fn failures_surface_the_right_error(#[case] card_no: u32) {
    let (client, _scratch) = mock_client(card_no, b"x");
    let res = client.run();
    let matched = match (card_no, &res) {
        (1, Err(HelloAccelError::CardOpen { .. })) => true,
        (2, Err(HelloAccelError::ActionAttach { .. })) => true,
        (3, Err(HelloAccelError::Execute { rc: -110, .. })) => true,
        (4, Err(HelloAccelError::Retc(0x104))) => true,
        _ => false,
    };
    expect_true!(matched);
    expect_that!(res.err().map(|e| e.exit_code()), some(eq(1)));
}

#[gtest]
fn failing_job_still_writes_the_output_file() {
    let (client, scratch) = mock_client(4, b"data");
    let res = client.run();
    expect_true!(matches!(res, Err(HelloAccelError::Retc(_))));
    // output is written before the return code is checked
    assert_eq!(std::fs::read(&scratch.output).unwrap(), vec![0u8; 4]);
}

#[gtest]
fn open_failure_leaves_no_output_file() {
    let (client, scratch) = mock_client(1, b"data");
    expect_true!(client.run().is_err());
    expect_false!(scratch.output.exists());
}

#[gtest]
fn dropping_a_client_mid_run_releases_the_session() {
    let (mut client, _scratch) = mock_client(0, b"abc");
    client.stage_input().unwrap();
    client.stage_output().unwrap();
    client.acquire_session().unwrap();
    expect_that!(
        counts(),
        eq(Counts {
            cards_opened: 1,
            actions_attached: 1,
            ..Counts::default()
        })
    );
    drop(client);
    let c = counts();
    expect_that!(c.cards_released, eq(1));
    expect_that!(c.actions_detached, eq(1));
    expect_that!(c.jobs_executed, eq(0));
}

#[gtest]
fn steps_cannot_be_repeated() {
    let (mut client, _scratch) = mock_client(0, b"abc");
    client.stage_input().unwrap();
    expect_true!(matches!(client.stage_input(), Err(HelloAccelError::Internal(_))));
    expect_that!(client.state(), eq(ClientState::InputStaged));
}
