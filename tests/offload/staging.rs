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

use crate::common::test_functions::{cpu_file_options, scratch_with_input, temp_file_with};
use googletest::prelude::*;
use helloaccel::client::{ClientState, OffloadClient, OffloadOptions};
use helloaccel::error::HelloAccelError;
use helloaccel::job::AddressSpace;
use helloaccel::memory::host_range_is_staged;
use helloaccel::system_io::fs_file_size;
use rstest::*;
use std::path::Path;

#[gtest]
#[rstest]
#[case::not_found(
    "bad_input",
    err(displays_as(contains_substring("No such file or directory")))
)]
#[case::is_dir("/etc/", err(displays_as(contains_substring("HelloAccelError::IOSize"))))]
#[case::ok("Cargo.toml", ok(anything()))]
fn test_fs_file_size<M: for<'a> Matcher<&'a std::result::Result<u64, HelloAccelError>>>(
    #[case] path_str: &str,
    #[case] condition: M,
) {
    let r = fs_file_size(Path::new(path_str));
    expect_that!(r, condition);
}

#[gtest]
#[rstest]
#[case::one_byte(1)]
#[case::one_page(4096)]
#[case::unaligned(4099)]
fn input_file_is_staged_verbatim(#[case] len: usize) {
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    let scratch = scratch_with_input(&data);
    let mut client = OffloadClient::new(cpu_file_options(&scratch));

    client.stage_input().expect("staging a readable file");
    let params = client.parameters().clone();
    expect_that!(client.state(), eq(ClientState::InputStaged));
    expect_that!(params.size, eq(len));
    expect_that!(params.type_in, eq(AddressSpace::HostDram));
    assert_eq!(client.input(), Some(&data[..]));
    expect_true!(host_range_is_staged(params.addr_in, len));
    expect_that!(params.addr_in % 64, eq(0));
}

#[gtest]
fn input_file_overrides_size_and_source() {
    let file = temp_file_with(b"abc");
    let mut client = OffloadClient::new(OffloadOptions {
        input: Some(file.path().to_path_buf()),
        src_space: AddressSpace::CardDram,
        src_addr: Some(0x1000),
        size: Some(1 << 20),
        ..OffloadOptions::default()
    });
    client.stage_input().expect("staging a readable file");
    expect_that!(client.parameters().size, eq(3));
    expect_that!(client.parameters().type_in, eq(AddressSpace::HostDram));
    expect_that!(client.parameters().addr_in, not(eq(0x1000)));
}

#[gtest]
fn output_file_forces_host_destination() {
    let scratch = scratch_with_input(b"hello");
    let mut client = OffloadClient::new(OffloadOptions {
        dst_space: AddressSpace::CardDram,
        dst_addr: Some(0x2000),
        ..cpu_file_options(&scratch)
    });
    client.stage_input().expect("staging input");
    client.stage_output().expect("staging output");
    expect_that!(client.state(), eq(ClientState::Staged));
    expect_that!(client.parameters().type_out, eq(AddressSpace::HostDram));
    assert_eq!(client.output(), Some(&[0u8; 5][..]));
}

#[gtest]
fn empty_input_file_is_an_allocation_error() {
    let scratch = scratch_with_input(b"");
    let mut client = OffloadClient::new(cpu_file_options(&scratch));
    let res = client.stage_input();
    expect_true!(matches!(res, Err(HelloAccelError::Alloc { size: 0, .. })));
    expect_that!(client.state(), eq(ClientState::Failed));
    expect_true!(client.input().is_none());
}

#[gtest]
fn missing_input_file_fails_before_anything_is_opened() {
    let dir = tempfile::tempdir().expect("failed to create scratch dir");
    let mut client = OffloadClient::new(OffloadOptions {
        input: Some(dir.path().join("missing")),
        ..OffloadOptions::default()
    });
    let res = client.stage_input();
    expect_true!(matches!(res, Err(HelloAccelError::IOSize { .. })));
    expect_that!(client.state(), eq(ClientState::Failed));
    expect_true!(client.stage_output().is_err());
}
