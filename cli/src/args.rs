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

use clap::Parser;
use helloaccel::client::OffloadOptions;
use helloaccel::config::DEFAULT_TIMEOUT_SECS;
use helloaccel::job::AddressSpace;
use std::path::PathBuf;
use std::time::Duration;

const AFTER_HELP: &str = r#"Useful environment variables (to be placed before the command):
  OCACCEL_CONFIG=CPU   run the action in software instead of on the FPGA
  OCACCEL_TRACE=0x0    no debug trace (default mode)
  OCACCEL_TRACE=0xF    full debug trace
  RUST_LOG=debug       verbose host-side logging

Example:
  echo "Hello world. This is my first OpenCAPI experience. It's real fun." > /tmp/t1
  helloaccel -i /tmp/t1 -o /tmp/t2
  cat /tmp/t2    # UPPER CASE expected
"#;

#[derive(Parser, Debug)]
#[command(name = "helloaccel")]
#[command(bin_name = "helloaccel")]
#[command(version, about = "Run the changecase action on an OpenCAPI accelerator card")]
#[command(after_help = AFTER_HELP)]
pub struct Cli {
    #[arg(short = 'C', long = "card", default_value = "0", value_parser = parse_card,
        help = "card to be used for the operation, can be (0...3)")]
    pub card: u32,
    #[arg(short, long, help = "input file")]
    pub input: Option<PathBuf>,
    #[arg(short, long, help = "output file")]
    pub output: Option<PathBuf>,
    #[arg(short = 'A', long = "src-type", value_parser = parse_space,
        help = "source address space: HOST_DRAM, CARD_DRAM or TYPE_NVME")]
    pub src_type: Option<AddressSpace>,
    #[arg(short = 'a', long = "src-addr", value_parser = parse_addr,
        help = "source address, e.g. in CARD_DRAM")]
    pub src_addr: Option<u64>,
    #[arg(short = 'D', long = "dst-type", value_parser = parse_space,
        help = "destination address space: HOST_DRAM, CARD_DRAM or TYPE_NVME")]
    pub dst_type: Option<AddressSpace>,
    #[arg(short = 'd', long = "dst-addr", value_parser = parse_addr,
        help = "destination address, e.g. in CARD_DRAM")]
    pub dst_addr: Option<u64>,
    #[arg(short, long, value_parser = parse_size,
        help = "size of data when there is no input file (suffixes K, M, G)")]
    pub size: Option<usize>,
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS, value_parser = parse_timeout,
        help = "timeout in sec to wait for done")]
    pub timeout: u64,
    #[arg(short = 'X', long, help = "verify result if possible")]
    pub verify: bool,
    #[arg(short = 'N', long = "no-irq", help = "disable interrupts, poll for completion")]
    pub no_irq: bool,
    #[arg(short, long, help = "log debug output")]
    pub verbose: bool,
}

impl Cli {
    pub fn into_options(self) -> OffloadOptions {
        let defaults = OffloadOptions::default();
        OffloadOptions {
            card_no: self.card,
            input: self.input,
            output: self.output,
            src_space: self.src_type.unwrap_or(defaults.src_space),
            src_addr: self.src_addr,
            dst_space: self.dst_type.unwrap_or(defaults.dst_space),
            dst_addr: self.dst_addr,
            size: self.size,
            timeout: Duration::from_secs(self.timeout),
            verify: self.verify,
            irq: !self.no_irq,
            ..defaults
        }
    }
}

/// Parse an unsigned number the way C's `strtoul(s, NULL, 0)` does: `0x` prefix for hex,
/// a leading `0` for octal, decimal otherwise.
pub fn parse_number(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, radix) = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };
    u64::from_str_radix(digits, radix).map_err(|e| format!("{s:?} is not a number: {e}"))
}

fn parse_card(s: &str) -> Result<u32, String> {
    let n = parse_number(s)?;
    u32::try_from(n).map_err(|_| format!("card number {n} is out of range"))
}

fn parse_addr(s: &str) -> Result<u64, String> {
    parse_number(s)
}

fn parse_timeout(s: &str) -> Result<u64, String> {
    parse_number(s)
}

fn parse_space(s: &str) -> Result<AddressSpace, String> {
    s.parse::<AddressSpace>().map_err(|e| e.to_string())
}

/// Parse a size with an optional binary unit suffix: `K`/`KiB`, `M`/`MiB`, `G`/`GiB`.
pub fn parse_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let (number, shift) = [("KiB", 10), ("MiB", 20), ("GiB", 30), ("K", 10), ("M", 20), ("G", 30)]
        .iter()
        .find_map(|&(unit, shift)| s.strip_suffix(unit).map(|n| (n, shift)))
        .unwrap_or((s, 0));
    let value = parse_number(number)?;
    value
        .checked_mul(1u64 << shift)
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| format!("{s:?} is too large"))
}
