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

//! `helloaccel` - run the changecase action once and report the result.
//!
//! Reads the input file into host memory, lets the action upper-case it into an output
//! buffer, writes the output file and optionally verifies it.
//!
//! # Exit status
//!
//! - `0` - The job succeeded (and verified, if `-X` was given)
//! - `1` - Usage error, I/O error, card/action error or a failing job
//! - `65` - The job succeeded but `-X` found a mismatch

use clap::CommandFactory;
use clap::Parser;
use clap::error::ErrorKind;
use helloaccel::client::OffloadClient;
use helloaccel::config::TRACE_ENV;
use helloaccel::error::HelloAccelError;
use log::debug;
use std::process::ExitCode;

mod args;

use crate::args::Cli;

/// Stage, print the parameters, run the job and print the result.
fn run(cli: Cli) -> Result<u8, HelloAccelError> {
    let mut client = OffloadClient::new(cli.into_options());
    client.stage_input()?;
    client.stage_output()?;
    println!("{}", client.parameters());

    match client.complete() {
        Ok(report) => {
            println!("SUCCESS");
            println!("helloaccel took {} usec", report.elapsed.as_micros());
            Ok(report.exit_code())
        }
        Err(e @ HelloAccelError::Retc(_)) => {
            println!("FAILED");
            Err(e)
        }
        Err(e) => Err(e),
    }
}

fn main() -> ExitCode {
    // provide help when called without arguments
    if std::env::args_os().len() == 1 {
        let _ = Cli::command().print_help();
        return ExitCode::FAILURE;
    }
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    let level = match cli.verbose {
        true => "debug",
        false => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    debug!("parsed cli command with {cli:?}");
    if let Ok(mask) = std::env::var(TRACE_ENV) {
        debug!("vendor library trace mask {TRACE_ENV}={mask}");
    }

    helloaccel::register_backends();
    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => ExitCode::from(e.exit_code()),
    }
}
