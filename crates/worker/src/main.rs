// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote worker binary.
//!
//! Spawned on a target host by the Remote transport (e.g. over ssh); speaks
//! the frame protocol on stdin/stdout and logs to stderr, which the
//! controller passes through.

use std::io::BufReader;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let input = BufReader::new(std::io::stdin());
    let output = std::io::stdout();
    match gw_system::worker::serve(input, output, gw_actions::builtin()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "worker loop failed");
            ExitCode::FAILURE
        }
    }
}
