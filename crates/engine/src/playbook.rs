// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Playbook fan-out: one driver thread per declared host.

use crate::error::RunnerError;
use crate::host::Host;
use crate::runner::Runner;
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Command-line surface shared by playbook binaries.
#[derive(Debug, Default, Parser)]
pub struct PlaybookArgs {
    /// Do not perform changes; report what would change.
    #[arg(short = 'C', long)]
    pub check: bool,
    /// Verbose output.
    #[arg(short, long)]
    pub verbose: bool,
    /// Debug output.
    #[arg(long)]
    pub debug: bool,
}

/// A playbook: a set of hosts and the roles to apply to each.
///
/// Hosts execute independently on their own driver threads; there is no
/// cross-host synchronisation.
pub trait Playbook: Sync {
    /// All the hosts this playbook needs to run on.
    fn hosts(&self) -> Vec<Host>;

    /// Add roles for one host. Called once per host, on its driver thread.
    fn start(&self, host: &Host, runner: &mut Runner) -> Result<(), RunnerError>;
}

/// Entry point for playbook binaries: parse arguments, configure logging,
/// fan out, and fold the per-host outcomes into an exit code.
pub fn main(playbook: &impl Playbook) -> ExitCode {
    let args = PlaybookArgs::parse();
    init_logging(&args);
    match run(playbook, &args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failed_hosts) => {
            tracing::error!(failed_hosts, "playbook finished with failures");
            ExitCode::FAILURE
        }
    }
}

/// Run the playbook across its hosts; `Err` carries the failed-host count.
pub fn run<P: Playbook>(playbook: &P, args: &PlaybookArgs) -> Result<(), usize> {
    let hosts = playbook.hosts();
    let mut failed = 0usize;

    std::thread::scope(|scope| {
        let handles: Vec<_> = hosts
            .iter()
            .map(|host| (host, scope.spawn(move || host_main(playbook, host, args.check))))
            .collect();

        for (host, handle) in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(host = %host.name, error = %err, "host failed");
                    failed += 1;
                }
                Err(_) => {
                    // An engine bug killed the driver; the other hosts keep
                    // their results.
                    tracing::error!(host = %host.name, "host driver panicked");
                    failed += 1;
                }
            }
        }
    });

    if failed == 0 {
        Ok(())
    } else {
        Err(failed)
    }
}

fn host_main<P: Playbook>(playbook: &P, host: &Host, check: bool) -> Result<(), RunnerError> {
    let system = host.make_system()?;
    let mut runner = Runner::new(system).with_check_mode(check);
    playbook.start(host, &mut runner)?;
    runner.main()?;
    runner.close()
}

fn init_logging(args: &PlaybookArgs) {
    let directive = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        // Quiet by default, but always show the per-action progress line.
        "warn,progress=info"
    };
    let filter = EnvFilter::try_new(directive).unwrap_or_default();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
#[path = "playbook_tests.rs"]
mod tests;
