// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Helpers shared by the action library tests.

use gw_core::action::{run_collected, Action, Execution};
use gw_core::cache::ActionCache;
use gw_core::error::ActionError;
use gw_core::result::ResultState;
use std::io::Write;
use std::path::Path;

/// Execution context for tests, with a fresh per-test cache.
#[derive(Default)]
pub struct TestExec {
    cache: ActionCache,
}

impl TestExec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Execution for TestExec {
    fn name(&self) -> &str {
        "test"
    }

    fn cache(&self) -> &ActionCache {
        &self.cache
    }

    fn transfer_file(&self, src: &Path, out: &mut dyn Write) -> Result<(), ActionError> {
        let mut file = std::fs::File::open(src)?;
        std::io::copy(&mut file, out)?;
        Ok(())
    }
}

/// Run one action through the collect region and return its terminal state.
pub fn run(action: &mut dyn Action) -> ResultState {
    let exec = TestExec::new();
    run_collected(action, &exec);
    action.meta().result.state
}

/// Run one action, panicking with the recorded error if it failed.
pub fn run_ok(action: &mut dyn Action) -> ResultState {
    let state = run(action);
    assert_ne!(
        state,
        ResultState::Failed,
        "action failed: {:?}",
        action.meta().result.exc_val
    );
    state
}

/// Mode bits of a path.
pub fn mode_of(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).unwrap().permissions().mode() & 0o7777
}
