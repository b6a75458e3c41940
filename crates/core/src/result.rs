// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result protocol: terminal states and the execution record every action carries.

use crate::error::ActionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal states of an action run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultState {
    /// No state is available yet.
    #[default]
    None,
    /// The action did not need to change anything.
    Noop,
    /// The action changed the target system.
    Changed,
    /// The action was not run, for example because a previous action failed.
    Skipped,
    /// The action ran and reported an error.
    Failed,
}

impl fmt::Display for ResultState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultState::None => "none",
            ResultState::Noop => "noop",
            ResultState::Changed => "changed",
            ResultState::Skipped => "skipped",
            ResultState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// One command run by an action, as recorded in its result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub cmdline: Vec<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub returncode: Option<i32>,
}

/// Execution record carried by every action across the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    #[serde(default)]
    pub state: ResultState,
    /// Elapsed wall time in nanoseconds.
    #[serde(default)]
    pub elapsed: Option<u64>,
    /// Error classifier, set when the action failed.
    #[serde(default)]
    pub exc_type: Option<String>,
    /// Error message, set when the action failed.
    #[serde(default)]
    pub exc_val: Option<String>,
    /// Rendered chain of error sources, outermost first.
    #[serde(default)]
    pub exc_tb: Vec<String>,
    /// Trace of commands run by the action.
    #[serde(default)]
    pub command_log: Vec<CommandResult>,
}

impl ActionResult {
    /// Record a failure: state, classifier, message and the source chain.
    pub fn record_failure(&mut self, err: &ActionError) {
        self.state = ResultState::Failed;
        self.exc_type = Some(err.kind().to_string());
        self.exc_val = Some(err.to_string());
        self.exc_tb = error_chain(err);
    }
}

fn error_chain(err: &ActionError) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        chain.push(e.to_string());
        current = e.source();
    }
    chain
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
