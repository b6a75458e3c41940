// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control actions with no system footprint.

use gw_core::action::{ActionData, ActionMeta, Execution};
use gw_core::error::ActionError;
use serde::{Deserialize, Serialize};

/// Do nothing, successfully.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Noop {
    #[serde(flatten)]
    pub meta: ActionMeta,
    /// Pretend the action performed changes.
    #[serde(default)]
    pub changed: bool,
}

impl ActionData for Noop {
    const TAG: &'static str = "groundwork.actions.misc.Noop";

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        "Do nothing".to_string()
    }

    fn run(&mut self, _exec: &dyn Execution) -> Result<(), ActionError> {
        if self.changed {
            self.meta.set_changed();
        }
        Ok(())
    }
}

/// Fail with a custom message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fail {
    #[serde(flatten)]
    pub meta: ActionMeta,
    #[serde(default = "Fail::default_msg")]
    pub msg: String,
}

impl Fail {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            meta: ActionMeta::default(),
            msg: msg.into(),
        }
    }

    fn default_msg() -> String {
        "Failed as requested from task".to_string()
    }
}

impl Default for Fail {
    fn default() -> Self {
        Self::new(Self::default_msg())
    }
}

impl ActionData for Fail {
    const TAG: &'static str = "groundwork.actions.misc.Fail";

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        format!("Fail: {}", self.msg)
    }

    fn run(&mut self, _exec: &dyn Execution) -> Result<(), ActionError> {
        Err(ActionError::Message(self.msg.clone()))
    }
}

#[cfg(test)]
#[path = "misc_tests.rs"]
mod tests;
