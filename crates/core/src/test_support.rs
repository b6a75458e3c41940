// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test helpers shared by the core unit tests.

use crate::action::{ActionData, ActionMeta, Execution};
use crate::asset::FileAsset;
use crate::cache::ActionCache;
use crate::error::ActionError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Minimal action used by core tests: optionally reports a change, fails on
/// demand, and carries binary and asset fields for envelope round-trips.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Probe {
    #[serde(flatten)]
    pub meta: ActionMeta,
    #[serde(default)]
    pub changed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<FileAsset>,
}

impl ActionData for Probe {
    const TAG: &'static str = "groundwork.test.Probe";
    const BINARY_FIELDS: &'static [&'static str] = &["payload"];
    const ASSET_FIELDS: &'static [&'static str] = &["asset"];

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        "test probe".to_string()
    }

    fn assets_mut(&mut self) -> Vec<&mut FileAsset> {
        self.asset.as_mut().into_iter().collect()
    }

    fn run(&mut self, _exec: &dyn Execution) -> Result<(), ActionError> {
        if let Some(msg) = &self.fail {
            return Err(ActionError::Message(msg.clone()));
        }
        if self.changed {
            self.meta.set_changed();
        }
        Ok(())
    }
}

/// Execution context for tests: a scratch name and a fresh cache.
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
