// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The action contract: the declarative unit of work moved between
//! controller and targets.

use crate::asset::FileAsset;
use crate::cache::ActionCache;
use crate::error::ActionError;
use crate::result::{ActionResult, ResultState};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use uuid::Uuid;

/// Execution-side services available to a running action.
pub trait Execution {
    /// Name of the system being provisioned, for log context.
    fn name(&self) -> &str;

    /// Typed per-host cache where actions memoise expensive probes.
    fn cache(&self) -> &ActionCache;

    /// Fetch file `src` from the controller and write it to `out`.
    fn transfer_file(&self, src: &Path, out: &mut dyn Write) -> Result<(), ActionError>;
}

/// Identity and bookkeeping shared by every action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMeta {
    /// Stable identifier, assigned at construction and preserved across the wire.
    #[serde(default = "Uuid::new_v4")]
    pub uuid: Uuid,
    /// When true, compute change intent without mutating the system.
    #[serde(default)]
    pub check: bool,
    #[serde(default)]
    pub result: ActionResult,
}

impl Default for ActionMeta {
    fn default() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            check: false,
            result: ActionResult::default(),
        }
    }
}

impl ActionMeta {
    /// Mark that this action has changed something on the target.
    pub fn set_changed(&mut self) {
        self.result.state = ResultState::Changed;
    }
}

/// Static contract implemented by every concrete action type.
///
/// The object-safe [`Action`] facade is provided blanket-wise for any
/// `ActionData`; `Box<dyn Action>` is what pipelines and transports move
/// around.
pub trait ActionData: Serialize + DeserializeOwned + Send + Any {
    /// Fully-qualified type tag used in the wire envelope.
    const TAG: &'static str;

    /// Names of fields carrying raw bytes, re-encoded as text on the JSON wire.
    const BINARY_FIELDS: &'static [&'static str] = &[];

    /// Names of fields holding [`FileAsset`] values.
    const ASSET_FIELDS: &'static [&'static str] = &[];

    /// Facts actions merge their public fields into the requesting role.
    const IS_FACTS: bool = false;

    fn meta(&self) -> &ActionMeta;
    fn meta_mut(&mut self) -> &mut ActionMeta;

    /// Short human description of this action.
    fn summary(&self) -> String;

    /// Reject invalid or conflicting configurations before the action is
    /// enqueued.
    fn validate(&self) -> Result<(), ActionError> {
        Ok(())
    }

    /// Controller-side files this action needs; the Runner registers them
    /// with the transport's file service before dispatch.
    fn local_files_needed(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// Mutable access to asset fields so transports can remap them.
    fn assets_mut(&mut self) -> Vec<&mut FileAsset> {
        Vec::new()
    }

    /// Perform the work. The state starts at NOOP; call
    /// [`ActionMeta::set_changed`] whenever a mutation is performed.
    fn run(&mut self, exec: &dyn Execution) -> Result<(), ActionError>;
}

/// Object-safe action facade; see [`ActionData`] for the implementor side.
pub trait Action: Send {
    fn type_tag(&self) -> &'static str;
    fn meta(&self) -> &ActionMeta;
    fn meta_mut(&mut self) -> &mut ActionMeta;
    fn summary(&self) -> String;
    fn binary_fields(&self) -> &'static [&'static str];
    fn asset_fields(&self) -> &'static [&'static str];
    fn is_facts(&self) -> bool;
    fn validate(&self) -> Result<(), ActionError>;
    fn local_files_needed(&self) -> Vec<PathBuf>;
    fn assets_mut(&mut self) -> Vec<&mut FileAsset>;

    /// The action's own fields as a JSON object, without envelope keys.
    fn fields_value(&self) -> Result<serde_json::Value, serde_json::Error>;

    fn run(&mut self, exec: &dyn Execution) -> Result<(), ActionError>;

    /// Called by the pipeline executor instead of `run` when the pipeline is
    /// already in the failed state.
    fn run_pipeline_failed(&mut self);

    /// Called when the action's `when` conditions are unmet.
    fn run_pipeline_skipped(&mut self, reason: &str);

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: ActionData> Action for T {
    fn type_tag(&self) -> &'static str {
        T::TAG
    }

    fn meta(&self) -> &ActionMeta {
        ActionData::meta(self)
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        ActionData::meta_mut(self)
    }

    fn summary(&self) -> String {
        ActionData::summary(self)
    }

    fn binary_fields(&self) -> &'static [&'static str] {
        T::BINARY_FIELDS
    }

    fn asset_fields(&self) -> &'static [&'static str] {
        T::ASSET_FIELDS
    }

    fn is_facts(&self) -> bool {
        T::IS_FACTS
    }

    fn validate(&self) -> Result<(), ActionError> {
        ActionData::validate(self)
    }

    fn local_files_needed(&self) -> Vec<PathBuf> {
        ActionData::local_files_needed(self)
    }

    fn assets_mut(&mut self) -> Vec<&mut FileAsset> {
        ActionData::assets_mut(self)
    }

    fn fields_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    fn run(&mut self, exec: &dyn Execution) -> Result<(), ActionError> {
        ActionData::run(self, exec)
    }

    fn run_pipeline_failed(&mut self) {
        tracing::info!(
            action = T::TAG,
            "skipped: a previous action failed in the same pipeline"
        );
        ActionData::meta_mut(self).result.state = ResultState::Skipped;
    }

    fn run_pipeline_skipped(&mut self, reason: &str) {
        tracing::info!(action = T::TAG, reason, "skipped");
        ActionData::meta_mut(self).result.state = ResultState::Skipped;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Boxed action moving through pipelines and transports.
pub type BoxAction = Box<dyn Action>;

/// Run the action inside the result-collect region.
///
/// The state is reset to NOOP first; any error is captured into the result
/// (state FAILED, classifier, message, source chain) instead of propagating,
/// and elapsed wall time is always recorded.
pub fn run_collected(action: &mut dyn Action, exec: &dyn Execution) {
    let start = Instant::now();
    action.meta_mut().result.state = ResultState::Noop;
    let outcome = action.run(exec);
    let result = &mut action.meta_mut().result;
    if let Err(err) = outcome {
        result.record_failure(&err);
    }
    result.elapsed = Some(elapsed_ns(start));
}

pub(crate) fn elapsed_ns(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
