// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pipeline metadata and the per-host pipeline state machine.

use crate::action::{elapsed_ns, run_collected, BoxAction, Execution};
use crate::result::ResultState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use uuid::Uuid;

/// Metadata controlling the pipelined execution of one action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineInfo {
    /// Pipeline this action belongs to; defaults to the sending role's id.
    pub id: String,
    /// Execute only if, for every entry, the recorded state of the named
    /// prior action is one of those listed.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub when: BTreeMap<Uuid, Vec<ResultState>>,
}

impl PipelineInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            when: BTreeMap::new(),
        }
    }
}

/// Per-pipeline execution record.
#[derive(Debug, Default)]
pub struct PipelineState {
    /// Once set, subsequent actions complete as SKIPPED until cleared.
    pub failed: bool,
    /// Terminal state of every action seen on this pipeline.
    pub states: HashMap<Uuid, ResultState>,
}

/// Pipeline records owned by the executing side of a transport.
///
/// Records are created on the first action of a pipeline and kept until an
/// explicit close; they are never garbage-collected on their own.
#[derive(Default)]
pub struct PipelineSet {
    pipelines: HashMap<String, PipelineState>,
}

impl PipelineSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pipeline_id: &str) -> Option<&PipelineState> {
        self.pipelines.get(pipeline_id)
    }

    fn entry(&mut self, pipeline_id: &str) -> &mut PipelineState {
        self.pipelines
            .entry(pipeline_id.to_string())
            .or_default()
    }

    /// Reset the `failed` flag so subsequent actions run again.
    pub fn clear_failed(&mut self, pipeline_id: &str) {
        self.entry(pipeline_id).failed = false;
    }

    /// Discard all state about a pipeline.
    pub fn close(&mut self, pipeline_id: &str) {
        self.pipelines.remove(pipeline_id);
    }

    /// Run one action under the pipeline state machine.
    ///
    /// A failed pipeline skips the action outright; unmet `when` conditions
    /// skip it with a reason; otherwise the action runs inside the
    /// result-collect region and a FAILED outcome trips the pipeline.
    pub fn execute(
        &mut self,
        exec: &dyn Execution,
        mut action: BoxAction,
        info: &PipelineInfo,
    ) -> BoxAction {
        let pipeline = self.entry(&info.id);

        if pipeline.failed {
            let start = Instant::now();
            action.run_pipeline_failed();
            action.meta_mut().result.elapsed = Some(elapsed_ns(start));
            pipeline
                .states
                .insert(action.meta().uuid, action.meta().result.state);
            return action;
        }

        for (prior, allowed) in &info.when {
            let satisfied = pipeline
                .states
                .get(prior)
                .is_some_and(|state| allowed.contains(state));
            if !satisfied {
                let start = Instant::now();
                action.run_pipeline_skipped("pipeline condition not met");
                action.meta_mut().result.elapsed = Some(elapsed_ns(start));
                pipeline
                    .states
                    .insert(action.meta().uuid, action.meta().result.state);
                return action;
            }
        }

        run_collected(action.as_mut(), exec);
        let state = action.meta().result.state;
        if state == ResultState::Failed {
            pipeline.failed = true;
        }
        pipeline.states.insert(action.meta().uuid, state);
        action
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
