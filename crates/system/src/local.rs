// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-process transport: actions run in the caller's process.

use crate::error::SystemError;
use crate::system::System;
use gw_core::action::{run_collected, BoxAction, Execution};
use gw_core::cache::ActionCache;
use gw_core::error::ActionError;
use gw_core::pipeline::{PipelineInfo, PipelineSet};
use std::collections::VecDeque;
use std::io::Write;
use std::path::Path;

/// Execution context for actions running in this process.
pub struct LocalExec {
    name: String,
    cache: ActionCache,
}

impl LocalExec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache: ActionCache::new(),
        }
    }
}

impl Execution for LocalExec {
    fn name(&self) -> &str {
        &self.name
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

/// Work on the local system.
///
/// Pipelining is a queue: sends enqueue, and each drain pops one action and
/// runs it under the pipeline state machine. File assets pass through
/// unchanged, so sharing is a no-op.
pub struct Local {
    exec: LocalExec,
    pipelines: PipelineSet,
    queue: VecDeque<(BoxAction, PipelineInfo)>,
}

impl Local {
    pub fn new() -> Self {
        Self::named("local")
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            exec: LocalExec::new(name),
            pipelines: PipelineSet::new(),
            queue: VecDeque::new(),
        }
    }
}

impl Default for Local {
    fn default() -> Self {
        Self::new()
    }
}

impl System for Local {
    fn name(&self) -> &str {
        self.exec.name()
    }

    fn execute(&mut self, mut action: BoxAction) -> Result<BoxAction, SystemError> {
        run_collected(action.as_mut(), &self.exec);
        Ok(action)
    }

    fn send_pipelined(
        &mut self,
        action: BoxAction,
        info: PipelineInfo,
    ) -> Result<(), SystemError> {
        self.queue.push_back((action, info));
        Ok(())
    }

    fn receive_next(&mut self) -> Result<Option<BoxAction>, SystemError> {
        let Some((action, info)) = self.queue.pop_front() else {
            return Ok(None);
        };
        Ok(Some(self.pipelines.execute(&self.exec, action, &info)))
    }

    fn share_file(&mut self, _path: &Path) {}

    fn share_file_prefix(&mut self, _prefix: &Path) {}

    fn pipeline_clear_failed(&mut self, pipeline_id: &str) -> Result<(), SystemError> {
        self.pipelines.clear_failed(pipeline_id);
        Ok(())
    }

    fn pipeline_close(&mut self, pipeline_id: &str) -> Result<(), SystemError> {
        self.pipelines.close(pipeline_id);
        Ok(())
    }

    fn transfer_file(&self, src: &Path, out: &mut dyn Write) -> Result<(), SystemError> {
        let mut file = std::fs::File::open(src)?;
        std::io::copy(&mut file, out)?;
        Ok(())
    }

    fn cache(&self) -> &ActionCache {
        self.exec.cache()
    }

    fn close(&mut self) -> Result<(), SystemError> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod tests;
