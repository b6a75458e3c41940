// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The transport contract to one target host.

use crate::error::SystemError;
use gw_core::action::BoxAction;
use gw_core::cache::ActionCache;
use gw_core::pipeline::PipelineInfo;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Access to a system to be provisioned.
///
/// Ordering contract: on one host, results come back in the order the
/// actions were sent on that pipeline. Sends never block; draining blocks
/// per element.
pub trait System: Send {
    fn name(&self) -> &str;

    /// Round-trip one action immediately.
    ///
    /// On remote transports this costs a full round trip per action; prefer
    /// the pipelined calls where latency matters.
    fn execute(&mut self, action: BoxAction) -> Result<BoxAction, SystemError>;

    /// Enqueue an action without waiting; the other side may start
    /// executing immediately.
    fn send_pipelined(
        &mut self,
        action: BoxAction,
        info: PipelineInfo,
    ) -> Result<(), SystemError>;

    /// Drain the next completed result, in send order.
    ///
    /// Returns `None` when nothing is in flight. It is fine to send more
    /// pipelined actions between drains.
    fn receive_next(&mut self) -> Result<Option<BoxAction>, SystemError>;

    /// Register a pathname as servable to the host's file requests.
    fn share_file(&mut self, path: &Path);

    /// Register a pathname prefix as servable to the host's file requests.
    fn share_file_prefix(&mut self, prefix: &Path);

    /// Reset the failed flag of a pipeline so its actions run again.
    fn pipeline_clear_failed(&mut self, pipeline_id: &str) -> Result<(), SystemError>;

    /// Discard all state about a pipeline.
    fn pipeline_close(&mut self, pipeline_id: &str) -> Result<(), SystemError>;

    /// Pull a controller-side file into `out`.
    fn transfer_file(&self, src: &Path, out: &mut dyn Write) -> Result<(), SystemError>;

    /// Per-host cache where actions memoise expensive probes.
    fn cache(&self) -> &ActionCache;

    fn close(&mut self) -> Result<(), SystemError>;

    /// Run a batch of actions under one fresh pipeline, returning results
    /// in order.
    fn run_actions(&mut self, actions: Vec<BoxAction>) -> Result<Vec<BoxAction>, SystemError> {
        let info = PipelineInfo::new(Uuid::new_v4().to_string());
        let count = actions.len();
        for action in actions {
            self.send_pipelined(action, info.clone())?;
        }
        let mut results = Vec::with_capacity(count);
        while results.len() < count {
            match self.receive_next()? {
                Some(action) => results.push(action),
                None => {
                    return Err(SystemError::Protocol(
                        "transport ran dry with actions in flight".to_string(),
                    ))
                }
            }
        }
        Ok(results)
    }
}
