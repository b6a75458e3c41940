// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use thiserror::Error;
use uuid::Uuid;

/// Failures raised while a role emits or reacts to tasks.
#[derive(Debug, Error)]
pub enum RoleError {
    /// The action's configuration was rejected; it was not enqueued.
    #[error("invalid action {summary:?}: {source}")]
    InvalidAction {
        summary: String,
        source: gw_core::error::ActionError,
    },
    #[error(transparent)]
    Template(#[from] crate::template::TemplateError),
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

/// Failures of the per-host driver.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    System(#[from] gw_system::error::SystemError),
    #[error("role {role:?} failed: {source}")]
    Role {
        role: String,
        source: RoleError,
    },
    #[error("received result for unknown action {0}")]
    UnknownAction(Uuid),
    #[error("{0}")]
    Protocol(String),
}
