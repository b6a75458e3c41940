// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types shared across the engine core.

use thiserror::Error;

/// Failure raised by an action implementation while running.
///
/// The result-collect region converts these into a FAILED result; they never
/// propagate past the pipeline executor.
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action was configured with invalid or conflicting options.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("command {} exited with code {returncode}", cmdline.join(" "))]
    CommandFailed {
        cmdline: Vec<String>,
        returncode: i32,
        stderr: Option<String>,
    },
    #[error("command {0:?} not found on this system")]
    CommandNotFound(String),
    #[error("transfer of {path:?} interrupted: {reason}")]
    Transfer { path: String, reason: String },
    #[error(transparent)]
    Mode(#[from] ModeError),
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl ActionError {
    /// Short classifier recorded as `exc_type` in action results.
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::Invalid(_) => "invalid",
            ActionError::Message(_) => "error",
            ActionError::Io(_) => "io",
            ActionError::CommandFailed { .. } => "command_failed",
            ActionError::CommandNotFound(_) => "command_not_found",
            ActionError::Transfer { .. } => "transfer",
            ActionError::Mode(_) => "mode",
            ActionError::Envelope(_) => "envelope",
        }
    }
}

/// Invalid symbolic or octal mode string.
#[derive(Debug, Error)]
pub enum ModeError {
    #[error("invalid mode: {0:?}")]
    Invalid(String),
    #[error("invalid octal mode: {0:?}")]
    InvalidOctal(String),
}

/// Errors converting actions to and from their wire envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope has no '__action__' element")]
    MissingTag,
    #[error("action type {0:?} is not registered")]
    UnknownTag(String),
    #[error("envelope is not a JSON object")]
    NotAnObject,
    #[error("unknown binary encoding style: {0:?}")]
    UnknownEncoding(String),
    #[error("field {field:?} does not hold valid {encoding} data")]
    BadBinary {
        field: String,
        encoding: &'static str,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
