// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport error type.

use std::path::PathBuf;
use thiserror::Error;

/// Failures in the transport layer.
///
/// These are distinct from action failures: an action failing is a recorded
/// result, while a `SystemError` means the conversation with the host broke.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Envelope(#[from] gw_core::error::EnvelopeError),
    #[error("malformed frame: {0}")]
    BadFrame(#[from] serde_json::Error),
    #[error("worker for {host:?} exited unexpectedly")]
    WorkerGone { host: String },
    #[error("cannot spawn worker {argv:?}: {source}")]
    Spawn {
        argv: Vec<String>,
        source: std::io::Error,
    },
    #[error("file {0:?} was not shared with this transport")]
    NotShared(PathBuf),
    #[error("transfer of {path:?} failed: {reason}")]
    Transfer { path: PathBuf, reason: String },
    #[error("protocol error: {0}")]
    Protocol(String),
}
