// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between the controller and a remote worker.
//!
//! Frames are newline-delimited JSON objects tagged with `op`. Actions ride
//! inside frames as their self-describing envelopes; file-service chunks
//! carry base64 payloads.

use crate::error::SystemError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::PathBuf;

/// Raw bytes per file-service chunk, before base64 expansion.
pub const FILE_CHUNK: usize = 49152;

/// Frames sent from the controller to the worker.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlFrame {
    /// Execute an action; pipeline metadata rides inside the envelope.
    Action { envelope: serde_json::Value },
    ClearFailed { pipeline: String },
    ClosePipeline { pipeline: String },
    /// File-service reply chunk, base64-encoded.
    FileData {
        id: u64,
        #[serde(default)]
        chunk: String,
        #[serde(default)]
        eof: bool,
    },
    /// File-service refusal or read error.
    FileError { id: u64, error: String },
    Shutdown,
}

/// Frames sent from the worker back to the controller.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WorkerFrame {
    /// A completed action, re-serialised with its result.
    Result { envelope: serde_json::Value },
    /// Request for a controller-side file's bytes.
    FileRequest { id: u64, path: PathBuf },
}

/// Write one frame and flush, so the other side sees it immediately.
pub fn write_frame<W: Write, F: Serialize>(writer: &mut W, frame: &F) -> Result<(), SystemError> {
    let mut line = serde_json::to_vec(frame)?;
    line.push(b'\n');
    writer.write_all(&line)?;
    writer.flush()?;
    Ok(())
}

/// Read one frame; `None` on a clean end of stream.
pub fn read_frame<R: BufRead, F: DeserializeOwned>(
    reader: &mut R,
) -> Result<Option<F>, SystemError> {
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        if line.trim().is_empty() {
            continue;
        }
        return Ok(Some(serde_json::from_str(line.trim())?));
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
