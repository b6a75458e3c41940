// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Controller side of the remote transport.
//!
//! Spawns a worker process on the target (typically `ssh host gw-worker`)
//! and speaks the frame protocol over its stdio. Calls are pipelined: sends
//! return immediately, results stream back in send order, and file-service
//! requests are served inline while waiting.

use crate::error::SystemError;
use crate::protocol::{read_frame, write_frame, ControlFrame, WorkerFrame, FILE_CHUNK};
use crate::service::SharedFiles;
use crate::system::System;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use gw_core::action::BoxAction;
use gw_core::asset::FileAsset;
use gw_core::cache::ActionCache;
use gw_core::envelope::{attach_pipeline, deserialize_action, serialize_action};
use gw_core::pipeline::PipelineInfo;
use gw_core::registry::ActionRegistry;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};

/// Pipelined transport to one remote host.
pub struct Remote {
    name: String,
    writer: BufWriter<Box<dyn Write + Send>>,
    reader: BufReader<Box<dyn Read + Send>>,
    child: Option<Child>,
    registry: &'static ActionRegistry,
    shared: SharedFiles,
    in_flight: usize,
    cache: ActionCache,
}

impl Remote {
    /// Spawn the worker with the given argv and speak the protocol over its
    /// stdio. The worker's stderr passes through for diagnostics.
    pub fn connect(
        name: impl Into<String>,
        argv: &[String],
        registry: &'static ActionRegistry,
    ) -> Result<Self, SystemError> {
        let name = name.into();
        if argv.is_empty() {
            return Err(SystemError::Protocol("empty worker command".to_string()));
        }
        let mut child = Command::new(&argv[0])
            .args(&argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SystemError::Spawn {
                argv: argv.to_vec(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            SystemError::Protocol("worker stdin was not piped".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            SystemError::Protocol("worker stdout was not piped".to_string())
        })?;

        Ok(Self {
            name,
            writer: BufWriter::new(Box::new(stdin)),
            reader: BufReader::new(Box::new(stdout)),
            child: Some(child),
            registry,
            shared: SharedFiles::new(),
            in_flight: 0,
            cache: ActionCache::new(),
        })
    }

    /// Build a transport over caller-provided streams. Used to talk to a
    /// worker reached by other means than a spawned process.
    pub fn from_streams(
        name: impl Into<String>,
        reader: impl Read + Send + 'static,
        writer: impl Write + Send + 'static,
        registry: &'static ActionRegistry,
    ) -> Self {
        Self {
            name: name.into(),
            writer: BufWriter::new(Box::new(writer)),
            reader: BufReader::new(Box::new(reader)),
            child: None,
            registry,
            shared: SharedFiles::new(),
            in_flight: 0,
            cache: ActionCache::new(),
        }
    }

    fn send_action(
        &mut self,
        action: &mut BoxAction,
        info: Option<&PipelineInfo>,
    ) -> Result<(), SystemError> {
        // Zip entries cannot be fetched through the file service, which
        // serves whole files; ship their bytes inline instead.
        for asset in action.assets_mut() {
            if matches!(asset, FileAsset::Zip { cached: None, .. }) {
                asset.cache_contents().map_err(|err| {
                    SystemError::Protocol(format!("cannot inline zip asset: {}", err))
                })?;
            }
        }

        let mut envelope = serialize_action(action.as_ref())?;
        if let Some(info) = info {
            attach_pipeline(&mut envelope, info)?;
        }
        write_frame(&mut self.writer, &ControlFrame::Action { envelope })?;
        self.in_flight += 1;
        Ok(())
    }

    fn serve_file_request(&mut self, id: u64, path: &Path) -> Result<(), SystemError> {
        if !self.shared.is_shared(path) {
            tracing::warn!(path = %path.display(), "refusing unshared file request");
            let frame = ControlFrame::FileError {
                id,
                error: format!("{:?} is not shared", path),
            };
            return write_frame(&mut self.writer, &frame);
        }

        let mut file = match std::fs::File::open(path) {
            Err(err) => {
                let frame = ControlFrame::FileError {
                    id,
                    error: err.to_string(),
                };
                return write_frame(&mut self.writer, &frame);
            }
            Ok(file) => file,
        };

        let mut buf = vec![0u8; FILE_CHUNK];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let frame = ControlFrame::FileData {
                id,
                chunk: BASE64_STANDARD.encode(&buf[..n]),
                eof: false,
            };
            write_frame(&mut self.writer, &frame)?;
        }
        write_frame(
            &mut self.writer,
            &ControlFrame::FileData {
                id,
                chunk: String::new(),
                eof: true,
            },
        )
    }

    /// Block until the next result frame, serving file requests that arrive
    /// while the remote action runs.
    fn read_result(&mut self) -> Result<BoxAction, SystemError> {
        loop {
            match read_frame::<_, WorkerFrame>(&mut self.reader)? {
                None => {
                    return Err(SystemError::WorkerGone {
                        host: self.name.clone(),
                    })
                }
                Some(WorkerFrame::FileRequest { id, path }) => {
                    self.serve_file_request(id, &path)?;
                }
                Some(WorkerFrame::Result { envelope }) => {
                    let (action, _) = deserialize_action(self.registry, envelope)?;
                    self.in_flight -= 1;
                    return Ok(action);
                }
            }
        }
    }
}

impl System for Remote {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&mut self, mut action: BoxAction) -> Result<BoxAction, SystemError> {
        self.send_action(&mut action, None)?;
        self.read_result()
    }

    fn send_pipelined(
        &mut self,
        mut action: BoxAction,
        info: PipelineInfo,
    ) -> Result<(), SystemError> {
        self.send_action(&mut action, Some(&info))
    }

    fn receive_next(&mut self) -> Result<Option<BoxAction>, SystemError> {
        if self.in_flight == 0 {
            return Ok(None);
        }
        self.read_result().map(Some)
    }

    fn share_file(&mut self, path: &Path) {
        self.shared.register(path);
    }

    fn share_file_prefix(&mut self, prefix: &Path) {
        self.shared.register_prefix(prefix);
    }

    fn pipeline_clear_failed(&mut self, pipeline_id: &str) -> Result<(), SystemError> {
        write_frame(
            &mut self.writer,
            &ControlFrame::ClearFailed {
                pipeline: pipeline_id.to_string(),
            },
        )
    }

    fn pipeline_close(&mut self, pipeline_id: &str) -> Result<(), SystemError> {
        write_frame(
            &mut self.writer,
            &ControlFrame::ClosePipeline {
                pipeline: pipeline_id.to_string(),
            },
        )
    }

    fn transfer_file(&self, src: &Path, out: &mut dyn Write) -> Result<(), SystemError> {
        let mut file = std::fs::File::open(src)?;
        std::io::copy(&mut file, out)?;
        Ok(())
    }

    fn cache(&self) -> &ActionCache {
        &self.cache
    }

    fn close(&mut self) -> Result<(), SystemError> {
        // The worker may already be gone; shutting down twice is harmless.
        let _ = write_frame(&mut self.writer, &ControlFrame::Shutdown);
        if let Some(mut child) = self.child.take() {
            let status = child.wait()?;
            tracing::debug!(host = %self.name, %status, "worker exited");
        }
        Ok(())
    }
}

impl Drop for Remote {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = write_frame(&mut self.writer, &ControlFrame::Shutdown);
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
#[path = "remote_tests.rs"]
mod tests;
