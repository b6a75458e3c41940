// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host side of the remote transport.
//!
//! A long-lived loop owns the per-host pipeline records: it deserialises
//! inbound envelopes, remaps file-asset fields into channel-backed variants,
//! executes under the pipeline state machine, and writes the re-serialised
//! action back. One loop runs per worker process; the channel it shares
//! with running actions is the only cross-cutting state, guarded by mutexes.

use crate::error::SystemError;
use crate::protocol::{read_frame, write_frame, ControlFrame, WorkerFrame};
use base64::prelude::{Engine as _, BASE64_STANDARD};
use gw_core::action::{run_collected, BoxAction, Execution};
use gw_core::asset::{FetchFile, FileAsset};
use gw_core::cache::ActionCache;
use gw_core::envelope::{deserialize_action, serialize_action};
use gw_core::error::ActionError;
use gw_core::pipeline::PipelineSet;
use gw_core::registry::ActionRegistry;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Stdio channel shared between the frame loop and running actions.
///
/// While an action runs, its remote assets fetch bytes through the same
/// streams the loop reads frames from; control frames that arrive in the
/// middle of a fetch are queued for the loop to pick up afterwards.
struct Channel {
    writer: Mutex<Box<dyn Write + Send>>,
    reader: Mutex<ChannelReader>,
    next_request: AtomicU64,
}

struct ChannelReader {
    input: Box<dyn BufRead + Send>,
    queued: VecDeque<ControlFrame>,
}

impl Channel {
    fn new(input: impl BufRead + Send + 'static, output: impl Write + Send + 'static) -> Self {
        Self {
            writer: Mutex::new(Box::new(output)),
            reader: Mutex::new(ChannelReader {
                input: Box::new(input),
                queued: VecDeque::new(),
            }),
            next_request: AtomicU64::new(1),
        }
    }

    fn send(&self, frame: &WorkerFrame) -> Result<(), SystemError> {
        let mut writer = self.writer.lock();
        write_frame(&mut *writer, frame)
    }

    /// Next control frame for the main loop; `None` on end of stream.
    fn next_control(&self) -> Result<Option<ControlFrame>, SystemError> {
        let mut reader = self.reader.lock();
        if let Some(frame) = reader.queued.pop_front() {
            return Ok(Some(frame));
        }
        read_frame(&mut reader.input)
    }

    /// Pull a controller file over the channel into `out`.
    fn fetch(&self, path: &Path, out: &mut dyn Write) -> Result<(), SystemError> {
        let id = self.next_request.fetch_add(1, Ordering::SeqCst);
        self.send(&WorkerFrame::FileRequest {
            id,
            path: path.to_path_buf(),
        })?;

        let mut reader = self.reader.lock();
        loop {
            match read_frame::<_, ControlFrame>(&mut reader.input)? {
                None => {
                    return Err(SystemError::Transfer {
                        path: path.to_path_buf(),
                        reason: "controller went away mid-transfer".to_string(),
                    })
                }
                Some(ControlFrame::FileData {
                    id: reply,
                    chunk,
                    eof,
                }) if reply == id => {
                    if !chunk.is_empty() {
                        let bytes =
                            BASE64_STANDARD
                                .decode(&chunk)
                                .map_err(|_| SystemError::Transfer {
                                    path: path.to_path_buf(),
                                    reason: "chunk is not valid base64".to_string(),
                                })?;
                        out.write_all(&bytes)?;
                    }
                    if eof {
                        return Ok(());
                    }
                }
                Some(ControlFrame::FileError { id: reply, error }) if reply == id => {
                    return Err(SystemError::Transfer {
                        path: path.to_path_buf(),
                        reason: error,
                    })
                }
                Some(other) => reader.queued.push_back(other),
            }
        }
    }
}

/// Fetch handle planted into remote file assets.
struct ChannelFetch {
    channel: Arc<Channel>,
}

impl FetchFile for ChannelFetch {
    fn fetch(&self, path: &Path, out: &mut dyn Write) -> Result<(), ActionError> {
        self.channel
            .fetch(path, out)
            .map_err(|err| ActionError::Transfer {
                path: path.to_string_lossy().into_owned(),
                reason: err.to_string(),
            })
    }
}

/// Execution context for actions running in the worker.
struct WorkerExec {
    name: String,
    cache: ActionCache,
    channel: Arc<Channel>,
}

impl Execution for WorkerExec {
    fn name(&self) -> &str {
        &self.name
    }

    fn cache(&self) -> &ActionCache {
        &self.cache
    }

    fn transfer_file(&self, src: &Path, out: &mut dyn Write) -> Result<(), ActionError> {
        self.channel
            .fetch(src, out)
            .map_err(|err| ActionError::Transfer {
                path: src.to_string_lossy().into_owned(),
                reason: err.to_string(),
            })
    }
}

/// Swap controller-side assets for variants that work here: cached bytes
/// serve from memory, everything else fetches through the channel.
fn remap_assets(action: &mut BoxAction, channel: &Arc<Channel>) {
    for asset in action.assets_mut() {
        if asset.cached().is_some() {
            continue;
        }
        let FileAsset::Local { path, .. } = &*asset else {
            continue;
        };
        let remote = FileAsset::Remote {
            path: path.clone(),
            fetch: Arc::new(ChannelFetch {
                channel: Arc::clone(channel),
            }),
        };
        *asset = remote;
    }
}

/// Run the worker loop over the given streams until shutdown or EOF.
pub fn serve(
    input: impl BufRead + Send + 'static,
    output: impl Write + Send + 'static,
    registry: &ActionRegistry,
) -> Result<(), SystemError> {
    let channel = Arc::new(Channel::new(input, output));
    let exec = WorkerExec {
        name: "remote".to_string(),
        cache: ActionCache::new(),
        channel: Arc::clone(&channel),
    };
    let mut pipelines = PipelineSet::new();

    loop {
        let Some(frame) = channel.next_control()? else {
            tracing::debug!("controller closed the stream");
            break;
        };
        match frame {
            ControlFrame::Action { envelope } => {
                let (mut action, info) = deserialize_action(registry, envelope)?;
                remap_assets(&mut action, &channel);
                let done = match info {
                    Some(info) => pipelines.execute(&exec, action, &info),
                    None => {
                        run_collected(action.as_mut(), &exec);
                        action
                    }
                };
                let envelope = serialize_action(done.as_ref())?;
                channel.send(&WorkerFrame::Result { envelope })?;
            }
            ControlFrame::ClearFailed { pipeline } => pipelines.clear_failed(&pipeline),
            ControlFrame::ClosePipeline { pipeline } => pipelines.close(&pipeline),
            ControlFrame::FileData { .. } | ControlFrame::FileError { .. } => {
                tracing::warn!("stray file-service frame outside a transfer");
            }
            ControlFrame::Shutdown => break,
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
