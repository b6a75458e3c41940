// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maintain exactly one marker-delimited block of text in a file.

use crate::common::{
    apply_permissions, write_file_atomically, FilePerms, PathInfo,
};
use gw_core::action::{ActionData, ActionMeta, Execution};
use gw_core::error::ActionError;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockState {
    Present,
    Absent,
}

/// Insert, replace or remove a block of lines framed by marker comments.
///
/// When several marker pairs exist, the last pair wins; a lone begin marker
/// spans to end of file; multiple begin markers before an end marker
/// collapse to the first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockInFile {
    #[serde(flatten)]
    pub meta: ActionMeta,
    pub path: PathBuf,
    /// Lines to place inside the markers. Empty means remove the block.
    #[serde(default)]
    pub block: String,
    /// Insert after the last line matching this regex (or `EOF`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insertafter: Option<String>,
    /// Insert before the last line matching this regex (or `BOF`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insertbefore: Option<String>,
    /// Marker line template; `{mark}` expands to the begin/end word.
    #[serde(default = "BlockInFile::default_marker")]
    pub marker: String,
    #[serde(default = "BlockInFile::default_marker_begin")]
    pub marker_begin: String,
    #[serde(default = "BlockInFile::default_marker_end")]
    pub marker_end: String,
    /// Create the file when missing instead of doing nothing.
    #[serde(default)]
    pub create: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<BlockState>,
    #[serde(flatten)]
    pub perms: FilePerms,
}

impl BlockInFile {
    pub fn new(path: impl Into<PathBuf>, block: impl Into<String>) -> Self {
        Self {
            meta: ActionMeta::default(),
            path: path.into(),
            block: block.into(),
            insertafter: None,
            insertbefore: None,
            marker: Self::default_marker(),
            marker_begin: Self::default_marker_begin(),
            marker_end: Self::default_marker_end(),
            create: false,
            state: None,
            perms: FilePerms::default(),
        }
    }

    fn default_marker() -> String {
        "# {mark} MANAGED BLOCK".to_string()
    }

    fn default_marker_begin() -> String {
        "BEGIN".to_string()
    }

    fn default_marker_end() -> String {
        "END".to_string()
    }

    fn effective_state(&self) -> BlockState {
        match self.state {
            Some(state) => state,
            None if self.block.is_empty() => BlockState::Absent,
            None => BlockState::Present,
        }
    }

    /// Edit `lines` in place so exactly one block matches the request.
    pub fn edit_lines(&self, lines: &mut Vec<Vec<u8>>) -> Result<(), ActionError> {
        let marker_begin = self.marker.replace("{mark}", &self.marker_begin).into_bytes();
        let marker_end = self.marker.replace("{mark}", &self.marker_end).into_bytes();

        enum Pos {
            Eof,
            Bof,
            Before(Regex),
            After(Regex),
        }

        let compile = |pattern: &str| {
            Regex::new(pattern)
                .map_err(|err| ActionError::Invalid(format!("bad anchor regex: {}", err)))
        };
        let pos = match (&self.insertbefore, &self.insertafter) {
            (None, None) => Pos::Eof,
            (None, Some(after)) if after == "EOF" => Pos::Eof,
            (None, Some(after)) => Pos::After(compile(after)?),
            (Some(before), _) if before == "BOF" => Pos::Bof,
            (Some(before), _) => Pos::Before(compile(before)?),
        };

        // Lines to put in place of the block.
        let mut blocklines: Vec<Vec<u8>> = Vec::new();
        if !self.block.is_empty() && self.effective_state() == BlockState::Present {
            let mut line = marker_begin.clone();
            line.push(b'\n');
            blocklines.push(line);
            for body in self.block.as_bytes().split(|b| *b == b'\n') {
                let mut line = body.to_vec();
                line.push(b'\n');
                blocklines.push(line);
            }
            let mut line = marker_end.clone();
            line.push(b'\n');
            blocklines.push(line);
        }

        // Find the last marker pair and the last anchor match. A begin
        // marker with no end spans to end of file; repeated begin markers
        // collapse to the first.
        let mut line_begin: Option<usize> = None;
        let mut last_block: Option<(usize, usize)> = None;
        let mut anchor_pos: Option<usize> = None;
        for (lineno, line) in lines.iter().enumerate() {
            let stripped = rstrip(line);
            match line_begin {
                None => {
                    if stripped == marker_begin.as_slice() {
                        line_begin = Some(lineno);
                    }
                }
                Some(begin) => {
                    if stripped == marker_end.as_slice() {
                        last_block = Some((begin, lineno));
                        line_begin = None;
                    }
                }
            }
            match &pos {
                Pos::Before(re) | Pos::After(re) => {
                    if re.is_match(line) {
                        anchor_pos = Some(lineno);
                    }
                }
                _ => {}
            }
        }
        if let Some(begin) = line_begin {
            last_block = Some((begin, lines.len()));
        }

        match last_block {
            Some((begin, end)) => {
                let stop = (end + 1).min(lines.len());
                lines.splice(begin..stop, blocklines);
            }
            None => match pos {
                Pos::Eof => lines.extend(blocklines),
                Pos::Bof => {
                    lines.splice(0..0, blocklines);
                }
                Pos::Before(_) => {
                    // No anchor match inserts at end of file.
                    let at = anchor_pos.unwrap_or(lines.len());
                    lines.splice(at..at, blocklines);
                }
                Pos::After(_) => {
                    let at = anchor_pos.map(|p| p + 1).unwrap_or(lines.len());
                    lines.splice(at..at, blocklines);
                }
            },
        }
        Ok(())
    }
}

fn rstrip(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && line[end - 1].is_ascii_whitespace() {
        end -= 1;
    }
    &line[..end]
}

impl ActionData for BlockInFile {
    const TAG: &'static str = "groundwork.actions.blockinfile.BlockInFile";

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        match self.effective_state() {
            BlockState::Present => format!("Edit block in {}", self.path.display()),
            BlockState::Absent => format!("Remove block from {}", self.path.display()),
        }
    }

    fn validate(&self) -> Result<(), ActionError> {
        if self.path.as_os_str().is_empty() {
            return Err(ActionError::Invalid("path cannot be empty".to_string()));
        }
        if self.insertbefore.is_some() && self.insertafter.is_some() {
            return Err(ActionError::Invalid(
                "insertbefore and insertafter cannot both be set".to_string(),
            ));
        }
        if self.block.is_empty() && self.state == Some(BlockState::Present) {
            return Err(ActionError::Invalid(
                "state=present requires a non-empty block".to_string(),
            ));
        }
        Ok(())
    }

    fn run(&mut self, _exec: &dyn Execution) -> Result<(), ActionError> {
        self.validate()?;

        let info = PathInfo::probe(&self.path, true)?;
        let mut lines: Vec<Vec<u8>> = match &info {
            None if !self.create => return Ok(()),
            None => Vec::new(),
            Some(found) => std::fs::read(&found.path)?
                .split_inclusive(|b| *b == b'\n')
                .map(<[u8]>::to_vec)
                .collect(),
        };

        let original = lines.clone();
        self.edit_lines(&mut lines)?;

        if original == lines {
            let perms = self.perms.resolve()?;
            if let Some(info) = &info {
                apply_permissions(&perms, info, &mut self.meta)?;
            }
            return Ok(());
        }

        if self.meta.check {
            self.meta.set_changed();
            return Ok(());
        }

        let perms = self.perms.resolve()?;
        let content: Vec<u8> = lines.concat();
        let dest = self.path.clone();
        write_file_atomically(&dest, &content, &perms, &mut self.meta)
    }
}

#[cfg(test)]
#[path = "blockinfile_tests.rs"]
mod tests;
