// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manage a path: create, touch, make a directory, or remove.

use crate::common::{
    apply_permissions, create_file_if_missing, FilePerms, PathInfo, ResolvedPerms,
};
use gw_core::action::{ActionData, ActionMeta, Execution};
use gw_core::error::ActionError;
use serde::{Deserialize, Serialize};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Desired state for the [`File`] action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    /// Adjust permissions if the file exists; do nothing if it does not.
    #[default]
    File,
    /// Create an empty file if missing, then adjust permissions.
    Touch,
    /// Create the directory recursively, then adjust permissions.
    Directory,
    /// Remove the file, or the directory tree, if present.
    Absent,
}

/// Align a path's type, mode and ownership with the requested state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct File {
    #[serde(flatten)]
    pub meta: ActionMeta,
    pub path: PathBuf,
    #[serde(default)]
    pub state: FileState,
    #[serde(flatten)]
    pub perms: FilePerms,
    /// Operate on the target of a final symlink rather than the link itself.
    #[serde(default = "default_true")]
    pub follow: bool,
}

fn default_true() -> bool {
    true
}

impl File {
    pub fn new(path: impl Into<PathBuf>, state: FileState) -> Self {
        Self {
            meta: ActionMeta::default(),
            path: path.into(),
            state,
            perms: FilePerms::default(),
            follow: true,
        }
    }

    fn do_touch(&mut self, perms: &ResolvedPerms) -> Result<(), ActionError> {
        match PathInfo::probe(&self.path, self.follow)? {
            None => {
                if self.meta.check {
                    self.meta.set_changed();
                    return Ok(());
                }
                let path = self.path.clone();
                create_file_if_missing(&path, b"", perms, &mut self.meta)?;
                Ok(())
            }
            Some(info) => apply_permissions(perms, &info, &mut self.meta),
        }
    }

    fn do_file(&mut self, perms: &ResolvedPerms) -> Result<(), ActionError> {
        match PathInfo::probe(&self.path, self.follow)? {
            None => Ok(()),
            Some(info) => apply_permissions(perms, &info, &mut self.meta),
        }
    }

    fn do_directory(&mut self, perms: &ResolvedPerms) -> Result<(), ActionError> {
        match PathInfo::probe(&self.path, self.follow)? {
            Some(info) if info.is_dir() => apply_permissions(perms, &info, &mut self.meta),
            Some(_) => Err(ActionError::Message(format!(
                "{:?} exists and is not a directory",
                self.path
            ))),
            None => {
                // Create every missing ancestor, applying mode and ownership
                // to each directory this action creates.
                let mut missing = vec![self.path.clone()];
                let mut cursor = self.path.clone();
                while let Some(parent) = cursor.parent().map(Path::to_path_buf) {
                    if parent.as_os_str().is_empty() || parent.is_dir() {
                        break;
                    }
                    missing.push(parent.clone());
                    cursor = parent;
                }
                if self.meta.check {
                    self.meta.set_changed();
                    return Ok(());
                }
                for dir in missing.iter().rev() {
                    std::fs::create_dir(dir)?;
                    if let Some(mode) = perms.desired_mode(None, true) {
                        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(mode))?;
                    }
                    if perms.wants_ownership() {
                        std::os::unix::fs::chown(dir, perms.uid, perms.gid)?;
                    }
                    tracing::info!(path = %dir.display(), "directory created");
                }
                self.meta.set_changed();
                Ok(())
            }
        }
    }

    fn do_absent(&mut self) -> Result<(), ActionError> {
        match PathInfo::probe(&self.path, false)? {
            None => Ok(()),
            Some(info) => {
                if self.meta.check {
                    self.meta.set_changed();
                    return Ok(());
                }
                if info.is_dir() {
                    std::fs::remove_dir_all(&self.path)?;
                    tracing::info!(path = %self.path.display(), "directory removed recursively");
                } else {
                    std::fs::remove_file(&self.path)?;
                    tracing::info!(path = %self.path.display(), "file removed");
                }
                self.meta.set_changed();
                Ok(())
            }
        }
    }
}

impl ActionData for File {
    const TAG: &'static str = "groundwork.actions.file.File";

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        let verb = match self.state {
            FileState::File => "Set permissions of",
            FileState::Touch => "Touch",
            FileState::Directory => "Create directory",
            FileState::Absent => "Remove",
        };
        format!("{} {}", verb, self.path.display())
    }

    fn validate(&self) -> Result<(), ActionError> {
        if self.path.as_os_str().is_empty() {
            return Err(ActionError::Invalid("path cannot be empty".to_string()));
        }
        Ok(())
    }

    fn run(&mut self, _exec: &dyn Execution) -> Result<(), ActionError> {
        let perms = self.perms.resolve()?;
        match self.state {
            FileState::Touch => self.do_touch(&perms),
            FileState::File => self.do_file(&perms),
            FileState::Directory => self.do_directory(&perms),
            FileState::Absent => self.do_absent(),
        }
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
