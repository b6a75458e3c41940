// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Copy content from the controller to a path on the target.

use crate::common::{
    apply_permissions, file_sha1, sha1_hex, FilePerms, PathInfo,
};
use gw_core::action::{ActionData, ActionMeta, Execution};
use gw_core::asset::FileAsset;
use gw_core::error::ActionError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Replace `dest` with the given content, atomically.
///
/// The write is skipped entirely when the destination already has the same
/// bytes; permissions are still aligned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Copy {
    #[serde(flatten)]
    pub meta: ActionMeta,
    pub dest: PathBuf,
    /// Controller-side file to copy. Exactly one of `src` and `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<FileAsset>,
    /// Literal bytes to write. Exactly one of `src` and `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<u8>>,
    #[serde(flatten)]
    pub perms: FilePerms,
}

impl Copy {
    pub fn with_content(dest: impl Into<PathBuf>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            meta: ActionMeta::default(),
            dest: dest.into(),
            src: None,
            content: Some(content.into()),
            perms: FilePerms::default(),
        }
    }

    pub fn from_asset(dest: impl Into<PathBuf>, src: FileAsset) -> Self {
        Self {
            meta: ActionMeta::default(),
            dest: dest.into(),
            src: Some(src),
            content: None,
            perms: FilePerms::default(),
        }
    }
}

impl ActionData for Copy {
    const TAG: &'static str = "groundwork.actions.copy.Copy";
    const BINARY_FIELDS: &'static [&'static str] = &["content"];
    const ASSET_FIELDS: &'static [&'static str] = &["src"];

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        format!("Copy file to {}", self.dest.display())
    }

    fn validate(&self) -> Result<(), ActionError> {
        match (&self.src, &self.content) {
            (None, None) => Err(ActionError::Invalid(
                "one of src or content must be set".to_string(),
            )),
            (Some(_), Some(_)) => Err(ActionError::Invalid(
                "src and content cannot both be set".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn local_files_needed(&self) -> Vec<PathBuf> {
        match &self.src {
            Some(FileAsset::Local { path, .. }) => vec![path.clone()],
            _ => Vec::new(),
        }
    }

    fn assets_mut(&mut self) -> Vec<&mut FileAsset> {
        self.src.as_mut().into_iter().collect()
    }

    fn run(&mut self, _exec: &dyn Execution) -> Result<(), ActionError> {
        self.validate()?;
        let perms = self.perms.resolve()?;

        let desired_sha = match (self.src.as_mut(), &self.content) {
            (Some(asset), _) => asset.sha1sum()?,
            (None, Some(bytes)) => sha1_hex(bytes),
            // validate() rejected the neither-set case already
            (None, None) => return Ok(()),
        };

        if let Some(info) = PathInfo::probe(&self.dest, true)? {
            if !info.is_dir() && file_sha1(&info.path)? == desired_sha {
                return apply_permissions(&perms, &info, &mut self.meta);
            }
        }

        if self.meta.check {
            self.meta.set_changed();
            return Ok(());
        }

        let bytes = match (&self.src, &self.content) {
            (Some(asset), _) => asset.read_all()?,
            (None, Some(bytes)) => bytes.clone(),
            (None, None) => return Ok(()),
        };
        let dest = self.dest.clone();
        crate::common::write_file_atomically(&dest, &bytes, &perms, &mut self.meta)
    }
}

#[cfg(test)]
#[path = "copy_tests.rs"]
mod tests;
