// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keep a git checkout at a requested revision.

use gw_core::action::{ActionData, ActionMeta, Execution};
use gw_core::cmd::{find_command, CommandRunner};
use gw_core::error::ActionError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Clone a repository, or fetch and fast-forward an existing checkout, so
/// that `dest` ends up at `version`.
///
/// Reports CHANGED only when the working tree actually moved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Git {
    #[serde(flatten)]
    pub meta: ActionMeta,
    /// Repository URL or path to clone from.
    pub repo: String,
    pub dest: PathBuf,
    /// Branch, tag or commit sha to end up on.
    #[serde(default = "Git::default_version")]
    pub version: String,
    #[serde(default = "Git::default_remote")]
    pub remote: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    /// Local repository to borrow objects from when cloning.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default)]
    pub bare: bool,
    /// Discard local modifications instead of refusing to update.
    #[serde(default)]
    pub force: bool,
    /// When false, only report whether an update would happen.
    #[serde(default = "default_true")]
    pub update: bool,
}

fn default_true() -> bool {
    true
}

impl Git {
    pub fn new(repo: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            meta: ActionMeta::default(),
            repo: repo.into(),
            dest: dest.into(),
            version: Self::default_version(),
            remote: Self::default_remote(),
            depth: None,
            reference: None,
            bare: false,
            force: false,
            update: true,
        }
    }

    fn default_version() -> String {
        "HEAD".to_string()
    }

    fn default_remote() -> String {
        "origin".to_string()
    }

    fn checkout_exists(&self) -> bool {
        if self.bare {
            self.dest.join("HEAD").is_file()
        } else {
            self.dest.join(".git").exists()
        }
    }

    fn run_git(
        &mut self,
        git: &Path,
        args: &[&str],
        in_dest: bool,
        tolerate_failure: bool,
    ) -> Result<gw_core::cmd::CommandOutput, ActionError> {
        let mut cmd = vec![git.to_string_lossy().into_owned()];
        cmd.extend(args.iter().map(|a| (*a).to_string()));
        let mut runner = CommandRunner::new(cmd);
        if in_dest {
            runner = runner.cwd(self.dest.clone());
        }
        if tolerate_failure {
            runner = runner.allow_fail();
        }
        runner.run(&mut self.meta.result)
    }

    fn do_clone(&mut self, git: &Path) -> Result<(), ActionError> {
        if self.meta.check {
            self.meta.set_changed();
            return Ok(());
        }
        if let Some(parent) = self.dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut args = vec![
            "clone".to_string(),
            "--origin".to_string(),
            self.remote.clone(),
        ];
        if self.bare {
            args.push("--bare".to_string());
        }
        if let Some(depth) = self.depth {
            args.push("--depth".to_string());
            args.push(depth.to_string());
        }
        if let Some(reference) = self.reference.clone() {
            args.push("--reference".to_string());
            args.push(reference);
        }
        args.push(self.repo.clone());
        args.push(self.dest.to_string_lossy().into_owned());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run_git(git, &arg_refs, false, false)?;

        if !self.bare && self.version != "HEAD" {
            let version = self.version.clone();
            self.run_git(git, &["checkout", &version], true, false)?;
        }
        self.meta.set_changed();
        Ok(())
    }

    fn head_commit(&mut self, git: &Path) -> Result<Option<String>, ActionError> {
        let output = self.run_git(git, &["rev-parse", "HEAD"], true, true)?;
        if output.success() {
            Ok(Some(output.stdout_text().trim().to_string()))
        } else {
            Ok(None)
        }
    }

    fn has_local_mods(&mut self, git: &Path) -> Result<bool, ActionError> {
        if self.bare {
            return Ok(false);
        }
        let output = self.run_git(git, &["status", "--porcelain"], true, false)?;
        Ok(!output.stdout_text().trim().is_empty())
    }

    /// Resolve `version` to a commit, trying the remote-tracking branch
    /// first, then tags, then the name as given.
    fn resolve_version(&mut self, git: &Path) -> Result<String, ActionError> {
        let candidates = [
            format!("refs/remotes/{}/{}", self.remote, self.version),
            format!("refs/tags/{}", self.version),
            self.version.clone(),
        ];
        for candidate in &candidates {
            let spec = format!("{}^{{commit}}", candidate);
            let output = self.run_git(git, &["rev-parse", "--verify", &spec], true, true)?;
            if output.success() {
                return Ok(output.stdout_text().trim().to_string());
            }
        }
        Err(ActionError::Message(format!(
            "cannot resolve version {:?} in {:?}",
            self.version, self.dest
        )))
    }

    /// What the remote currently has for `version`, without mutating the
    /// local repository. Used in check mode.
    fn remote_commit(&mut self, git: &Path) -> Result<Option<String>, ActionError> {
        if looks_like_sha(&self.version) {
            return Ok(Some(self.version.clone()));
        }
        let repo = self.repo.clone();
        let version = self.version.clone();
        let output = self.run_git(git, &["ls-remote", &repo, &version], true, true)?;
        if !output.success() {
            return Ok(None);
        }
        let stdout = output.stdout_text();
        Ok(stdout
            .lines()
            .next()
            .and_then(|line| line.split_whitespace().next())
            .map(str::to_string))
    }

    fn do_update(&mut self, git: &Path) -> Result<(), ActionError> {
        let dirty = self.has_local_mods(git)?;
        if dirty {
            if !self.force {
                return Err(ActionError::Message(format!(
                    "local modifications exist in repository {:?}",
                    self.dest
                )));
            }
            if self.meta.check {
                self.meta.set_changed();
                return Ok(());
            }
            self.run_git(git, &["reset", "--hard"], true, false)?;
            self.meta.set_changed();
        }

        let before = self.head_commit(git)?;

        if !self.update {
            return Ok(());
        }

        if self.meta.check {
            let remote = self.remote_commit(git)?;
            if let (Some(before), Some(remote)) = (&before, &remote) {
                if before != remote {
                    self.meta.set_changed();
                }
            }
            return Ok(());
        }

        let mut fetch_args = vec!["fetch".to_string()];
        if let Some(depth) = self.depth {
            fetch_args.push("--depth".to_string());
            fetch_args.push(depth.to_string());
        }
        fetch_args.push(self.remote.clone());
        let fetch_refs: Vec<&str> = fetch_args.iter().map(String::as_str).collect();
        self.run_git(git, &fetch_refs, true, false)?;

        if self.bare {
            // Nothing to check out; fetching is all a bare mirror needs.
            let after = self.head_commit(git)?;
            if before != after {
                self.meta.set_changed();
            }
            return Ok(());
        }

        let desired = self.resolve_version(git)?;
        if before.as_deref() != Some(desired.as_str()) {
            // Prefer a fast-forward when we are on a branch tracking the
            // desired commit; fall back to a detached checkout.
            let merge = self.run_git(git, &["merge", "--ff-only", &desired], true, true)?;
            if !merge.success() {
                self.run_git(git, &["checkout", &desired], true, false)?;
            }
        }

        let after = self.head_commit(git)?;
        if before != after {
            self.meta.set_changed();
        }
        Ok(())
    }
}

fn looks_like_sha(text: &str) -> bool {
    text.len() == 40 && text.bytes().all(|b| b.is_ascii_hexdigit())
}

impl ActionData for Git {
    const TAG: &'static str = "groundwork.actions.git.Git";

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        format!(
            "Check out {} of {} into {}",
            self.version,
            self.repo,
            self.dest.display()
        )
    }

    fn validate(&self) -> Result<(), ActionError> {
        if self.repo.is_empty() {
            return Err(ActionError::Invalid("repo cannot be empty".to_string()));
        }
        if self.dest.as_os_str().is_empty() {
            return Err(ActionError::Invalid("dest cannot be empty".to_string()));
        }
        Ok(())
    }

    fn run(&mut self, _exec: &dyn Execution) -> Result<(), ActionError> {
        self.validate()?;
        let git = find_command("git")?;

        if !self.checkout_exists() {
            self.do_clone(&git)
        } else {
            self.do_update(&git)
        }
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
