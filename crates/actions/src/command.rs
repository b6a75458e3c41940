// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run an arbitrary command, with glob preconditions for idempotence.

use gw_core::action::{ActionData, ActionMeta, Execution};
use gw_core::cmd::CommandRunner;
use gw_core::error::ActionError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Run a command given as an argv or a shell string.
///
/// `creates`/`removes` turn the action idempotent: when the `creates` glob
/// already matches (or the `removes` glob no longer does) the command is not
/// run and the action reports NOOP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    #[serde(flatten)]
    pub meta: ActionMeta,
    /// Command and arguments, run directly. Exactly one of `argv` and `cmd`.
    #[serde(default)]
    pub argv: Vec<String>,
    /// Shell command line, run through `sh -c`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    /// Working directory for the command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chdir: Option<PathBuf>,
    /// Skip the command when this glob matches something.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creates: Option<String>,
    /// Skip the command when this glob matches nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub removes: Option<String>,
    /// Text fed to the command's standard input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdin: Option<String>,
    #[serde(default = "default_true")]
    pub stdin_add_newline: bool,
    /// Captured on execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<Vec<u8>>,
    /// Captured on execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<Vec<u8>>,
}

fn default_true() -> bool {
    true
}

impl Command {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            meta: ActionMeta::default(),
            argv: argv.into_iter().map(Into::into).collect(),
            cmd: None,
            chdir: None,
            creates: None,
            removes: None,
            stdin: None,
            stdin_add_newline: true,
            stdout: None,
            stderr: None,
        }
    }

    pub fn shell(cmd: impl Into<String>) -> Self {
        let mut action = Self::new(Vec::<String>::new());
        action.cmd = Some(cmd.into());
        action
    }

    fn glob_matches(&self, pattern: &str) -> Result<bool, ActionError> {
        let full = match &self.chdir {
            Some(dir) => dir.join(pattern).to_string_lossy().into_owned(),
            None => pattern.to_string(),
        };
        let mut paths = glob::glob(&full)
            .map_err(|err| ActionError::Invalid(format!("bad glob {:?}: {}", pattern, err)))?;
        Ok(paths.next().is_some())
    }
}

impl ActionData for Command {
    const TAG: &'static str = "groundwork.actions.command.Command";
    const BINARY_FIELDS: &'static [&'static str] = &["stdout", "stderr"];

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        match &self.cmd {
            Some(cmd) => format!("Run {:?}", cmd),
            None => format!("Run {}", self.argv.join(" ")),
        }
    }

    fn validate(&self) -> Result<(), ActionError> {
        match (self.argv.is_empty(), &self.cmd) {
            (true, None) => Err(ActionError::Invalid(
                "one of argv and cmd needs to be set".to_string(),
            )),
            (false, Some(_)) => Err(ActionError::Invalid(
                "argv and cmd cannot both be set".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn run(&mut self, _exec: &dyn Execution) -> Result<(), ActionError> {
        self.validate()?;

        if let Some(creates) = &self.creates {
            if self.glob_matches(creates)? {
                return Ok(());
            }
        }
        if let Some(removes) = &self.removes {
            if !self.glob_matches(removes)? {
                return Ok(());
            }
        }

        // Commands have no probe to decide idempotence: once the
        // preconditions pass, running means changing.
        self.meta.set_changed();
        if self.meta.check {
            return Ok(());
        }

        let argv = if self.argv.is_empty() {
            let cmd = self.cmd.clone().unwrap_or_default();
            vec!["sh".to_string(), "-c".to_string(), cmd]
        } else {
            self.argv.clone()
        };

        let mut runner = CommandRunner::new(argv);
        if let Some(dir) = &self.chdir {
            runner = runner.cwd(dir.as_path());
        }
        if let Some(stdin) = &self.stdin {
            let mut bytes = stdin.clone().into_bytes();
            if self.stdin_add_newline {
                bytes.push(b'\n');
            }
            runner = runner.stdin(bytes);
        }

        let output = runner.run(&mut self.meta.result)?;
        self.stdout = Some(output.stdout);
        self.stderr = Some(output.stderr);
        Ok(())
    }
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
