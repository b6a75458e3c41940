// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shell command helper used by actions.

use crate::error::ActionError;
use crate::result::{ActionResult, CommandResult};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Look for `cmd` in the search path and return its full path.
pub fn find_command(cmd: &str) -> Result<PathBuf, ActionError> {
    which::which(cmd).map_err(|_| ActionError::CommandNotFound(cmd.to_string()))
}

/// Captured output of one command run.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub returncode: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.returncode == 0
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Builder for commands run by actions.
///
/// Pins a predictable locale, captures both standard streams, records a
/// [`CommandResult`] in the action's command log, and fails on non-zero exit
/// unless [`CommandRunner::allow_fail`] was requested.
pub struct CommandRunner {
    argv: Vec<String>,
    cwd: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
    env: Vec<(String, String)>,
    check: bool,
}

impl CommandRunner {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            cwd: None,
            stdin: None,
            env: Vec::new(),
            check: true,
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(bytes.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Tolerate a non-zero exit; the caller inspects the returned record.
    pub fn allow_fail(mut self) -> Self {
        self.check = false;
        self
    }

    /// Run the command, recording it in `result.command_log`.
    pub fn run(self, result: &mut ActionResult) -> Result<CommandOutput, ActionError> {
        if self.argv.is_empty() {
            return Err(ActionError::Invalid("empty command line".to_string()));
        }
        tracing::debug!(argv = ?self.argv, "running command");

        let mut record = CommandResult {
            cmdline: self.argv.clone(),
            stderr: None,
            returncode: None,
        };

        match self.spawn() {
            Err(err) => {
                result.command_log.push(record);
                Err(err.into())
            }
            Ok(output) => {
                let returncode = output.status.code().unwrap_or(-1);
                let stderr_text = String::from_utf8_lossy(&output.stderr).into_owned();
                record.stderr = Some(stderr_text.clone());
                record.returncode = Some(returncode);
                result.command_log.push(record);

                if self.check && returncode != 0 {
                    return Err(ActionError::CommandFailed {
                        cmdline: self.argv,
                        returncode,
                        stderr: Some(stderr_text),
                    });
                }
                Ok(CommandOutput {
                    stdout: output.stdout,
                    stderr: output.stderr,
                    returncode,
                })
            }
        }
    }

    fn spawn(&self) -> std::io::Result<Output> {
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..])
            .env("LANG", "C")
            .env("LC_ALL", "C")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        match &self.stdin {
            None => {
                cmd.stdin(Stdio::null());
                cmd.output()
            }
            Some(bytes) => {
                cmd.stdin(Stdio::piped());
                let mut child = cmd.spawn()?;
                if let Some(mut stdin) = child.stdin.take() {
                    stdin.write_all(bytes)?;
                }
                child.wait_with_output()
            }
        }
    }
}

#[cfg(test)]
#[path = "cmd_tests.rs"]
mod tests;
