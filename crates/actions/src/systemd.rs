// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manage systemd units: mask state, enablement and activity.

use gw_core::action::{ActionData, ActionMeta, Execution};
use gw_core::cmd::{find_command, CommandRunner};
use gw_core::error::ActionError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// Requested activity for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitActivity {
    Started,
    Stopped,
    Reloaded,
    Restarted,
}

/// UnitFileState values that count as enabled, per systemctl(1).
const ENABLED_STATES: &[&str] = &[
    "enabled",
    "enabled-runtime",
    "alias",
    "static",
    "indirect",
    "generated",
    "transient",
];

/// Drive systemctl, issuing transitions only when the unit needs them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Systemd {
    #[serde(flatten)]
    pub meta: ActionMeta,
    /// `system` or `user`.
    #[serde(default = "Systemd::default_scope")]
    pub scope: String,
    #[serde(default)]
    pub no_block: bool,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub daemon_reload: bool,
    #[serde(default)]
    pub daemon_reexec: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<UnitActivity>,
}

impl Systemd {
    pub fn unit(name: impl Into<String>) -> Self {
        Self {
            meta: ActionMeta::default(),
            scope: Self::default_scope(),
            no_block: false,
            force: false,
            daemon_reload: false,
            daemon_reexec: false,
            unit: Some(name.into()),
            enabled: None,
            masked: None,
            state: None,
        }
    }

    fn default_scope() -> String {
        "system".to_string()
    }

    fn base_command(&self, systemctl: &Path) -> Vec<String> {
        let mut cmd = vec![systemctl.to_string_lossy().into_owned()];
        if self.scope != "system" {
            cmd.push(format!("--{}", self.scope));
        }
        if self.no_block {
            cmd.push("--no-block".to_string());
        }
        if self.force {
            cmd.push("--force".to_string());
        }
        cmd
    }

    /// Run systemctl with the given arguments. In check mode the command is
    /// logged but not executed unless `allow_in_check` (read-only probes).
    fn run_systemctl(
        &mut self,
        systemctl: &Path,
        args: &[&str],
        allow_in_check: bool,
        tolerate_failure: bool,
    ) -> Result<Option<String>, ActionError> {
        let mut cmd = self.base_command(systemctl);
        cmd.extend(args.iter().map(|a| (*a).to_string()));
        tracing::info!(cmd = %cmd.join(" "), "running systemctl");
        if self.meta.check && !allow_in_check {
            return Ok(None);
        }
        let mut runner = CommandRunner::new(cmd);
        if self.scope != "system" && std::env::var_os("XDG_RUNTIME_DIR").is_none() {
            // systemctl --user needs the runtime dir; derive it from our uid.
            if let Ok(meta) = std::fs::metadata("/proc/self") {
                runner = runner.env("XDG_RUNTIME_DIR", format!("/run/user/{}", meta.uid()));
            }
        }
        if tolerate_failure {
            runner = runner.allow_fail();
        }
        let output = runner.run(&mut self.meta.result)?;
        Ok(Some(output.stdout_text()))
    }

    /// Fetch the current status of the unit as reported by `systemctl show`.
    fn unit_info(&mut self, systemctl: &Path) -> Result<HashMap<String, String>, ActionError> {
        let Some(unit) = self.unit.clone() else {
            return Ok(HashMap::new());
        };
        let stdout = self.run_systemctl(systemctl, &["show", &unit, "--no-page"], true, true)?;
        let mut info = HashMap::new();
        if let Some(stdout) = stdout {
            for line in stdout.lines() {
                if let Some((key, value)) = line.trim().split_once('=') {
                    info.insert(key.to_string(), value.to_string());
                }
            }
        }
        Ok(info)
    }
}

impl ActionData for Systemd {
    const TAG: &'static str = "groundwork.actions.systemd.Systemd";

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        let mut summary = String::new();
        if let Some(unit) = &self.unit {
            let mut verbs: Vec<&str> = Vec::new();
            if self.masked.is_some() {
                verbs.push("mask");
            }
            if self.enabled.is_some() {
                verbs.push("enable");
            }
            match self.state {
                Some(UnitActivity::Started) => verbs.push("start"),
                Some(UnitActivity::Stopped) => verbs.push("stop"),
                Some(UnitActivity::Reloaded) => verbs.push("reload"),
                Some(UnitActivity::Restarted) => verbs.push("restart"),
                None => {}
            }
            if !verbs.is_empty() {
                summary = format!("{} {}", verbs.join(", "), unit);
            }
        }
        let mut daemon_verbs: Vec<&str> = Vec::new();
        if self.daemon_reload {
            daemon_verbs.push("reload");
        }
        if self.daemon_reexec {
            daemon_verbs.push("reexec");
        }
        if !daemon_verbs.is_empty() {
            if !summary.is_empty() {
                summary.push_str(" and ");
            }
            summary.push_str(&format!("{} systemd", daemon_verbs.join(", ")));
        }
        if summary.is_empty() {
            summary = "systemd action with nothing to do".to_string();
        }
        if self.scope != "system" {
            summary.push_str(&format!(" [{} scope]", self.scope));
        }
        summary
    }

    fn validate(&self) -> Result<(), ActionError> {
        if self.scope != "system" && self.scope != "user" && self.scope != "global" {
            return Err(ActionError::Invalid(format!(
                "invalid scope {:?}",
                self.scope
            )));
        }
        if self.unit.is_none()
            && (self.enabled.is_some() || self.masked.is_some() || self.state.is_some())
        {
            return Err(ActionError::Invalid(
                "enabled/masked/state require a unit".to_string(),
            ));
        }
        Ok(())
    }

    fn run(&mut self, _exec: &dyn Execution) -> Result<(), ActionError> {
        self.validate()?;
        let systemctl = find_command("systemctl")?;

        if self.daemon_reload {
            self.run_systemctl(&systemctl, &["daemon-reload"], false, false)?;
        }
        if self.daemon_reexec {
            self.run_systemctl(&systemctl, &["daemon-reexec"], false, false)?;
        }

        let Some(unit) = self.unit.clone() else {
            return Ok(());
        };
        let info = self.unit_info(&systemctl)?;

        if let Some(masked) = self.masked {
            let is_masked = info.get("UnitFileState").map(String::as_str) == Some("masked");
            if masked != is_masked {
                let verb = if masked { "mask" } else { "unmask" };
                self.run_systemctl(&systemctl, &[verb, &unit], false, false)?;
                self.meta.set_changed();
            }
        }

        if let Some(enabled) = self.enabled {
            let is_enabled = info
                .get("UnitFileState")
                .is_some_and(|state| ENABLED_STATES.contains(&state.as_str()));
            if enabled != is_enabled {
                let verb = if enabled { "enable" } else { "disable" };
                self.run_systemctl(&systemctl, &[verb, &unit], false, false)?;
                self.meta.set_changed();
            }
        }

        if let Some(wanted) = self.state {
            let active = info.get("ActiveState").map(String::as_str);
            let transition = match (wanted, active) {
                (_, None) => None,
                (UnitActivity::Started, Some(state)) => {
                    (!matches!(state, "active" | "activating")).then_some("start")
                }
                (UnitActivity::Stopped, Some(state)) => {
                    matches!(state, "active" | "activating" | "deactivating").then_some("stop")
                }
                (UnitActivity::Reloaded, Some(state)) => {
                    if !matches!(state, "active" | "activating") {
                        Some("start")
                    } else {
                        Some("reload")
                    }
                }
                (UnitActivity::Restarted, Some(state)) => {
                    if !matches!(state, "active" | "activating") {
                        Some("start")
                    } else {
                        Some("restart")
                    }
                }
            };
            if let Some(verb) = transition {
                self.run_systemctl(&systemctl, &[verb, &unit], false, false)?;
                self.meta.set_changed();
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "systemd_tests.rs"]
mod tests;
