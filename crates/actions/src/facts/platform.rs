// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kernel, architecture and host identity facts.

use gw_core::action::{ActionData, ActionMeta, Execution};
use gw_core::error::ActionError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

// i86pc is a Solaris and derivatives-ism.
#[allow(clippy::expect_used)]
static SOLARIS_I86_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"i([3456]86|86pc)").expect("constant regex pattern is valid"));

/// Platform facts gathered from uname and friends.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Platform {
    #[serde(flatten)]
    pub meta: ActionMeta,
    /// Kernel name, e.g. `Linux`.
    #[serde(default)]
    pub system: Option<String>,
    /// Kernel release, e.g. `6.1.0-13-amd64`.
    #[serde(default)]
    pub kernel: Option<String>,
    #[serde(default)]
    pub kernel_version: Option<String>,
    /// Hardware name as reported by the kernel.
    #[serde(default)]
    pub machine: Option<String>,
    #[serde(default)]
    pub nodename: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub userspace_bits: Option<String>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub userspace_architecture: Option<String>,
    #[serde(default)]
    pub machine_id: Option<String>,
}

/// Run a probe command and return its first line of output.
fn probe(argv: &[&str]) -> Option<String> {
    let output = std::process::Command::new(argv[0])
        .args(&argv[1..])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let line = text.lines().next()?.trim();
    if line.is_empty() {
        None
    } else {
        Some(line.to_string())
    }
}

impl ActionData for Platform {
    const TAG: &'static str = "groundwork.actions.facts.Platform";
    const IS_FACTS: bool = true;

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        "Gather platform facts".to_string()
    }

    fn run(&mut self, _exec: &dyn Execution) -> Result<(), ActionError> {
        self.system = probe(&["uname", "-s"]);
        self.kernel = probe(&["uname", "-r"]);
        self.kernel_version = probe(&["uname", "-v"]);
        self.machine = probe(&["uname", "-m"]);
        self.nodename = probe(&["uname", "-n"]);

        self.hostname = self
            .nodename
            .as_deref()
            .and_then(|n| n.split('.').next())
            .map(str::to_string);
        self.fqdn = probe(&["hostname", "-f"]).or_else(|| self.nodename.clone());
        self.domain = self.fqdn.as_deref().and_then(|fqdn| {
            fqdn.split_once('.').map(|(_, domain)| domain.to_string())
        });

        // Bits of the userspace we are running in, from this binary's
        // pointer width.
        self.userspace_bits = Some(if cfg!(target_pointer_width = "64") {
            "64".to_string()
        } else {
            "32".to_string()
        });

        let machine = self.machine.clone().unwrap_or_default();
        if machine == "x86_64" {
            self.architecture = Some(machine);
            self.userspace_architecture = Some(match self.userspace_bits.as_deref() {
                Some("32") => "i386".to_string(),
                _ => "x86_64".to_string(),
            });
        } else if SOLARIS_I86_RE.is_match(&machine) {
            self.architecture = Some("i386".to_string());
            self.userspace_architecture = Some(match self.userspace_bits.as_deref() {
                Some("32") => "i386".to_string(),
                _ => "x86_64".to_string(),
            });
        } else if !machine.is_empty() {
            self.architecture = Some(machine);
        }

        for path in ["/var/lib/dbus/machine-id", "/etc/machine-id"] {
            if let Ok(contents) = std::fs::read_to_string(path) {
                let id = contents.trim();
                if !id.is_empty() {
                    self.machine_id = Some(id.to_string());
                    break;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "platform_tests.rs"]
mod tests;
