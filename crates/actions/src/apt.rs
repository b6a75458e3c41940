// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Debian package management through apt-get, with a cached dpkg snapshot.

use gw_core::action::{ActionData, ActionMeta, Execution};
use gw_core::cmd::{find_command, CommandRunner};
use gw_core::error::ActionError;
use parking_lot::Mutex;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

#[allow(clippy::expect_used)]
static RE_APT_RESULTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<upgraded>\d+) upgraded, (?P<new>\d+) newly installed, (?P<removed>\d+) to remove and (?P<held>\d+) not upgraded\.$",
    )
    .expect("constant regex pattern is valid")
});

// Package names consist of lower case letters, digits, plus and minus signs
// and periods, optionally followed by :arch and =version.
#[allow(clippy::expect_used)]
static RE_PKG_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<name>[a-z0-9][a-z0-9+.-]+)(?::(?P<arch>\w+))?(?:=(?P<ver>.+))?$")
        .expect("constant regex pattern is valid")
});

/// Snapshot of the dpkg status database, shared across apt actions on one
/// host through the action cache.
#[derive(Default)]
pub struct DpkgStatus {
    /// Modification time of the status file the last time it was read.
    mtime: Option<SystemTime>,
    arch: Option<String>,
    /// (name, arch) -> (version, status)
    packages: HashMap<(String, String), (String, String)>,
}

impl DpkgStatus {
    const PATH: &'static str = "/var/lib/dpkg/status";

    /// Current status of a package: `None` when not known to dpkg.
    pub fn status(&self, name: &str, arch: Option<&str>) -> Option<(&str, &str)> {
        let native = self.arch.as_deref().unwrap_or("");
        let candidates = match arch {
            Some(arch) => vec![arch],
            None => vec![native, "all"],
        };
        for candidate in candidates {
            if let Some((version, status)) =
                self.packages.get(&(name.to_string(), candidate.to_string()))
            {
                return Some((version, status));
            }
        }
        None
    }

    /// Reload the snapshot if the status file changed on disk.
    pub fn update(&mut self) -> Result<(), ActionError> {
        if self.arch.is_none() {
            let output = std::process::Command::new("dpkg")
                .arg("--print-architecture")
                .output()?;
            if !output.status.success() {
                return Err(ActionError::Message(
                    "dpkg --print-architecture failed".to_string(),
                ));
            }
            self.arch = Some(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let mtime = match std::fs::metadata(Self::PATH) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.packages.clear();
                self.mtime = None;
                return Ok(());
            }
            Err(err) => return Err(err.into()),
            Ok(meta) => meta.modified()?,
        };
        if self.mtime.is_some_and(|seen| mtime <= seen) {
            return Ok(());
        }

        self.load(Path::new(Self::PATH))?;
        self.mtime = Some(mtime);
        Ok(())
    }

    /// Parse dpkg's status file. Only the single-line header fields matter,
    /// so paragraphs can be scanned without a full control-file parser.
    fn load(&mut self, path: &Path) -> Result<(), ActionError> {
        let contents = std::fs::read_to_string(path)?;
        self.packages.clear();
        for paragraph in contents.split("\n\n") {
            let mut package = None;
            let mut version = None;
            let mut arch = None;
            let mut status = None;
            for line in paragraph.lines() {
                if let Some(value) = line.strip_prefix("Package: ") {
                    package = Some(value.to_string());
                } else if let Some(value) = line.strip_prefix("Version: ") {
                    version = Some(value.to_string());
                } else if let Some(value) = line.strip_prefix("Architecture: ") {
                    arch = Some(value.to_string());
                } else if let Some(value) = line.strip_prefix("Status: ") {
                    status = Some(value.to_string());
                }
            }
            if let Some(name) = package {
                self.packages.insert(
                    (name, arch.unwrap_or_default()),
                    (version.unwrap_or_default(), status.unwrap_or_default()),
                );
            }
        }
        Ok(())
    }

    #[cfg(test)]
    fn from_text(arch: &str, text: &str) -> Self {
        let mut status = DpkgStatus {
            arch: Some(arch.to_string()),
            ..DpkgStatus::default()
        };
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), text).unwrap();
        status.load(file.path()).unwrap();
        status
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageState {
    #[default]
    Present,
    Latest,
    Absent,
}

/// Install, upgrade or remove Debian packages.
///
/// The dpkg database snapshot is shared across apt actions on the same host;
/// apt-get runs only when the filtered package list is non-empty, and
/// CHANGED is decided by parsing apt's summary line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Apt {
    #[serde(flatten)]
    pub meta: ActionMeta,
    /// Package specs: `name`, `name:arch`, `name=version` or a glob.
    #[serde(default)]
    pub name: Vec<String>,
    #[serde(default)]
    pub state: PackageState,
    /// Run apt-get update before installing.
    #[serde(default)]
    pub update_cache: bool,
    /// Skip the cache update when the apt cache is younger than this many
    /// seconds. Implies `update_cache`.
    #[serde(default)]
    pub cache_valid_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_recommends: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_release: Option<String>,
    #[serde(default)]
    pub autoremove: bool,
    #[serde(default)]
    pub purge: bool,
    #[serde(default)]
    pub fail_on_autoremove: bool,
    #[serde(default)]
    pub allow_unauthenticated: bool,
    #[serde(default)]
    pub only_upgrade: bool,
    #[serde(default = "Apt::default_dpkg_options")]
    pub dpkg_options: Vec<String>,
    /// Exit code for a temporary policy-rc.d shim that keeps services from
    /// starting during install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_rc_d: Option<i32>,
}

impl Apt {
    pub fn install<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            meta: ActionMeta::default(),
            name: names.into_iter().map(Into::into).collect(),
            state: PackageState::Present,
            update_cache: false,
            cache_valid_time: 0,
            install_recommends: None,
            default_release: None,
            autoremove: false,
            purge: false,
            fail_on_autoremove: false,
            allow_unauthenticated: false,
            only_upgrade: false,
            dpkg_options: Self::default_dpkg_options(),
            policy_rc_d: None,
        }
    }

    fn default_dpkg_options() -> Vec<String> {
        vec!["force-confdef".to_string(), "force-confold".to_string()]
    }

    fn base_command(&self, apt_get: &Path) -> Vec<String> {
        let mut cmd = vec![
            apt_get.to_string_lossy().into_owned(),
            "-q".to_string(),
            "-y".to_string(),
        ];
        if self.meta.check {
            cmd.push("--simulate".to_string());
        }
        for option in &self.dpkg_options {
            cmd.push(format!("--option=Dpkg::Options::=--{}", option));
        }
        cmd
    }

    fn push_install_flags(&self, cmd: &mut Vec<String>) {
        if self.only_upgrade {
            cmd.push("--only-upgrade".to_string());
        }
        if self.fail_on_autoremove {
            cmd.push("--no-remove".to_string());
        }
        if let Some(release) = &self.default_release {
            cmd.push("-t".to_string());
            cmd.push(release.clone());
        }
        match self.install_recommends {
            Some(true) => cmd.push("--install-recommends".to_string()),
            Some(false) => cmd.push("--no-install-recommends".to_string()),
            None => {}
        }
        if self.allow_unauthenticated {
            cmd.push("--allow-unauthenticated".to_string());
        }
    }

    fn cache_still_valid(&self) -> bool {
        if self.cache_valid_time == 0 {
            return false;
        }
        let Ok(meta) = std::fs::metadata("/var/cache/apt/pkgcache.bin") else {
            return false;
        };
        let Ok(mtime) = meta.modified() else {
            return false;
        };
        mtime + Duration::from_secs(self.cache_valid_time) >= SystemTime::now()
    }

    fn filter_packages_to_install(
        &self,
        dpkg: &DpkgStatus,
    ) -> Result<Vec<String>, ActionError> {
        let mut filtered = Vec::new();
        for spec in &self.name {
            if spec.contains('*') {
                filtered.push(spec.clone());
                continue;
            }
            let parsed = RE_PKG_NAME
                .captures(spec)
                .ok_or_else(|| ActionError::Invalid(format!("invalid package name {:?}", spec)))?;
            let name = &parsed["name"];
            let version = parsed.name("ver").map(|m| m.as_str());
            let arch = parsed.name("arch").map(|m| m.as_str());

            match dpkg.status(name, arch) {
                None => filtered.push(spec.clone()),
                Some((installed_version, status)) => {
                    if version.is_some_and(|wanted| wanted != installed_version) {
                        filtered.push(spec.clone());
                    } else if status != "install ok installed" {
                        filtered.push(spec.clone());
                    }
                }
            }
        }
        Ok(filtered)
    }

    fn filter_packages_to_remove(&self, dpkg: &DpkgStatus) -> Result<Vec<String>, ActionError> {
        let mut filtered = Vec::new();
        for spec in &self.name {
            if spec.contains('*') {
                filtered.push(spec.clone());
                continue;
            }
            let parsed = RE_PKG_NAME
                .captures(spec)
                .ok_or_else(|| ActionError::Invalid(format!("invalid package name {:?}", spec)))?;
            let name = &parsed["name"];
            let arch = parsed.name("arch").map(|m| m.as_str());

            match dpkg.status(name, arch) {
                None => {}
                Some((_, status)) => {
                    if !self.purge && status == "deinstall ok config-files" {
                        // Removed but not purged, and purge was not requested.
                        continue;
                    }
                    filtered.push(spec.clone());
                }
            }
        }
        Ok(filtered)
    }

    fn run_apt(&mut self, cmd: Vec<String>) -> Result<bool, ActionError> {
        let _shim = match self.policy_rc_d {
            Some(code) if !self.meta.check => Some(PolicyShim::install(code)?),
            _ => None,
        };
        let output = CommandRunner::new(cmd).run(&mut self.meta.result)?;
        Ok(has_apt_changes(&output.stdout_text()))
    }

    fn do_install(&mut self, apt_get: &Path, dpkg: &mut DpkgStatus) -> Result<(), ActionError> {
        let packages = match self.state {
            PackageState::Latest => self.name.clone(),
            _ => {
                dpkg.update()?;
                self.filter_packages_to_install(dpkg)?
            }
        };
        if packages.is_empty() {
            return Ok(());
        }

        let mut cmd = self.base_command(apt_get);
        self.push_install_flags(&mut cmd);
        if self.autoremove {
            cmd.push("--auto-remove".to_string());
        }
        cmd.push("install".to_string());
        cmd.extend(packages.iter().cloned());

        if self.run_apt(cmd)? {
            self.meta.set_changed();
            if !self.meta.check {
                self.mark_manually_installed(&packages)?;
            }
        }
        Ok(())
    }

    fn do_remove(&mut self, apt_get: &Path, dpkg: &mut DpkgStatus) -> Result<(), ActionError> {
        dpkg.update()?;
        let packages = self.filter_packages_to_remove(dpkg)?;
        if packages.is_empty() {
            return Ok(());
        }

        let mut cmd = self.base_command(apt_get);
        if self.purge {
            cmd.push("--purge".to_string());
        }
        if self.autoremove {
            cmd.push("--auto-remove".to_string());
        }
        cmd.push("remove".to_string());
        cmd.extend(packages.iter().cloned());

        if self.run_apt(cmd)? {
            self.meta.set_changed();
        }
        Ok(())
    }

    fn mark_manually_installed(&mut self, packages: &[String]) -> Result<(), ActionError> {
        let Ok(apt_mark) = find_command("apt-mark") else {
            return Ok(());
        };
        let mut cmd = vec![apt_mark.to_string_lossy().into_owned(), "manual".to_string()];
        // apt-mark does not understand version or arch suffixes.
        cmd.extend(packages.iter().map(|spec| {
            spec.split(['=', ':']).next().unwrap_or(spec).to_string()
        }));
        CommandRunner::new(cmd).run(&mut self.meta.result)?;
        Ok(())
    }
}

/// Parse apt output for the summary line reporting changes.
fn has_apt_changes(stdout: &str) -> bool {
    for line in stdout.lines() {
        let Some(caps) = RE_APT_RESULTS.captures(line) else {
            continue;
        };
        let count = |name: &str| {
            caps.name(name)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .unwrap_or(0)
        };
        if count("upgraded") > 0 || count("new") > 0 || count("removed") > 0 {
            return true;
        }
    }
    false
}

/// Temporary /usr/sbin/policy-rc.d that tells invoke-rc.d not to start
/// services; the previous file, if any, is restored on drop.
struct PolicyShim {
    stash: Option<PathBuf>,
}

impl PolicyShim {
    const PATH: &'static str = "/usr/sbin/policy-rc.d";

    fn install(exit_code: i32) -> Result<Self, ActionError> {
        use std::os::unix::fs::PermissionsExt;

        let path = Path::new(Self::PATH);
        let stash = if path.exists() {
            let stashed = tempfile::Builder::new()
                .prefix("policy-rc.d.")
                .tempfile_in("/usr/sbin")?;
            let (_, stash_path) = stashed.keep().map_err(|err| ActionError::Io(err.error))?;
            std::fs::rename(path, &stash_path)?;
            Some(stash_path)
        } else {
            None
        };

        let mut file = std::fs::File::create(path)?;
        writeln!(file, "#!/bin/sh")?;
        writeln!(file, "exit {}", exit_code)?;
        file.set_permissions(std::fs::Permissions::from_mode(0o755))?;
        Ok(Self { stash })
    }
}

impl Drop for PolicyShim {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(Self::PATH) {
            tracing::warn!(error = %err, "cannot remove policy-rc.d shim");
        }
        if let Some(stash) = self.stash.take() {
            if let Err(err) = std::fs::rename(&stash, Self::PATH) {
                tracing::warn!(error = %err, "cannot restore policy-rc.d");
            }
        }
    }
}

impl ActionData for Apt {
    const TAG: &'static str = "groundwork.actions.apt.Apt";

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        let names = self.name.join(", ");
        match self.state {
            PackageState::Present => format!("Install packages {}", names),
            PackageState::Latest => format!("Install latest packages {}", names),
            PackageState::Absent => format!("Remove packages {}", names),
        }
    }

    fn validate(&self) -> Result<(), ActionError> {
        for spec in &self.name {
            if spec.matches('=').count() > 1 {
                return Err(ActionError::Invalid(format!(
                    "invalid package name {:?}",
                    spec
                )));
            }
            if self.state == PackageState::Latest && spec.contains('=') {
                return Err(ActionError::Invalid(format!(
                    "cannot use version numbers when state=latest: {:?}",
                    spec
                )));
            }
        }
        Ok(())
    }

    fn run(&mut self, exec: &dyn Execution) -> Result<(), ActionError> {
        self.validate()?;
        let apt_get = find_command("apt-get")?;

        if (self.update_cache || self.cache_valid_time > 0) && !self.cache_still_valid() {
            let mut cmd = self.base_command(&apt_get);
            cmd.push("update".to_string());
            CommandRunner::new(cmd).run(&mut self.meta.result)?;
        }

        let cache = exec.cache().get_with(|| Mutex::new(DpkgStatus::default()));
        let mut dpkg = cache.lock();

        match self.state {
            PackageState::Present | PackageState::Latest => {
                self.do_install(&apt_get, &mut dpkg)
            }
            PackageState::Absent => self.do_remove(&apt_get, &mut dpkg),
        }
    }
}

#[cfg(test)]
#[path = "apt_tests.rs"]
mod tests;
