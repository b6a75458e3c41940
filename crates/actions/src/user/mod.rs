// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manage system users through the platform's user database tooling.

mod linux;

use gw_core::action::{ActionData, ActionMeta, Execution};
use gw_core::cmd::CommandRunner;
use gw_core::error::ActionError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserState {
    #[default]
    Present,
    Absent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePassword {
    /// Update the password whenever it differs from the requested one.
    #[default]
    Always,
    /// Only set the password when the user is first created.
    OnCreate,
}

/// One row of the passwd database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UserInfo {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub gecos: String,
    pub home: String,
    pub shell: String,
}

/// Create, modify or remove a user account.
///
/// The actual commands are issued by a platform backend selected from OS
/// identification; fields such as password and expiry need their own
/// commands and are handled separately from the main create/modify call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub meta: ActionMeta,
    pub name: String,
    #[serde(default)]
    pub state: UserState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<u32>,
    #[serde(default)]
    pub non_unique: bool,
    /// Primary group name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// Supplementary groups.
    #[serde(default)]
    pub groups: Vec<String>,
    /// Add to `groups` without removing membership elsewhere.
    #[serde(default)]
    pub append: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home: Option<PathBuf>,
    #[serde(default = "default_true")]
    pub create_home: bool,
    #[serde(default)]
    pub move_home: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<PathBuf>,
    #[serde(default)]
    pub system: bool,
    /// Pre-encrypted password hash, applied with chpasswd -e.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub update_password: UpdatePassword,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_lock: Option<bool>,
    /// Account expiry as seconds since the epoch; negative removes expiry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    /// With state=absent, force removal even if the user is logged in.
    #[serde(default)]
    pub force: bool,
    /// With state=absent, also remove the home directory.
    #[serde(default)]
    pub remove: bool,
}

fn default_true() -> bool {
    true
}

impl User {
    pub fn present(name: impl Into<String>) -> Self {
        Self {
            meta: ActionMeta::default(),
            name: name.into(),
            state: UserState::Present,
            uid: None,
            non_unique: false,
            group: None,
            groups: Vec::new(),
            append: false,
            comment: None,
            shell: None,
            home: None,
            create_home: true,
            move_home: false,
            skeleton: None,
            system: false,
            password: None,
            update_password: UpdatePassword::default(),
            password_lock: None,
            expires: None,
            force: false,
            remove: false,
        }
    }

    pub fn absent(name: impl Into<String>) -> Self {
        Self {
            state: UserState::Absent,
            ..Self::present(name)
        }
    }

    /// Run a command that changes the user database. In check mode the
    /// command is skipped but the change is still reported.
    pub(crate) fn run_change(
        &mut self,
        argv: Vec<String>,
        stdin: Option<Vec<u8>>,
    ) -> Result<(), ActionError> {
        if !self.meta.check {
            let mut runner = CommandRunner::new(argv);
            if let Some(bytes) = stdin {
                runner = runner.stdin(bytes);
            }
            runner.run(&mut self.meta.result)?;
        }
        self.meta.set_changed();
        Ok(())
    }

    /// Days since the epoch for chage -E, or "-1" to clear the expiry.
    pub(crate) fn expiry_days(&self) -> Option<i64> {
        self.expires.map(|seconds| {
            if seconds < 0.0 {
                -1
            } else {
                (seconds / 86400.0).floor() as i64
            }
        })
    }
}

/// Query one key from a system database via getent.
pub(crate) fn getent(database: &str, key: &str) -> Option<Vec<String>> {
    let output = std::process::Command::new("getent")
        .args([database, key])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let line = text.lines().next()?;
    Some(line.split(':').map(str::to_string).collect())
}

pub(crate) fn user_info(name: &str) -> Option<UserInfo> {
    let fields = getent("passwd", name)?;
    Some(UserInfo {
        name: fields.first()?.clone(),
        uid: fields.get(2)?.parse().ok()?,
        gid: fields.get(3)?.parse().ok()?,
        gecos: fields.get(4).cloned().unwrap_or_default(),
        home: fields.get(5).cloned().unwrap_or_default(),
        shell: fields.get(6).cloned().unwrap_or_default(),
    })
}

pub(crate) fn group_exists(name: &str) -> bool {
    getent("group", name).is_some()
}

/// Current supplementary group membership, primary group excluded.
pub(crate) fn group_membership(name: &str) -> Vec<String> {
    let output = std::process::Command::new("id").args(["-Gn", name]).output();
    let Ok(output) = output else {
        return Vec::new();
    };
    if !output.status.success() {
        return Vec::new();
    }
    String::from_utf8_lossy(&output.stdout)
        .split_whitespace()
        .skip(1)
        .map(str::to_string)
        .collect()
}

/// The shadow entry's password hash and expiry day, when readable.
pub(crate) fn shadow_entry(name: &str) -> Option<(String, Option<i64>)> {
    let fields = getent("shadow", name)?;
    let hash = fields.get(1)?.clone();
    let expiry = fields.get(7).and_then(|f| f.parse().ok());
    Some((hash, expiry))
}

/// Platform-specific user database operations.
pub(crate) trait UserBackend {
    fn create_user(&self, user: &mut User) -> Result<(), ActionError>;
    fn modify_user(&self, user: &mut User, info: &UserInfo) -> Result<(), ActionError>;
    fn remove_user(&self, user: &mut User) -> Result<(), ActionError>;
}

/// Pick the backend for this host from OS identification.
fn detect_backend() -> Result<Box<dyn UserBackend>, ActionError> {
    if std::env::consts::OS != "linux" {
        return Err(ActionError::Message(format!(
            "no user backend for platform {:?}",
            std::env::consts::OS
        )));
    }
    let distribution = os_release_id();
    if distribution.as_deref() == Some("alpine") {
        Ok(Box::new(linux::Busybox))
    } else {
        Ok(Box::new(linux::Shadow))
    }
}

fn os_release_id() -> Option<String> {
    let contents = std::fs::read_to_string("/etc/os-release").ok()?;
    for line in contents.lines() {
        if let Some(value) = line.strip_prefix("ID=") {
            return Some(value.trim().trim_matches('"').to_string());
        }
    }
    None
}

impl ActionData for User {
    const TAG: &'static str = "groundwork.actions.user.User";

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        match self.state {
            UserState::Absent => format!("Remove user {:?}", self.name),
            UserState::Present => format!("Create user {:?}", self.name),
        }
    }

    fn validate(&self) -> Result<(), ActionError> {
        if self.name.is_empty() {
            return Err(ActionError::Invalid("name cannot be empty".to_string()));
        }
        if self.append && self.groups.is_empty() {
            return Err(ActionError::Invalid(
                "'append' is set, but no 'groups' are specified".to_string(),
            ));
        }
        Ok(())
    }

    fn run(&mut self, _exec: &dyn Execution) -> Result<(), ActionError> {
        self.validate()?;
        let backend = detect_backend()?;

        match self.state {
            UserState::Absent => {
                if user_info(&self.name).is_some() {
                    backend.remove_user(self)?;
                }
            }
            UserState::Present => match user_info(&self.name) {
                None => backend.create_user(self)?,
                Some(info) => backend.modify_user(self, &info)?,
            },
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "user_tests.rs"]
mod tests;
