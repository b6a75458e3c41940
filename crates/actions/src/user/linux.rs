// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Linux user backends: shadow-utils for most distributions, the busybox
//! flavour for Alpine.

use super::{
    group_exists, group_membership, shadow_entry, UpdatePassword, User, UserBackend, UserInfo,
};
use gw_core::cmd::find_command;
use gw_core::error::ActionError;
use std::collections::BTreeSet;

/// useradd/usermod/userdel as shipped by shadow-utils.
pub(crate) struct Shadow;

impl Shadow {
    fn set_password(&self, user: &mut User) -> Result<(), ActionError> {
        let Some(password) = user.password.clone() else {
            return Ok(());
        };
        let chpasswd = find_command("chpasswd")?;
        let data = format!("{}:{}", user.name, password);
        user.run_change(
            vec![chpasswd.to_string_lossy().into_owned(), "-e".to_string()],
            Some(data.into_bytes()),
        )
    }

    fn set_expiry(&self, user: &mut User) -> Result<(), ActionError> {
        let Some(days) = user.expiry_days() else {
            return Ok(());
        };
        if let Some((_, Some(current))) = shadow_entry(&user.name) {
            if current == days {
                return Ok(());
            }
        }
        let chage = find_command("chage")?;
        user.run_change(
            vec![
                chage.to_string_lossy().into_owned(),
                "-E".to_string(),
                days.to_string(),
                user.name.clone(),
            ],
            None,
        )
    }

    fn set_lock(&self, user: &mut User) -> Result<(), ActionError> {
        let Some(want_locked) = user.password_lock else {
            return Ok(());
        };
        if let Some((hash, _)) = shadow_entry(&user.name) {
            let is_locked = hash.starts_with('!');
            if is_locked == want_locked {
                return Ok(());
            }
        }
        let usermod = find_command("usermod")?;
        let flag = if want_locked { "-L" } else { "-U" };
        user.run_change(
            vec![
                usermod.to_string_lossy().into_owned(),
                flag.to_string(),
                user.name.clone(),
            ],
            None,
        )
    }
}

impl UserBackend for Shadow {
    fn create_user(&self, user: &mut User) -> Result<(), ActionError> {
        let useradd = find_command("useradd")?;
        let mut cmd = vec![useradd.to_string_lossy().into_owned()];

        if let Some(uid) = user.uid {
            cmd.push("-u".to_string());
            cmd.push(uid.to_string());
            if user.non_unique {
                cmd.push("-o".to_string());
            }
        }
        if let Some(group) = &user.group {
            if !group_exists(group) {
                return Err(ActionError::Message(format!(
                    "group {:?} does not exist",
                    group
                )));
            }
            cmd.push("-g".to_string());
            cmd.push(group.clone());
        }
        if !user.groups.is_empty() {
            cmd.push("-G".to_string());
            cmd.push(user.groups.join(","));
        }
        if let Some(comment) = &user.comment {
            cmd.push("-c".to_string());
            cmd.push(comment.clone());
        }
        if let Some(home) = &user.home {
            cmd.push("-d".to_string());
            cmd.push(home.to_string_lossy().into_owned());
        }
        if let Some(shell) = &user.shell {
            cmd.push("-s".to_string());
            cmd.push(shell.clone());
        }
        if user.create_home {
            cmd.push("-m".to_string());
            if let Some(skeleton) = &user.skeleton {
                cmd.push("-k".to_string());
                cmd.push(skeleton.to_string_lossy().into_owned());
            }
        } else {
            cmd.push("-M".to_string());
        }
        if user.system {
            cmd.push("-r".to_string());
        }
        cmd.push(user.name.clone());

        user.run_change(cmd, None)?;
        self.set_password(user)?;
        self.set_expiry(user)?;
        self.set_lock(user)
    }

    fn modify_user(&self, user: &mut User, info: &UserInfo) -> Result<(), ActionError> {
        let usermod = find_command("usermod")?;
        let mut args: Vec<String> = Vec::new();

        if let Some(uid) = user.uid {
            if uid != info.uid {
                args.push("-u".to_string());
                args.push(uid.to_string());
                if user.non_unique {
                    args.push("-o".to_string());
                }
            }
        }
        if let Some(group) = &user.group {
            let wanted_gid = super::getent("group", group)
                .and_then(|fields| fields.get(2)?.parse::<u32>().ok())
                .ok_or_else(|| {
                    ActionError::Message(format!("group {:?} does not exist", group))
                })?;
            if wanted_gid != info.gid {
                args.push("-g".to_string());
                args.push(group.clone());
            }
        }
        if let Some(comment) = &user.comment {
            if comment != &info.gecos {
                args.push("-c".to_string());
                args.push(comment.clone());
            }
        }
        if let Some(home) = &user.home {
            if home.to_string_lossy() != info.home {
                args.push("-d".to_string());
                args.push(home.to_string_lossy().into_owned());
                if user.move_home {
                    args.push("-m".to_string());
                }
            }
        }
        if let Some(shell) = &user.shell {
            if shell != &info.shell {
                args.push("-s".to_string());
                args.push(shell.clone());
            }
        }

        if !user.groups.is_empty() {
            let current: BTreeSet<String> = group_membership(&user.name).into_iter().collect();
            let wanted: BTreeSet<String> = user.groups.iter().cloned().collect();
            let needs_update = if user.append {
                !wanted.is_subset(&current)
            } else {
                wanted != current
            };
            if needs_update {
                if user.append {
                    args.push("-a".to_string());
                }
                args.push("-G".to_string());
                args.push(user.groups.join(","));
            }
        }

        if !args.is_empty() {
            let mut cmd = vec![usermod.to_string_lossy().into_owned()];
            cmd.extend(args);
            cmd.push(user.name.clone());
            user.run_change(cmd, None)?;
        }

        if user.update_password == UpdatePassword::Always {
            if let Some(password) = &user.password {
                let differs = match shadow_entry(&user.name) {
                    Some((hash, _)) => &hash != password,
                    // Shadow unreadable: assume an update is needed.
                    None => true,
                };
                if differs {
                    self.set_password(user)?;
                }
            }
        }
        self.set_expiry(user)?;
        self.set_lock(user)
    }

    fn remove_user(&self, user: &mut User) -> Result<(), ActionError> {
        let userdel = find_command("userdel")?;
        let mut cmd = vec![userdel.to_string_lossy().into_owned()];
        if user.force {
            cmd.push("-f".to_string());
        }
        if user.remove {
            cmd.push("-r".to_string());
        }
        cmd.push(user.name.clone());
        user.run_change(cmd, None)
    }
}

/// adduser/deluser as shipped by busybox (Alpine).
pub(crate) struct Busybox;

impl Busybox {
    fn set_password(&self, user: &mut User) -> Result<(), ActionError> {
        let Some(password) = user.password.clone() else {
            return Ok(());
        };
        let chpasswd = find_command("chpasswd")?;
        let data = format!("{}:{}", user.name, password);
        user.run_change(
            vec![
                chpasswd.to_string_lossy().into_owned(),
                "--encrypted".to_string(),
            ],
            Some(data.into_bytes()),
        )
    }
}

impl UserBackend for Busybox {
    fn create_user(&self, user: &mut User) -> Result<(), ActionError> {
        let adduser = find_command("adduser")?;
        let mut cmd = vec![adduser.to_string_lossy().into_owned(), "-D".to_string()];

        if let Some(uid) = user.uid {
            cmd.push("-u".to_string());
            cmd.push(uid.to_string());
        }
        if let Some(group) = &user.group {
            if !group_exists(group) {
                return Err(ActionError::Message(format!(
                    "group {:?} does not exist",
                    group
                )));
            }
            cmd.push("-G".to_string());
            cmd.push(group.clone());
        }
        if let Some(comment) = &user.comment {
            cmd.push("-g".to_string());
            cmd.push(comment.clone());
        }
        if let Some(home) = &user.home {
            cmd.push("-h".to_string());
            cmd.push(home.to_string_lossy().into_owned());
        }
        if let Some(shell) = &user.shell {
            cmd.push("-s".to_string());
            cmd.push(shell.clone());
        }
        if !user.create_home {
            cmd.push("-H".to_string());
        }
        if let Some(skeleton) = &user.skeleton {
            cmd.push("-k".to_string());
            cmd.push(skeleton.to_string_lossy().into_owned());
        }
        if user.system {
            cmd.push("-S".to_string());
        }
        cmd.push(user.name.clone());

        user.run_change(cmd, None)?;
        self.set_password(user)?;

        if !user.groups.is_empty() {
            let adduser = adduser.to_string_lossy().into_owned();
            for group in user.groups.clone() {
                user.run_change(vec![adduser.clone(), user.name.clone(), group], None)?;
            }
        }
        Ok(())
    }

    fn modify_user(&self, user: &mut User, _info: &UserInfo) -> Result<(), ActionError> {
        let adduser = find_command("adduser")?;
        let delgroup = find_command("delgroup")?;

        if !user.groups.is_empty() {
            let current: BTreeSet<String> = group_membership(&user.name).into_iter().collect();
            let wanted: BTreeSet<String> = user.groups.iter().cloned().collect();

            for group in wanted.difference(&current) {
                user.run_change(
                    vec![
                        adduser.to_string_lossy().into_owned(),
                        user.name.clone(),
                        group.clone(),
                    ],
                    None,
                )?;
            }
            if !user.append {
                for group in current.difference(&wanted) {
                    user.run_change(
                        vec![
                            delgroup.to_string_lossy().into_owned(),
                            user.name.clone(),
                            group.clone(),
                        ],
                        None,
                    )?;
                }
            }
        }

        if user.update_password == UpdatePassword::Always {
            if let Some(password) = &user.password {
                let differs = match shadow_entry(&user.name) {
                    Some((hash, _)) => &hash != password,
                    None => true,
                };
                if differs {
                    self.set_password(user)?;
                }
            }
        }
        Ok(())
    }

    fn remove_user(&self, user: &mut User) -> Result<(), ActionError> {
        let deluser = find_command("deluser")?;
        let mut cmd = vec![deluser.to_string_lossy().into_owned()];
        if user.remove {
            cmd.push("--remove-home".to_string());
        }
        cmd.push(user.name.clone());
        user.run_change(cmd, None)
    }
}
