// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plumbing shared by the file-touching actions: owner/group resolution,
//! mode computation, atomic writes and exclusive creation.

use gw_core::action::ActionMeta;
use gw_core::error::ActionError;
use gw_core::modechange::{self, ModeChange};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::fs::Metadata;
use std::io::{Read, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};

/// File mode given either as octal bits or a symbolic mode string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mode {
    Bits(u32),
    Symbolic(String),
}

/// Owner, group and mode fields shared by file-touching actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilePerms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
}

impl FilePerms {
    /// Resolve names to numeric ids and compile the mode string, once per run.
    pub fn resolve(&self) -> Result<ResolvedPerms, ActionError> {
        let uid = self.owner.as_deref().map(lookup_uid).transpose()?;
        let gid = self.group.as_deref().map(lookup_gid).transpose()?;
        let mode = match &self.mode {
            None => None,
            Some(Mode::Bits(bits)) => Some(ResolvedMode::Bits(*bits)),
            Some(Mode::Symbolic(text)) => Some(ResolvedMode::Changes(modechange::compile(text)?)),
        };
        Ok(ResolvedPerms {
            uid,
            gid,
            mode,
            umask: read_umask(),
        })
    }
}

enum ResolvedMode {
    Bits(u32),
    Changes(Vec<ModeChange>),
}

/// Numeric identity and compiled mode, ready to apply to paths.
pub struct ResolvedPerms {
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    mode: Option<ResolvedMode>,
    umask: u32,
}

impl ResolvedPerms {
    /// Effective permissions the path should receive, or `None` when the
    /// current mode is already right.
    ///
    /// `orig` is the current mode, or `None` for a file being created; new
    /// files without an explicit mode get the umask default.
    pub fn desired_mode(&self, orig: Option<u32>, is_dir: bool) -> Option<u32> {
        match (&self.mode, orig) {
            (None, None) => {
                let base = if is_dir { 0o777 } else { 0o666 };
                Some(base & !self.umask)
            }
            (None, Some(_)) => None,
            (Some(ResolvedMode::Bits(bits)), None) => Some(*bits),
            (Some(ResolvedMode::Bits(bits)), Some(current)) => {
                (current != *bits).then_some(*bits)
            }
            (Some(ResolvedMode::Changes(changes)), orig) => {
                let (newmode, _) =
                    modechange::adjust(orig.unwrap_or(0), is_dir, self.umask, changes);
                match orig {
                    None => Some(newmode),
                    Some(current) => (current != newmode).then_some(newmode),
                }
            }
        }
    }

    pub fn wants_ownership(&self) -> bool {
        self.uid.is_some() || self.gid.is_some()
    }
}

/// Resolve a user name (or numeric string) to a uid.
pub fn lookup_uid(name: &str) -> Result<u32, ActionError> {
    if let Ok(numeric) = name.parse::<u32>() {
        return Ok(numeric);
    }
    lookup_db("passwd", name)
        .ok_or_else(|| ActionError::Invalid(format!("user {:?} not found", name)))
}

/// Resolve a group name (or numeric string) to a gid.
pub fn lookup_gid(name: &str) -> Result<u32, ActionError> {
    if let Ok(numeric) = name.parse::<u32>() {
        return Ok(numeric);
    }
    lookup_db("group", name)
        .ok_or_else(|| ActionError::Invalid(format!("group {:?} not found", name)))
}

/// Look a name up in /etc/passwd or /etc/group, falling back to getent for
/// entries served by NSS.
fn lookup_db(db: &str, name: &str) -> Option<u32> {
    let path = format!("/etc/{}", db);
    if let Ok(contents) = std::fs::read_to_string(&path) {
        for line in contents.lines() {
            let mut fields = line.split(':');
            if fields.next() == Some(name) {
                let _password = fields.next();
                if let Some(id) = fields.next().and_then(|f| f.parse().ok()) {
                    return Some(id);
                }
            }
        }
    }
    let output = std::process::Command::new("getent")
        .args([db, name])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    text.split(':').nth(2).and_then(|f| f.trim().parse().ok())
}

/// Current process umask.
///
/// There is no read-only umask syscall; on Linux the kernel exposes it in
/// /proc. Falls back to the conventional 022.
pub fn read_umask() -> u32 {
    if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("Umask:") {
                if let Ok(value) = u32::from_str_radix(rest.trim(), 8) {
                    return value;
                }
            }
        }
    }
    0o022
}

/// Metadata for an existing filesystem path.
pub struct PathInfo {
    pub path: PathBuf,
    pub meta: Metadata,
    pub is_symlink: bool,
}

impl PathInfo {
    /// Probe `path`, following the final symlink when `follow` is set.
    ///
    /// Returns `None` when the path (or, with `follow`, its target) does not
    /// exist.
    pub fn probe(path: &Path, follow: bool) -> Result<Option<PathInfo>, ActionError> {
        let link_meta = match std::fs::symlink_metadata(path) {
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
            Ok(meta) => meta,
        };
        if link_meta.is_symlink() && follow {
            match std::fs::metadata(path) {
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err.into()),
                Ok(meta) => Ok(Some(PathInfo {
                    path: path.to_path_buf(),
                    meta,
                    is_symlink: false,
                })),
            }
        } else {
            let is_symlink = link_meta.is_symlink();
            Ok(Some(PathInfo {
                path: path.to_path_buf(),
                meta: link_meta,
                is_symlink,
            }))
        }
    }

    pub fn is_dir(&self) -> bool {
        self.meta.is_dir()
    }

    /// Permission bits of the path.
    pub fn file_mode(&self) -> u32 {
        self.meta.permissions().mode() & 0o7777
    }

    pub fn uid(&self) -> u32 {
        self.meta.uid()
    }

    pub fn gid(&self) -> u32 {
        self.meta.gid()
    }
}

/// Align mode and ownership of an existing path with the resolved perms,
/// marking the action changed whenever the filesystem is touched.
pub fn apply_permissions(
    perms: &ResolvedPerms,
    info: &PathInfo,
    meta: &mut ActionMeta,
) -> Result<(), ActionError> {
    if let Some(mode) = perms.desired_mode(Some(info.file_mode()), info.is_dir()) {
        // chmod on a symlink itself is not expressible through std; the
        // probe already resolved the target unless follow was disabled.
        if !info.is_symlink {
            if !meta.check {
                std::fs::set_permissions(&info.path, std::fs::Permissions::from_mode(mode))?;
            }
            meta.set_changed();
            tracing::info!(path = %info.path.display(), mode = %format_args!("0o{:o}", mode), "file mode set");
        }
    }

    let uid = perms.uid.filter(|uid| *uid != info.uid());
    let gid = perms.gid.filter(|gid| *gid != info.gid());
    if uid.is_some() || gid.is_some() {
        if !meta.check {
            if info.is_symlink {
                std::os::unix::fs::lchown(&info.path, uid, gid)?;
            } else {
                std::os::unix::fs::chown(&info.path, uid, gid)?;
            }
        }
        meta.set_changed();
        tracing::info!(path = %info.path.display(), ?uid, ?gid, "file ownership set");
    }
    Ok(())
}

fn set_open_file_perms(file: &std::fs::File, perms: &ResolvedPerms) -> Result<(), ActionError> {
    if let Some(mode) = perms.desired_mode(None, false) {
        file.set_permissions(std::fs::Permissions::from_mode(mode))?;
    }
    if perms.wants_ownership() {
        std::os::unix::fs::fchown(file, perms.uid, perms.gid)?;
    }
    Ok(())
}

/// Atomically rewrite `path`: stage into a sibling temp file, apply
/// ownership and mode, then rename over the destination.
///
/// Missing parent directories are created with default permissions. Marks
/// the action changed.
pub fn write_file_atomically(
    path: &Path,
    content: &[u8],
    perms: &ResolvedPerms,
    meta: &mut ActionMeta,
) -> Result<(), ActionError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut staged = tempfile::Builder::new().prefix(".gw-stage.").tempfile_in(dir)?;
    staged.write_all(content)?;
    staged.flush()?;
    set_open_file_perms(staged.as_file(), perms)?;
    staged
        .persist(path)
        .map_err(|err| ActionError::Io(err.error))?;

    meta.set_changed();
    tracing::info!(path = %path.display(), "file replaced");
    Ok(())
}

/// Create `path` with exclusive-create semantics; returns false when it
/// already exists. The partial file is removed if anything fails after
/// creation. Marks the action changed on success.
pub fn create_file_if_missing(
    path: &Path,
    content: &[u8],
    perms: &ResolvedPerms,
    meta: &mut ActionMeta,
) -> Result<bool, ActionError> {
    use std::os::unix::fs::OpenOptionsExt;

    let opened = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path);
    let mut file = match opened {
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(err) => return Err(err.into()),
        Ok(file) => file,
    };

    let outcome = (|| -> Result<(), ActionError> {
        file.write_all(content)?;
        set_open_file_perms(&file, perms)
    })();
    if let Err(err) = outcome {
        let _ = std::fs::remove_file(path);
        return Err(err);
    }

    meta.set_changed();
    tracing::info!(path = %path.display(), "file created");
    Ok(true)
}

/// Hex sha1 of a byte slice.
pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Hex sha1 of a file's contents, streamed with a fixed-size buffer.
pub fn file_sha1(path: &Path) -> Result<String, ActionError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; 40960];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
#[path = "common_tests.rs"]
mod tests;
