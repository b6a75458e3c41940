// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gw_core::action::ActionMeta;

#[test]
fn numeric_owner_strings_pass_through() {
    assert_eq!(lookup_uid("0").unwrap(), 0);
    assert_eq!(lookup_gid("12345").unwrap(), 12345);
}

#[test]
fn root_resolves_to_uid_zero() {
    assert_eq!(lookup_uid("root").unwrap(), 0);
}

#[test]
fn unknown_user_is_a_configuration_error() {
    let err = lookup_uid("gw-no-such-user-xyzzy").unwrap_err();
    assert!(matches!(err, gw_core::error::ActionError::Invalid(_)));
}

#[test]
fn umask_is_plausible() {
    let umask = read_umask();
    assert!(umask <= 0o777);
}

#[test]
fn desired_mode_defaults_follow_the_umask() {
    let perms = FilePerms::default().resolve().unwrap();
    let umask = read_umask();
    assert_eq!(perms.desired_mode(None, false), Some(0o666 & !umask));
    assert_eq!(perms.desired_mode(None, true), Some(0o777 & !umask));
    // Existing files without a requested mode are left alone.
    assert_eq!(perms.desired_mode(Some(0o600), false), None);
}

#[test]
fn desired_mode_with_explicit_bits() {
    let perms = FilePerms {
        mode: Some(Mode::Bits(0o640)),
        ..FilePerms::default()
    }
    .resolve()
    .unwrap();
    assert_eq!(perms.desired_mode(None, false), Some(0o640));
    assert_eq!(perms.desired_mode(Some(0o644), false), Some(0o640));
    assert_eq!(perms.desired_mode(Some(0o640), false), None);
}

#[test]
fn desired_mode_with_symbolic_string() {
    let perms = FilePerms {
        mode: Some(Mode::Symbolic("u=rwX,g=rX,o=rX".to_string())),
        ..FilePerms::default()
    }
    .resolve()
    .unwrap();
    assert_eq!(perms.desired_mode(Some(0o644), false), None);
    assert_eq!(perms.desired_mode(Some(0o644), true), Some(0o755));
}

#[test]
fn bad_symbolic_mode_is_rejected_at_resolve_time() {
    let perms = FilePerms {
        mode: Some(Mode::Symbolic("q=z".to_string())),
        ..FilePerms::default()
    };
    assert!(perms.resolve().is_err());
}

#[test]
fn mode_serde_accepts_numbers_and_strings() {
    let bits: Mode = serde_json::from_str("416").unwrap();
    assert_eq!(bits, Mode::Bits(416));
    let text: Mode = serde_json::from_str("\"u+rw\"").unwrap();
    assert_eq!(text, Mode::Symbolic("u+rw".to_string()));
}

#[test]
fn probe_missing_path_is_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(PathInfo::probe(&dir.path().join("nope"), true)
        .unwrap()
        .is_none());
}

#[test]
fn probe_follows_symlinks_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("target");
    std::fs::write(&target, b"x").unwrap();
    let link = dir.path().join("link");
    std::os::unix::fs::symlink(&target, &link).unwrap();

    let followed = PathInfo::probe(&link, true).unwrap().unwrap();
    assert!(!followed.is_symlink);
    assert!(followed.meta.is_file());

    let unfollowed = PathInfo::probe(&link, false).unwrap().unwrap();
    assert!(unfollowed.is_symlink);
}

#[test]
fn probe_dangling_symlink_follows_to_none() {
    let dir = tempfile::tempdir().unwrap();
    let link = dir.path().join("dangling");
    std::os::unix::fs::symlink(dir.path().join("nope"), &link).unwrap();

    assert!(PathInfo::probe(&link, true).unwrap().is_none());
    assert!(PathInfo::probe(&link, false).unwrap().is_some());
}

#[test]
fn atomic_write_replaces_content_and_sets_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    std::fs::write(&path, b"old").unwrap();

    let perms = FilePerms {
        mode: Some(Mode::Bits(0o640)),
        ..FilePerms::default()
    }
    .resolve()
    .unwrap();
    let mut meta = ActionMeta::default();
    write_file_atomically(&path, b"new", &perms, &mut meta).unwrap();

    assert_eq!(std::fs::read(&path).unwrap(), b"new");
    assert_eq!(crate::test_support::mode_of(&path), 0o640);
    assert_eq!(
        meta.result.state,
        gw_core::result::ResultState::Changed
    );
}

#[test]
fn atomic_write_creates_missing_parents() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a/b/conf");
    let perms = FilePerms::default().resolve().unwrap();
    let mut meta = ActionMeta::default();
    write_file_atomically(&path, b"data", &perms, &mut meta).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"data");
}

#[test]
fn create_if_missing_is_exclusive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("once");
    let perms = FilePerms {
        mode: Some(Mode::Bits(0o600)),
        ..FilePerms::default()
    }
    .resolve()
    .unwrap();

    let mut meta = ActionMeta::default();
    assert!(create_file_if_missing(&path, b"seed", &perms, &mut meta).unwrap());
    assert_eq!(std::fs::read(&path).unwrap(), b"seed");

    let mut meta = ActionMeta::default();
    assert!(!create_file_if_missing(&path, b"other", &perms, &mut meta).unwrap());
    assert_eq!(std::fs::read(&path).unwrap(), b"seed");
    assert_eq!(meta.result.state, gw_core::result::ResultState::None);
}

#[test]
fn sha1_helpers_agree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data");
    std::fs::write(&path, b"test content").unwrap();
    assert_eq!(file_sha1(&path).unwrap(), sha1_hex(b"test content"));
}
