// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::common::{read_umask, Mode};
use crate::test_support::{mode_of, run, run_ok};
use gw_core::result::ResultState;

fn with_mode(mut action: File, mode: u32) -> File {
    action.perms.mode = Some(Mode::Bits(mode));
    action
}

#[test]
fn touch_creates_with_requested_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testfile");

    let mut action = with_mode(File::new(&path, FileState::Touch), 0o640);
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert_eq!(mode_of(&path), 0o640);

    // Second run: nothing to do.
    let mut action = with_mode(File::new(&path, FileState::Touch), 0o640);
    assert_eq!(run_ok(&mut action), ResultState::Noop);
}

#[test]
fn touch_adjusts_existing_permissions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testfile");
    std::fs::write(&path, b"").unwrap();
    std::fs::set_permissions(&path, std::os::unix::fs::PermissionsExt::from_mode(0o666)).unwrap();

    let mut action = with_mode(File::new(&path, FileState::Touch), 0o640);
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert_eq!(mode_of(&path), 0o640);
}

#[test]
fn touch_without_mode_uses_the_umask() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testfile");

    let mut action = File::new(&path, FileState::Touch);
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert_eq!(mode_of(&path), 0o666 & !read_umask());
}

#[test]
fn file_state_ignores_missing_paths() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testfile");

    let mut action = with_mode(File::new(&path, FileState::File), 0o640);
    assert_eq!(run_ok(&mut action), ResultState::Noop);
    assert!(!path.exists());
}

#[test]
fn file_state_fixes_existing_permissions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testfile");
    std::fs::write(&path, b"").unwrap();
    std::fs::set_permissions(&path, std::os::unix::fs::PermissionsExt::from_mode(0o666)).unwrap();

    let mut action = with_mode(File::new(&path, FileState::File), 0o640);
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert_eq!(mode_of(&path), 0o640);
}

#[test]
fn absent_removes_files_and_trees() {
    let dir = tempfile::tempdir().unwrap();

    // Missing path: nothing to do.
    let mut action = File::new(dir.path().join("missing"), FileState::Absent);
    assert_eq!(run_ok(&mut action), ResultState::Noop);

    let file = dir.path().join("testfile");
    std::fs::write(&file, b"").unwrap();
    let mut action = File::new(&file, FileState::Absent);
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert!(!file.exists());

    let tree = dir.path().join("testdir");
    std::fs::create_dir(&tree).unwrap();
    std::fs::write(tree.join("inner"), b"").unwrap();
    let mut action = File::new(&tree, FileState::Absent);
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert!(!tree.exists());
}

#[test]
fn directory_creates_recursively_with_mode() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testdir1/testdir2");

    let mut action = with_mode(File::new(&path, FileState::Directory), 0o750);
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert_eq!(mode_of(&path), 0o750);
    assert_eq!(mode_of(path.parent().unwrap()), 0o750);

    let mut action = with_mode(File::new(&path, FileState::Directory), 0o750);
    assert_eq!(run_ok(&mut action), ResultState::Noop);
}

#[test]
fn directory_fixes_mode_of_existing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testdir");
    std::fs::create_dir(&path).unwrap();
    std::fs::set_permissions(&path, std::os::unix::fs::PermissionsExt::from_mode(0o700)).unwrap();

    let mut action = with_mode(File::new(&path, FileState::Directory), 0o750);
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert_eq!(mode_of(&path), 0o750);
}

#[test]
fn directory_over_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let clash = dir.path().join("testdir1");
    std::fs::write(&clash, b"").unwrap();

    let mut action = File::new(&clash, FileState::Directory);
    assert_eq!(run(&mut action), ResultState::Failed);
}

#[test]
fn check_mode_reports_without_touching() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("testfile");

    let mut action = with_mode(File::new(&path, FileState::Touch), 0o640);
    action.meta.check = true;
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert!(!path.exists());

    // Existing file with wrong mode: change intent reported, mode untouched.
    std::fs::write(&path, b"").unwrap();
    std::fs::set_permissions(&path, std::os::unix::fs::PermissionsExt::from_mode(0o666)).unwrap();
    let mut action = with_mode(File::new(&path, FileState::Touch), 0o640);
    action.meta.check = true;
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert_eq!(mode_of(&path), 0o666);
}

#[test]
fn empty_path_is_rejected_up_front() {
    use gw_core::action::ActionData;
    let action = File::new("", FileState::Touch);
    assert!(action.validate().is_err());
}
