// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{run, run_ok};
use gw_core::action::ActionData;
use gw_core::result::ResultState;

#[test]
fn argv_commands_run_and_capture_output() {
    let mut action = Command::new(["echo", "hi"]);
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert_eq!(action.stdout.as_deref(), Some(b"hi\n".as_slice()));
    assert_eq!(action.meta.result.command_log.len(), 1);
}

#[test]
fn shell_commands_go_through_sh() {
    let mut action = Command::shell("echo $((6 * 7))");
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert_eq!(action.stdout.as_deref(), Some(b"42\n".as_slice()));
}

#[test]
fn failing_command_fails_the_action() {
    let mut action = Command::new(["false"]);
    assert_eq!(run(&mut action), ResultState::Failed);
}

#[test]
fn creates_glob_short_circuits() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("done.stamp"), b"").unwrap();

    let mut action = Command::new(["false"]);
    action.chdir = Some(dir.path().to_path_buf());
    action.creates = Some("*.stamp".to_string());
    // The command is never run, so its failure cannot matter.
    assert_eq!(run_ok(&mut action), ResultState::Noop);
    assert!(action.stdout.is_none());
}

#[test]
fn removes_glob_short_circuits_when_nothing_matches() {
    let dir = tempfile::tempdir().unwrap();

    let mut action = Command::new(["false"]);
    action.chdir = Some(dir.path().to_path_buf());
    action.removes = Some("*.pid".to_string());
    assert_eq!(run_ok(&mut action), ResultState::Noop);
}

#[test]
fn removes_glob_runs_when_matching() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("daemon.pid"), b"").unwrap();

    let mut action = Command::new(["true"]);
    action.chdir = Some(dir.path().to_path_buf());
    action.removes = Some("*.pid".to_string());
    assert_eq!(run_ok(&mut action), ResultState::Changed);
}

#[test]
fn stdin_is_fed_with_a_trailing_newline() {
    let mut action = Command::new(["cat"]);
    action.stdin = Some("line".to_string());
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert_eq!(action.stdout.as_deref(), Some(b"line\n".as_slice()));

    let mut action = Command::new(["cat"]);
    action.stdin = Some("line".to_string());
    action.stdin_add_newline = false;
    run_ok(&mut action);
    assert_eq!(action.stdout.as_deref(), Some(b"line".as_slice()));
}

#[test]
fn chdir_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let mut action = Command::new(["pwd"]);
    action.chdir = Some(dir.path().to_path_buf());
    run_ok(&mut action);
    let reported = String::from_utf8(action.stdout.unwrap()).unwrap();
    assert_eq!(
        std::fs::canonicalize(reported.trim()).unwrap(),
        std::fs::canonicalize(dir.path()).unwrap()
    );
}

#[test]
fn check_mode_reports_changed_without_running() {
    let mut action = Command::new(["false"]);
    action.meta.check = true;
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert!(action.meta.result.command_log.is_empty());
}

#[test]
fn argv_and_cmd_are_mutually_exclusive() {
    let mut action = Command::new(["echo"]);
    action.cmd = Some("echo".to_string());
    assert!(action.validate().is_err());

    let neither = Command::new(Vec::<String>::new());
    assert!(neither.validate().is_err());
}
