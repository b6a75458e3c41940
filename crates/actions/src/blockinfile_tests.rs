// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{run, run_ok};
use gw_core::action::ActionData;
use gw_core::result::ResultState;
use similar_asserts::assert_eq;

const BEGIN: &str = "# BEGIN MANAGED BLOCK";
const END: &str = "# END MANAGED BLOCK";

fn write_lines(path: &std::path::Path, lines: &[&str]) {
    let mut text = lines.join("\n");
    if !text.is_empty() {
        text.push('\n');
    }
    std::fs::write(path, text).unwrap();
}

fn read_lines(path: &std::path::Path) -> Vec<String> {
    String::from_utf8(std::fs::read(path).unwrap())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn edit(path: &std::path::Path, configure: impl FnOnce(&mut BlockInFile)) -> ResultState {
    let mut action = BlockInFile::new(path, "");
    configure(&mut action);
    run_ok(&mut action)
}

#[test]
fn missing_file_without_create_is_noop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    let state = edit(&path, |a| a.block = "test".to_string());
    assert_eq!(state, ResultState::Noop);
    assert!(!path.exists());
}

#[test]
fn create_on_empty_writes_exactly_the_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    let state = edit(&path, |a| {
        a.block = "test".to_string();
        a.create = true;
    });
    assert_eq!(state, ResultState::Changed);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        format!("{BEGIN}\ntest\n{END}\n")
    );
}

#[test]
fn replaces_the_existing_block() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    write_lines(&path, &[BEGIN, "line1", END]);

    let state = edit(&path, |a| a.block = "a\nb".to_string());
    assert_eq!(state, ResultState::Changed);
    assert_eq!(read_lines(&path), vec![BEGIN, "a", "b", END]);

    // Identical content on rerun: nothing to do.
    let state = edit(&path, |a| a.block = "a\nb".to_string());
    assert_eq!(state, ResultState::Noop);
}

#[test]
fn the_last_marker_pair_wins() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    write_lines(
        &path,
        &[BEGIN, "first", END, "middle", BEGIN, "second", END, "tail"],
    );

    let state = edit(&path, |a| a.block = "replaced".to_string());
    assert_eq!(state, ResultState::Changed);
    assert_eq!(
        read_lines(&path),
        vec![BEGIN, "first", END, "middle", BEGIN, "replaced", END, "tail"]
    );
}

#[test]
fn a_lone_begin_marker_spans_to_eof() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    write_lines(&path, &["keep", BEGIN, "old1", "old2"]);

    let state = edit(&path, |a| a.block = "new".to_string());
    assert_eq!(state, ResultState::Changed);
    assert_eq!(read_lines(&path), vec!["keep", BEGIN, "new", END]);
}

#[test]
fn repeated_begin_markers_collapse_to_the_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    write_lines(&path, &["keep", BEGIN, "x", BEGIN, "y", END, "tail"]);

    let state = edit(&path, |a| a.block = "new".to_string());
    assert_eq!(state, ResultState::Changed);
    assert_eq!(read_lines(&path), vec!["keep", BEGIN, "new", END, "tail"]);
}

#[test]
fn inserts_at_eof_when_no_block_exists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    write_lines(&path, &["line0", "line1"]);

    let state = edit(&path, |a| a.block = "test".to_string());
    assert_eq!(state, ResultState::Changed);
    assert_eq!(
        read_lines(&path),
        vec!["line0", "line1", BEGIN, "test", END]
    );
}

#[yare::parameterized(
    bof = { Some("BOF"), None, &["# BEGIN MANAGED BLOCK", "test", "# END MANAGED BLOCK", "line0", "line1", "line2"] },
    before_middle = { Some("line1"), None, &["line0", "# BEGIN MANAGED BLOCK", "test", "# END MANAGED BLOCK", "line1", "line2"] },
    after_first = { None, Some("line0"), &["line0", "# BEGIN MANAGED BLOCK", "test", "# END MANAGED BLOCK", "line1", "line2"] },
    after_last = { None, Some("line2"), &["line0", "line1", "line2", "# BEGIN MANAGED BLOCK", "test", "# END MANAGED BLOCK"] },
    after_eof = { None, Some("EOF"), &["line0", "line1", "line2", "# BEGIN MANAGED BLOCK", "test", "# END MANAGED BLOCK"] },
)]
fn insert_positions(
    insertbefore: Option<&str>,
    insertafter: Option<&str>,
    expected: &[&str],
) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    write_lines(&path, &["line0", "line1", "line2"]);

    let state = edit(&path, |a| {
        a.block = "test".to_string();
        a.insertbefore = insertbefore.map(str::to_string);
        a.insertafter = insertafter.map(str::to_string);
    });
    similar_asserts::assert_eq!(state, ResultState::Changed);
    similar_asserts::assert_eq!(read_lines(&path), expected);
}

#[test]
fn the_last_anchor_match_is_used() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    write_lines(&path, &["entry", "other", "entry"]);

    let state = edit(&path, |a| {
        a.block = "test".to_string();
        a.insertafter = Some("^entry".to_string());
    });
    assert_eq!(state, ResultState::Changed);
    assert_eq!(
        read_lines(&path),
        vec!["entry", "other", "entry", BEGIN, "test", END]
    );
}

#[test]
fn empty_block_removes_the_markers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    write_lines(&path, &["keep", BEGIN, "body", END, "tail"]);

    let state = edit(&path, |a| a.block = String::new());
    assert_eq!(state, ResultState::Changed);
    assert_eq!(read_lines(&path), vec!["keep", "tail"]);

    // No block left: nothing to remove.
    let state = edit(&path, |a| a.block = String::new());
    assert_eq!(state, ResultState::Noop);
}

#[test]
fn custom_markers_are_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    write_lines(&path, &["; begin x", "old", "; end x"]);

    let mut action = BlockInFile::new(&path, "new");
    action.marker = "; {mark} x".to_string();
    action.marker_begin = "begin".to_string();
    action.marker_end = "end".to_string();
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert_eq!(read_lines(&path), vec!["; begin x", "new", "; end x"]);
}

#[test]
fn check_mode_leaves_the_file_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("conf");
    write_lines(&path, &["line0"]);

    let mut action = BlockInFile::new(&path, "test");
    action.meta.check = true;
    assert_eq!(run_ok(&mut action), ResultState::Changed);
    assert_eq!(read_lines(&path), vec!["line0"]);
}

#[test]
fn conflicting_anchors_are_rejected() {
    let mut action = BlockInFile::new("/tmp/x", "test");
    action.insertbefore = Some("a".to_string());
    action.insertafter = Some("b".to_string());
    assert!(action.validate().is_err());
}

#[test]
fn empty_block_with_state_present_is_rejected() {
    let mut action = BlockInFile::new("/tmp/x", "");
    action.state = Some(BlockState::Present);
    assert!(action.validate().is_err());
    assert_eq!(run(&mut action), ResultState::Failed);
}
