// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::run_ok;
use gw_core::action::{Action, ActionData};
use gw_core::result::ResultState;

#[test]
fn facts_probe_and_stay_noop() {
    let mut action = Platform::default();
    assert_eq!(run_ok(&mut action), ResultState::Noop);

    // uname is everywhere this engine runs.
    assert!(action.system.is_some());
    assert!(action.kernel.is_some());
    assert!(action.machine.is_some());
    assert!(action.nodename.is_some());
    assert_eq!(action.hostname.is_some(), action.nodename.is_some());
    assert!(matches!(
        action.userspace_bits.as_deref(),
        Some("32") | Some("64")
    ));
}

#[test]
fn x86_64_architecture_is_normalised() {
    let mut action = Platform::default();
    run_ok(&mut action);
    if action.machine.as_deref() == Some("x86_64") {
        assert_eq!(action.architecture.as_deref(), Some("x86_64"));
        assert!(action.userspace_architecture.is_some());
    } else {
        assert_eq!(action.architecture, action.machine);
    }
}

#[test]
fn platform_is_flagged_as_facts() {
    assert!(Platform::IS_FACTS);
    let boxed: Box<dyn Action> = Box::new(Platform::default());
    assert!(boxed.is_facts());
}

#[test]
fn fields_serialise_flat_for_role_merging() {
    let mut action = Platform::default();
    run_ok(&mut action);
    let value = serde_json::to_value(&action).unwrap();
    assert!(value.get("system").is_some());
    assert!(value.get("uuid").is_some());
}
