// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::role::{handler, Role, RoleContext, TaskRef};
use gw_actions::{Fail, Noop, Platform};
use gw_core::action::{ActionData, ActionMeta, Execution};
use gw_core::error::ActionError;
use gw_core::result::ResultState;
use gw_system::Local;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn runner() -> Runner {
    Runner::new(Box::new(Local::new()))
}

/// Record of states observed by a role's continuations.
type Seen = Arc<Mutex<Vec<ResultState>>>;

struct Emitter {
    changed: Vec<bool>,
    seen: Seen,
}

impl Role for Emitter {
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        for changed in self.changed.clone() {
            let seen = Arc::clone(&self.seen);
            ctx.task(Noop {
                changed,
                ..Noop::default()
            })
            .then(move |action, _ctx| {
                if let Ok(mut log) = seen.lock() {
                    log.push(action.meta().result.state);
                }
                Ok(())
            })
            .finish()?;
        }
        Ok(())
    }
}

#[test]
fn runs_all_tasks_and_invokes_continuations() {
    let seen: Seen = Seen::default();
    let mut runner = runner();
    runner
        .add_role(
            "emitter",
            Emitter {
                changed: vec![false, true, false],
                seen: Arc::clone(&seen),
            },
        )
        .unwrap();
    runner.main().unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![ResultState::Noop, ResultState::Changed, ResultState::Noop]
    );
}

struct ChainRole {
    seen: Seen,
}

impl Role for ChainRole {
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        let seen = Arc::clone(&self.seen);
        ctx.task(Noop {
            changed: true,
            ..Noop::default()
        })
        .then(move |_action, ctx| {
            // Continuations may enqueue more tasks.
            let seen = Arc::clone(&seen);
            ctx.task(Noop::default())
                .then(move |action, _ctx| {
                    if let Ok(mut log) = seen.lock() {
                        log.push(action.meta().result.state);
                    }
                    Ok(())
                })
                .finish()?;
            Ok(())
        })
        .finish()?;
        Ok(())
    }
}

#[test]
fn continuations_can_enqueue_more_tasks() {
    let seen: Seen = Seen::default();
    let mut runner = runner();
    runner
        .add_role(
            "chain",
            ChainRole {
                seen: Arc::clone(&seen),
            },
        )
        .unwrap();
    runner.main().unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![ResultState::Noop]);
}

struct GatedRole {
    seen: Seen,
}

impl Role for GatedRole {
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        let quiet: TaskRef = ctx.task(Noop::default()).finish()?;
        let noisy = ctx
            .task(Noop {
                changed: true,
                ..Noop::default()
            })
            .finish()?;

        for (prior, wanted) in [(quiet, ResultState::Changed), (noisy, ResultState::Changed)] {
            let seen = Arc::clone(&self.seen);
            ctx.task(Noop {
                changed: true,
                ..Noop::default()
            })
            .when(prior, [wanted])
            .then(move |action, _ctx| {
                if let Ok(mut log) = seen.lock() {
                    log.push(action.meta().result.state);
                }
                Ok(())
            })
            .finish()?;
        }
        Ok(())
    }
}

#[test]
fn when_gates_follow_recorded_states() {
    let seen: Seen = Seen::default();
    let mut runner = runner();
    runner
        .add_role(
            "gated",
            GatedRole {
                seen: Arc::clone(&seen),
            },
        )
        .unwrap();
    runner.main().unwrap();

    // The first gate is unmet (its prior ran as NOOP) so that task is
    // skipped; continuations still see the skipped result.
    assert_eq!(
        *seen.lock().unwrap(),
        vec![ResultState::Skipped, ResultState::Changed]
    );
}

static HANDLER_RUNS: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct CountingHandler;

impl Role for CountingHandler {
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        HANDLER_RUNS.fetch_add(1, Ordering::SeqCst);
        ctx.task(Noop::default()).finish()?;
        Ok(())
    }
}

struct Notifier {
    changed: bool,
    tasks: usize,
}

impl Role for Notifier {
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        for _ in 0..self.tasks {
            ctx.task(Noop {
                changed: self.changed,
                ..Noop::default()
            })
            .notify(handler::<CountingHandler>())
            .finish()?;
        }
        Ok(())
    }
}

#[test]
fn handlers_run_once_and_only_after_changes() {
    HANDLER_RUNS.store(0, Ordering::SeqCst);

    // No change: the handler never runs.
    let mut runner_quiet = runner();
    runner_quiet
        .add_role(
            "quiet",
            Notifier {
                changed: false,
                tasks: 2,
            },
        )
        .unwrap();
    runner_quiet.main().unwrap();
    assert_eq!(HANDLER_RUNS.load(Ordering::SeqCst), 0);

    // Two notifying changes: the handler is instantiated exactly once.
    let mut runner_noisy = runner();
    runner_noisy
        .add_role(
            "noisy",
            Notifier {
                changed: true,
                tasks: 2,
            },
        )
        .unwrap();
    runner_noisy.main().unwrap();
    assert_eq!(HANDLER_RUNS.load(Ordering::SeqCst), 1);
}

struct FactsRole {
    all_available: Arc<Mutex<bool>>,
    hostname_var: Arc<Mutex<Option<serde_json::Value>>>,
}

impl Role for FactsRole {
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        ctx.task(Platform::default()).name("facts").finish()?;
        Ok(())
    }

    fn wanted_facts(&self) -> &'static [&'static str] {
        &[Platform::TAG]
    }

    fn all_facts_available(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        if let Ok(mut flag) = self.all_available.lock() {
            *flag = true;
        }
        if let Ok(mut var) = self.hostname_var.lock() {
            *var = ctx.vars().get("hostname").cloned();
        }
        Ok(())
    }
}

#[test]
fn facts_merge_into_role_vars_before_the_callback() {
    let all_available = Arc::new(Mutex::new(false));
    let hostname_var = Arc::new(Mutex::new(None));

    let mut runner = runner();
    runner
        .add_role(
            "facts",
            FactsRole {
                all_available: Arc::clone(&all_available),
                hostname_var: Arc::clone(&hostname_var),
            },
        )
        .unwrap();
    runner.main().unwrap();

    assert!(*all_available.lock().unwrap());
    // The merged variable is present (a string on any host with uname).
    assert!(hostname_var.lock().unwrap().is_some());
}

/// Facts action that always fails, for the failure-propagation path.
#[derive(Debug, Default, Serialize, Deserialize)]
struct BrokenFacts {
    #[serde(flatten)]
    meta: ActionMeta,
}

impl ActionData for BrokenFacts {
    const TAG: &'static str = "groundwork.test.BrokenFacts";
    const IS_FACTS: bool = true;

    fn meta(&self) -> &ActionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ActionMeta {
        &mut self.meta
    }

    fn summary(&self) -> String {
        "broken facts".to_string()
    }

    fn run(&mut self, _exec: &dyn Execution) -> Result<(), ActionError> {
        Err(ActionError::Message("probe failed".to_string()))
    }
}

struct NeedsFacts {
    later_states: Seen,
}

impl Role for NeedsFacts {
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        ctx.task(BrokenFacts::default()).name("probe").finish()?;
        let seen = Arc::clone(&self.later_states);
        ctx.task(Noop::default())
            .then(move |action, _ctx| {
                if let Ok(mut log) = seen.lock() {
                    log.push(action.meta().result.state);
                }
                Ok(())
            })
            .finish()?;
        Ok(())
    }
}

#[test]
fn failed_facts_stop_the_role_pipeline() {
    let later: Seen = Seen::default();
    let mut runner = runner();
    runner
        .add_role(
            "needy",
            NeedsFacts {
                later_states: Arc::clone(&later),
            },
        )
        .unwrap();
    runner.main().unwrap();

    // The follow-up task was skipped by the tripped pipeline; the Fail the
    // engine enqueued keeps the pipeline terminally stopped.
    assert_eq!(*later.lock().unwrap(), vec![ResultState::Skipped]);
}

struct Checked;

impl Role for Checked {
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        ctx.task(Noop::default())
            .then(|action, _ctx| {
                assert!(action.meta().check, "check flag must be set in check mode");
                Ok(())
            })
            .finish()?;
        Ok(())
    }
}

#[test]
fn check_mode_marks_every_shipped_action() {
    let mut runner = Runner::new(Box::new(Local::new())).with_check_mode(true);
    runner.add_role("checked", Checked).unwrap();
    runner.main().unwrap();
}

struct EndTracker {
    ended: Arc<Mutex<bool>>,
}

impl Role for EndTracker {
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        ctx.task(Noop::default()).finish()?;
        Ok(())
    }

    fn end(&mut self, _ctx: &mut RoleContext) -> Result<(), RoleError> {
        if let Ok(mut flag) = self.ended.lock() {
            *flag = true;
        }
        Ok(())
    }
}

#[test]
fn end_runs_after_the_last_result() {
    let ended = Arc::new(Mutex::new(false));
    let mut runner = runner();
    runner
        .add_role(
            "tracked",
            EndTracker {
                ended: Arc::clone(&ended),
            },
        )
        .unwrap();
    runner.main().unwrap();
    assert!(*ended.lock().unwrap());
}

struct BadConfig;

impl Role for BadConfig {
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        let mut bad = gw_actions::Copy::with_content("/tmp/x", b"".to_vec());
        bad.content = None;
        ctx.task(bad).finish()?;
        Ok(())
    }
}

#[test]
fn bad_action_configuration_surfaces_at_add_role() {
    let mut runner = runner();
    let err = runner.add_role("bad", BadConfig).unwrap_err();
    assert!(matches!(err, RunnerError::Role { .. }));
}

#[test]
fn roles_interleave_on_one_host() {
    let seen_a: Seen = Seen::default();
    let seen_b: Seen = Seen::default();
    let mut runner = runner();
    runner
        .add_role(
            "first",
            Emitter {
                changed: vec![false, false],
                seen: Arc::clone(&seen_a),
            },
        )
        .unwrap();
    runner
        .add_role(
            "second",
            Emitter {
                changed: vec![true],
                seen: Arc::clone(&seen_b),
            },
        )
        .unwrap();
    runner.main().unwrap();

    assert_eq!(seen_a.lock().unwrap().len(), 2);
    assert_eq!(*seen_b.lock().unwrap(), vec![ResultState::Changed]);
}

#[test]
fn fail_action_trips_its_pipeline() {
    let seen: Seen = Seen::default();
    struct Fails {
        seen: Seen,
    }
    impl Role for Fails {
        fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
            ctx.task(Fail::new("x")).finish()?;
            let seen = Arc::clone(&self.seen);
            ctx.task(Noop::default())
                .then(move |action, _ctx| {
                    if let Ok(mut log) = seen.lock() {
                        log.push(action.meta().result.state);
                    }
                    Ok(())
                })
                .finish()?;
            Ok(())
        }
    }

    let mut runner = runner();
    runner
        .add_role(
            "fails",
            Fails {
                seen: Arc::clone(&seen),
            },
        )
        .unwrap();
    runner.main().unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![ResultState::Skipped]);
}
