// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::role::{Role, RoleContext};
use crate::RoleError;
use gw_actions::{Fail, Noop};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct OneTask;

impl Role for OneTask {
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        ctx.task(Noop::default()).finish()?;
        Ok(())
    }
}

struct Breaks;

impl Role for Breaks {
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError> {
        ctx.task(Fail::new("x")).finish()?;
        Ok(())
    }

    fn end(&mut self, _ctx: &mut RoleContext) -> Result<(), RoleError> {
        // A failed action is a recorded result, not a driver error; the
        // role decides whether that fails the host.
        Err(RoleError::Message("provisioning failed".to_string()))
    }
}

struct CountingPlaybook {
    hosts: Vec<Host>,
    started: Arc<AtomicUsize>,
    breaks_on: Option<String>,
}

impl Playbook for CountingPlaybook {
    fn hosts(&self) -> Vec<Host> {
        self.hosts.clone()
    }

    fn start(&self, host: &Host, runner: &mut Runner) -> Result<(), RunnerError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if self.breaks_on.as_deref() == Some(host.name.as_str()) {
            runner.add_role("breaks", Breaks)?;
        } else {
            runner.add_role("one-task", OneTask)?;
        }
        Ok(())
    }
}

#[test]
fn every_host_gets_its_own_driver() {
    let started = Arc::new(AtomicUsize::new(0));
    let playbook = CountingPlaybook {
        hosts: vec![Host::local("alpha"), Host::local("beta"), Host::local("gamma")],
        started: Arc::clone(&started),
        breaks_on: None,
    };
    run(&playbook, &PlaybookArgs::default()).unwrap();
    assert_eq!(started.load(Ordering::SeqCst), 3);
}

#[test]
fn one_broken_host_does_not_stop_the_others() {
    let started = Arc::new(AtomicUsize::new(0));
    let playbook = CountingPlaybook {
        hosts: vec![Host::local("good"), Host::local("bad")],
        started: Arc::clone(&started),
        breaks_on: Some("bad".to_string()),
    };
    let failed = run(&playbook, &PlaybookArgs::default()).unwrap_err();
    assert_eq!(failed, 1);
    assert_eq!(started.load(Ordering::SeqCst), 2);
}

#[test]
fn no_hosts_is_a_clean_run() {
    let playbook = CountingPlaybook {
        hosts: Vec::new(),
        started: Arc::new(AtomicUsize::new(0)),
        breaks_on: None,
    };
    run(&playbook, &PlaybookArgs::default()).unwrap();
}
