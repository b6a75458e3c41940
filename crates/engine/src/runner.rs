// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-host driver: interleaves role task emission with result
//! reception until every role has run dry.

use crate::error::{RoleError, RunnerError};
use crate::role::{ControlRequest, HandlerSpec, Outbound, Role, RoleAssets, RoleContext, ThenFn};
use gw_core::action::BoxAction;
use gw_core::result::ResultState;
use gw_system::System;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Bookkeeping for one in-flight action.
struct Ticket {
    slot: usize,
    name: Option<String>,
    notify: Vec<HandlerSpec>,
    then: Vec<ThenFn>,
}

struct RoleSlot {
    name: String,
    role: Box<dyn Role>,
    ctx: RoleContext,
    facts_received: HashSet<&'static str>,
    ended: bool,
}

/// Drives the roles of one host against its transport.
pub struct Runner {
    system: Box<dyn System>,
    check_mode: bool,
    slots: Vec<RoleSlot>,
    pending: HashMap<Uuid, Ticket>,
    notified: HashSet<&'static str>,
}

impl Runner {
    pub fn new(system: Box<dyn System>) -> Self {
        Self {
            system,
            check_mode: false,
            slots: Vec::new(),
            pending: HashMap::new(),
            notified: HashSet::new(),
        }
    }

    /// Dry-run mode: every shipped action gets its check flag set.
    pub fn with_check_mode(mut self, check: bool) -> Self {
        self.check_mode = check;
        self
    }

    pub fn system_name(&self) -> &str {
        self.system.name()
    }

    /// Instantiate a role and run its producer. Its first tasks ship on the
    /// next turn of the interleave loop.
    pub fn add_role(
        &mut self,
        name: impl Into<String>,
        role: impl Role + 'static,
    ) -> Result<(), RunnerError> {
        let name = name.into();
        let assets = RoleAssets::for_role(&name);
        self.add_role_with_assets(name, Box::new(role), assets)
    }

    /// Like [`Runner::add_role`], for roles whose assets live elsewhere.
    pub fn add_role_with_assets(
        &mut self,
        name: String,
        mut role: Box<dyn Role>,
        assets: RoleAssets,
    ) -> Result<(), RunnerError> {
        let mut ctx = RoleContext::new(&name, assets);
        role.start(&mut ctx).map_err(|source| RunnerError::Role {
            role: name.clone(),
            source,
        })?;
        self.slots.push(RoleSlot {
            name,
            role,
            ctx,
            facts_received: HashSet::new(),
            ended: false,
        });
        Ok(())
    }

    /// Run the interleave loop until all roles have ended and nothing is in
    /// flight.
    pub fn main(&mut self) -> Result<(), RunnerError> {
        loop {
            self.flush()?;
            if self.pending.is_empty() {
                break;
            }
            match self.system.receive_next() {
                Ok(Some(action)) => self.handle_result(action)?,
                Ok(None) => {
                    return Err(RunnerError::Protocol(
                        "transport ran dry with actions in flight".to_string(),
                    ))
                }
                Err(err) => {
                    self.fail_in_flight(&err);
                    return Err(err.into());
                }
            }
        }

        for index in 0..self.slots.len() {
            self.end_role(index)?;
        }
        Ok(())
    }

    /// Close the transport. Call after [`Runner::main`].
    pub fn close(&mut self) -> Result<(), RunnerError> {
        self.system.close()?;
        Ok(())
    }

    /// Ship every queued task and control request to the transport.
    fn flush(&mut self) -> Result<(), RunnerError> {
        for slot in 0..self.slots.len() {
            while let Some(request) = self.slots[slot].ctx.take_control() {
                match request {
                    ControlRequest::ClearFailed(id) => self.system.pipeline_clear_failed(&id)?,
                    ControlRequest::ClosePipeline(id) => self.system.pipeline_close(&id)?,
                }
            }
            while let Some(outbound) = self.slots[slot].ctx.take_outbound() {
                let Outbound {
                    mut action,
                    info,
                    name,
                    notify,
                    then,
                } = outbound;
                if self.check_mode {
                    action.meta_mut().check = true;
                }
                for path in action.local_files_needed() {
                    self.system.share_file(&path);
                }
                self.pending.insert(
                    action.meta().uuid,
                    Ticket {
                        slot,
                        name,
                        notify,
                        then,
                    },
                );
                self.system.send_pipelined(action, info)?;
            }
        }
        Ok(())
    }

    fn handle_result(&mut self, action: BoxAction) -> Result<(), RunnerError> {
        let uuid = action.meta().uuid;
        let Some(ticket) = self.pending.remove(&uuid) else {
            return Err(RunnerError::UnknownAction(uuid));
        };
        let slot = ticket.slot;
        self.slots[slot].ctx.pending_remove(uuid);

        let state = action.meta().result.state;
        self.log_progress(slot, &ticket, action.as_ref());

        if state == ResultState::Failed {
            if action.is_facts() {
                // A role cannot make progress without its facts; stop its
                // pipeline with a terminal failure.
                let fail = gw_actions::Fail::new(format!(
                    "{} failed, pipeline stopped",
                    ticket.name.as_deref().unwrap_or("facts gathering"),
                ));
                self.slots[slot].ctx.push_raw(Box::new(fail));
            }
        } else {
            for then in ticket.then {
                let role_name = self.slots[slot].name.clone();
                then(action.as_ref(), &mut self.slots[slot].ctx).map_err(|source| {
                    RunnerError::Role {
                        role: role_name,
                        source,
                    }
                })?;
            }
            if action.is_facts() {
                self.merge_facts(slot, action.as_ref())?;
            }
        }

        if state == ResultState::Changed {
            for spec in &ticket.notify {
                if self.notified.insert(spec.name) {
                    tracing::info!(handler = spec.name, "notifying handler role");
                    let handler = (spec.build)();
                    let display = short_type_name(spec.name).to_string();
                    let assets = RoleAssets::for_role(&display);
                    self.add_role_with_assets(display, handler, assets)?;
                }
            }
        }

        let slot_ref = &self.slots[slot];
        if !slot_ref.ended && slot_ref.ctx.pending_is_empty() && slot_ref.ctx.outbox_is_empty() {
            self.end_role(slot)?;
        }
        Ok(())
    }

    fn merge_facts(&mut self, slot: usize, action: &dyn gw_core::action::Action) -> Result<(), RunnerError> {
        let role_name = self.slots[slot].name.clone();
        let as_role_err = |source: RoleError| RunnerError::Role {
            role: role_name.clone(),
            source,
        };

        let fields = action
            .fields_value()
            .map_err(|err| as_role_err(RoleError::Serialize(err)))?;
        if let serde_json::Value::Object(fields) = fields {
            let slot_ref = &mut self.slots[slot];
            for (key, value) in fields {
                if matches!(key.as_str(), "uuid" | "check" | "result") || key.starts_with("__") {
                    continue;
                }
                slot_ref.ctx.set_var(key, value);
            }
        }

        let slot_ref = &mut self.slots[slot];
        slot_ref
            .role
            .facts_available(&mut slot_ref.ctx, action)
            .map_err(as_role_err)?;

        let tag = action.type_tag();
        if self.slots[slot].facts_received.insert(tag) {
            let slot_ref = &mut self.slots[slot];
            let wanted = slot_ref.role.wanted_facts();
            let complete = wanted.contains(&tag)
                && wanted
                    .iter()
                    .all(|needed| slot_ref.facts_received.contains(needed));
            if complete {
                slot_ref
                    .role
                    .all_facts_available(&mut slot_ref.ctx)
                    .map_err(as_role_err)?;
            }
        }
        Ok(())
    }

    fn end_role(&mut self, slot: usize) -> Result<(), RunnerError> {
        let slot_ref = &mut self.slots[slot];
        if slot_ref.ended {
            return Ok(());
        }
        slot_ref.ended = true;
        let role_name = slot_ref.name.clone();
        slot_ref
            .role
            .end(&mut slot_ref.ctx)
            .map_err(|source| RunnerError::Role {
                role: role_name,
                source,
            })
    }

    /// One line per action: state, elapsed, role, name.
    fn log_progress(&self, slot: usize, ticket: &Ticket, action: &dyn gw_core::action::Action) {
        let result = &action.meta().result;
        let elapsed = result.elapsed.unwrap_or(0) as f64 / 1e9;
        let action_label = ticket
            .name
            .clone()
            .unwrap_or_else(|| action.summary());
        tracing::info!(
            target: "progress",
            host = self.system.name(),
            "[{} {:.3}s] {} {}",
            result.state,
            elapsed,
            self.slots[slot].name,
            action_label,
        );
        if result.state == ResultState::Failed {
            tracing::error!(
                host = self.system.name(),
                role = %self.slots[slot].name,
                error = result.exc_val.as_deref().unwrap_or("unknown"),
                "action failed"
            );
            for frame in &result.exc_tb {
                tracing::debug!(host = self.system.name(), "  {}", frame);
            }
        }
        for command in &result.command_log {
            if let Some(stderr) = command.stderr.as_deref().filter(|s| !s.is_empty()) {
                tracing::debug!(
                    host = self.system.name(),
                    cmd = %command.cmdline.join(" "),
                    stderr,
                    "command output"
                );
            }
        }
    }

    /// Transport broke: everything still in flight is reported FAILED
    /// before the driver dies. Other hosts are unaffected.
    fn fail_in_flight(&mut self, err: &gw_system::error::SystemError) {
        for (uuid, ticket) in self.pending.drain() {
            tracing::error!(
                target: "progress",
                host = self.system.name(),
                role = %self.slots[ticket.slot].name,
                action = %uuid,
                name = ticket.name.as_deref().unwrap_or(""),
                error = %err,
                "[failed] transport lost with action in flight"
            );
        }
    }
}

/// Last segment of a fully-qualified type name, for display.
fn short_type_name(full: &str) -> &str {
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
