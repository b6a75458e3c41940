// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Roles: stateful producers of actions for one host.
//!
//! A role implements [`Role`] and emits tasks through the engine-owned
//! [`RoleContext`], which tracks pending actions, scoped `when`/`notify`
//! defaults, and the template variables merged in from received facts.

use crate::error::RoleError;
use crate::template::{FilesystemEngine, TemplateEngine, TemplateVars, ZipEngine};
use gw_core::action::{Action, ActionData, BoxAction};
use gw_core::asset::FileAsset;
use gw_core::pipeline::PipelineInfo;
use gw_core::result::ResultState;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Reference to an enqueued task, usable in later `when` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRef {
    pub uuid: Uuid,
}

/// A handler role referenced by `notify`.
///
/// Handlers are instantiated lazily, once per host, when the first
/// notifying action reports CHANGED; their `start` is the recovery task set.
#[derive(Clone, Copy)]
pub struct HandlerSpec {
    pub name: &'static str,
    pub(crate) build: fn() -> Box<dyn Role>,
}

impl PartialEq for HandlerSpec {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSpec")
            .field("name", &self.name)
            .finish()
    }
}

/// Handler spec for a role type constructible with `Default`.
pub fn handler<R: Role + Default + 'static>() -> HandlerSpec {
    HandlerSpec {
        name: std::any::type_name::<R>(),
        build: || Box::new(R::default()),
    }
}

/// A collection of related actions performing one provisioning macro-task.
pub trait Role: Send {
    /// Producer callback, invoked once per host: enqueue the initial tasks.
    fn start(&mut self, ctx: &mut RoleContext) -> Result<(), RoleError>;

    /// Type tags of the Facts this role needs before
    /// [`Role::all_facts_available`] fires.
    fn wanted_facts(&self) -> &'static [&'static str] {
        &[]
    }

    /// Called for every Facts action that returns successfully; its fields
    /// are already merged into the context variables.
    fn facts_available(
        &mut self,
        _ctx: &mut RoleContext,
        _facts: &dyn Action,
    ) -> Result<(), RoleError> {
        Ok(())
    }

    /// Called once every declared fact type has been received.
    fn all_facts_available(&mut self, _ctx: &mut RoleContext) -> Result<(), RoleError> {
        Ok(())
    }

    /// Cleanup hook, called when the role has no more tasks in flight.
    /// No further tasks may be emitted from here.
    fn end(&mut self, _ctx: &mut RoleContext) -> Result<(), RoleError> {
        Ok(())
    }
}

/// Continuation attached to a task, invoked with the returned action.
pub(crate) type ThenFn =
    Box<dyn FnOnce(&dyn Action, &mut RoleContext) -> Result<(), RoleError> + Send>;

/// A task queued by a role, waiting to be shipped by the Runner.
pub(crate) struct Outbound {
    pub action: BoxAction,
    pub info: PipelineInfo,
    pub name: Option<String>,
    pub notify: Vec<HandlerSpec>,
    pub then: Vec<ThenFn>,
}

/// Pipeline control requests forwarded to the transport by the Runner.
pub(crate) enum ControlRequest {
    ClearFailed(String),
    ClosePipeline(String),
}

/// Where a role's assets and templates live.
#[derive(Debug, Clone)]
pub struct RoleAssets {
    pub root: PathBuf,
    pub zip: Option<PathBuf>,
}

impl RoleAssets {
    /// Conventional location: `roles/<name>/`.
    pub fn for_role(name: &str) -> Self {
        Self {
            root: PathBuf::from("roles").join(name),
            zip: None,
        }
    }

    /// Assets bundled inside a zip archive.
    pub fn in_zip(archive: impl Into<PathBuf>, root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            zip: Some(archive.into()),
        }
    }
}

/// Per-role runtime owned by the engine.
pub struct RoleContext {
    id: Uuid,
    name: String,
    assets: RoleAssets,
    engine: Box<dyn TemplateEngine>,
    vars: TemplateVars,
    pending: HashSet<Uuid>,
    when_stack: Vec<BTreeMap<Uuid, Vec<ResultState>>>,
    notify_stack: Vec<Vec<HandlerSpec>>,
    outbox: VecDeque<Outbound>,
    control: VecDeque<ControlRequest>,
}

impl RoleContext {
    pub(crate) fn new(name: impl Into<String>, assets: RoleAssets) -> Self {
        let engine: Box<dyn TemplateEngine> = match &assets.zip {
            Some(archive) => Box::new(ZipEngine::new(
                archive.clone(),
                assets.root.to_string_lossy().into_owned(),
            )),
            None => Box::new(FilesystemEngine::new([assets.root.clone()])),
        };
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            assets,
            engine,
            vars: TemplateVars::new(),
            pending: HashSet::new(),
            when_stack: Vec::new(),
            notify_stack: Vec::new(),
            outbox: VecDeque::new(),
            control: VecDeque::new(),
        }
    }

    /// Stable role id; used as the default pipeline id for its tasks.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start building a task around `action`; call `finish` to enqueue it.
    pub fn task<A: ActionData>(&mut self, action: A) -> TaskBuilder<'_> {
        TaskBuilder {
            ctx: self,
            action: Box::new(action),
            name: None,
            notify: Vec::new(),
            when: BTreeMap::new(),
            then: Vec::new(),
        }
    }

    /// Apply extra `when` rules to every task added inside `f`.
    /// Nested scopes merge rather than replace.
    pub fn with_when<T, F>(
        &mut self,
        when: impl IntoIterator<Item = (TaskRef, Vec<ResultState>)>,
        f: F,
    ) -> Result<T, RoleError>
    where
        F: FnOnce(&mut Self) -> Result<T, RoleError>,
    {
        let scope: BTreeMap<Uuid, Vec<ResultState>> = when
            .into_iter()
            .map(|(task, states)| (task.uuid, states))
            .collect();
        self.when_stack.push(scope);
        let outcome = f(self);
        self.when_stack.pop();
        outcome
    }

    /// Apply extra `notify` targets to every task added inside `f`.
    pub fn with_notify<T, F>(
        &mut self,
        notify: impl IntoIterator<Item = HandlerSpec>,
        f: F,
    ) -> Result<T, RoleError>
    where
        F: FnOnce(&mut Self) -> Result<T, RoleError>,
    {
        self.notify_stack.push(notify.into_iter().collect());
        let outcome = f(self);
        self.notify_stack.pop();
        outcome
    }

    /// Template variables, as merged from facts and role setup.
    pub fn vars(&self) -> &TemplateVars {
        &self.vars
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.vars.insert(key.into(), value);
    }

    /// Render a template string against the role variables plus `extra`.
    pub fn render_string(
        &self,
        template: &str,
        extra: &TemplateVars,
    ) -> Result<String, RoleError> {
        Ok(self.engine.render_string(template, &self.merged(extra))?)
    }

    /// Render a template file from the role's asset root.
    pub fn render_file(&self, path: &str, extra: &TemplateVars) -> Result<String, RoleError> {
        Ok(self.engine.render_file(path, &self.merged(extra))?)
    }

    fn merged(&self, extra: &TemplateVars) -> TemplateVars {
        let mut ctx = self.vars.clone();
        for (key, value) in extra {
            ctx.insert(key.clone(), value.clone());
        }
        ctx
    }

    /// Asset handle for a file under the role's asset root.
    pub fn lookup_file(&self, path: &str) -> FileAsset {
        match &self.assets.zip {
            Some(archive) => FileAsset::zip(
                archive.clone(),
                self.assets.root.join(path).to_string_lossy().into_owned(),
            ),
            None => FileAsset::local(self.assets.root.join(path)),
        }
    }

    /// Resume this role's pipeline after a failure it has decided to
    /// recover from.
    pub fn clear_failed(&mut self) {
        self.control
            .push_back(ControlRequest::ClearFailed(self.id.to_string()));
    }

    /// Discard the transport-side state of this role's pipeline.
    pub fn close_pipeline(&mut self) {
        self.control
            .push_back(ControlRequest::ClosePipeline(self.id.to_string()));
    }

    fn effective_when(
        &self,
        task_when: BTreeMap<Uuid, Vec<ResultState>>,
    ) -> BTreeMap<Uuid, Vec<ResultState>> {
        let mut merged = BTreeMap::new();
        for scope in &self.when_stack {
            for (uuid, states) in scope {
                merged.insert(*uuid, states.clone());
            }
        }
        merged.extend(task_when);
        merged
    }

    fn effective_notify(&self, task_notify: Vec<HandlerSpec>) -> Vec<HandlerSpec> {
        let mut merged: Vec<HandlerSpec> = Vec::new();
        for scope in &self.notify_stack {
            for spec in scope {
                if !merged.contains(spec) {
                    merged.push(*spec);
                }
            }
        }
        for spec in task_notify {
            if !merged.contains(&spec) {
                merged.push(spec);
            }
        }
        merged
    }

    pub(crate) fn take_outbound(&mut self) -> Option<Outbound> {
        self.outbox.pop_front()
    }

    pub(crate) fn take_control(&mut self) -> Option<ControlRequest> {
        self.control.pop_front()
    }

    pub(crate) fn pending_remove(&mut self, uuid: Uuid) {
        self.pending.remove(&uuid);
    }

    pub(crate) fn pending_is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub(crate) fn outbox_is_empty(&self) -> bool {
        self.outbox.is_empty()
    }

    /// Enqueue an already-boxed action with no extras (engine internal).
    pub(crate) fn push_raw(&mut self, action: BoxAction) {
        self.pending.insert(action.meta().uuid);
        let info = PipelineInfo::new(self.id.to_string());
        self.outbox.push_back(Outbound {
            action,
            info,
            name: None,
            notify: Vec::new(),
            then: Vec::new(),
        });
    }
}

/// Builder attaching a name, conditions, notifications and continuations to
/// a task before it is enqueued.
pub struct TaskBuilder<'a> {
    ctx: &'a mut RoleContext,
    action: BoxAction,
    name: Option<String>,
    notify: Vec<HandlerSpec>,
    when: BTreeMap<Uuid, Vec<ResultState>>,
    then: Vec<ThenFn>,
}

impl TaskBuilder<'_> {
    /// Display name for progress output.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Notify a handler role if this action reports CHANGED.
    pub fn notify(mut self, spec: HandlerSpec) -> Self {
        self.notify.push(spec);
        self
    }

    /// Run only if `prior` completed in one of the given states.
    pub fn when<I>(mut self, prior: TaskRef, states: I) -> Self
    where
        I: IntoIterator<Item = ResultState>,
    {
        self.when.insert(prior.uuid, states.into_iter().collect());
        self
    }

    /// Invoke `f` with the returned action when it completes successfully.
    pub fn then<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&dyn Action, &mut RoleContext) -> Result<(), RoleError> + Send + 'static,
    {
        self.then.push(Box::new(f));
        self
    }

    /// Validate the action and enqueue it, merging in the contextual
    /// `when`/`notify` defaults. Invalid actions are rejected here and
    /// never enqueued.
    pub fn finish(self) -> Result<TaskRef, RoleError> {
        if let Err(source) = self.action.validate() {
            return Err(RoleError::InvalidAction {
                summary: self.action.summary(),
                source,
            });
        }

        let uuid = self.action.meta().uuid;
        let mut info = PipelineInfo::new(self.ctx.id.to_string());
        info.when = self.ctx.effective_when(self.when);
        let notify = self.ctx.effective_notify(self.notify);

        self.ctx.pending.insert(uuid);
        self.ctx.outbox.push_back(Outbound {
            action: self.action,
            info,
            name: self.name,
            notify,
            then: self.then,
        });
        Ok(TaskRef { uuid })
    }
}

#[cfg(test)]
#[path = "role_tests.rs"]
mod tests;
