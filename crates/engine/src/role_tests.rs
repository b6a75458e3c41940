// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use gw_actions::{Copy, Noop};
use gw_core::asset::FileAsset;

#[derive(Default)]
struct Quiet;

impl Role for Quiet {
    fn start(&mut self, _ctx: &mut RoleContext) -> Result<(), RoleError> {
        Ok(())
    }
}

fn ctx() -> RoleContext {
    RoleContext::new("webserver", RoleAssets::for_role("webserver"))
}

#[test]
fn task_enqueues_with_the_role_pipeline() {
    let mut ctx = ctx();
    let task = ctx.task(Noop::default()).finish().unwrap();

    let outbound = ctx.take_outbound().unwrap();
    assert_eq!(outbound.action.meta().uuid, task.uuid);
    assert_eq!(outbound.info.id, ctx.id().to_string());
    assert!(outbound.info.when.is_empty());
    assert!(outbound.notify.is_empty());
    assert!(outbound.name.is_none());
    assert!(!ctx.pending_is_empty());
}

#[test]
fn builder_attaches_name_when_and_notify() {
    let mut ctx = ctx();
    let first = ctx.task(Noop::default()).finish().unwrap();
    let _second = ctx
        .task(Noop::default())
        .name("gated")
        .when(first, [ResultState::Changed])
        .notify(handler::<Quiet>())
        .finish()
        .unwrap();

    ctx.take_outbound().unwrap();
    let gated = ctx.take_outbound().unwrap();
    assert_eq!(gated.name.as_deref(), Some("gated"));
    assert_eq!(
        gated.info.when.get(&first.uuid),
        Some(&vec![ResultState::Changed])
    );
    assert_eq!(gated.notify.len(), 1);
}

#[test]
fn invalid_actions_are_rejected_and_not_enqueued() {
    let mut ctx = ctx();
    // A copy with neither src nor content is a configuration error.
    let mut bad = Copy::with_content("/tmp/x", b"".to_vec());
    bad.content = None;
    let err = ctx.task(bad).finish().unwrap_err();
    assert!(matches!(err, RoleError::InvalidAction { .. }));
    assert!(ctx.outbox_is_empty());
    assert!(ctx.pending_is_empty());
}

#[test]
fn when_scopes_apply_and_merge() {
    let mut ctx = ctx();
    let a = ctx.task(Noop::default()).finish().unwrap();
    let b = ctx.task(Noop::default()).finish().unwrap();

    ctx.with_when([(a, vec![ResultState::Changed])], |ctx| {
        ctx.task(Noop::default()).finish()?;
        ctx.with_when([(b, vec![ResultState::Noop])], |ctx| {
            ctx.task(Noop::default()).finish()
        })?;
        Ok(())
    })
    .unwrap();

    // After the scopes close, tasks are unconstrained again.
    ctx.task(Noop::default()).finish().unwrap();

    ctx.take_outbound().unwrap();
    ctx.take_outbound().unwrap();
    let inner = ctx.take_outbound().unwrap();
    assert_eq!(inner.info.when.len(), 1);
    assert!(inner.info.when.contains_key(&a.uuid));

    let nested = ctx.take_outbound().unwrap();
    assert_eq!(nested.info.when.len(), 2);
    assert!(nested.info.when.contains_key(&a.uuid));
    assert!(nested.info.when.contains_key(&b.uuid));

    let after = ctx.take_outbound().unwrap();
    assert!(after.info.when.is_empty());
}

#[test]
fn notify_scopes_merge_and_dedup() {
    let mut ctx = ctx();
    ctx.with_notify([handler::<Quiet>()], |ctx| {
        // The same handler named twice collapses to one entry.
        ctx.task(Noop::default()).notify(handler::<Quiet>()).finish()
    })
    .unwrap();

    let outbound = ctx.take_outbound().unwrap();
    assert_eq!(outbound.notify.len(), 1);
}

#[test]
fn task_when_overrides_the_scope_for_the_same_prior() {
    let mut ctx = ctx();
    let a = ctx.task(Noop::default()).finish().unwrap();

    ctx.with_when([(a, vec![ResultState::Changed])], |ctx| {
        ctx.task(Noop::default())
            .when(a, [ResultState::Noop])
            .finish()
    })
    .unwrap();

    ctx.take_outbound().unwrap();
    let gated = ctx.take_outbound().unwrap();
    assert_eq!(gated.info.when.get(&a.uuid), Some(&vec![ResultState::Noop]));
}

#[test]
fn vars_feed_template_rendering() {
    let mut ctx = ctx();
    ctx.set_var("package", serde_json::json!("nginx"));

    let rendered = ctx
        .render_string("install ${package} ${version}", &{
            let mut extra = TemplateVars::new();
            extra.insert("version".to_string(), serde_json::json!("1.2"));
            extra
        })
        .unwrap();
    assert_eq!(rendered, "install nginx 1.2");

    // Null vars render empty, matching the template engine contract.
    ctx.set_var("package", serde_json::Value::Null);
    let rendered = ctx.render_string("<${package}>", &TemplateVars::new()).unwrap();
    assert_eq!(rendered, "<>");
}

#[test]
fn lookup_file_roots_assets_at_the_role_directory() {
    let ctx = ctx();
    let asset = ctx.lookup_file("files/motd");
    assert_eq!(
        asset,
        FileAsset::local(std::path::Path::new("roles/webserver/files/motd"))
    );

    let zipped = RoleContext::new(
        "webserver",
        RoleAssets::in_zip("/srv/bundle.zip", "roles/webserver"),
    );
    let asset = zipped.lookup_file("files/motd");
    assert_eq!(
        asset,
        FileAsset::zip("/srv/bundle.zip", "roles/webserver/files/motd")
    );
}

#[test]
fn control_requests_queue_for_the_runner() {
    let mut ctx = ctx();
    ctx.clear_failed();
    ctx.close_pipeline();

    assert!(matches!(
        ctx.take_control(),
        Some(ControlRequest::ClearFailed(id)) if id == ctx.id().to_string()
    ));
    assert!(matches!(
        ctx.take_control(),
        Some(ControlRequest::ClosePipeline(_))
    ));
    assert!(ctx.take_control().is_none());
}
