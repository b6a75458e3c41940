// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! gw-actions: the bundled action library for Groundwork.
//!
//! Every action here is idempotent: it reports NOOP when the target already
//! matches, CHANGED when it had to mutate, and honours check mode by
//! computing intent without touching the system.

pub mod apt;
pub mod blockinfile;
pub mod command;
pub mod common;
pub mod copy;
pub mod facts;
pub mod file;
pub mod git;
pub mod misc;
mod registry;
pub mod systemd;
pub mod user;

#[cfg(test)]
pub mod test_support;

pub use apt::Apt;
pub use blockinfile::BlockInFile;
pub use command::Command;
pub use copy::Copy;
pub use facts::Platform;
pub use file::{File, FileState};
pub use git::Git;
pub use misc::{Fail, Noop};
pub use registry::builtin;
pub use systemd::Systemd;
pub use user::User;
