// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Facts: read-only probes whose fields feed back into the requesting role.
//!
//! Facts are ordinary actions with `IS_FACTS` set; they always report NOOP
//! and only populate their own fields for later consumption.

mod platform;

pub use platform::Platform;
