// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of the bundled action types.

use gw_core::registry::ActionRegistry;
use std::sync::LazyLock;

/// The registry with every bundled action type, built once per process.
///
/// Transports deserialising envelopes from the wire resolve type tags here;
/// anything not registered is rejected.
pub fn builtin() -> &'static ActionRegistry {
    static REGISTRY: LazyLock<ActionRegistry> = LazyLock::new(|| {
        let mut registry = ActionRegistry::new();
        registry.register::<crate::misc::Noop>();
        registry.register::<crate::misc::Fail>();
        registry.register::<crate::file::File>();
        registry.register::<crate::copy::Copy>();
        registry.register::<crate::blockinfile::BlockInFile>();
        registry.register::<crate::command::Command>();
        registry.register::<crate::apt::Apt>();
        registry.register::<crate::systemd::Systemd>();
        registry.register::<crate::user::User>();
        registry.register::<crate::git::Git>();
        registry.register::<crate::facts::Platform>();
        registry
    });
    &REGISTRY
}

#[cfg(test)]
mod tests {
    use super::*;
    use gw_core::action::ActionData;

    #[test]
    fn builtin_knows_every_bundled_action() {
        let registry = builtin();
        for tag in [
            crate::misc::Noop::TAG,
            crate::misc::Fail::TAG,
            crate::file::File::TAG,
            crate::copy::Copy::TAG,
            crate::blockinfile::BlockInFile::TAG,
            crate::command::Command::TAG,
            crate::apt::Apt::TAG,
            crate::systemd::Systemd::TAG,
            crate::user::User::TAG,
            crate::git::Git::TAG,
            crate::facts::Platform::TAG,
        ] {
            assert!(registry.contains(tag), "missing {tag}");
        }
        assert!(!registry.contains("groundwork.actions.misc.Unknown"));
    }
}
