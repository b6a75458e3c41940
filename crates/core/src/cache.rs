// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-host cache where actions memoise expensive probes.

use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Type-keyed cache shared by all actions running against one host.
///
/// Entries are keyed by their Rust type, so unrelated actions cannot
/// collide. Lookup-or-create is serialised under a single lock.
#[derive(Default)]
pub struct ActionCache {
    entries: Mutex<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl ActionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the entry of type `T`, creating it with `factory` on first use.
    pub fn get_with<T, F>(&self, factory: F) -> Arc<T>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(&TypeId::of::<T>()) {
            if let Ok(typed) = Arc::clone(entry).downcast::<T>() {
                return typed;
            }
        }
        let fresh = Arc::new(factory());
        entries.insert(TypeId::of::<T>(), Arc::clone(&fresh) as Arc<dyn Any + Send + Sync>);
        fresh
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
