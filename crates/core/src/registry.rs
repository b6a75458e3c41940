// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Explicit registry of action types, keyed by wire type tag.

use crate::action::{ActionData, BoxAction};
use crate::error::EnvelopeError;
use std::collections::HashMap;

type Constructor = fn(serde_json::Value) -> Result<BoxAction, EnvelopeError>;

/// Maps wire type tags to action constructors.
///
/// Populated at initialisation; deserialisation rejects envelopes whose tag
/// was never registered.
#[derive(Default)]
pub struct ActionRegistry {
    constructors: HashMap<&'static str, Constructor>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the action type `T` under its wire tag.
    pub fn register<T: ActionData>(&mut self) {
        self.constructors.insert(T::TAG, construct::<T>);
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Build a boxed action of the type named by `tag` from its fields.
    pub fn construct(
        &self,
        tag: &str,
        fields: serde_json::Value,
    ) -> Result<BoxAction, EnvelopeError> {
        let ctor = self
            .constructors
            .get(tag)
            .ok_or_else(|| EnvelopeError::UnknownTag(tag.to_string()))?;
        ctor(fields)
    }
}

fn construct<T: ActionData>(fields: serde_json::Value) -> Result<BoxAction, EnvelopeError> {
    let action: T = serde_json::from_value(fields)?;
    Ok(Box::new(action))
}
