// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Self-describing wire envelope for actions.
//!
//! The envelope is a flat JSON object: the action's own fields plus the
//! reserved keys `__action__` (type tag), `__file_assets__` (names of asset
//! fields), `__binary__` (encoding tag per byte field) and, when attached by
//! a transport, `__pipeline__`.

use crate::action::{Action, BoxAction};
use crate::error::EnvelopeError;
use crate::pipeline::PipelineInfo;
use crate::registry::ActionRegistry;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde_json::{Map, Value};

pub const ACTION_KEY: &str = "__action__";
pub const FILE_ASSETS_KEY: &str = "__file_assets__";
pub const BINARY_KEY: &str = "__binary__";
pub const PIPELINE_KEY: &str = "__pipeline__";

/// Serialise an action into its wire envelope.
///
/// Byte fields are re-encoded as base64 text and flagged in `__binary__` so
/// the envelope survives a JSON transport.
pub fn serialize_action(action: &dyn Action) -> Result<Value, EnvelopeError> {
    let mut value = action.fields_value()?;
    let obj = value.as_object_mut().ok_or(EnvelopeError::NotAnObject)?;

    let mut binary = Map::new();
    for &field in action.binary_fields() {
        let Some(slot) = obj.get_mut(field) else {
            continue;
        };
        if slot.is_null() {
            continue;
        }
        let bytes = bytes_from_json(field, slot)?;
        *slot = Value::String(BASE64_STANDARD.encode(bytes));
        binary.insert(field.to_string(), Value::String("b64".to_string()));
    }

    let assets: Vec<Value> = action
        .asset_fields()
        .iter()
        .filter(|field| obj.get(**field).is_some_and(|v| !v.is_null()))
        .map(|field| Value::String((*field).to_string()))
        .collect();

    obj.insert(
        ACTION_KEY.to_string(),
        Value::String(action.type_tag().to_string()),
    );
    obj.insert(FILE_ASSETS_KEY.to_string(), Value::Array(assets));
    obj.insert(BINARY_KEY.to_string(), Value::Object(binary));
    Ok(value)
}

/// Attach transport pipeline metadata to a serialised envelope.
pub fn attach_pipeline(envelope: &mut Value, info: &PipelineInfo) -> Result<(), EnvelopeError> {
    let obj = envelope.as_object_mut().ok_or(EnvelopeError::NotAnObject)?;
    obj.insert(PIPELINE_KEY.to_string(), serde_json::to_value(info)?);
    Ok(())
}

/// Parse a wire envelope back into a boxed action, plus the pipeline
/// metadata when a transport attached any.
///
/// Rejects envelopes with no type tag or with a tag that does not resolve to
/// a registered action type.
pub fn deserialize_action(
    registry: &ActionRegistry,
    mut envelope: Value,
) -> Result<(BoxAction, Option<PipelineInfo>), EnvelopeError> {
    let obj = envelope.as_object_mut().ok_or(EnvelopeError::NotAnObject)?;

    let pipeline = match obj.remove(PIPELINE_KEY) {
        Some(Value::Null) | None => None,
        Some(value) => Some(serde_json::from_value(value)?),
    };

    let tag = match obj.remove(ACTION_KEY) {
        Some(Value::String(tag)) => tag,
        _ => return Err(EnvelopeError::MissingTag),
    };

    // Asset fields deserialise through their own wire format.
    obj.remove(FILE_ASSETS_KEY);

    if let Some(Value::Object(binary)) = obj.remove(BINARY_KEY) {
        for (field, encoding) in binary {
            let Some(slot) = obj.get_mut(&field) else {
                continue;
            };
            if slot.is_null() {
                continue;
            }
            let encoding = match encoding.as_str() {
                Some("b64") => "b64",
                Some("a85") => "a85",
                other => {
                    return Err(EnvelopeError::UnknownEncoding(
                        other.unwrap_or_default().to_string(),
                    ))
                }
            };
            let text = slot.as_str().ok_or_else(|| EnvelopeError::BadBinary {
                field: field.clone(),
                encoding: "text",
            })?;
            let bytes = match encoding {
                "a85" => a85_decode(text).ok_or_else(|| EnvelopeError::BadBinary {
                    field: field.clone(),
                    encoding: "a85",
                })?,
                _ => BASE64_STANDARD
                    .decode(text)
                    .map_err(|_| EnvelopeError::BadBinary {
                        field: field.clone(),
                        encoding: "b64",
                    })?,
            };
            *slot = Value::Array(bytes.into_iter().map(|b| Value::Number(b.into())).collect());
        }
    }

    let action = registry.construct(&tag, envelope)?;
    Ok((action, pipeline))
}

fn bytes_from_json(field: &str, value: &Value) -> Result<Vec<u8>, EnvelopeError> {
    let bad = || EnvelopeError::BadBinary {
        field: field.to_string(),
        encoding: "byte array",
    };
    let items = value.as_array().ok_or_else(bad)?;
    items
        .iter()
        .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect::<Option<Vec<u8>>>()
        .ok_or_else(bad)
}

/// Decode Ascii85 text, accepting the `z` shorthand for zero groups.
fn a85_decode(text: &str) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    let mut group = [0u8; 5];
    let mut len = 0;
    for ch in text.bytes() {
        if ch.is_ascii_whitespace() {
            continue;
        }
        if ch == b'z' {
            if len != 0 {
                return None;
            }
            out.extend_from_slice(&[0, 0, 0, 0]);
            continue;
        }
        if !(b'!'..=b'u').contains(&ch) {
            return None;
        }
        group[len] = ch - b'!';
        len += 1;
        if len == 5 {
            decode_group(&group, 5, &mut out)?;
            len = 0;
        }
    }
    if len == 1 {
        return None;
    }
    if len > 1 {
        for slot in group.iter_mut().skip(len) {
            *slot = 84;
        }
        decode_group(&group, len, &mut out)?;
    }
    Some(out)
}

fn decode_group(group: &[u8; 5], len: usize, out: &mut Vec<u8>) -> Option<()> {
    let mut acc: u64 = 0;
    for &digit in group {
        acc = acc * 85 + u64::from(digit);
    }
    if acc > u64::from(u32::MAX) {
        return None;
    }
    let bytes = (acc as u32).to_be_bytes();
    out.extend_from_slice(&bytes[..len - 1]);
    Some(())
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
