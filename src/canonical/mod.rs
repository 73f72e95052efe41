//! Query canonicalization and fingerprinting.
//!
//! Turns raw tool parameters into an abstract parameter tree (volatile fields
//! stripped, strings normalized, identifying values replaced per the tool's
//! [`rules::ToolRule`]) and hashes tool name + canonical JSON into a stable
//! fingerprint. Two logically identical queries always produce
//! byte-identical canonical JSON, independent of key insertion order.

pub mod rules;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::error::{MemoryError, Result};
use rules::{AbstractionRules, FieldAction, TagRule, VOLATILE_FIELDS};

/// Abstract a tool's raw parameters per its rule.
///
/// Fails with [`MemoryError::Validation`] when `params` is not a JSON object.
pub fn abstract_params(
    table: &AbstractionRules,
    tool: &str,
    params: &Value,
) -> Result<Value> {
    let obj = params
        .as_object()
        .ok_or_else(|| MemoryError::Validation(format!("{tool}: parameters must be an object")))?;

    let mut out = Map::new();
    let rule = table.get(tool);

    for (key, value) in obj {
        if VOLATILE_FIELDS.contains(&key.as_str()) {
            continue;
        }
        match rule.and_then(|r| field_action(r, key)) {
            Some(FieldAction::Drop) => continue,
            Some(FieldAction::Placeholder(marker)) => {
                out.insert(key.clone(), Value::String((*marker).to_string()));
            }
            None => {
                out.insert(key.clone(), normalize_value(value));
            }
        }
    }

    for tag in rule.map(|r| r.tags.as_slice()).unwrap_or(&[]) {
        apply_tag(tag, obj, &mut out);
    }

    Ok(Value::Object(out))
}

/// Stable fingerprint of `(tool, params)`: SHA-256 over the tool name and the
/// canonical JSON of the abstracted parameters.
pub fn fingerprint(table: &AbstractionRules, tool: &str, params: &Value) -> Result<String> {
    let abstracted = abstract_params(table, tool, params)?;
    Ok(fingerprint_abstract(tool, &abstracted))
}

/// Fingerprint from already-abstracted parameters (compound steps reuse this).
pub fn fingerprint_abstract(tool: &str, abstracted: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(tool.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_json(abstracted).as_bytes());
    hex::encode(hasher.finalize())
}

/// Complexity of a query: tool base weight plus parameter-shape weight.
pub fn complexity_score(table: &AbstractionRules, tool: &str, params: &Value) -> f64 {
    table.base_weight(tool) + shape_weight(params)
}

/// Canonical JSON: recursively key-sorted, no whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

// ── internals ────────────────────────────────────────────────────────────────

fn field_action<'r>(rule: &'r rules::ToolRule, key: &str) -> Option<&'r FieldAction> {
    rule.actions
        .iter()
        .find(|(field, _)| *field == key)
        .map(|(_, action)| action)
}

fn apply_tag(tag: &TagRule, original: &Map<String, Value>, out: &mut Map<String, Value>) {
    match tag {
        TagRule::CategoryOf {
            source,
            tag_key,
            fallback_sources,
        } => {
            // Explicit category when present; otherwise a digest of the
            // identifying values keeps distinct subjects distinct.
            let category = original
                .get(*source)
                .and_then(Value::as_str)
                .map(normalize_str)
                .or_else(|| short_digest(original, fallback_sources))
                .unwrap_or_else(|| "general".to_string());
            out.insert((*tag_key).to_string(), Value::String(category));
        }
        TagRule::DigestOf { sources, tag_key } => {
            let digest = short_digest(original, sources)
                .unwrap_or_else(|| "general".to_string());
            out.insert((*tag_key).to_string(), Value::String(digest));
        }
    }
}

/// 8-hex-char digest over the normalized values of `sources`, or `None` when
/// none of the fields carry a string value.
fn short_digest(original: &Map<String, Value>, sources: &[&str]) -> Option<String> {
    let mut hasher = Sha256::new();
    let mut any = false;
    for source in sources {
        if let Some(s) = original.get(*source).and_then(Value::as_str) {
            hasher.update(normalize_str(s).as_bytes());
            hasher.update(b"\x1f");
            any = true;
        }
    }
    any.then(|| hex::encode(hasher.finalize())[..8].to_string())
}

/// Trim and case-fold a string value.
fn normalize_str(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Recursively normalize a value: strings trimmed and case-folded, volatile
/// keys dropped from nested objects too.
fn normalize_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(normalize_str(s)),
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !VOLATILE_FIELDS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), normalize_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Parameter-shape weight: 0.5 per object key, 0.25 per array element,
/// recursing into nested values.
fn shape_weight(value: &Value) -> f64 {
    match value {
        Value::Object(map) => map
            .values()
            .map(|v| 0.5 + shape_weight(v))
            .sum(),
        Value::Array(items) => items.iter().map(|v| 0.25 + shape_weight(v)).sum(),
        _ => 0.0,
    }
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // serde_json handles string escaping
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
