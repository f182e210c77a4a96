//! Read-only helpers over a webhook payload.
//!
//! Payloads are kept as [`serde_json::Value`]; nothing here mutates them.

use serde_json::Value;
use std::collections::HashMap;

/// Resolve a dot path such as `data.fields.0.value`.
///
/// Numeric segments index into arrays. A missing segment yields `None`.
pub fn resolve_path<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    let path = path.trim();
    if path.is_empty() {
        return None;
    }
    path.split('.').try_fold(payload, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// String form used by string operators and templates.
///
/// `null` has no string form. Strings are returned without quotes, other
/// values in their JSON rendering.
pub fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Numeric form used by `greater_than` / `less_than`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// First of `paths` that resolves to a non-empty string or a number.
pub fn first_string(payload: &Value, paths: &[&str]) -> Option<String> {
    paths.iter().find_map(|path| match resolve_path(payload, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// CRM record the event refers to.
pub fn record_id(payload: &Value) -> Option<String> {
    first_string(
        payload,
        &[
            "metadata.sugar_record_id",
            "metadata.crm_record_id",
            "metadata.record_id",
        ],
    )
}

/// Provider-side document id.
pub fn document_id(payload: &Value) -> Option<String> {
    first_string(payload, &["data.id", "metadata.document_id"])
}

pub fn document_name(payload: &Value) -> Option<String> {
    first_string(payload, &["data.name"])
}

/// CRM module named by the payload metadata, if any.
pub fn metadata_module(payload: &Value) -> Option<String> {
    first_string(payload, &["metadata.crm_module", "metadata.sugar_module"])
}

const FIELD_NAME_KEYS: [&str; 4] = ["merge_field", "name", "api_id", "field_name"];

/// Lowercased field name → value for every field the document carries.
///
/// Accepts `data.fields` either as a list of `{merge_field|name|api_id, value}`
/// entries or as a plain object. Later entries win on duplicate names.
pub fn field_values(payload: &Value) -> HashMap<String, Value> {
    let mut values = HashMap::new();
    match resolve_path(payload, "data.fields") {
        Some(Value::Array(entries)) => {
            for entry in entries {
                let Some(name) = FIELD_NAME_KEYS
                    .iter()
                    .find_map(|key| entry.get(key).and_then(Value::as_str))
                    .filter(|n| !n.trim().is_empty())
                else {
                    continue;
                };
                let value = entry.get("value").cloned().unwrap_or(Value::Null);
                values.insert(name.trim().to_lowercase(), value);
            }
        }
        Some(Value::Object(map)) => {
            for (name, value) in map {
                values.insert(name.trim().to_lowercase(), value.clone());
            }
        }
        _ => {}
    }
    values
}
