//! Typed records for the store's schema-less documents.
//!
//! Shapes are coerced at the boundary, immediately on read — missing fields
//! get defaults, scalars promoted to arrays where an array is expected —
//! so loosely-typed maps never travel through the rest of the system.

pub mod message;
pub mod project;
pub mod testimonial;

use serde_json::Value;

/// Origin channel stamped on public form submissions.
pub const SOURCE_PORTFOLIO: &str = "portfolio_website";

pub(crate) fn string_field(data: &serde_json::Map<String, Value>, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn opt_string_field(
    data: &serde_json::Map<String, Value>,
    key: &str,
) -> Option<String> {
    data.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Treats the stored value as an array of strings even when it is a single
/// scalar (promoted to a one-element array) or absent (empty array).
pub(crate) fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}
