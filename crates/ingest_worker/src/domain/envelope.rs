//! Shared payload-shape helpers for the normalizers.
//!
//! OME publishes the same logical record in several shapes: a bare object,
//! an envelope with the object(s) under a `Data` list, and (for telemetry)
//! bare lists of objects. Key casing and spacing vary across platform
//! versions, so keys are folded to lowercase snake form before any lookup.

use serde_json::{Map, Value};

/// If `data` is an envelope holding a non-empty `Data` list, returns the
/// first element; otherwise returns `data` unchanged.
pub(crate) fn unwrap_envelope(data: &Value) -> &Value {
    if let Some(items) = data.get("Data").and_then(Value::as_array) {
        if let Some(first) = items.first() {
            return first;
        }
    }
    data
}

/// Lowercases keys and replaces spaces with underscores, preserving values.
pub(crate) fn normalize_keys(obj: &Map<String, Value>) -> Map<String, Value> {
    obj.iter()
        .map(|(k, v)| (k.trim().to_lowercase().replace(' ', "_"), v.clone()))
        .collect()
}

/// Renders a scalar JSON value as text. Strings pass through, numbers and
/// booleans are formatted; empty strings, nulls, arrays, and objects yield
/// `None` so identifier fallback chains can skip them.
pub(crate) fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// First present key in `keys` that holds renderable text.
pub(crate) fn first_text<'a>(
    obj: &Map<String, Value>,
    keys: impl IntoIterator<Item = &'a str>,
) -> Option<String> {
    keys.into_iter()
        .filter_map(|k| obj.get(k))
        .find_map(text_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_unwraps_to_first_element() {
        let data = json!({"Data": [{"Severity": 8}, {"Severity": 16}]});
        assert_eq!(unwrap_envelope(&data), &json!({"Severity": 8}));
    }

    #[test]
    fn empty_envelope_passes_through() {
        let data = json!({"Data": []});
        assert_eq!(unwrap_envelope(&data), &data);
    }

    #[test]
    fn bare_object_passes_through() {
        let data = json!({"Severity": 8});
        assert_eq!(unwrap_envelope(&data), &data);
    }

    #[test]
    fn keys_fold_to_snake_lowercase() {
        let obj = json!({" Device Id ": 1, "AlertIdentifier": "A1"});
        let normalized = normalize_keys(obj.as_object().unwrap());
        assert!(normalized.contains_key("device_id"));
        assert!(normalized.contains_key("alertidentifier"));
    }

    #[test]
    fn text_value_skips_empty_and_structured() {
        assert_eq!(text_value(&json!("abc")), Some("abc".to_string()));
        assert_eq!(text_value(&json!(42)), Some("42".to_string()));
        assert_eq!(text_value(&json!("")), None);
        assert_eq!(text_value(&json!(null)), None);
        assert_eq!(text_value(&json!([1])), None);
    }
}
