use crate::domain::envelope::{first_text, normalize_keys, unwrap_envelope};
use crate::domain::{canonical_severity, AlertEvent};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static SERVICE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"System Service Tag:\s*([A-Za-z0-9_-]+)").unwrap());
static DISPLAY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Device Display Name:\s*([^,]+)").unwrap());
static RAC_FQDN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RAC FQDN:\s*([^,\n]+)").unwrap());
static MESSAGE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Message ID:\s*([^,\n]+)").unwrap());

/// Extracts labeled segments from freeform alert description text.
pub fn parse_description(desc: &str) -> Map<String, Value> {
    let mut out = Map::new();

    if let Some(caps) = SERVICE_TAG_RE.captures(desc) {
        out.insert(
            "system_service_tag".to_string(),
            Value::String(caps[1].to_string()),
        );
    }
    if let Some(caps) = DISPLAY_NAME_RE.captures(desc) {
        out.insert(
            "device_display_name".to_string(),
            Value::String(caps[1].trim().to_string()),
        );
    }
    if let Some(caps) = RAC_FQDN_RE.captures(desc) {
        out.insert("rac_fqdn".to_string(), Value::String(caps[1].trim().to_string()));
    }
    if let Some(caps) = MESSAGE_ID_RE.captures(desc) {
        out.insert(
            "message_id".to_string(),
            Value::String(caps[1].trim().to_string()),
        );
    }

    out
}

/// Normalizes an incoming alert payload into an [`AlertEvent`].
///
/// Envelopes with a `Data` list are replaced by their first entry. Keys are
/// folded to lowercase snake form, a numeric severity is mapped to its
/// canonical name, and fields extracted from the description text are merged
/// in afterwards. The merge intentionally overwrites colliding top-level
/// keys; downstream consumers rely on the extracted values winning.
///
/// Returns `None` for non-object payloads and objects with no fields.
pub fn normalize_alert(data: &Value) -> Option<AlertEvent> {
    let data = unwrap_envelope(data);
    let obj = data.as_object()?;
    if obj.is_empty() {
        return None;
    }

    let mut normalized = normalize_keys(obj);

    if let Some(sev) = normalized.get("severity") {
        if let Some(numeric) = numeric_severity(sev) {
            normalized.insert(
                "severity".to_string(),
                Value::String(canonical_severity(numeric)),
            );
        }
    }

    let description = match normalized.get("description") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    if let Some(desc) = description {
        for (k, v) in parse_description(&desc) {
            normalized.insert(k, v);
        }
    }

    // Reconcile the alternate identifier spelling only when the canonical
    // key is absent.
    if normalized.contains_key("alertidentifier") && !normalized.contains_key("alert_identifier") {
        let alt = normalized["alertidentifier"].clone();
        normalized.insert("alert_identifier".to_string(), alt);
    }

    Some(AlertEvent {
        time: normalized.get("time").and_then(parse_alert_time),
        device_id: first_text(&normalized, ["device_id", "system_service_tag"]),
        alert_id: first_text(&normalized, ["alert_identifier", "alertid"]),
        severity: first_text(&normalized, ["severity"]).unwrap_or_else(|| "UNKNOWN".to_string()),
        message: first_text(&normalized, ["message", "description"]),
        category: first_text(&normalized, ["category", "message_id"]),
        details: normalized,
    })
}

/// Severities arrive as JSON numbers or numeric strings; anything else is
/// left untouched so the original text survives into the record.
fn numeric_severity(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn parse_alert_time(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
