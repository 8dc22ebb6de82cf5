use crate::domain::envelope::{first_text, normalize_keys, unwrap_envelope};
use crate::domain::HealthStatus;
use chrono::Utc;
use serde_json::Value;

/// Fixed ordinal scale for health statuses. Anything unmapped is 0.
pub fn health_value(status: &str) -> i32 {
    match status.to_uppercase().as_str() {
        "HEALTHY" => 1000,
        "WARNING" => 2000,
        "CRITICAL" => 3000,
        _ => 0,
    }
}

/// Normalizes a health payload into a [`HealthStatus`].
///
/// Same envelope-unwrap and key-folding step as alerts. The device id and
/// status come from the first present of their alternate spellings, falling
/// back to `"unknown"`/`"UNKNOWN"`. Health payloads carry no timestamp, so
/// the record is stamped with the current instant.
///
/// Returns `None` only for non-object payloads.
pub fn normalize_health(data: &Value) -> Option<HealthStatus> {
    let data = unwrap_envelope(data);
    let obj = data.as_object()?;

    let mut normalized = normalize_keys(obj);

    let device_id = first_text(&normalized, ["device_id", "deviceid", "id"])
        .unwrap_or_else(|| "unknown".to_string());
    let health_status = first_text(&normalized, ["health_status", "healthstatus", "status"])
        .unwrap_or_else(|| "UNKNOWN".to_string());
    let value = health_value(&health_status);

    // Details mirror the resolved fields the way the normalized record is
    // persisted, not just the raw input keys.
    normalized.insert("device_id".to_string(), Value::String(device_id.clone()));
    normalized.insert(
        "health_status".to_string(),
        Value::String(health_status.clone()),
    );
    normalized.insert("health_value".to_string(), Value::from(value));

    Some(HealthStatus {
        time: Utc::now(),
        device_id,
        health_status,
        health_value: value,
        details: normalized,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn warning_maps_to_2000_any_casing() {
        for status in ["Warning", "WARNING", "warning"] {
            let health = normalize_health(&json!({"DeviceId": "D1", "Status": status})).unwrap();
            assert_eq!(health.health_value, 2000, "{status}");
            assert_eq!(health.health_status, status);
        }
    }

    #[test]
    fn ordinal_table() {
        assert_eq!(health_value("HEALTHY"), 1000);
        assert_eq!(health_value("WARNING"), 2000);
        assert_eq!(health_value("CRITICAL"), 3000);
        assert_eq!(health_value("UNKNOWN"), 0);
        assert_eq!(health_value("garbage"), 0);
    }

    #[test]
    fn absent_status_defaults_to_unknown_zero() {
        let health = normalize_health(&json!({"DeviceId": "D1"})).unwrap();
        assert_eq!(health.health_status, "UNKNOWN");
        assert_eq!(health.health_value, 0);
    }

    #[test]
    fn device_id_fallback_chain() {
        let health = normalize_health(&json!({"Id": "fallback-id"})).unwrap();
        assert_eq!(health.device_id, "fallback-id");

        let health = normalize_health(&json!({"Status": "Healthy"})).unwrap();
        assert_eq!(health.device_id, "unknown");
    }

    #[test]
    fn envelope_unwraps_to_first_entry() {
        let payload = json!({"Data": [{"DeviceId": "D1", "Status": "Critical"}]});
        let health = normalize_health(&payload).unwrap();
        assert_eq!(health.device_id, "D1");
        assert_eq!(health.health_value, 3000);
    }

    #[test]
    fn details_carry_resolved_fields_and_raw_extras() {
        let health =
            normalize_health(&json!({"DeviceId": "D1", "Status": "Healthy", "Rack": "R4"}))
                .unwrap();
        assert_eq!(health.details["device_id"], json!("D1"));
        assert_eq!(health.details["health_status"], json!("Healthy"));
        assert_eq!(health.details["health_value"], json!(1000));
        assert_eq!(health.details["rack"], json!("R4"));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        assert!(normalize_health(&json!("text")).is_none());
        assert!(normalize_health(&json!([{"DeviceId": "D1"}])).is_none());
    }
}
