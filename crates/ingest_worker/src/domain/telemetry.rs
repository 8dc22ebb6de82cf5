use crate::domain::envelope::text_value;
use crate::domain::{parse_metric_id, MetricPoint, NormalizeError, NormalizeResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

/// Output of [`parse_telemetry`]: the well-formed points plus a count of
/// records dropped for timestamp/value parse failures.
#[derive(Debug, Default)]
pub struct TelemetryBatch {
    pub points: Vec<MetricPoint>,
    pub skipped: usize,
}

impl TelemetryBatch {
    fn extend(&mut self, other: TelemetryBatch) {
        self.points.extend(other.points);
        self.skipped += other.skipped;
    }
}

/// Parses an OME telemetry payload into individual metric points.
///
/// Accepts a single telemetry object, a bare list of such objects, or an
/// envelope with a `Data` list; lists are flattened recursively. Within one
/// object, `TimeStamp` and `MetricValue` are parallel arrays (scalars are
/// treated as single-element arrays) zipped pairwise. A pair whose timestamp
/// or value fails to parse is dropped and counted in `skipped`; parsing
/// always continues with the remaining pairs.
pub fn parse_telemetry(data: &Value) -> TelemetryBatch {
    let mut batch = TelemetryBatch::default();

    if let Some(items) = data.as_array() {
        for item in items {
            batch.extend(parse_telemetry(item));
        }
        return batch;
    }

    if let Some(items) = data.get("Data").and_then(Value::as_array) {
        for item in items {
            batch.extend(parse_telemetry(item));
        }
        return batch;
    }

    let device_id = data
        .get("Identifier")
        .or_else(|| data.get("identifier"))
        .and_then(text_value)
        .unwrap_or_else(|| "unknown".to_string());

    let Some(metric_list) = data.get("Metric").and_then(Value::as_array) else {
        return batch;
    };

    for metric in metric_list {
        let Some(metric_id) = metric.get("MetricId").and_then(Value::as_str) else {
            // A metric block without an id cannot produce a usable point;
            // every pair in it counts as skipped.
            batch.skipped += pair_count(metric);
            continue;
        };
        let component_id = metric.get("ComponentId").and_then(text_value);

        let timestamps = as_slice(metric.get("TimeStamp"));
        let values = as_slice(metric.get("MetricValue"));

        for (timestamp, value) in timestamps.iter().zip(values.iter()) {
            match metric_point(&device_id, metric_id, component_id.as_deref(), timestamp, value) {
                Ok(point) => batch.points.push(point),
                Err(_) => batch.skipped += 1,
            }
        }
    }

    batch
}

/// Parses one timestamp/value pair into a point. Kept as a `Result` so the
/// caller can drop individual bad records without exception control flow.
fn metric_point(
    device_id: &str,
    metric_id: &str,
    component_id: Option<&str>,
    timestamp: &Value,
    value: &Value,
) -> NormalizeResult<MetricPoint> {
    let time = parse_compact_timestamp(timestamp.as_str().ok_or(NormalizeError::TimestampNotText)?)?;
    let value = metric_value(value)?;
    let tags = parse_metric_id(metric_id);

    Ok(MetricPoint {
        time,
        device_id: device_id.to_string(),
        metric_id: metric_id.to_string(),
        component_id: component_id.map(str::to_string),
        value,
        tags,
    })
}

/// Parses the compact OME timestamp format `YYYYMMDDTHHMMSSZ`. The trailing
/// `Z` is stripped; the value carries no offset and is implicitly UTC.
pub fn parse_compact_timestamp(raw: &str) -> NormalizeResult<DateTime<Utc>> {
    let cleaned = raw.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(cleaned, "%Y%m%dT%H%M%S")
        .map(|naive| naive.and_utc())
        .map_err(|source| NormalizeError::Timestamp {
            value: raw.to_string(),
            source,
        })
}

fn metric_value(raw: &Value) -> NormalizeResult<f64> {
    let parsed = match raw {
        Value::Number(n) => n.as_f64().ok_or_else(|| NormalizeError::Value(n.to_string()))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| NormalizeError::Value(s.clone()))?,
        other => return Err(NormalizeError::Value(other.to_string())),
    };
    if !parsed.is_finite() {
        return Err(NormalizeError::NonFinite(parsed));
    }
    Ok(parsed)
}

/// Coerces a scalar field to a one-element slice, an array to itself, and a
/// missing field to empty.
fn as_slice(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(scalar) => vec![scalar],
        None => Vec::new(),
    }
}

fn pair_count(metric: &Value) -> usize {
    as_slice(metric.get("TimeStamp"))
        .len()
        .min(as_slice(metric.get("MetricValue")).len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_payload() -> Value {
        json!({
            "Identifier": "SVCTAG1",
            "Metric": [
                {
                    "MetricId": "PSU.AmpsReading.Average.5.Interval",
                    "ComponentId": "PSU.Slot.1",
                    "TimeStamp": ["20260201T183500Z", "20260201T183000Z"],
                    "MetricValue": ["0.8", "0.8"]
                }
            ]
        })
    }

    #[test]
    fn well_formed_pairs_yield_one_point_each() {
        let batch = parse_telemetry(&sample_payload());
        assert_eq!(batch.points.len(), 2);
        assert_eq!(batch.skipped, 0);

        let point = &batch.points[0];
        assert_eq!(point.device_id, "SVCTAG1");
        assert_eq!(point.metric_id, "PSU.AmpsReading.Average.5.Interval");
        assert_eq!(point.component_id.as_deref(), Some("PSU.Slot.1"));
        assert_eq!(point.value, 0.8);
        assert_eq!(point.time, Utc.with_ymd_and_hms(2026, 2, 1, 18, 35, 0).unwrap());
        assert_eq!(point.tags.unit.as_deref(), Some("amperes"));
    }

    #[test]
    fn compact_timestamp_parses_as_utc() {
        let time = parse_compact_timestamp("20260201T183500Z").unwrap();
        assert_eq!(time, Utc.with_ymd_and_hms(2026, 2, 1, 18, 35, 0).unwrap());
    }

    #[test]
    fn malformed_timestamp_is_rejected() {
        assert!(parse_compact_timestamp("2026-02-01T18:35:00Z").is_err());
        assert!(parse_compact_timestamp("garbage").is_err());
        assert!(parse_compact_timestamp("").is_err());
    }

    #[test]
    fn malformed_pairs_reduce_count_without_failing() {
        let payload = json!({
            "Identifier": "SVCTAG1",
            "Metric": [{
                "MetricId": "PSU.AmpsReading.Average.5.Interval",
                "TimeStamp": ["20260201T183500Z", "not-a-time", "20260201T184000Z"],
                "MetricValue": ["0.8", "0.9", "not-a-number"]
            }]
        });
        let batch = parse_telemetry(&payload);
        assert_eq!(batch.points.len(), 1);
        assert_eq!(batch.skipped, 2);
    }

    #[test]
    fn non_finite_values_are_dropped() {
        let payload = json!({
            "Identifier": "SVCTAG1",
            "Metric": [{
                "MetricId": "PSU.AmpsReading.Average.5.Interval",
                "TimeStamp": ["20260201T183500Z", "20260201T184000Z"],
                "MetricValue": ["NaN", "inf"]
            }]
        });
        let batch = parse_telemetry(&payload);
        assert!(batch.points.is_empty());
        assert_eq!(batch.skipped, 2);
    }

    #[test]
    fn scalar_timestamp_and_value_are_coerced() {
        let payload = json!({
            "Identifier": "SVCTAG1",
            "Metric": [{
                "MetricId": "PSU.AmpsReading.Average.5.Interval",
                "TimeStamp": "20260201T183500Z",
                "MetricValue": 0.8
            }]
        });
        let batch = parse_telemetry(&payload);
        assert_eq!(batch.points.len(), 1);
        assert_eq!(batch.points[0].value, 0.8);
    }

    #[test]
    fn list_and_envelope_payloads_flatten() {
        let listed = json!([sample_payload(), sample_payload()]);
        assert_eq!(parse_telemetry(&listed).points.len(), 4);

        let enveloped = json!({"Data": [sample_payload()]});
        assert_eq!(parse_telemetry(&enveloped).points.len(), 2);
    }

    #[test]
    fn missing_identifier_defaults_to_unknown() {
        let payload = json!({
            "Metric": [{
                "MetricId": "PSU.AmpsReading.Average.5.Interval",
                "TimeStamp": ["20260201T183500Z"],
                "MetricValue": ["0.8"]
            }]
        });
        let batch = parse_telemetry(&payload);
        assert_eq!(batch.points[0].device_id, "unknown");
    }

    #[test]
    fn metric_without_id_is_skipped() {
        let payload = json!({
            "Identifier": "SVCTAG1",
            "Metric": [{
                "TimeStamp": ["20260201T183500Z"],
                "MetricValue": ["0.8"]
            }]
        });
        let batch = parse_telemetry(&payload);
        assert!(batch.points.is_empty());
        assert_eq!(batch.skipped, 1);
    }

    #[test]
    fn non_object_payload_yields_nothing() {
        assert!(parse_telemetry(&json!("text")).points.is_empty());
        assert!(parse_telemetry(&json!(42)).points.is_empty());
    }

    #[test]
    fn mismatched_array_lengths_zip_to_shorter() {
        let payload = json!({
            "Identifier": "SVCTAG1",
            "Metric": [{
                "MetricId": "PSU.AmpsReading.Average.5.Interval",
                "TimeStamp": ["20260201T183500Z", "20260201T184000Z"],
                "MetricValue": ["0.8"]
            }]
        });
        assert_eq!(parse_telemetry(&payload).points.len(), 1);
    }
}
