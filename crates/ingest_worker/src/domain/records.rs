use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One fully-normalized metric sample, ready for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub time: DateTime<Utc>,
    pub device_id: String,
    pub metric_id: String,
    pub component_id: Option<String>,
    pub value: f64,
    pub tags: MetricTags,
}

/// Metadata derived purely from the dot-segmented MetricId, e.g.
/// `PSU.AmpsReading.Average.5.Interval`. Stored as a JSONB document with
/// absent fields omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricTags {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A normalized alert. `severity` is always a canonical name (or the literal
/// digits of an unmapped numeric severity); `details` keeps the full
/// normalized source record for audit and debugging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub time: Option<DateTime<Utc>>,
    pub device_id: Option<String>,
    pub alert_id: Option<String>,
    pub severity: String,
    pub message: Option<String>,
    pub category: Option<String>,
    pub details: Map<String, Value>,
}

/// A normalized device health observation. Health payloads carry no
/// timestamp, so `time` is stamped at normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub time: DateTime<Utc>,
    pub device_id: String,
    pub health_status: String,
    pub health_value: i32,
    pub details: Map<String, Value>,
}
