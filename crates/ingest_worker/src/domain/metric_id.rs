use crate::domain::MetricTags;

/// Derives tag metadata from a dot-segmented MetricId.
///
/// Segment layout: `<ComponentType>.<MetricType>.<Aggregation>.<Interval>.Interval`,
/// e.g. `PSU.AmpsReading.Average.5.Interval` or
/// `PMP_CPU.TemperatureReading.Min.5.Interval`. Shorter ids fill as many
/// fields as they have segments. The unit is inferred from well-known
/// substrings of the metric type.
pub fn parse_metric_id(metric_id: &str) -> MetricTags {
    let mut tags = MetricTags::default();

    if metric_id.is_empty() {
        return tags;
    }

    let parts: Vec<&str> = metric_id.split('.').collect();

    if parts.len() >= 2 {
        tags.component_type = Some(parts[0].to_string());
        tags.metric_type = Some(parts[1].to_string());
    }
    if parts.len() >= 3 {
        tags.aggregation = Some(parts[2].to_string());
    }
    if parts.len() >= 4 {
        tags.interval = Some(parts[3].to_string());
    }

    if let Some(metric_type) = tags.metric_type.as_deref() {
        tags.unit = infer_unit(metric_type).map(str::to_string);
    }

    tags
}

fn infer_unit(metric_type: &str) -> Option<&'static str> {
    if metric_type.contains("Amps") {
        Some("amperes")
    } else if metric_type.contains("Temperature") {
        Some("celsius")
    } else if metric_type.contains("Power") || metric_type.contains("Energy") {
        Some("watts")
    } else if metric_type.contains("Voltage") {
        Some("volts")
    } else {
        None
    }
}
