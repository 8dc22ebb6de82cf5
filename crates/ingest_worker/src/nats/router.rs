use crate::domain::{
    normalize_alert, normalize_health, parse_telemetry, severity_value, EventSink,
};
use crate::nats::{classify, TopicDomain};
use anyhow::Context;
use async_nats::jetstream::Message;
use common::{BatchProcessor, ProcessingResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Routes decoded broker messages to the normalizer and sink matching their
/// subject's domain.
///
/// The dispatch table is fixed at construction: each configured subject is
/// classified once, and unrecognized subjects get no route — messages
/// arriving on them are skipped, not errored.
pub struct TopicRouter {
    sink: Arc<dyn EventSink>,
    routes: HashMap<String, TopicDomain>,
    alert_min_severity: i64,
}

impl TopicRouter {
    pub fn new(sink: Arc<dyn EventSink>, subjects: &[String], alert_min_severity: i64) -> Self {
        let mut routes = HashMap::new();
        for subject in subjects {
            let domain = classify(subject);
            if domain == TopicDomain::Unrecognized {
                warn!(subject = %subject, "No handler for subject, messages will be skipped");
                continue;
            }
            info!(subject = %subject, domain = %domain, "Registered handler");
            routes.insert(subject.clone(), domain);
        }
        Self {
            sink,
            routes,
            alert_min_severity,
        }
    }

    pub fn domain_for(&self, subject: &str) -> Option<TopicDomain> {
        self.routes.get(subject).copied()
    }

    /// Decodes and handles one message. Errors returned here mean the
    /// message is dropped; they never stop the poll loop.
    pub async fn dispatch(&self, subject: &str, payload: &[u8]) -> anyhow::Result<()> {
        let Some(domain) = self.domain_for(subject) else {
            debug!(subject = %subject, "No handler registered for subject, skipping message");
            return Ok(());
        };

        let data: Value =
            serde_json::from_slice(payload).context("failed to decode message body as JSON")?;

        match domain {
            TopicDomain::Telemetry => self.handle_telemetry(&data).await,
            TopicDomain::Alert => self.handle_alert(&data).await,
            TopicDomain::Health => self.handle_health(&data).await,
            TopicDomain::Inventory => {
                debug!(subject = %subject, "Inventory event received, not persisted");
                Ok(())
            }
            TopicDomain::Audit => {
                debug!(subject = %subject, "Audit event received, not persisted");
                Ok(())
            }
            TopicDomain::Unrecognized => Ok(()),
        }
    }

    async fn handle_telemetry(&self, data: &Value) -> anyhow::Result<()> {
        let batch = parse_telemetry(data);
        if batch.skipped > 0 {
            warn!(skipped = batch.skipped, "Dropped malformed metric records");
        }
        if batch.points.is_empty() {
            warn!("No valid metrics found in telemetry payload");
            return Ok(());
        }

        let count = batch.points.len();
        let device_id = batch.points[0].device_id.clone();
        self.sink
            .insert_metrics(batch.points)
            .await
            .context("failed to insert telemetry metrics")?;
        info!(count, device_id = %device_id, "Processed telemetry metrics");
        Ok(())
    }

    async fn handle_alert(&self, data: &Value) -> anyhow::Result<()> {
        let Some(alert) = normalize_alert(data) else {
            warn!("No valid alert data found");
            return Ok(());
        };

        // Numeric severity for threshold filtering: literal digits first,
        // then the name table, defaulting to unknown.
        let severity_num = alert
            .severity
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| severity_value(&alert.severity))
            .unwrap_or(1);
        if severity_num < self.alert_min_severity {
            debug!(
                severity = %alert.severity,
                severity_num,
                threshold = self.alert_min_severity,
                "Alert severity below threshold, eligible for downstream filtering"
            );
        }

        let alert_id = alert.alert_id.clone();
        let severity = alert.severity.clone();
        self.sink
            .insert_alert(alert)
            .await
            .context("failed to insert alert")?;
        info!(alert_id = ?alert_id, severity = %severity, "Processed alert");
        Ok(())
    }

    async fn handle_health(&self, data: &Value) -> anyhow::Result<()> {
        let Some(health) = normalize_health(data) else {
            warn!("No valid health data found");
            return Ok(());
        };

        let device_id = health.device_id.clone();
        self.sink
            .insert_health(health)
            .await
            .context("failed to insert health status")?;
        info!(device_id = %device_id, "Processed health status");
        Ok(())
    }
}

/// Adapts the router to the consumer's batch interface: every message is
/// dispatched in order; failures are logged and terminated (dropped without
/// redelivery), never propagated to the poll loop.
pub fn create_ingest_processor(router: Arc<TopicRouter>) -> BatchProcessor {
    Box::new(move |messages: &[Message]| {
        let router = Arc::clone(&router);

        // Copy payloads out: the async block must not borrow the slice.
        let message_data: Vec<(usize, Vec<u8>, String)> = messages
            .iter()
            .enumerate()
            .map(|(idx, msg)| (idx, msg.payload.to_vec(), msg.subject.to_string()))
            .collect();

        Box::pin(async move {
            let mut result = ProcessingResult::default();

            for (idx, payload, subject) in message_data {
                match router.dispatch(&subject, &payload).await {
                    Ok(()) => result.ack.push(idx),
                    Err(e) => {
                        error!(
                            subject = %subject,
                            error = %format!("{e:#}"),
                            "Error processing message"
                        );
                        result.term.push((idx, Some(e.to_string())));
                    }
                }
            }

            Ok(result)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MockEventSink;
    use serde_json::json;

    fn subjects(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn router_with(sink: MockEventSink) -> TopicRouter {
        TopicRouter::new(
            Arc::new(sink),
            &subjects(&["ome.telemetry", "ome.alerts", "ome.health"]),
            1,
        )
    }

    #[test]
    fn routes_are_classified_once_at_startup() {
        let router = router_with(MockEventSink::new());
        assert_eq!(router.domain_for("ome.telemetry"), Some(TopicDomain::Telemetry));
        assert_eq!(router.domain_for("ome.alerts"), Some(TopicDomain::Alert));
        assert_eq!(router.domain_for("ome.health"), Some(TopicDomain::Health));
        assert_eq!(router.domain_for("ome.firmware"), None);
    }

    #[test]
    fn unrecognized_subjects_get_no_route() {
        let router = TopicRouter::new(
            Arc::new(MockEventSink::new()),
            &subjects(&["ome.firmware"]),
            1,
        );
        assert_eq!(router.domain_for("ome.firmware"), None);
    }

    #[tokio::test]
    async fn telemetry_payload_reaches_the_sink() {
        let mut sink = MockEventSink::new();
        sink.expect_insert_metrics()
            .withf(|points| points.len() == 1 && points[0].device_id == "SVCTAG1")
            .times(1)
            .return_once(|_| Ok(()));

        let payload = json!({
            "Identifier": "SVCTAG1",
            "Metric": [{
                "MetricId": "PSU.AmpsReading.Average.5.Interval",
                "TimeStamp": ["20260201T183500Z"],
                "MetricValue": ["0.8"]
            }]
        });

        router_with(sink)
            .dispatch("ome.telemetry", payload.to_string().as_bytes())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_telemetry_payload_is_not_inserted() {
        let mut sink = MockEventSink::new();
        sink.expect_insert_metrics().times(0);

        router_with(sink)
            .dispatch("ome.telemetry", b"{\"Identifier\": \"SVCTAG1\"}")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn alert_is_normalized_before_insert() {
        let mut sink = MockEventSink::new();
        sink.expect_insert_alert()
            .withf(|alert| alert.severity == "warning" && alert.alert_id.as_deref() == Some("A1"))
            .times(1)
            .return_once(|_| Ok(()));

        let payload = json!({"Data": [{"Severity": 8, "AlertIdentifier": "A1"}]});
        router_with(sink)
            .dispatch("ome.alerts", payload.to_string().as_bytes())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn health_is_normalized_before_insert() {
        let mut sink = MockEventSink::new();
        sink.expect_insert_health()
            .withf(|health| health.device_id == "D1" && health.health_value == 2000)
            .times(1)
            .return_once(|_| Ok(()));

        let payload = json!({"DeviceId": "D1", "Status": "Warning"});
        router_with(sink)
            .dispatch("ome.health", payload.to_string().as_bytes())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn malformed_body_is_a_decode_error() {
        let router = router_with(MockEventSink::new());
        let result = router.dispatch("ome.alerts", b"{not json").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unrouted_subject_is_skipped_without_decoding() {
        let router = router_with(MockEventSink::new());
        // Malformed payload on an unrouted subject: still fine, never decoded.
        router.dispatch("ome.firmware", b"{not json").await.unwrap();
    }

    #[tokio::test]
    async fn sink_failure_surfaces_as_dispatch_error() {
        let mut sink = MockEventSink::new();
        sink.expect_insert_health()
            .times(1)
            .return_once(|_| Err(anyhow::anyhow!("connection reset")));

        let result = router_with(sink)
            .dispatch("ome.health", b"{\"DeviceId\": \"D1\"}")
            .await;
        assert!(result.is_err());
    }
}
