use crate::domain::{AlertEvent, HealthStatus, MetricPoint};
use async_trait::async_trait;

/// Write seam between the topic router and storage.
///
/// Implemented by the Timescale store; mocked in router tests. Insert calls
/// are synchronous from the router's point of view: the poll loop does not
/// advance until the write completes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Batched metric insert; all-or-nothing per call. Empty input is a no-op.
    async fn insert_metrics(&self, points: Vec<MetricPoint>) -> anyhow::Result<()>;

    async fn insert_alert(&self, event: AlertEvent) -> anyhow::Result<()>;

    async fn insert_health(&self, status: HealthStatus) -> anyhow::Result<()>;
}
