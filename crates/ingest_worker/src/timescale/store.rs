use crate::domain::{AlertEvent, EventSink, HealthStatus, MetricPoint};
use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ensure_database, PostgresClient};
use serde_json::Value;
use std::fmt::Write as _;
use thiserror::Error;
use tokio_postgres::types::ToSql;
use tracing::{debug, info, instrument};

/// Rows per multi-row INSERT statement. Six parameters per row keeps even a
/// full chunk well under the postgres wire limit of 65535 bind parameters.
const INSERT_CHUNK_ROWS: usize = 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection error: {0}")]
    Connection(anyhow::Error),

    #[error("database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("tag serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub pool_size: usize,
}

/// TimescaleDB-backed event store.
///
/// Owns the connection pool and the schema: `connect` bootstraps the target
/// database, verifies connectivity, and provisions tables, hypertables, and
/// indexes — every step idempotent so the process can restart freely.
pub struct TimescaleStore {
    client: PostgresClient,
}

/// One row of diagnostic output for the background sampler.
#[derive(Debug, Clone)]
pub struct RecentMetric {
    pub time: DateTime<Utc>,
    pub device_id: String,
    pub metric_id: String,
    pub value: Option<f64>,
}

impl TimescaleStore {
    /// Connects and prepares the database. Failures here are fatal for
    /// startup; there is no degraded mode without storage.
    pub async fn connect(cfg: &StoreConfig) -> anyhow::Result<Self> {
        info!(
            host = %cfg.host,
            port = cfg.port,
            database = %cfg.database,
            "Connecting to TimescaleDB"
        );

        ensure_database(&cfg.host, cfg.port, &cfg.database, &cfg.username, &cfg.password)
            .await
            .context("database bootstrap failed")?;

        let client = PostgresClient::new(
            &cfg.host,
            cfg.port,
            &cfg.database,
            &cfg.username,
            &cfg.password,
            cfg.pool_size,
        )?;
        client.ping().await.context("database ping failed")?;

        let store = Self { client };
        store
            .provision_schema()
            .await
            .context("schema provisioning failed")?;

        info!(database = %cfg.database, "TimescaleDB ready");
        Ok(store)
    }

    /// Creates the extension, tables, hypertables, and indexes. Every
    /// statement is guarded so re-running at each process start is safe.
    async fn provision_schema(&self) -> StoreResult<()> {
        let conn = self.conn().await?;

        conn.batch_execute("CREATE EXTENSION IF NOT EXISTS timescaledb CASCADE;")
            .await?;

        conn.batch_execute(
            "CREATE TABLE IF NOT EXISTS metrics (
                time TIMESTAMPTZ NOT NULL,
                device_id TEXT NOT NULL,
                metric_id TEXT NOT NULL,
                component_id TEXT,
                value DOUBLE PRECISION,
                tags JSONB
            );
            CREATE TABLE IF NOT EXISTS alerts (
                time TIMESTAMPTZ NOT NULL,
                device_id TEXT,
                alert_id TEXT,
                severity TEXT,
                message TEXT,
                category TEXT,
                details JSONB
            );
            CREATE TABLE IF NOT EXISTS health (
                time TIMESTAMPTZ NOT NULL,
                device_id TEXT NOT NULL,
                health_status TEXT,
                health_value INTEGER,
                details JSONB
            );",
        )
        .await?;

        for table in ["metrics", "alerts", "health"] {
            self.ensure_hypertable(&conn, table).await?;
        }

        conn.batch_execute(
            "CREATE INDEX IF NOT EXISTS idx_metrics_device_id
                ON metrics (device_id, time DESC);
            CREATE INDEX IF NOT EXISTS idx_metrics_metric_id
                ON metrics (metric_id, time DESC);
            CREATE INDEX IF NOT EXISTS idx_metrics_component_id
                ON metrics (component_id, time DESC) WHERE component_id IS NOT NULL;",
        )
        .await?;

        debug!("Schema provisioning complete");
        Ok(())
    }

    async fn ensure_hypertable(
        &self,
        conn: &deadpool_postgres::Client,
        table: &str,
    ) -> StoreResult<()> {
        let already = conn
            .query_opt(
                "SELECT 1 FROM timescaledb_information.hypertables
                 WHERE hypertable_name = $1",
                &[&table],
            )
            .await?
            .is_some();

        if !already {
            // Table names come from the fixed list above, never from input.
            let convert = format!(
                "SELECT create_hypertable('{table}', 'time',
                                          if_not_exists => TRUE,
                                          migrate_data => TRUE);"
            );
            conn.batch_execute(&convert).await?;
            info!(table = %table, "Created hypertable");
        }

        Ok(())
    }

    /// Batched multi-row insert in one transaction. Empty input performs no
    /// database operation at all. Any failure rolls back the whole call;
    /// partial success within a batch does not exist.
    #[instrument(skip(self, points), fields(count = points.len()))]
    pub async fn insert_metrics(&self, points: &[MetricPoint]) -> StoreResult<()> {
        if points.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn().await?;
        let tx = conn.transaction().await?;

        for chunk in points.chunks(INSERT_CHUNK_ROWS) {
            let tags: Vec<Value> = chunk
                .iter()
                .map(|p| serde_json::to_value(&p.tags))
                .collect::<Result<_, _>>()?;

            let sql = metrics_insert_statement(chunk.len());
            let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(chunk.len() * 6);
            for (point, tag) in chunk.iter().zip(tags.iter()) {
                params.push(&point.time);
                params.push(&point.device_id);
                params.push(&point.metric_id);
                params.push(&point.component_id);
                params.push(&point.value);
                params.push(tag);
            }

            tx.execute(sql.as_str(), &params).await?;
        }

        tx.commit().await?;
        debug!(count = points.len(), "Inserted metrics");
        Ok(())
    }

    pub async fn insert_alert(&self, alert: &AlertEvent) -> StoreResult<()> {
        let conn = self.conn().await?;
        let time = alert.time.unwrap_or_else(Utc::now);
        let details = Value::Object(alert.details.clone());

        conn.execute(
            "INSERT INTO alerts (time, device_id, alert_id, severity, message, category, details)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &time,
                &alert.device_id,
                &alert.alert_id,
                &alert.severity,
                &alert.message,
                &alert.category,
                &details,
            ],
        )
        .await?;

        debug!(alert_id = ?alert.alert_id, "Inserted alert");
        Ok(())
    }

    pub async fn insert_health(&self, health: &HealthStatus) -> StoreResult<()> {
        let conn = self.conn().await?;
        let details = Value::Object(health.details.clone());

        conn.execute(
            "INSERT INTO health (time, device_id, health_status, health_value, details)
             VALUES ($1, $2, $3, $4, $5)",
            &[
                &health.time,
                &health.device_id,
                &health.health_status,
                &health.health_value,
                &details,
            ],
        )
        .await?;

        debug!(device_id = %health.device_id, "Inserted health status");
        Ok(())
    }

    /// Most recent metric rows, newest first. Read-only; used by the
    /// background sampler, never by the write path.
    pub async fn recent_metrics(&self, limit: i64) -> StoreResult<Vec<RecentMetric>> {
        let conn = self.conn().await?;
        let rows = conn
            .query(
                "SELECT time, device_id, metric_id, value
                 FROM metrics
                 ORDER BY time DESC
                 LIMIT $1",
                &[&limit],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| RecentMetric {
                time: row.get(0),
                device_id: row.get(1),
                metric_id: row.get(2),
                value: row.get(3),
            })
            .collect())
    }

    async fn conn(&self) -> StoreResult<deadpool_postgres::Client> {
        self.client.get_connection().await.map_err(StoreError::Connection)
    }
}

#[async_trait]
impl EventSink for TimescaleStore {
    async fn insert_metrics(&self, points: Vec<MetricPoint>) -> anyhow::Result<()> {
        TimescaleStore::insert_metrics(self, &points).await?;
        Ok(())
    }

    async fn insert_alert(&self, event: AlertEvent) -> anyhow::Result<()> {
        TimescaleStore::insert_alert(self, &event).await?;
        Ok(())
    }

    async fn insert_health(&self, status: HealthStatus) -> anyhow::Result<()> {
        TimescaleStore::insert_health(self, &status).await?;
        Ok(())
    }
}

/// Builds the placeholder list for a multi-row metrics insert.
fn metrics_insert_statement(rows: usize) -> String {
    let mut sql = String::from(
        "INSERT INTO metrics (time, device_id, metric_id, component_id, value, tags) VALUES ",
    );
    for row in 0..rows {
        if row > 0 {
            sql.push_str(", ");
        }
        let base = row * 6;
        let _ = write!(
            sql,
            "(${}, ${}, ${}, ${}, ${}, ${})",
            base + 1,
            base + 2,
            base + 3,
            base + 4,
            base + 5,
            base + 6
        );
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_row_statement_numbers_from_one() {
        let sql = metrics_insert_statement(1);
        assert!(sql.ends_with("($1, $2, $3, $4, $5, $6)"));
    }

    #[test]
    fn multi_row_statement_numbers_continuously() {
        let sql = metrics_insert_statement(3);
        assert!(sql.contains("($1, $2, $3, $4, $5, $6)"));
        assert!(sql.contains("($7, $8, $9, $10, $11, $12)"));
        assert!(sql.ends_with("($13, $14, $15, $16, $17, $18)"));
    }

    #[tokio::test]
    async fn empty_metrics_insert_is_a_no_op() {
        // The pool is lazy: as long as no rows need writing, no connection
        // is ever drawn, so this passes without a running database.
        let store = TimescaleStore {
            client: PostgresClient::new("localhost", 5432, "none", "none", "none", 1).unwrap(),
        };
        store.insert_metrics(&[]).await.unwrap();
    }
}
