use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// NATS JetStream stream name
    #[serde(default = "default_nats_stream")]
    pub nats_stream: String,

    /// Comma-separated list of subjects bound to the stream
    #[serde(default = "default_nats_topics")]
    pub nats_topics: String,

    /// Durable consumer name
    #[serde(default = "default_nats_consumer")]
    pub nats_consumer: String,

    /// Batch size for consumer fetches
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    // TimescaleDB configuration
    #[serde(default = "default_timescaledb_host")]
    pub timescaledb_host: String,

    #[serde(default = "default_timescaledb_port")]
    pub timescaledb_port: u16,

    #[serde(default = "default_timescaledb_database")]
    pub timescaledb_database: String,

    #[serde(default = "default_timescaledb_username")]
    pub timescaledb_username: String,

    #[serde(default = "default_timescaledb_password")]
    pub timescaledb_password: String,

    /// Maximum pooled connections
    #[serde(default = "default_timescaledb_pool_size")]
    pub timescaledb_pool_size: usize,

    /// Alerts below this numeric severity are flagged at debug level
    #[serde(default = "default_alert_min_severity")]
    pub alert_min_severity: i64,

    /// Interval between metric sample dumps in seconds
    #[serde(default = "default_sample_interval_secs")]
    pub sample_interval_secs: u64,

    /// Rows per metric sample dump
    #[serde(default = "default_sample_limit")]
    pub sample_limit: i64,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_nats_stream() -> String {
    "ome".to_string()
}

fn default_nats_topics() -> String {
    "ome.telemetry,ome.alerts,ome.health".to_string()
}

fn default_nats_consumer() -> String {
    "omed-ingest".to_string()
}

fn default_nats_batch_size() -> usize {
    30
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

// TimescaleDB defaults
fn default_timescaledb_host() -> String {
    "localhost".to_string()
}

fn default_timescaledb_port() -> u16 {
    5432
}

fn default_timescaledb_database() -> String {
    "ome_events".to_string()
}

fn default_timescaledb_username() -> String {
    "postgres".to_string()
}

fn default_timescaledb_password() -> String {
    "postgres".to_string()
}

fn default_timescaledb_pool_size() -> usize {
    10
}

fn default_alert_min_severity() -> i64 {
    1
}

fn default_sample_interval_secs() -> u64 {
    30
}

fn default_sample_limit() -> i64 {
    5
}

fn default_startup_timeout_secs() -> u64 {
    30
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("OMED"))
            .build()?
            .try_deserialize()
    }

    /// Splits the topic list, dropping empty entries.
    pub fn topics(&self) -> Vec<String> {
        self.nats_topics
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
