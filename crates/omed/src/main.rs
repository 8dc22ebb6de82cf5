mod config;

use anyhow::Context as _;
use common::{init_telemetry, NatsClient, TelemetryConfig};
use ingest_worker::{IngestWorker, IngestWorkerConfig, SamplerConfig, StoreConfig, TimescaleStore};
use ome_runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match config::ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_telemetry(&TelemetryConfig {
        service_name: "omed".to_string(),
        log_level: config.log_level.clone(),
    });

    info!("Starting OME event ingestion service");

    if let Err(e) = run(config).await {
        error!(error = ?e, "Service failed");
        std::process::exit(1);
    }
}

async fn run(config: config::ServiceConfig) -> anyhow::Result<()> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);
    let topics = config.topics();
    anyhow::ensure!(!topics.is_empty(), "no topics configured");

    let store = tokio::time::timeout(
        startup_timeout,
        TimescaleStore::connect(&StoreConfig {
            host: config.timescaledb_host.clone(),
            port: config.timescaledb_port,
            database: config.timescaledb_database.clone(),
            username: config.timescaledb_username.clone(),
            password: config.timescaledb_password.clone(),
            pool_size: config.timescaledb_pool_size,
        }),
    )
    .await
    .context("timed out connecting to TimescaleDB")??;
    let store = Arc::new(store);

    let nats = NatsClient::connect(&config.nats_url, startup_timeout).await?;
    nats.ensure_stream(&config.nats_stream, &topics).await?;

    let worker = IngestWorker::new(
        nats.jetstream(),
        store,
        &IngestWorkerConfig {
            stream_name: config.nats_stream.clone(),
            consumer_name: config.nats_consumer.clone(),
            subjects: topics,
            batch_size: config.nats_batch_size,
            max_wait_secs: config.nats_batch_wait_secs,
            alert_min_severity: config.alert_min_severity,
            sampler: SamplerConfig {
                interval: Duration::from_secs(config.sample_interval_secs),
                limit: config.sample_limit,
            },
        },
    )
    .await?;

    let mut runner = Runner::new().with_closer_timeout(Duration::from_secs(10));
    for (name, process) in worker.into_runner_processes() {
        runner = runner.with_boxed_process(name, process);
    }
    runner = runner.with_closer(move || {
        Box::pin(async move {
            nats.close().await;
            Ok(())
        })
    });

    runner.run().await
}
