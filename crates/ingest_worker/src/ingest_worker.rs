use crate::domain::EventSink;
use crate::nats::{create_ingest_processor, TopicRouter};
use crate::timescale::{run_sampler, SamplerConfig, TimescaleStore};
use common::NatsConsumer;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct IngestWorkerConfig {
    pub stream_name: String,
    pub consumer_name: String,
    pub subjects: Vec<String>,
    pub batch_size: usize,
    pub max_wait_secs: u64,
    pub alert_min_severity: i64,
    pub sampler: SamplerConfig,
}

/// Wires the consumer loop and the metrics sampler into runnable processes.
///
/// The worker owns no lifecycle of its own; both loops run under the
/// process runner and stop on its cancellation token.
pub struct IngestWorker {
    consumer: NatsConsumer,
    store: Arc<TimescaleStore>,
    sampler: SamplerConfig,
}

impl IngestWorker {
    pub async fn new(
        jetstream: &async_nats::jetstream::Context,
        store: Arc<TimescaleStore>,
        config: &IngestWorkerConfig,
    ) -> anyhow::Result<Self> {
        let sink: Arc<dyn EventSink> = store.clone();
        let router = Arc::new(TopicRouter::new(
            sink,
            &config.subjects,
            config.alert_min_severity,
        ));

        let consumer = NatsConsumer::new(
            jetstream,
            &config.stream_name,
            &config.consumer_name,
            "",
            config.batch_size,
            config.max_wait_secs,
            create_ingest_processor(router),
        )
        .await?;

        info!(
            stream = %config.stream_name,
            consumer = %config.consumer_name,
            subjects = ?config.subjects,
            "Ingest worker initialized"
        );

        Ok(Self {
            consumer,
            store,
            sampler: config.sampler.clone(),
        })
    }

    /// Hands ownership of both loops to the runner as named processes.
    pub fn into_runner_processes(self) -> Vec<(&'static str, ome_runner::Process)> {
        let Self {
            consumer,
            store,
            sampler,
        } = self;

        let consumer_process: ome_runner::Process =
            Box::new(move |ctx| Box::pin(async move { consumer.run(ctx).await }));

        let sampler_process: ome_runner::Process =
            Box::new(move |ctx| Box::pin(run_sampler(store, sampler, ctx)));

        vec![
            ("event-consumer", consumer_process),
            ("metrics-sampler", sampler_process),
        ]
    }
}
