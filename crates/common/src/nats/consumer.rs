use anyhow::{Context, Result};
use async_nats::jetstream::{self, consumer::PullConsumer, Message};
use futures::{future::BoxFuture, StreamExt};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcome of processing one fetched batch.
///
/// Messages listed in `ack` were handled and are acknowledged. Messages in
/// `term` could not be handled and are terminated: the server drops them
/// without redelivery. There is no Nak path; this pipeline has no retry
/// semantics, a message is either written or lost.
#[derive(Debug, Default)]
pub struct ProcessingResult {
    pub ack: Vec<usize>,
    pub term: Vec<(usize, Option<String>)>,
}

impl ProcessingResult {
    pub fn term_all(count: usize, reason: Option<String>) -> Self {
        Self {
            ack: Vec::new(),
            term: (0..count).map(|i| (i, reason.clone())).collect(),
        }
    }
}

/// Batch handler invoked by [`NatsConsumer`]. Deserialization and routing
/// live behind this boundary; the consumer only moves messages and acks.
pub type BatchProcessor =
    Box<dyn Fn(&[Message]) -> BoxFuture<'static, Result<ProcessingResult>> + Send + Sync>;

/// Durable JetStream pull consumer running a sequential fetch-and-dispatch
/// loop. One message batch is fully processed before the next fetch; slow
/// downstream writes therefore throttle consumption naturally.
pub struct NatsConsumer {
    consumer: PullConsumer,
    stream_name: String,
    batch_size: usize,
    max_wait: Duration,
    processor: BatchProcessor,
}

impl NatsConsumer {
    pub async fn new(
        jetstream: &jetstream::Context,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        processor: BatchProcessor,
    ) -> Result<Self> {
        debug!(
            stream = stream_name,
            consumer = consumer_name,
            subject = subject_filter,
            "Creating JetStream consumer"
        );

        let consumer = jetstream
            .create_consumer_on_stream(
                jetstream::consumer::pull::Config {
                    name: Some(consumer_name.to_string()),
                    durable_name: Some(consumer_name.to_string()),
                    filter_subject: subject_filter.to_string(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
                stream_name,
            )
            .await
            .context("failed to create consumer")?;

        info!(
            stream = stream_name,
            consumer = consumer_name,
            "Consumer created"
        );

        Ok(Self {
            consumer,
            stream_name: stream_name.to_string(),
            batch_size,
            max_wait: Duration::from_secs(max_wait_secs),
            processor,
        })
    }

    /// Runs the poll loop until cancellation.
    ///
    /// An empty fetch is normal and the loop continues; a broker-level fetch
    /// failure is unrecoverable for this run and stops the consumer with an
    /// error. Per-message handling failures never reach this level.
    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!(stream = %self.stream_name, "Starting consumer loop");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!(stream = %self.stream_name, "Received shutdown signal, stopping consumer");
                    break;
                }
                result = self.fetch_and_process_batch() => {
                    result.context("broker error in consumer loop")?;
                }
            }
        }

        info!(stream = %self.stream_name, "Consumer stopped");
        Ok(())
    }

    async fn fetch_and_process_batch(&self) -> Result<()> {
        let mut messages = self
            .consumer
            .fetch()
            .max_messages(self.batch_size)
            .expires(self.max_wait)
            .messages()
            .await
            .context("failed to fetch messages")?;

        let mut raw_messages = Vec::new();
        while let Some(result) = messages.next().await {
            match result {
                Ok(msg) => raw_messages.push(msg),
                Err(e) => {
                    // A stream hiccup on one message; the rest of the batch
                    // is still usable.
                    warn!(error = %e, "Error receiving message from batch");
                }
            }
        }

        if raw_messages.is_empty() {
            return Ok(());
        }

        debug!(message_count = raw_messages.len(), "Received message batch");

        let processing_result = match (self.processor)(&raw_messages).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Processor returned error, terminating batch");
                ProcessingResult::term_all(raw_messages.len(), Some(e.to_string()))
            }
        };

        for idx in processing_result.ack {
            match raw_messages.get(idx) {
                Some(msg) => {
                    if let Err(e) = msg.ack().await {
                        error!(error = %e, message_index = idx, "Failed to acknowledge message");
                    }
                }
                None => warn!(message_index = idx, "Invalid ack index in ProcessingResult"),
            }
        }

        for (idx, reason) in processing_result.term {
            let Some(msg) = raw_messages.get(idx) else {
                warn!(message_index = idx, "Invalid term index in ProcessingResult");
                continue;
            };
            if let Some(ref r) = reason {
                warn!(subject = %msg.subject, reason = %r, "Dropping unprocessable message");
            } else {
                warn!(subject = %msg.subject, "Dropping unprocessable message");
            }
            if let Err(e) = msg.ack_with(jetstream::AckKind::Term).await {
                error!(error = %e, message_index = idx, "Failed to terminate message");
            }
        }

        Ok(())
    }
}
