//! Process runner for long-lived ingestion tasks with graceful shutdown.
//!
//! The runner owns a set of named processes (consumer loops, samplers) plus a
//! set of closers. Processes run concurrently until one fails or a shutdown
//! signal (SIGINT/SIGTERM) arrives; closers then execute under a bounded
//! timeout regardless of how the processes stopped.
//!
//! # Example
//!
//! ```no_run
//! use ome_runner::Runner;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     Runner::new()
//!         .with_process("heartbeat", |ctx| async move {
//!             loop {
//!                 tokio::select! {
//!                     _ = ctx.cancelled() => break,
//!                     _ = tokio::time::sleep(Duration::from_secs(1)) => {}
//!                 }
//!             }
//!             Ok(())
//!         })
//!         .with_closer(|| async move { Ok(()) })
//!         .with_closer_timeout(Duration::from_secs(5))
//!         .run()
//!         .await;
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

type ProcessFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// A long-running process: receives a cancellation token, runs until told to
/// stop, and reports its outcome.
pub type Process = Box<dyn FnOnce(CancellationToken) -> ProcessFuture + Send>;

/// A cleanup function executed after all processes have stopped.
pub type Closer = Box<dyn FnOnce() -> ProcessFuture + Send>;

pub struct Runner {
    processes: Vec<(String, Process)>,
    closers: Vec<Closer>,
    closer_timeout: Duration,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
            closers: Vec::new(),
            closer_timeout: Duration::from_secs(10),
        }
    }

    /// Adds a named process. The name only appears in logs.
    pub fn with_process<F, Fut>(mut self, name: impl Into<String>, process: F) -> Self
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.processes
            .push((name.into(), Box::new(|token| Box::pin(process(token)))));
        self
    }

    /// Adds a pre-boxed process, for callers that build their process list
    /// dynamically.
    pub fn with_boxed_process(mut self, name: impl Into<String>, process: Process) -> Self {
        self.processes.push((name.into(), process));
        self
    }

    /// Adds a closer. Closers run concurrently after all processes stop and
    /// every closer is attempted even if some fail.
    pub fn with_closer<F, Fut>(mut self, closer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.closers.push(Box::new(|| Box::pin(closer())));
        self
    }

    pub fn with_closer_timeout(mut self, timeout: Duration) -> Self {
        self.closer_timeout = timeout;
        self
    }

    /// Runs every process to completion or cancellation, then the closers.
    ///
    /// Returns the first process error, if any. SIGINT and SIGTERM cancel all
    /// processes; a process error cancels the rest.
    pub async fn run(self) -> anyhow::Result<()> {
        let token = CancellationToken::new();
        let mut join_set = JoinSet::new();

        for (name, process) in self.processes {
            let process_token = token.clone();
            join_set.spawn(async move {
                let result = process(process_token).await;
                (name, result)
            });
        }

        spawn_signal_handlers(token.clone());

        let mut first_error: Option<anyhow::Error> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(()))) => {
                    tracing::debug!(process = %name, "Process completed");
                }
                Ok((name, Err(err))) => {
                    if first_error.is_none() && !token.is_cancelled() {
                        tracing::error!(process = %name, error = %format!("{err:#}"), "Process failed, shutting down");
                        first_error = Some(err);
                    } else {
                        tracing::error!(process = %name, error = %format!("{err:#}"), "Process failed during shutdown");
                    }
                    token.cancel();
                }
                Err(err) => {
                    tracing::error!(error = %err, "Process panicked");
                    token.cancel();
                }
            }
            if token.is_cancelled() {
                break;
            }
        }

        // Cancel and drain whatever is still running.
        token.cancel();
        join_set.shutdown().await;

        if !self.closers.is_empty() {
            tracing::info!(timeout = ?self.closer_timeout, "Running closers");
            if tokio::time::timeout(self.closer_timeout, run_closers(self.closers))
                .await
                .is_err()
            {
                tracing::error!(timeout = ?self.closer_timeout, "Closers timed out");
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn spawn_signal_handlers(token: CancellationToken) {
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Received interrupt, shutting down");
                ctrl_c_token.cancel();
            }
            Err(err) => tracing::error!(error = %err, "Failed to install SIGINT handler"),
        }
    });

    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM, shutting down");
                token.cancel();
            }
            Err(err) => tracing::error!(error = %err, "Failed to install SIGTERM handler"),
        }
    });
}

async fn run_closers(closers: Vec<Closer>) {
    let mut closer_set = JoinSet::new();
    for closer in closers {
        closer_set.spawn(closer());
    }
    while let Some(result) = closer_set.join_next().await {
        match result {
            Ok(Ok(())) => tracing::debug!("Closer completed"),
            Ok(Err(err)) => tracing::error!(error = %format!("{err:#}"), "Closer failed"),
            Err(err) => tracing::error!(error = %err, "Closer panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn completed_processes_trigger_closers() {
        let closed = Arc::new(AtomicBool::new(false));
        let closed_flag = closed.clone();

        let result = Runner::new()
            .with_process("noop", |_ctx| async move { Ok(()) })
            .with_closer(move || async move {
                closed_flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .run()
            .await;

        assert!(result.is_ok());
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failing_process_cancels_siblings_and_reports_error() {
        let sibling_stopped = Arc::new(AtomicBool::new(false));
        let sibling_flag = sibling_stopped.clone();

        let result = Runner::new()
            .with_process("failing", |_ctx| async move {
                Err(anyhow::anyhow!("broker connection lost"))
            })
            .with_process("sibling", move |ctx| async move {
                ctx.cancelled().await;
                sibling_flag.store(true, Ordering::SeqCst);
                Ok(())
            })
            .run()
            .await;

        assert!(result.is_err());
        assert!(sibling_stopped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn all_closers_run_even_when_one_fails() {
        let ran = Arc::new(AtomicUsize::new(0));
        let first = ran.clone();
        let second = ran.clone();

        let result = Runner::new()
            .with_process("noop", |_ctx| async move { Ok(()) })
            .with_closer(move || async move {
                first.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("close failed"))
            })
            .with_closer(move || async move {
                second.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .run()
            .await;

        assert!(result.is_ok());
        assert_eq!(ran.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn slow_closer_is_bounded_by_timeout() {
        let start = std::time::Instant::now();
        let result = Runner::new()
            .with_process("noop", |_ctx| async move { Ok(()) })
            .with_closer(|| async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .with_closer_timeout(Duration::from_millis(100))
            .run()
            .await;

        assert!(result.is_ok());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
