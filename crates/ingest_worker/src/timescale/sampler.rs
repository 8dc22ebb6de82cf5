use crate::timescale::{RecentMetric, TimescaleStore};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub interval: Duration,
    pub limit: i64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            limit: 5,
        }
    }
}

/// Periodically logs the newest metric rows as a rendered table at debug
/// verbosity; at the default level the sampler stays quiet.
///
/// Query failures are logged and the loop keeps going; only cancellation
/// ends it. The sampler draws its own pooled connection on each tick, so a
/// slow query never blocks the ingest path.
pub async fn run_sampler(
    store: Arc<TimescaleStore>,
    config: SamplerConfig,
    ctx: CancellationToken,
) -> anyhow::Result<()> {
    info!(
        interval_secs = config.interval.as_secs(),
        limit = config.limit,
        "Starting metrics sampler"
    );

    loop {
        tokio::select! {
            _ = ctx.cancelled() => {
                info!("Metrics sampler shutting down");
                return Ok(());
            }
            _ = tokio::time::sleep(config.interval) => {
                match store.recent_metrics(config.limit).await {
                    Ok(rows) => log_sample(&rows),
                    Err(err) => {
                        warn!(error = %err, "Metrics sample query failed");
                    }
                }
            }
        }
    }
}

/// Emits one sample observation. Diagnostic output only, so both the empty
/// notice and the table go out at debug.
fn log_sample(rows: &[RecentMetric]) {
    if rows.is_empty() {
        debug!("No metrics recorded yet");
    } else {
        debug!("Recent metrics:\n{}", render_metrics_table(rows));
    }
}

/// Renders rows as an ASCII table with columns sized to their content.
fn render_metrics_table(rows: &[RecentMetric]) -> String {
    let headers = ["time", "device_id", "metric_id", "value"];
    let cells: Vec<[String; 4]> = rows
        .iter()
        .map(|r| {
            [
                r.time.format("%Y-%m-%d %H:%M:%S").to_string(),
                r.device_id.clone(),
                r.metric_id.clone(),
                r.value.map_or_else(|| "-".to_string(), |v| format!("{v}")),
            ]
        })
        .collect();

    let mut widths: [usize; 4] = [0; 4];
    for (i, header) in headers.iter().enumerate() {
        widths[i] = header.len();
    }
    for row in &cells {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let mut border = String::from("+");
    for width in widths {
        let _ = write!(border, "{}+", "-".repeat(width + 2));
    }

    let render_row = |cols: &[String; 4]| {
        let mut line = String::from("|");
        for (i, cell) in cols.iter().enumerate() {
            let _ = write!(line, " {:<width$} |", cell, width = widths[i]);
        }
        line
    };

    let header_row: [String; 4] = headers.map(str::to_string);
    let mut out = String::new();
    let _ = writeln!(out, "{border}");
    let _ = writeln!(out, "{}", render_row(&header_row));
    let _ = writeln!(out, "{border}");
    for row in &cells {
        let _ = writeln!(out, "{}", render_row(row));
    }
    let _ = write!(out, "{border}");
    out
}
