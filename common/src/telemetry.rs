// Telemetry module for structured logging and solve metrics

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const SOLVE_TOTAL: &str = "cadence_solve_total";
pub const SOLVE_DURATION_SECONDS: &str = "cadence_solve_duration_seconds";
pub const SCHEDULED_INTERVALS: &str = "cadence_scheduled_intervals";

/// Initialize structured logging with JSON formatting
///
/// `RUST_LOG` takes precedence over `log_level`. Fails when a global
/// subscriber is already installed.
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(
        log_level = log_level,
        "Structured logging initialized with JSON formatting"
    );

    Ok(())
}

/// Register metric descriptions with whatever recorder is installed
pub fn describe_metrics() {
    describe_counter!(SOLVE_TOTAL, "Total number of solver invocations by status");
    describe_histogram!(
        SOLVE_DURATION_SECONDS,
        "Wall time spent inside the constraint solver in seconds"
    );
    describe_gauge!(
        SCHEDULED_INTERVALS,
        "Number of intervals placed by the most recent solve"
    );
}

/// Record the outcome of one solve
#[inline]
pub fn record_solve(status: &str, duration_seconds: f64, scheduled: usize) {
    counter!(SOLVE_TOTAL, "status" => status.to_string()).increment(1);
    histogram!(SOLVE_DURATION_SECONDS).record(duration_seconds);
    gauge!(SCHEDULED_INTERVALS).set(scheduled as f64);
}
