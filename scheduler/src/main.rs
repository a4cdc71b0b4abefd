// Scheduler binary entry point: one build/solve cycle over a stored pool

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use common::config::Settings;
use common::cp::PumpkinSolver;
use common::scheduler::{Scheduler, SolveReport};
use common::storage::{JsonFilePoolStore, PoolRepository};
use common::telemetry;
use common::time::retain_date;
use serde_json::{json, Value};
use tracing::{error, info};

fn main() -> Result<()> {
    let settings = Settings::load().context("Failed to load configuration")?;
    telemetry::init_logging(&settings.observability.log_level)?;
    telemetry::describe_metrics();

    info!("Starting Cadence scheduler run");

    settings.validate().map_err(|e| {
        error!(error = %e, "Invalid configuration");
        anyhow::anyhow!(e)
    })?;
    let display_tz = settings.display_tz().map_err(anyhow::Error::msg)?;

    info!(
        pool_id = settings.run.pool_id,
        pool_dir = %settings.storage.pool_dir.display(),
        unit_length_seconds = settings.scheduler.unit_length_seconds,
        "Configuration loaded"
    );

    let store = JsonFilePoolStore::new(&settings.storage.pool_dir);
    let pool_id = settings.run.pool_id;
    let pool = store
        .load_or_create(pool_id)
        .with_context(|| format!("Failed to load task pool {}", pool_id))?;

    let window_start = match settings.window_start().map_err(anyhow::Error::msg)? {
        Some(start) => start,
        None => retain_date(Utc::now().with_timezone(&display_tz).fixed_offset())
            .context("Failed to compute the start of the current day")?,
    };
    let window_end = window_start
        .checked_add_signed(settings.window_length())
        .context("Scheduling window end is out of range")?;

    let mut scheduler = Scheduler::new(PumpkinSolver::new(), settings.solve_options());
    if let Err(e) = scheduler.build(pool, (window_start, window_end), settings.unit_length()) {
        error!(error = %e, "Failed to build scheduling model");
        return Err(e.into());
    }
    let report = scheduler.solve()?;

    if let Some(pool) = scheduler.pool() {
        store
            .save(pool_id, pool)
            .with_context(|| format!("Failed to save task pool {}", pool_id))?;
    }

    let rendered = render_report(&report, &display_tz, (window_start, window_end));
    println!("{}", serde_json::to_string_pretty(&rendered)?);

    info!(status = %report.status, "Scheduler run finished");
    Ok(())
}

fn render_time<O: chrono::TimeZone>(time: Option<DateTime<O>>, tz: &Tz) -> Value {
    time.map(|t| Value::String(t.with_timezone(tz).to_rfc3339()))
        .unwrap_or(Value::Null)
}

/// Report JSON with every timestamp shown in the display time zone
fn render_report<O: chrono::TimeZone>(
    report: &SolveReport,
    tz: &Tz,
    window: (DateTime<O>, DateTime<O>),
) -> Value {
    let tasks: Vec<Value> = report
        .intervals
        .iter()
        .map(|(task_id, intervals)| {
            let intervals: Vec<Value> = intervals
                .iter()
                .map(|interval| {
                    json!({
                        "id": interval.id,
                        "name": interval.name,
                        "mandatory": interval.mandatory,
                        "priority": interval.priority,
                        "scheduled": interval.is_scheduled(),
                        "start": render_time(interval.actual_interval.start(), tz),
                        "end": render_time(interval.actual_interval.end(), tz),
                    })
                })
                .collect();
            json!({ "task_id": task_id, "intervals": intervals })
        })
        .collect();

    json!({
        "status": report.status,
        "objective": report.objective,
        "scheduled": report.scheduled,
        "unscheduled": report.unscheduled,
        "elapsed_ms": report.elapsed_ms,
        "window_start": render_time(Some(window.0), tz),
        "window_end": render_time(Some(window.1), tz),
        "tasks": tasks,
    })
}
