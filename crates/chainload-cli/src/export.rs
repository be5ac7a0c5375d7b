//! Report export: JSON and Prometheus text exposition

use anyhow::{Context, Result};
use chainload_engine::RunStats;
use prometheus::{Encoder, Gauge, GaugeVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder};
use std::path::Path;
use tracing::info;

/// Write the statistics as pretty-printed JSON
pub fn write_json(stats: &RunStats, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(stats)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote JSON report");
    Ok(())
}

/// Write the statistics in the Prometheus text format
pub fn write_prometheus(stats: &RunStats, path: &Path) -> Result<()> {
    let text = render_prometheus(stats)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote Prometheus report");
    Ok(())
}

/// Render the statistics as Prometheus gauges
pub fn render_prometheus(stats: &RunStats) -> Result<String> {
    let registry = Registry::new();

    let total = IntGauge::new("chainload_requests_total", "Step results recorded")?;
    let success = IntGauge::new("chainload_requests_success", "Successful step results")?;
    let failure = IntGauge::new("chainload_requests_failure", "Failed step results")?;
    let rps = Gauge::new("chainload_requests_per_second", "Step results per wall-clock second")?;
    let run_seconds = Gauge::new("chainload_run_duration_seconds", "Wall-clock run duration")?;
    let latency = GaugeVec::new(
        Opts::new("chainload_latency_seconds", "Successful request latency"),
        &["stat"],
    )?;
    let status = IntGaugeVec::new(
        Opts::new("chainload_status_codes", "Successful responses by HTTP status"),
        &["code"],
    )?;
    let errors = IntGaugeVec::new(
        Opts::new("chainload_errors", "Failed steps by classification"),
        &["kind"],
    )?;

    registry.register(Box::new(total.clone()))?;
    registry.register(Box::new(success.clone()))?;
    registry.register(Box::new(failure.clone()))?;
    registry.register(Box::new(rps.clone()))?;
    registry.register(Box::new(run_seconds.clone()))?;
    registry.register(Box::new(latency.clone()))?;
    registry.register(Box::new(status.clone()))?;
    registry.register(Box::new(errors.clone()))?;

    total.set(stats.total_requests as i64);
    success.set(stats.success_count as i64);
    failure.set(stats.failure_count as i64);
    rps.set(stats.requests_per_sec);
    run_seconds.set(stats.run_duration.as_secs_f64());

    latency.with_label_values(&["min"]).set(stats.min_duration.as_secs_f64());
    latency.with_label_values(&["max"]).set(stats.max_duration.as_secs_f64());
    latency.with_label_values(&["avg"]).set(stats.avg_duration.as_secs_f64());
    for row in &stats.percentiles {
        let label = format!("p{}", row.percentile);
        latency
            .with_label_values(&[label.as_str()])
            .set(row.value.as_secs_f64());
    }

    for (code, count) in &stats.status_codes {
        let code = code.to_string();
        status.with_label_values(&[code.as_str()]).set(*count as i64);
    }
    for (kind, count) in &stats.error_kinds {
        errors.with_label_values(&[kind.as_str()]).set(*count as i64);
    }

    let mut buffer = Vec::new();
    TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
