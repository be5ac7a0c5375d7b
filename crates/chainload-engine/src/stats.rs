//! # Run statistics
//!
//! The [`StatsAggregator`] folds every [`StepResult`] of a run into counters,
//! histograms and an HDR latency histogram of successful durations.
//! [`StatsAggregator::finalize`] turns them into an immutable [`RunStats`]
//! report.
//!
//! The aggregator is driven by the single result-collection loop and holds no
//! locks. Memory stays constant regardless of run length.

use crate::executor::StepResult;
use chainload_core::ErrorKind;
use chrono::{DateTime, Utc};
use hdrhistogram::Histogram;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::warn;

/// Percentiles reported for successful request durations
pub const PERCENTILES: [u8; 5] = [50, 75, 90, 95, 99];

/// Highest latency the histogram tracks exactly (1 hour, in microseconds);
/// longer samples are clamped
const MAX_LATENCY_MICROS: u64 = 3_600_000_000;

/// Significant figures kept by the latency histogram
const LATENCY_SIGFIGS: u8 = 3;

// ============================================================================
// AGGREGATOR
// ============================================================================

/// Accumulates step results for one run
#[derive(Debug)]
pub struct StatsAggregator {
    started_at: DateTime<Utc>,
    total: u64,
    success: u64,
    failure: u64,
    total_duration: Duration,
    min_duration: Option<Duration>,
    max_duration: Duration,
    /// Successful durations in microseconds; `None` if it could not be built
    latency: Option<Histogram<u64>>,
    status_codes: BTreeMap<u16, u64>,
    error_kinds: BTreeMap<ErrorKind, u64>,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        let latency = Histogram::new_with_bounds(1, MAX_LATENCY_MICROS, LATENCY_SIGFIGS)
            .map_err(|e| warn!(error = %e, "Latency histogram unavailable, percentiles disabled"))
            .ok();

        Self {
            started_at: Utc::now(),
            total: 0,
            success: 0,
            failure: 0,
            total_duration: Duration::ZERO,
            min_duration: None,
            max_duration: Duration::ZERO,
            latency,
            status_codes: BTreeMap::new(),
            error_kinds: BTreeMap::new(),
        }
    }

    /// Fold one step outcome into the totals
    pub fn record(&mut self, result: &StepResult) {
        self.total += 1;

        match result.error_kind() {
            Some(kind) => {
                self.failure += 1;
                *self.error_kinds.entry(kind).or_insert(0) += 1;
            }
            None => {
                self.success += 1;
                if let Some(status) = result.status {
                    *self.status_codes.entry(status).or_insert(0) += 1;
                }

                let elapsed = result.elapsed;
                self.total_duration += elapsed;
                self.min_duration = Some(self.min_duration.map_or(elapsed, |min| min.min(elapsed)));
                self.max_duration = self.max_duration.max(elapsed);
                if let Some(latency) = &mut self.latency {
                    let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
                    latency.saturating_record(micros);
                }
            }
        }
    }

    /// Compute the final report. `run_duration` is the wall-clock length of
    /// the run and the throughput denominator.
    pub fn finalize(self, run_duration: Duration) -> RunStats {
        let avg_duration = mean(self.total_duration, self.success);
        let min_duration = self.min_duration.unwrap_or(Duration::ZERO);

        let secs = run_duration.as_secs_f64();
        let requests_per_sec = if secs > 0.0 {
            self.total as f64 / secs
        } else {
            0.0
        };

        let percentiles = match &self.latency {
            Some(latency) if !latency.is_empty() => PERCENTILES
                .iter()
                .map(|&percentile| Percentile {
                    percentile,
                    value: nearest_rank(latency, percentile)
                        .clamp(min_duration, self.max_duration),
                })
                .collect(),
            _ => Vec::new(),
        };

        RunStats {
            started_at: self.started_at,
            total_requests: self.total,
            success_count: self.success,
            failure_count: self.failure,
            total_duration: self.total_duration,
            min_duration,
            max_duration: self.max_duration,
            avg_duration,
            run_duration,
            requests_per_sec,
            percentiles,
            status_codes: self.status_codes,
            error_kinds: self.error_kinds,
        }
    }
}

/// Average of `count` samples summing to `total`; zero when there are none
fn mean(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    let nanos = total.as_nanos() / u128::from(count);
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Nearest-rank value of a non-empty histogram: the sample at sorted index
/// `floor(len * p / 100)`, clamped to the last sample
fn nearest_rank(latency: &Histogram<u64>, percentile: u8) -> Duration {
    let len = latency.len();
    let index = (len * u64::from(percentile) / 100).min(len - 1);

    let mut seen = 0;
    for bucket in latency.iter_recorded() {
        seen += bucket.count_at_value();
        if seen > index {
            return Duration::from_micros(latency.lowest_equivalent(bucket.value_iterated_to()));
        }
    }
    Duration::from_micros(latency.max())
}

// ============================================================================
// REPORT
// ============================================================================

/// One row of the percentile table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Percentile {
    pub percentile: u8,
    #[serde(rename = "value_ms", serialize_with = "duration_ms")]
    pub value: Duration,
}

/// Final statistics of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,

    pub total_requests: u64,
    pub success_count: u64,
    pub failure_count: u64,

    /// Sum of successful request durations
    #[serde(rename = "total_duration_ms", serialize_with = "duration_ms")]
    pub total_duration: Duration,

    #[serde(rename = "min_duration_ms", serialize_with = "duration_ms")]
    pub min_duration: Duration,

    #[serde(rename = "max_duration_ms", serialize_with = "duration_ms")]
    pub max_duration: Duration,

    #[serde(rename = "avg_duration_ms", serialize_with = "duration_ms")]
    pub avg_duration: Duration,

    /// Wall-clock length of the run
    #[serde(rename = "run_duration_ms", serialize_with = "duration_ms")]
    pub run_duration: Duration,

    pub requests_per_sec: f64,

    /// Empty when no step succeeded
    pub percentiles: Vec<Percentile>,

    /// Successful responses by HTTP status
    pub status_codes: BTreeMap<u16, u64>,

    /// Failed steps by classification
    #[serde(serialize_with = "error_labels")]
    pub error_kinds: BTreeMap<ErrorKind, u64>,
}

impl RunStats {
    /// Successful share of all results, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.success_count as f64 / self.total_requests as f64 * 100.0
        }
    }

    /// Value of a reported percentile
    pub fn percentile(&self, percentile: u8) -> Option<Duration> {
        self.percentiles
            .iter()
            .find(|row| row.percentile == percentile)
            .map(|row| row.value)
    }
}

fn duration_ms<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

fn error_labels<S: Serializer>(
    kinds: &BTreeMap<ErrorKind, u64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_map(kinds.iter().map(|(kind, count)| (kind.as_str(), count)))
}

const RULE: &str = "══════════════════════════════════════════════════════════════";

fn row(f: &mut fmt::Formatter<'_>, label: &str, value: String) -> fmt::Result {
    writeln!(f, "║ {:<24}{:>36} ║", label, value)
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "╔{RULE}╗")?;
        writeln!(f, "║{:^62}║", "CHAINLOAD RUN RESULTS")?;
        writeln!(f, "╠{RULE}╣")?;
        row(f, "Total Requests:", self.total_requests.to_string())?;
        row(f, "Successful:", self.success_count.to_string())?;
        row(f, "Failed:", self.failure_count.to_string())?;
        row(f, "Success Rate:", format!("{:.2}%", self.success_rate()))?;
        row(f, "Run Duration:", format!("{:.2?}", self.run_duration))?;
        row(f, "Total Success Duration:", format!("{:.2?}", self.total_duration))?;
        row(f, "Requests/sec:", format!("{:.2}", self.requests_per_sec))?;

        writeln!(f, "╠{RULE}╣")?;
        writeln!(f, "║ {:<60} ║", "LATENCY")?;
        row(f, "  min:", format!("{:.2?}", self.min_duration))?;
        row(f, "  max:", format!("{:.2?}", self.max_duration))?;
        row(f, "  avg:", format!("{:.2?}", self.avg_duration))?;
        for p in &self.percentiles {
            row(f, &format!("  p{}:", p.percentile), format!("{:.2?}", p.value))?;
        }

        if !self.status_codes.is_empty() {
            writeln!(f, "╠{RULE}╣")?;
            writeln!(f, "║ {:<60} ║", "STATUS CODES")?;
            for (status, count) in &self.status_codes {
                row(f, &format!("  {status}"), count.to_string())?;
            }
        }

        if !self.error_kinds.is_empty() {
            writeln!(f, "╠{RULE}╣")?;
            writeln!(f, "║ {:<60} ║", "ERRORS")?;
            for (kind, count) in &self.error_kinds {
                row(f, &format!("  {kind}"), count.to_string())?;
            }
        }

        writeln!(f, "╚{RULE}╝")
    }
}
