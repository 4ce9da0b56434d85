// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! requiem-telemetry
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::info;

// ---------------------------------------------------------------------------
// InvocationMetrics
// ---------------------------------------------------------------------------

/// Metrics captured for a single tool invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvocationMetrics {
    /// Tenant this invocation belongs to.
    pub tenant_id: String,
    /// Name of the tool invoked.
    pub tool_name: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Cost debited for this invocation, in cents.
    pub cost_cents: i64,
    /// Whether the invocation completed without error.
    pub success: bool,
    /// Whether the result was served from the replay cache.
    pub replayed: bool,
}

// ---------------------------------------------------------------------------
// MetricsSummary
// ---------------------------------------------------------------------------

/// Aggregated statistics across multiple invocations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsSummary {
    /// Number of invocations recorded.
    pub count: usize,
    /// Mean duration in milliseconds.
    pub mean_duration_ms: f64,
    /// Median (p50) duration in milliseconds.
    pub p50_duration_ms: f64,
    /// 99th-percentile duration in milliseconds.
    pub p99_duration_ms: f64,
    /// Total cost debited across all invocations, in cents.
    pub total_cost_cents: i64,
    /// Error rate (failures / total invocations).
    pub error_rate: f64,
    /// Fraction of invocations served from the replay cache.
    pub replay_rate: f64,
    /// Per-tool invocation counts (deterministic ordering).
    pub tool_counts: BTreeMap<String, usize>,
}

impl Default for MetricsSummary {
    fn default() -> Self {
        Self {
            count: 0,
            mean_duration_ms: 0.0,
            p50_duration_ms: 0.0,
            p99_duration_ms: 0.0,
            total_cost_cents: 0,
            error_rate: 0.0,
            replay_rate: 0.0,
            tool_counts: BTreeMap::new(),
        }
    }
}

/// Compute a percentile value from a **sorted** slice.
fn percentile(sorted: &[u64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0] as f64;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let frac = rank - lower as f64;
    sorted[lower] as f64 * (1.0 - frac) + sorted[upper] as f64 * frac
}

// ---------------------------------------------------------------------------
// MetricsCollector
// ---------------------------------------------------------------------------

/// Thread-safe collector for invocation metrics.
///
/// Wrap in an `Arc` to share across threads (the inner storage is already
/// behind a `Mutex`).
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<Vec<InvocationMetrics>>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Create a new, empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Record a completed invocation's metrics.
    pub fn record(&self, metrics: InvocationMetrics) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.push(metrics);
    }

    /// Return all recorded invocation metrics.
    #[must_use]
    pub fn invocations(&self) -> Vec<InvocationMetrics> {
        let data = self.inner.lock().expect("metrics lock poisoned");
        data.clone()
    }

    /// Number of invocations recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        let data = self.inner.lock().expect("metrics lock poisoned");
        data.len()
    }

    /// Whether the collector has no recorded invocations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compute an aggregated summary of all recorded invocations.
    #[must_use]
    pub fn summary(&self) -> MetricsSummary {
        let data = self.inner.lock().expect("metrics lock poisoned");
        if data.is_empty() {
            return MetricsSummary::default();
        }

        let count = data.len();
        let mut durations: Vec<u64> = data.iter().map(|r| r.duration_ms).collect();
        durations.sort_unstable();

        let total_duration: u64 = durations.iter().sum();
        let mean_duration_ms = total_duration as f64 / count as f64;
        let p50_duration_ms = percentile(&durations, 50.0);
        let p99_duration_ms = percentile(&durations, 99.0);

        let total_cost_cents: i64 = data.iter().map(|r| r.cost_cents).sum();
        let failures = data.iter().filter(|r| !r.success).count();
        let error_rate = failures as f64 / count as f64;
        let replayed = data.iter().filter(|r| r.replayed).count();
        let replay_rate = replayed as f64 / count as f64;

        let mut tool_counts: BTreeMap<String, usize> = BTreeMap::new();
        for r in data.iter() {
            *tool_counts.entry(r.tool_name.clone()).or_insert(0) += 1;
        }

        MetricsSummary {
            count,
            mean_duration_ms,
            p50_duration_ms,
            p99_duration_ms,
            total_cost_cents,
            error_rate,
            replay_rate,
            tool_counts,
        }
    }

    /// Clear all recorded metrics.
    pub fn clear(&self) {
        let mut data = self.inner.lock().expect("metrics lock poisoned");
        data.clear();
    }
}

// ---------------------------------------------------------------------------
// TelemetrySink
// ---------------------------------------------------------------------------

/// A destination for structured logs, spans, and cost records.
///
/// Implementors are expected to be cheap to clone (an `Arc` around shared
/// state) since a sink is threaded through every pipeline stage.
pub trait TelemetrySink: Send + Sync {
    /// Emit a structured log line at `level` with the given `attributes`.
    fn log(&self, level: &str, message: &str, attributes: &BTreeMap<String, String>);

    /// Emit a named span with attributes, for request tracing.
    fn span(&self, name: &str, attributes: &BTreeMap<String, String>);

    /// Record a cost event for billing/metrics aggregation.
    fn record_cost(&self, tenant_id: &str, tool_name: &str, cost_cents: i64);
}

/// A [`TelemetrySink`] that emits via `tracing` macros.
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn log(&self, level: &str, message: &str, attributes: &BTreeMap<String, String>) {
        info!(level, message, attributes = ?attributes, "requiem_log");
    }

    fn span(&self, name: &str, attributes: &BTreeMap<String, String>) {
        info!(span_name = %name, attributes = ?attributes, "requiem_span");
    }

    fn record_cost(&self, tenant_id: &str, tool_name: &str, cost_cents: i64) {
        info!(tenant_id, tool_name, cost_cents, "requiem_cost");
    }
}

/// Wraps a [`TelemetrySink`] and redacts every string value passing through
/// it before delegating.
///
/// Telemetry sits downstream of every pipeline stage, including ones that
/// handle raw tool input/output — this wrapper is the last line of defense
/// against a secret reaching a log line or span attribute.
pub struct RedactingSink<S> {
    inner: S,
}

impl<S: TelemetrySink> RedactingSink<S> {
    /// Wrap `inner`, redacting everything passed to it.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    fn redact_attrs(attributes: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let value = serde_json::to_value(attributes).unwrap_or_default();
        let redacted = requiem_redact::redact(&value);
        serde_json::from_value(redacted).unwrap_or_default()
    }
}

impl<S: TelemetrySink> TelemetrySink for RedactingSink<S> {
    fn log(&self, level: &str, message: &str, attributes: &BTreeMap<String, String>) {
        let safe_message = requiem_redact::redact_string(message);
        self.inner.log(level, &safe_message, &Self::redact_attrs(attributes));
    }

    fn span(&self, name: &str, attributes: &BTreeMap<String, String>) {
        self.inner.span(name, &Self::redact_attrs(attributes));
    }

    fn record_cost(&self, tenant_id: &str, tool_name: &str, cost_cents: i64) {
        self.inner.record_cost(tenant_id, tool_name, cost_cents);
    }
}

// ---------------------------------------------------------------------------
// TelemetryExporter
// ---------------------------------------------------------------------------

/// Exports a collected [`MetricsSummary`].
pub trait TelemetryExporter: Send + Sync {
    /// Export the given summary. Returns the serialized output on success.
    fn export(&self, summary: &MetricsSummary) -> Result<String, String>;
}

/// Exports metrics as pretty-printed JSON to a string.
#[derive(Debug, Default)]
pub struct JsonExporter;

impl TelemetryExporter for JsonExporter {
    fn export(&self, summary: &MetricsSummary) -> Result<String, String> {
        serde_json::to_string_pretty(summary).map_err(|e| e.to_string())
    }
}
