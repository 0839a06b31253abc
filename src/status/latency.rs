//! Latency percentiles for a set of completed probes.

use serde::Serialize;
use std::time::Duration;
use tdigests::TDigest;

/// Latency distribution of one day's completed probes, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySummary {
    pub samples: usize,
    pub min_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

/// Summarize latencies with a t-digest. Returns `None` for an empty input.
pub fn summarize_latencies(latencies: &[Duration]) -> Option<LatencySummary> {
    if latencies.is_empty() {
        return None;
    }

    let values: Vec<f64> = latencies.iter().map(|d| d.as_nanos() as f64 / 1_000_000.0).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let td = TDigest::from_values(values);

    Some(LatencySummary {
        samples: latencies.len(),
        min_ms: sanitize_float(min),
        p50_ms: clamp(td.estimate_quantile(0.50), min, max),
        p95_ms: clamp(td.estimate_quantile(0.95), min, max),
        p99_ms: clamp(td.estimate_quantile(0.99), min, max),
        max_ms: sanitize_float(max),
    })
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    sanitize_float(value).clamp(min, max)
}

fn sanitize_float(f: f64) -> f64 {
    if f.is_nan() || f.is_infinite() {
        0.0
    } else {
        f
    }
}
