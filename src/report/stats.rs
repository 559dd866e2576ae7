//! Numeric helpers for server summaries.
//!
//! Percentiles come from a TDigest built over every successful sample, the
//! same sketch used for latency distributions elsewhere.

use tdigests::TDigest;

/// Compression bound for latency digests.
const DIGEST_CENTROIDS: usize = 100;

/// Arithmetic mean, 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1), 0 for fewer than two values.
pub fn sample_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// (min, max), or (0, 0) for an empty slice.
pub fn min_max(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// Build a latency digest; values are sorted first so the result does not
/// depend on arrival order.
pub fn latency_digest(mut values: Vec<f64>) -> Option<TDigest> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mut td = TDigest::from_values(values);
    td.compress(DIGEST_CENTROIDS);
    Some(td)
}

/// Estimated (p50, p95) latency, (0, 0) with no samples.
pub fn latency_percentiles(values: Vec<f64>) -> (f64, f64) {
    if values.len() == 1 {
        return (values[0], values[0]);
    }
    match latency_digest(values) {
        Some(td) => (td.estimate_quantile(0.5), td.estimate_quantile(0.95)),
        None => (0.0, 0.0),
    }
}

/// Round to two decimals for presentation.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
