//! Result aggregation and reporting.
//!
//! [`aggregate`] reduces job records to ranked per-server summaries; the
//! submodules render them to the console and to report files.

mod console;
mod stats;
mod writer;

pub use console::*;
pub use stats::*;
pub use writer::*;

use crate::models::{JobRecord, ServerStatus, ServerSummary};

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Character cap for joined error messages in rendered output.
pub const MAX_ERROR_CHARS: usize = 200;

/// Group records by server and rank the resulting summaries.
///
/// The result does not depend on the order of `records`.
pub fn aggregate(records: &[JobRecord]) -> Vec<ServerSummary> {
    let mut groups: HashMap<&str, Vec<&JobRecord>> = HashMap::new();
    for record in records {
        groups
            .entry(record.target.server.as_str())
            .or_default()
            .push(record);
    }

    let mut summaries: Vec<ServerSummary> = groups
        .into_iter()
        .map(|(server, jobs)| summarize(server, jobs))
        .collect();
    summaries.sort_by(rank_order);
    summaries
}

fn summarize(server: &str, mut jobs: Vec<&JobRecord>) -> ServerSummary {
    // Fixed order so floating point sums are reproducible
    jobs.sort_by(|a, b| {
        a.target
            .cmp(&b.target)
            .then(a.average_latency_ms.total_cmp(&b.average_latency_ms))
            .then(a.error_rate_percent.total_cmp(&b.error_rate_percent))
    });

    let latencies: Vec<f64> = jobs
        .iter()
        .filter(|j| j.has_responses())
        .map(|j| j.average_latency_ms)
        .collect();
    let error_rates: Vec<f64> = jobs.iter().map(|j| j.error_rate_percent).collect();
    let samples: Vec<f64> = jobs.iter().flat_map(|j| j.success_times()).collect();

    let (latency_min_ms, latency_max_ms) = min_max(&latencies);
    let (latency_p50_ms, latency_p95_ms) = latency_percentiles(samples);
    let (_, error_rate_max_percent) = min_max(&error_rates);

    let status = if jobs.iter().any(|j| j.is_working()) {
        ServerStatus::Working
    } else {
        ServerStatus::NotWorking
    };

    let error_messages: BTreeSet<String> = jobs
        .iter()
        .flat_map(|j| j.distinct_error_messages.iter().cloned())
        .collect();

    ServerSummary {
        server: server.to_string(),
        jobs: jobs.len(),
        latency_mean_ms: mean(&latencies),
        latency_min_ms,
        latency_max_ms,
        latency_std_ms: sample_std_dev(&latencies),
        latency_p50_ms,
        latency_p95_ms,
        error_rate_mean_percent: mean(&error_rates),
        error_rate_max_percent,
        total_successful: jobs.iter().map(|j| j.successful_count).sum(),
        total_failed: jobs.iter().map(|j| j.failed_count).sum(),
        status,
        error_messages,
    }
}

/// Working servers first, then lower error rate, then lower latency.
fn rank_order(a: &ServerSummary, b: &ServerSummary) -> Ordering {
    a.status
        .cmp(&b.status)
        .then(a.error_rate_mean_percent.total_cmp(&b.error_rate_mean_percent))
        .then(a.latency_mean_ms.total_cmp(&b.latency_mean_ms))
        .then_with(|| a.server.cmp(&b.server))
}

/// Join messages with `"; "` and cut the result at `max_chars` characters.
pub fn join_messages<'a, I>(messages: I, max_chars: usize) -> String
where
    I: IntoIterator<Item = &'a String>,
{
    let joined = messages
        .into_iter()
        .filter(|m| !m.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("; ");
    match joined.char_indices().nth(max_chars) {
        Some((idx, _)) => joined[..idx].to_string(),
        None => joined,
    }
}
