//! Console rendering of job results and server summaries.

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::models::{JobRecord, ServerSummary};
use crate::scheduler::ProgressObserver;

use super::{join_messages, MAX_ERROR_CHARS};

/// Error messages shown per job on the console.
const JOB_ERROR_LIMIT: usize = 3;

pub fn format_header() -> String {
    format!("\n=== DNS Resolution Results ===\n{}", "=".repeat(50))
}

/// Multi-line block describing one completed job.
pub fn format_job(record: &JobRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nDomain: {}", record.target.domain);
    let _ = writeln!(out, "Server: {}", record.target.server);
    let _ = writeln!(out, "Average Response Time: {:.2} ms", record.average_latency_ms);

    let times = record
        .success_times()
        .map(|t| format!("{:.2}", t))
        .collect::<Vec<_>>()
        .join(" ");
    let _ = writeln!(out, "Query Times: {} ms", times);
    let _ = writeln!(
        out,
        "Queries: {} ok, {} failed ({:.1}% errors){}",
        record.successful_count,
        record.failed_count,
        record.error_rate_percent,
        if record.aborted { ", stopped early" } else { "" }
    );

    let _ = writeln!(out, "IPs:");
    if record.unique_addresses.is_empty() {
        let _ = writeln!(out, "  No IPs found");
    } else {
        for ip in &record.unique_addresses {
            let _ = writeln!(out, "  - {}", ip);
        }
    }

    if !record.distinct_error_messages.is_empty() {
        let errors = join_messages(
            record.distinct_error_messages.iter().take(JOB_ERROR_LIMIT),
            MAX_ERROR_CHARS,
        );
        let _ = writeln!(out, "Errors: {}", errors);
    }

    out.push_str(&"-".repeat(60));
    out
}

/// Ranked summary table, one line per server.
pub fn format_summary(summaries: &[ServerSummary]) -> String {
    let width = summaries
        .iter()
        .map(|s| s.server.chars().count())
        .max()
        .unwrap_or(0)
        .max("Server".len());

    let mut out = String::new();
    let _ = writeln!(out, "\n=== Server Performance ===");
    let _ = writeln!(
        out,
        "{:<width$}  {:>9}  {:>9}  {:>9}  {:>9}  {:>8}  {:<11}",
        "Server", "Avg (ms)", "Min (ms)", "Max (ms)", "P95 (ms)", "Err (%)", "Status",
    );
    for s in summaries {
        let _ = writeln!(
            out,
            "{:<width$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9.2}  {:>8.1}  {:<11}",
            s.server,
            s.latency_mean_ms,
            s.latency_min_ms,
            s.latency_max_ms,
            s.latency_p95_ms,
            s.error_rate_mean_percent,
            s.status.to_string(),
        );
    }
    out
}

/// Progress line on stderr, updated as jobs complete.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl ConsoleProgress {
    /// Clear the progress line.
    pub fn finish(&self) {
        let mut err = io::stderr().lock();
        let _ = write!(err, "\r{}\r", " ".repeat(50));
        let _ = err.flush();
    }
}

impl ProgressObserver for ConsoleProgress {
    fn on_job_complete(&self, completed: usize, total: usize, _record: &JobRecord) {
        let mut err = io::stderr().lock();
        let _ = write!(err, "\rProcessing [{}/{}] ", completed, total);
        let _ = err.flush();
    }
}
