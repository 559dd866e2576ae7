//! Report files: CSV server summary and an optional JSON dump.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::models::{JobRecord, ServerSummary};

use super::{join_messages, round2, MAX_ERROR_CHARS};

/// Report output error types.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

const CSV_HEADER: [&str; 13] = [
    "Server",
    "Average (ms)",
    "Min (ms)",
    "Max (ms)",
    "Std Dev (ms)",
    "P50 (ms)",
    "P95 (ms)",
    "Avg Error Rate (%)",
    "Max Error Rate (%)",
    "Total Successful Queries",
    "Total Failed Queries",
    "Status",
    "Error Messages",
];

/// File stem for a report generated at `at`.
pub fn report_stem(at: DateTime<Local>) -> String {
    format!("dns_server_performance_{}", at.format("%Y%m%d_%H%M%S"))
}

/// Write the ranked summaries as CSV.
pub fn write_csv<W: Write>(writer: W, summaries: &[ServerSummary]) -> Result<(), ReportError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADER)?;
    for s in summaries {
        wtr.write_record([
            s.server.clone(),
            round2(s.latency_mean_ms).to_string(),
            round2(s.latency_min_ms).to_string(),
            round2(s.latency_max_ms).to_string(),
            round2(s.latency_std_ms).to_string(),
            round2(s.latency_p50_ms).to_string(),
            round2(s.latency_p95_ms).to_string(),
            round2(s.error_rate_mean_percent).to_string(),
            round2(s.error_rate_max_percent).to_string(),
            s.total_successful.to_string(),
            s.total_failed.to_string(),
            s.status.to_string(),
            join_messages(&s.error_messages, MAX_ERROR_CHARS),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: DateTime<Utc>,
    servers: &'a [ServerSummary],
    jobs: &'a [JobRecord],
}

/// Write summaries and every job record as pretty-printed JSON.
pub fn write_json<W: Write>(
    writer: W,
    summaries: &[ServerSummary],
    records: &[JobRecord],
    generated_at: DateTime<Utc>,
) -> Result<(), ReportError> {
    let report = JsonReport {
        generated_at,
        servers: summaries,
        jobs: records,
    };
    let mut writer = writer;
    serde_json::to_writer_pretty(&mut writer, &report)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Write the report files into `dir` and return their paths.
pub fn save_reports(
    dir: &Path,
    summaries: &[ServerSummary],
    records: &[JobRecord],
    with_json: bool,
) -> Result<Vec<PathBuf>, ReportError> {
    std::fs::create_dir_all(dir)?;
    let stem = report_stem(Local::now());
    let mut written = Vec::new();

    let csv_path = dir.join(format!("{}.csv", stem));
    write_csv(BufWriter::new(File::create(&csv_path)?), summaries)?;
    written.push(csv_path);

    if with_json {
        let json_path = dir.join(format!("{}.json", stem));
        write_json(
            BufWriter::new(File::create(&json_path)?),
            summaries,
            records,
            Utc::now(),
        )?;
        written.push(json_path);
    }

    Ok(written)
}
