//! Benchmark data model types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One (domain, server) pair under test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub domain: String,
    pub server: String,
}

impl ProbeTarget {
    pub fn new(domain: &str, server: &str) -> Self {
        Self {
            domain: domain.to_string(),
            server: server.to_string(),
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.domain, self.server)
    }
}

/// Outcome of a single query attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure { message: String },
}

/// A single query attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySample {
    /// Wall-clock duration of the attempt in milliseconds
    pub elapsed_ms: f64,
    /// IPv4 answers in the order the resolver printed them
    pub addresses: Vec<String>,
    pub outcome: Outcome,
}

impl QuerySample {
    pub fn success(elapsed_ms: f64, addresses: Vec<String>) -> Self {
        Self {
            elapsed_ms,
            addresses,
            outcome: Outcome::Success,
        }
    }

    pub fn failure(elapsed_ms: f64, message: impl Into<String>) -> Self {
        Self {
            elapsed_ms,
            addresses: Vec::new(),
            outcome: Outcome::Failure {
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success)
    }
}

/// All samples collected for one probe target, with derived statistics.
///
/// Built once by the job runner through [`JobRecord::from_samples`] and never
/// modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub target: ProbeTarget,
    /// Number of attempts the job was configured to run
    pub query_count: usize,
    pub samples: Vec<QuerySample>,
    pub successful_count: usize,
    pub failed_count: usize,
    /// True when fewer than `query_count` attempts ran
    pub aborted: bool,
    pub unique_addresses: Vec<String>,
    pub distinct_error_messages: BTreeSet<String>,
    /// Mean elapsed time of successful samples, or 0 with no successes
    pub average_latency_ms: f64,
    pub error_rate_percent: f64,
}

impl JobRecord {
    /// Derive the record statistics from the collected samples.
    pub fn from_samples(
        target: ProbeTarget,
        query_count: usize,
        samples: Vec<QuerySample>,
    ) -> Self {
        let mut successful_count = 0;
        let mut failed_count = 0;
        let mut total_ms = 0.0;
        let mut unique_addresses: Vec<String> = Vec::new();
        let mut distinct_error_messages = BTreeSet::new();

        for sample in &samples {
            match &sample.outcome {
                Outcome::Success => {
                    successful_count += 1;
                    total_ms += sample.elapsed_ms;
                    for addr in &sample.addresses {
                        if !unique_addresses.contains(addr) {
                            unique_addresses.push(addr.clone());
                        }
                    }
                }
                Outcome::Failure { message } => {
                    failed_count += 1;
                    distinct_error_messages.insert(message.clone());
                }
            }
        }

        let average_latency_ms = if successful_count > 0 {
            total_ms / successful_count as f64
        } else {
            0.0
        };

        let error_rate_percent = if query_count > 0 {
            failed_count as f64 / query_count as f64 * 100.0
        } else {
            0.0
        };

        Self {
            aborted: samples.len() < query_count,
            target,
            query_count,
            samples,
            successful_count,
            failed_count,
            unique_addresses,
            distinct_error_messages,
            average_latency_ms,
            error_rate_percent,
        }
    }

    /// A record for a job that faulted as a whole: every attempt is a failure
    /// carrying the same diagnostic.
    pub fn failed(target: ProbeTarget, query_count: usize, message: &str) -> Self {
        let samples = (0..query_count)
            .map(|_| QuerySample::failure(0.0, message))
            .collect();
        Self::from_samples(target, query_count, samples)
    }

    pub fn has_responses(&self) -> bool {
        self.successful_count > 0
    }

    /// Whether this job counts towards its server being reachable.
    pub fn is_working(&self) -> bool {
        self.has_responses() && self.error_rate_percent < 100.0
    }

    /// Elapsed times of the successful samples, in attempt order.
    pub fn success_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples
            .iter()
            .filter(|s| s.is_success())
            .map(|s| s.elapsed_ms)
    }
}

/// Reachability classification of a server.
///
/// Ordered so that `Working` sorts before `NotWorking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ServerStatus {
    Working,
    NotWorking,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerStatus::Working => f.write_str("Working"),
            ServerStatus::NotWorking => f.write_str("Not Working"),
        }
    }
}

/// Per-server statistics derived from every job that targeted the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSummary {
    pub server: String,
    pub jobs: usize,
    /// Statistics over the per-job averages of jobs with at least one success
    pub latency_mean_ms: f64,
    pub latency_min_ms: f64,
    pub latency_max_ms: f64,
    pub latency_std_ms: f64,
    /// Percentiles over every successful sample of the server
    pub latency_p50_ms: f64,
    pub latency_p95_ms: f64,
    pub error_rate_mean_percent: f64,
    pub error_rate_max_percent: f64,
    pub total_successful: usize,
    pub total_failed: usize,
    pub status: ServerStatus,
    pub error_messages: BTreeSet<String>,
}
