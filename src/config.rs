//! Configuration module for dnsbench.
//!
//! Loads configuration from environment variables with sensible defaults;
//! command-line flags are applied on top in `main`.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::scheduler::{JobSettings, SetupError};

/// Benchmark configuration.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Queries per (domain, server) pair (default: 30)
    pub num_queries: usize,
    /// Jobs running at once (default: 1)
    pub max_threads: usize,
    /// Upper bound for a single query (default: 10s)
    pub timeout: Duration,
    /// Stop a job after this many consecutive failures (default: off)
    pub fail_fast_after: Option<usize>,
    /// Resolver executable (default: "dnslookup")
    pub dnslookup_path: PathBuf,
    /// Domain list (default: "test_domains.txt")
    pub domains_file: PathBuf,
    /// Server list (default: "dns_servers.txt")
    pub servers_file: PathBuf,
    /// Directory for report files (default: ".")
    pub output_dir: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            num_queries: 30,
            max_threads: 1,
            timeout: Duration::from_secs(10),
            fail_fast_after: None,
            dnslookup_path: PathBuf::from("dnslookup"),
            domains_file: PathBuf::from("test_domains.txt"),
            servers_file: PathBuf::from("dns_servers.txt"),
            output_dir: PathBuf::from("."),
        }
    }
}

impl BenchConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DNSBENCH_NUM_QUERIES`: queries per pair (default: 30)
    /// - `DNSBENCH_MAX_THREADS`: concurrent jobs (default: 1)
    /// - `DNSBENCH_TIMEOUT_MS`: per-query timeout in milliseconds (default: 10000)
    /// - `DNSBENCH_DNSLOOKUP`: resolver executable (default: "dnslookup")
    /// - `DNSBENCH_DOMAINS_FILE`: domain list (default: "test_domains.txt")
    /// - `DNSBENCH_SERVERS_FILE`: server list (default: "dns_servers.txt")
    /// - `DNSBENCH_OUTPUT_DIR`: report directory (default: ".")
    ///
    /// Values that fail to parse keep their default.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(n) = lookup("DNSBENCH_NUM_QUERIES").and_then(|v| v.parse().ok()) {
            cfg.num_queries = n;
        }
        if let Some(n) = lookup("DNSBENCH_MAX_THREADS").and_then(|v| v.parse().ok()) {
            cfg.max_threads = n;
        }
        if let Some(ms) = lookup("DNSBENCH_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            cfg.timeout = Duration::from_millis(ms);
        }
        if let Some(path) = lookup("DNSBENCH_DNSLOOKUP") {
            cfg.dnslookup_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("DNSBENCH_DOMAINS_FILE") {
            cfg.domains_file = PathBuf::from(path);
        }
        if let Some(path) = lookup("DNSBENCH_SERVERS_FILE") {
            cfg.servers_file = PathBuf::from(path);
        }
        if let Some(path) = lookup("DNSBENCH_OUTPUT_DIR") {
            cfg.output_dir = PathBuf::from(path);
        }

        cfg
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), SetupError> {
        if self.num_queries == 0 {
            return Err(SetupError::Config("number of queries must be at least 1".into()));
        }
        if self.max_threads == 0 {
            return Err(SetupError::Config("max threads must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(SetupError::Config("timeout must be greater than zero".into()));
        }
        if self.fail_fast_after == Some(0) {
            return Err(SetupError::Config("fail-fast limit must be at least 1".into()));
        }
        Ok(())
    }

    pub fn job_settings(&self) -> JobSettings {
        JobSettings {
            query_count: self.num_queries,
            timeout: self.timeout,
            fail_fast_after: self.fail_fast_after,
        }
    }
}
