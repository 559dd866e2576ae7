//! Resolution probes.
//!
//! A [`Resolver`] performs one external lookup; [`invoke`] times it, bounds it
//! with a timeout and turns every outcome into a [`QuerySample`].

mod dnslookup;

pub use dnslookup::*;

use std::future::Future;
use std::net::Ipv4Addr;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;
use tokio::time::Instant;

use crate::models::QuerySample;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
    #[error("command failed: {0}")]
    Command(String),
    #[error("malformed resolver output: {0}")]
    Output(String),
}

/// An external resolution mechanism.
///
/// On success returns the raw textual answer, which may contain any number of
/// address lines.
pub trait Resolver: Send + Sync {
    fn resolve(
        &self,
        domain: &str,
        server: &str,
    ) -> impl Future<Output = Result<String, ProbeError>> + Send;
}

/// Run one timed resolution attempt.
///
/// Never fails: timeouts and resolver errors become `Failure` samples that
/// still carry the elapsed time.
pub async fn invoke<R: Resolver>(
    resolver: &R,
    domain: &str,
    server: &str,
    timeout: Duration,
) -> QuerySample {
    let start = Instant::now();
    let result = match tokio::time::timeout(timeout, resolver.resolve(domain, server)).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::Timeout(timeout)),
    };
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(output) => QuerySample::success(elapsed_ms, extract_ipv4_answers(&output)),
        Err(e) => {
            tracing::debug!("Query for {} via {} failed: {}", domain, server, e);
            QuerySample::failure(elapsed_ms, e.to_string())
        }
    }
}

/// Extract IPv4 answers from resolver output.
///
/// Only `IN A` record lines count; the value must be a valid dotted-quad.
pub fn extract_ipv4_answers(output: &str) -> Vec<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(concat!(
            r"(?m)^[ \t]*\S+[ \t]+(?:\d+[ \t]+)?IN[ \t]+A[ \t]+",
            r"(?P<addr>\d{1,3}(?:\.\d{1,3}){3})[ \t]*\r?$",
        ))
        .unwrap()
    });

    re.captures_iter(output)
        .filter_map(|caps| caps.name("addr"))
        .map(|m| m.as_str())
        .filter(|addr| addr.parse::<Ipv4Addr>().is_ok())
        .map(str::to_string)
        .collect()
}
