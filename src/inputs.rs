//! Domain and server lists.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::ProbeTarget;
use crate::scheduler::SetupError;

const SERVER_PREFIXES: [&str; 4] = ["tls://", "https://", "quic://", "sdns://"];

/// Read a newline-delimited list, skipping blank lines and `#` comments.
pub fn read_list(path: &Path) -> Result<Vec<String>, SetupError> {
    let content = fs::read_to_string(path).map_err(|source| SetupError::ReadList {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_list(&content))
}

pub fn parse_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Whether a server entry is something the resolver understands: an
/// encrypted-DNS URL or a dotted-decimal IPv4 address.
pub fn is_valid_server(server: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"^(?:[0-9]{1,3}\.){3}[0-9]{1,3}$").unwrap());

    SERVER_PREFIXES.iter().any(|p| server.starts_with(p)) || re.is_match(server)
}

/// Every (domain, server) pair, domain-major.
pub fn cross_product(domains: &[String], servers: &[String]) -> Vec<ProbeTarget> {
    domains
        .iter()
        .flat_map(|d| servers.iter().map(move |s| ProbeTarget::new(d, s)))
        .collect()
}

/// Drop invalid servers and build the target list.
///
/// Fails when nothing would be scheduled.
pub fn prepare_targets(
    domains: &[String],
    servers: &[String],
) -> Result<Vec<ProbeTarget>, SetupError> {
    let valid: Vec<String> = servers
        .iter()
        .filter(|s| {
            let ok = is_valid_server(s);
            if !ok {
                tracing::warn!("Skipping invalid DNS server entry: {}", s);
            }
            ok
        })
        .cloned()
        .collect();

    if valid.is_empty() {
        return Err(SetupError::NoServers);
    }
    if domains.is_empty() {
        return Err(SetupError::NoDomains);
    }

    Ok(cross_product(domains, &valid))
}
