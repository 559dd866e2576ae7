//! `dnslookup` command resolver.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use super::{ProbeError, Resolver};
use crate::scheduler::SetupError;

/// Resolves through the external `dnslookup` executable:
/// `dnslookup <domain> <server>`.
#[derive(Debug, Clone)]
pub struct DnsLookup {
    path: PathBuf,
}

impl DnsLookup {
    /// Find the executable, either at the given path or on `PATH`.
    pub fn locate(path: &Path) -> Result<Self, SetupError> {
        if path.is_file() {
            return Ok(Self {
                path: path.to_path_buf(),
            });
        }

        // Bare names are looked up on PATH
        if path.components().count() == 1 {
            if let Some(dirs) = env::var_os("PATH") {
                for dir in env::split_paths(&dirs) {
                    let candidate = dir.join(path);
                    if candidate.is_file() {
                        return Ok(Self { path: candidate });
                    }
                }
            }
        }

        Err(SetupError::MissingResolver(path.to_path_buf()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl Resolver for DnsLookup {
    async fn resolve(&self, domain: &str, server: &str) -> Result<String, ProbeError> {
        // The child is killed if the attempt is dropped by the caller's timeout.
        let output = Command::new(&self.path)
            .args([domain, server])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProbeError::Command(format!("failed to execute {}: {}", self.name(), e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.lines().map(str::trim).find(|l| !l.is_empty());
            return Err(ProbeError::Command(match detail {
                Some(detail) => format!("{} returned {}: {}", self.name(), output.status, detail),
                None => format!("{} returned {}", self.name(), output.status),
            }));
        }

        String::from_utf8(output.stdout)
            .map_err(|e| ProbeError::Output(format!("not valid UTF-8: {}", e)))
    }
}
