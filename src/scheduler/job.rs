//! Job runner: repeated sequential queries for one probe target.

use crate::models::{JobRecord, ProbeTarget};
use crate::probe::{invoke, Resolver};

use super::{CancelFlag, JobSettings};

/// Run every attempt for one target and fold the samples into a record.
///
/// Attempts are strictly sequential. The job stops early only when the
/// cancellation flag is raised or the opt-in fail-fast limit is reached.
pub async fn run_job<R: Resolver>(
    resolver: &R,
    target: ProbeTarget,
    settings: &JobSettings,
    cancel: &CancelFlag,
) -> JobRecord {
    let mut samples = Vec::with_capacity(settings.query_count);
    let mut consecutive_failures = 0;

    for attempt in 0..settings.query_count {
        if cancel.is_cancelled() {
            tracing::debug!("Job {} cancelled after {} attempts", target, attempt);
            break;
        }

        let sample = invoke(resolver, &target.domain, &target.server, settings.timeout).await;
        if sample.is_success() {
            consecutive_failures = 0;
        } else {
            consecutive_failures += 1;
        }
        samples.push(sample);

        if let Some(limit) = settings.fail_fast_after {
            if consecutive_failures >= limit && attempt + 1 < settings.query_count {
                tracing::debug!(
                    "Job {} stopped after {} consecutive failures",
                    target,
                    consecutive_failures
                );
                break;
            }
        }
    }

    JobRecord::from_samples(target, settings.query_count, samples)
}
