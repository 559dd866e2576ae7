//! Scheduler module for running benchmark jobs on a bounded worker pool.

mod job;
#[cfg(test)]
pub(crate) mod testing;

pub use job::*;

use crate::models::{JobRecord, ProbeTarget};
use crate::probe::Resolver;

use std::any::Any;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};

/// Fatal conditions detected before any job is scheduled.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("no valid DNS servers found")]
    NoServers,
    #[error("no domains to test")]
    NoDomains,
    #[error("resolver executable not found: {}", .0.display())]
    MissingResolver(PathBuf),
    #[error("failed to read {}: {source}", .path.display())]
    ReadList {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Per-job settings shared by every worker.
#[derive(Debug, Clone)]
pub struct JobSettings {
    /// Attempts per target
    pub query_count: usize,
    /// Upper bound for a single attempt
    pub timeout: Duration,
    /// Stop a job after this many consecutive failures (off by default)
    pub fail_fast_after: Option<usize>,
}

/// Cooperative cancellation shared between the caller and the workers.
///
/// Running jobs finish their current attempt; nothing new is started.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Receives a callback for every completed job.
///
/// Called from [`JobStream::next`] as each record is handed to the consumer,
/// so `completed` counts up from 1 in delivery order.
pub trait ProgressObserver: Send + Sync {
    fn on_job_complete(&self, completed: usize, total: usize, record: &JobRecord);
}

/// The job scheduler.
pub struct Scheduler<R> {
    resolver: Arc<R>,
    settings: JobSettings,
    concurrency: usize,
    cancel: CancelFlag,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl<R: Resolver + 'static> Scheduler<R> {
    /// Create a scheduler running at most `concurrency` jobs at once.
    pub fn new(
        resolver: Arc<R>,
        settings: JobSettings,
        concurrency: usize,
    ) -> Result<Self, SetupError> {
        if concurrency == 0 {
            return Err(SetupError::Config("concurrency must be at least 1".to_string()));
        }
        if settings.query_count == 0 {
            return Err(SetupError::Config("query count must be at least 1".to_string()));
        }

        Ok(Self {
            resolver,
            settings,
            concurrency,
            cancel: CancelFlag::new(),
            observer: None,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Start running every target and return the stream of completed records.
    ///
    /// Records arrive in completion order. Must be called within a tokio runtime.
    pub fn run(&self, targets: Vec<ProbeTarget>) -> JobStream {
        let total = targets.len();
        let (tx, rx) = mpsc::channel(total.max(1));

        tracing::info!(
            "Scheduler: running {} jobs ({} queries each, concurrency {})",
            total,
            self.settings.query_count,
            self.concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let resolver = self.resolver.clone();
        let settings = self.settings.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            for target in targets {
                if cancel.is_cancelled() {
                    break;
                }
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => break,
                };
                // A slot may free up only after cancellation was requested
                if cancel.is_cancelled() {
                    break;
                }

                let resolver = resolver.clone();
                let settings = settings.clone();
                let cancel = cancel.clone();
                let tx = tx.clone();

                tokio::spawn(async move {
                    let _permit = permit; // Hold permit until the record is handed off

                    let record = run_isolated(resolver, target, settings, cancel).await;
                    if tx.send(record).await.is_err() {
                        tracing::debug!("Scheduler: result receiver dropped");
                    }
                });
            }

            if cancel.is_cancelled() {
                tracing::warn!("Scheduler: cancelled, no further jobs dispatched");
            }
        });

        JobStream {
            rx,
            observer: self.observer.clone(),
            completed: 0,
            total,
        }
    }
}

/// Run one job in its own task so that a panic is contained to that job.
async fn run_isolated<R: Resolver + 'static>(
    resolver: Arc<R>,
    target: ProbeTarget,
    settings: JobSettings,
    cancel: CancelFlag,
) -> JobRecord {
    let fallback_target = target.clone();
    let query_count = settings.query_count;

    let handle = tokio::spawn(async move { run_job(&*resolver, target, &settings, &cancel).await });

    match handle.await {
        Ok(record) => record,
        Err(e) => {
            let message = if e.is_panic() {
                format!("job panicked: {}", panic_message(e.into_panic()))
            } else {
                format!("job aborted: {}", e)
            };
            tracing::warn!("Scheduler: job {} failed: {}", fallback_target, message);
            JobRecord::failed(fallback_target, query_count, &message)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Completed job records of one run, in completion order.
///
/// The stream is the only place records are counted, so the progress count
/// and the records delivered never disagree.
pub struct JobStream {
    rx: mpsc::Receiver<JobRecord>,
    observer: Option<Arc<dyn ProgressObserver>>,
    completed: usize,
    total: usize,
}

impl JobStream {
    /// The next completed record, or `None` once every dispatched job is done.
    pub async fn next(&mut self) -> Option<JobRecord> {
        let record = self.rx.recv().await?;
        self.completed += 1;
        if let Some(observer) = &self.observer {
            observer.on_job_complete(self.completed, self.total, &record);
        }
        Some(record)
    }

    /// Number of records delivered so far.
    pub fn completed(&self) -> usize {
        self.completed
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Drain the stream.
    #[cfg(test)]
    pub async fn collect(mut self) -> Vec<JobRecord> {
        let mut records = Vec::with_capacity(self.total);
        while let Some(record) = self.next().await {
            records.push(record);
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::aggregate;
    use crate::scheduler::testing::{ScriptedResolver, Step};
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    fn settings(query_count: usize) -> JobSettings {
        JobSettings {
            query_count,
            timeout: Duration::from_secs(5),
            fail_fast_after: None,
        }
    }

    fn mixed_resolver() -> ScriptedResolver {
        ScriptedResolver::new()
            .on(
                "1.1.1.1",
                vec![
                    Step::answer(10, "203.0.113.5"),
                    Step::answer(12, "203.0.113.5"),
                    Step::answer(11, "203.0.113.5"),
                ],
            )
            .on("9.9.9.9", vec![Step::fail(4, "exit status 1")])
            .on("8.8.8.8", vec![Step::answer(20, "203.0.113.7"), Step::fail(3, "timeout")])
    }

    fn targets() -> Vec<ProbeTarget> {
        let mut out = Vec::new();
        for domain in ["a.example", "b.example", "c.example"] {
            for server in ["1.1.1.1", "9.9.9.9", "8.8.8.8"] {
                out.push(ProbeTarget::new(domain, server));
            }
        }
        out
    }

    /// Comparable view of a record, ignoring completion order.
    fn fingerprint(r: &JobRecord) -> (ProbeTarget, usize, usize, Vec<String>, BTreeSet<String>) {
        (
            r.target.clone(),
            r.successful_count,
            r.failed_count,
            r.unique_addresses.clone(),
            r.distinct_error_messages.clone(),
        )
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<usize>>);

    impl ProgressObserver for Recorder {
        fn on_job_complete(&self, completed: usize, _total: usize, _record: &JobRecord) {
            self.0.lock().unwrap().push(completed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_server_scenario() {
        let resolver = Arc::new(mixed_resolver());
        let scheduler = Scheduler::new(resolver, settings(3), 1).unwrap();
        let targets = vec![
            ProbeTarget::new("a.example", "1.1.1.1"),
            ProbeTarget::new("a.example", "9.9.9.9"),
        ];
        let records = scheduler.run(targets).collect().await;
        assert_eq!(records.len(), 2);

        let good = records.iter().find(|r| r.target.server == "1.1.1.1").unwrap();
        assert!((good.average_latency_ms - 11.0).abs() < 1e-6);
        assert_eq!(good.unique_addresses, vec!["203.0.113.5"]);
        assert_eq!(good.error_rate_percent, 0.0);

        let bad = records.iter().find(|r| r.target.server == "9.9.9.9").unwrap();
        assert_eq!(bad.average_latency_ms, 0.0);
        assert_eq!(bad.error_rate_percent, 100.0);

        let summaries = aggregate(&records);
        assert_eq!(summaries[0].server, "1.1.1.1");
        assert_eq!(summaries[1].server, "9.9.9.9");
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_does_not_change_results() {
        let sequential = Scheduler::new(Arc::new(mixed_resolver()), settings(3), 1).unwrap();
        let mut stream = sequential.run(targets());
        let mut seq_records = Vec::new();
        while let Some(r) = stream.next().await {
            seq_records.push(r);
        }
        assert_eq!(stream.completed(), 9);

        let parallel = Scheduler::new(Arc::new(mixed_resolver()), settings(3), 4).unwrap();
        let mut stream = parallel.run(targets());
        let mut par_records = Vec::new();
        while let Some(r) = stream.next().await {
            par_records.push(r);
        }
        assert_eq!(stream.completed(), 9);

        let a: BTreeSet<_> = seq_records.iter().map(fingerprint).collect();
        let b: BTreeSet<_> = par_records.iter().map(fingerprint).collect();
        assert_eq!(a, b);
        assert_eq!(aggregate(&seq_records), aggregate(&par_records));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pool_is_bounded() {
        let resolver = Arc::new(mixed_resolver());
        let scheduler = Scheduler::new(resolver.clone(), settings(2), 3).unwrap();
        let records = scheduler.run(targets()).collect().await;

        assert_eq!(records.len(), 9);
        assert!(resolver.max_in_flight() <= 3);
        assert!(resolver.max_in_flight() > 1);
        assert_eq!(resolver.calls(), 18);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_order() {
        let resolver = ScriptedResolver::new()
            .on("slow", vec![Step::answer(500, "192.0.2.1")])
            .on("fast", vec![Step::answer(5, "192.0.2.2")]);
        let scheduler = Scheduler::new(Arc::new(resolver), settings(1), 2).unwrap();
        let targets = vec![
            ProbeTarget::new("a.example", "slow"),
            ProbeTarget::new("a.example", "fast"),
        ];
        let records = scheduler.run(targets).collect().await;
        assert_eq!(records[0].target.server, "fast");
        assert_eq!(records[1].target.server, "slow");
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_counts_every_job_once() {
        let recorder = Arc::new(Recorder::default());
        let scheduler = Scheduler::new(Arc::new(mixed_resolver()), settings(2), 4)
            .unwrap()
            .with_observer(recorder.clone());
        let mut stream = scheduler.run(targets());
        let mut delivered = 0;
        while stream.next().await.is_some() {
            delivered += 1;
            // Counted as the record is handed over, never ahead of it
            assert_eq!(stream.completed(), delivered);
            assert_eq!(recorder.0.lock().unwrap().last(), Some(&delivered));
        }

        assert_eq!(delivered, 9);
        let seen = recorder.0.lock().unwrap().clone();
        assert_eq!(seen, (1..=9).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_job_is_isolated() {
        // "broken" has no script, so the resolver panics on it
        let resolver = mixed_resolver();
        let scheduler = Scheduler::new(Arc::new(resolver), settings(3), 2).unwrap();
        let targets = vec![
            ProbeTarget::new("a.example", "1.1.1.1"),
            ProbeTarget::new("a.example", "broken"),
            ProbeTarget::new("b.example", "1.1.1.1"),
        ];
        let mut stream = scheduler.run(targets);
        let mut records = Vec::new();
        while let Some(r) = stream.next().await {
            records.push(r);
        }
        assert_eq!(records.len(), 3);
        assert_eq!(stream.completed(), 3);

        let broken = records.iter().find(|r| r.target.server == "broken").unwrap();
        assert_eq!(broken.samples.len(), 3);
        assert_eq!(broken.error_rate_percent, 100.0);
        let message = broken.distinct_error_messages.iter().next().unwrap();
        assert!(message.starts_with("job panicked"));
        assert!(message.contains("no script for server broken"));

        assert!(records
            .iter()
            .filter(|r| r.target.server == "1.1.1.1")
            .all(|r| r.successful_count == 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_run() {
        let cancel = CancelFlag::new();
        let scheduler = Scheduler::new(Arc::new(mixed_resolver()), settings(3), 2)
            .unwrap()
            .with_cancel(cancel.clone());
        cancel.cancel();
        let mut stream = scheduler.run(targets());
        assert!(stream.next().await.is_none());
        assert_eq!(stream.completed(), 0);
    }

    /// Every server answers in 10ms, so each 3-query job takes 30ms.
    fn uniform_resolver() -> ScriptedResolver {
        ["1.1.1.1", "9.9.9.9", "8.8.8.8"]
            .into_iter()
            .fold(ScriptedResolver::new(), |r, server| {
                r.on(server, vec![Step::answer(10, "192.0.2.1")])
            })
    }

    fn cancel_at(cancel: &CancelFlag, ms: u64) {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            cancel.cancel();
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_run() {
        // Jobs 1-2 finish at 30ms, jobs 3-4 are on their second attempt at 45ms
        let cancel = CancelFlag::new();
        let resolver = Arc::new(uniform_resolver());
        let scheduler = Scheduler::new(resolver.clone(), settings(3), 2)
            .unwrap()
            .with_cancel(cancel.clone());
        cancel_at(&cancel, 45);

        let mut stream = scheduler.run(targets());
        let mut records = Vec::new();
        while let Some(r) = stream.next().await {
            records.push(r);
        }
        assert_eq!(stream.completed(), 4);
        assert!(stream.completed() < stream.total());

        let full: Vec<_> = records.iter().filter(|r| !r.aborted).collect();
        let cut: Vec<_> = records.iter().filter(|r| r.aborted).collect();
        assert_eq!(full.len(), 2);
        assert!(full.iter().all(|r| r.samples.len() == 3));
        assert_eq!(cut.len(), 2);
        for r in cut {
            assert_eq!(r.samples.len(), 2);
            assert_eq!(r.failed_count, 0);
            assert_eq!(r.error_rate_percent, 0.0);
        }
        assert_eq!(resolver.calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_lets_running_attempts_finish() {
        let cancel = CancelFlag::new();
        let scheduler = Scheduler::new(Arc::new(uniform_resolver()), settings(3), 4)
            .unwrap()
            .with_cancel(cancel.clone());
        cancel_at(&cancel, 5);

        let records = scheduler.run(targets()).collect().await;
        assert_eq!(records.len(), 4);
        for r in &records {
            assert!(r.aborted);
            assert_eq!(r.samples.len(), 1);
            assert_eq!(r.successful_count, 1);
        }
    }

    #[test]
    fn test_rejects_zero_limits() {
        let resolver = Arc::new(ScriptedResolver::new());
        assert!(Scheduler::new(resolver.clone(), settings(3), 0).is_err());
        assert!(Scheduler::new(resolver, settings(0), 1).is_err());
    }
}
