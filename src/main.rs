//! dnsbench - DNS resolver benchmark
//!
//! Resolves every domain through every server repeatedly with `dnslookup`,
//! then ranks the servers by reachability, error rate and latency.

mod config;
mod inputs;
mod models;
mod probe;
mod report;
mod scheduler;

use config::BenchConfig;
use probe::DnsLookup;
use report::ConsoleProgress;
use scheduler::{CancelFlag, Scheduler};

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "dnsbench", version, about = "Benchmark DNS resolvers with dnslookup")]
struct Cli {
    /// Domain list (one per line, # comments)
    #[arg(long, value_name = "FILE")]
    domains: Option<PathBuf>,
    /// Server list: tls://, https://, quic://, sdns:// or IPv4
    #[arg(long, value_name = "FILE")]
    servers: Option<PathBuf>,
    /// Queries per domain/server pair
    #[arg(long)]
    queries: Option<usize>,
    /// Jobs running at once
    #[arg(long)]
    concurrency: Option<usize>,
    /// Timeout per query in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Path to the dnslookup executable
    #[arg(long, value_name = "PATH")]
    dnslookup: Option<PathBuf>,
    /// Stop a job after N consecutive failed queries
    #[arg(long, value_name = "N")]
    fail_fast: Option<usize>,
    /// Directory for report files
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Also write a JSON report with every job record
    #[arg(long, default_value_t = false)]
    json: bool,
    /// Do not print each job result
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

impl Cli {
    fn apply(&self, cfg: &mut BenchConfig) {
        if let Some(p) = &self.domains {
            cfg.domains_file = p.clone();
        }
        if let Some(p) = &self.servers {
            cfg.servers_file = p.clone();
        }
        if let Some(n) = self.queries {
            cfg.num_queries = n;
        }
        if let Some(n) = self.concurrency {
            cfg.max_threads = n;
        }
        if let Some(ms) = self.timeout_ms {
            cfg.timeout = Duration::from_millis(ms);
        }
        if let Some(p) = &self.dnslookup {
            cfg.dnslookup_path = p.clone();
        }
        if self.fail_fast.is_some() {
            cfg.fail_fast_after = self.fail_fast;
        }
        if let Some(p) = &self.output_dir {
            cfg.output_dir = p.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("dnsbench=info".parse()?))
        .init();

    let cli = Cli::parse();
    let mut cfg = BenchConfig::load();
    cli.apply(&mut cfg);
    cfg.validate()?;

    // Setup failures end the run before anything is scheduled
    let resolver = DnsLookup::locate(&cfg.dnslookup_path)?;
    tracing::info!("Using resolver at {}", resolver.path().display());

    let domains = inputs::read_list(&cfg.domains_file)?;
    let servers = inputs::read_list(&cfg.servers_file)?;
    let targets = inputs::prepare_targets(&domains, &servers)?;
    tracing::info!(
        "Benchmarking {} domains against {} servers ({} jobs)",
        domains.len(),
        targets.len() / domains.len(),
        targets.len()
    );

    let progress = Arc::new(ConsoleProgress);
    let cancel = CancelFlag::new();
    let scheduler = Scheduler::new(Arc::new(resolver), cfg.job_settings(), cfg.max_threads)?
        .with_observer(progress.clone())
        .with_cancel(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing running queries");
            cancel.cancel();
        }
    });

    if !cli.quiet {
        println!("{}", report::format_header());
    }

    let mut stream = scheduler.run(targets);
    let mut records = Vec::with_capacity(stream.total());
    while let Some(record) = stream.next().await {
        if !cli.quiet {
            println!("{}", report::format_job(&record));
        }
        records.push(record);
    }
    progress.finish();

    if stream.completed() < stream.total() {
        tracing::warn!(
            "Run stopped early: {} of {} jobs completed",
            stream.completed(),
            stream.total()
        );
    }

    let summaries = report::aggregate(&records);
    println!("{}", report::format_summary(&summaries));

    for path in report::save_reports(&cfg.output_dir, &summaries, &records, cli.json)? {
        tracing::info!("Results saved to {}", path.display());
    }

    Ok(())
}
