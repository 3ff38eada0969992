//! Probe command - Run a synthetic blocking workload through the detector.
//!
//! Every worker performs four waits:
//!
//! 1. a join on a thread that is still running (reported)
//! 2. a receive on a channel that already holds a message (silent)
//! 3. a receive on a channel whose sender is still sleeping (reported)
//! 4. a join on a running thread inside an allowed call site (silent)

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::{Context, Result, anyhow};
use clap::Args;
use serde::Serialize;

use stallwatch::prelude::*;

use crate::OutputFormat;

/// Allowed call site the probe warms up inside.
pub const PROBE_OWNER: &str = "stallwatch_cli::probe::Warmup";
/// Member of the allowed call site.
pub const PROBE_MEMBER: &str = "run";

/// Arguments for the probe command.
#[derive(Args)]
pub struct ProbeArgs {
    /// Number of worker threads
    #[arg(short = 't', long, default_value = "4")]
    pub threads: usize,

    /// How long each pending wait lasts, in milliseconds
    #[arg(short = 'w', long, default_value = "20")]
    pub wait_ms: u64,

    /// Events to keep when the configuration does not collect any
    #[arg(long, default_value = "256")]
    pub collect: usize,

    /// Log every blocking call
    #[arg(long)]
    pub log_events: bool,
}

/// What the workers saw.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProbeSummary {
    /// Waits that completed.
    pub completed: u64,
    /// Waits rejected before they started.
    pub rejected: u64,
    /// Waits whose exit consumers failed.
    pub exit_failures: u64,
}

impl ProbeSummary {
    fn merge(&mut self, other: ProbeSummary) {
        self.completed += other.completed;
        self.rejected += other.rejected;
        self.exit_failures += other.exit_failures;
    }

    fn record<T>(&mut self, result: Result<T, DetectionError>) {
        match result {
            Ok(_) => self.completed += 1,
            Err(e) if e.is_entry() => self.rejected += 1,
            Err(_) => self.exit_failures += 1,
        }
    }
}

/// Probe output.
#[derive(Serialize)]
struct ProbeResult {
    threads: usize,
    wait_ms: u64,
    summary: ProbeSummary,
    report: DetectionReport,
}

fn load_config(path: Option<&PathBuf>) -> Result<DetectorConfig> {
    match path {
        Some(path) => DetectorConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration: {}", path.display())),
        None => Ok(DetectorConfig::default()),
    }
}

fn build_runtime(args: &ProbeArgs, mut config: DetectorConfig) -> Result<StallwatchRuntime> {
    if config.collect_events == 0 {
        config.collect_events = args.collect;
    }
    if config.call_site_prefix.is_none() {
        config.call_site_prefix = Some("stallwatch::commands::".to_string());
    }
    config.log_events |= args.log_events;

    StallwatchBuilder::from_config(config)
        .with_allowance(PROBE_OWNER, PROBE_MEMBER)
        .build()
        .context("Failed to build detector")
}

fn pending_thread(wait: Duration) -> thread::JoinHandle<()> {
    thread::spawn(move || thread::sleep(wait))
}

fn run_worker(runtime: &StallwatchRuntime, wait: Duration) -> ProbeSummary {
    let mut summary = ProbeSummary::default();

    summary.record(runtime.wait_on(pending_thread(wait)));

    let (tx, rx) = mpsc::channel();
    let _ = tx.send(1u32);
    summary.record(runtime.recv(&rx));

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        thread::sleep(wait);
        let _ = tx.send(2u32);
    });
    summary.record(runtime.recv(&rx));

    {
        let _scope = runtime.allowed_scope(PROBE_OWNER, PROBE_MEMBER);
        summary.record(runtime.wait_on(pending_thread(wait)));
    }

    summary
}

/// Run the workload and report what the detector observed.
pub fn run_probe(
    args: &ProbeArgs,
    config: DetectorConfig,
) -> Result<(ProbeSummary, DetectionReport)> {
    let runtime = Arc::new(build_runtime(args, config)?);
    let wait = Duration::from_millis(args.wait_ms);

    tracing::info!(threads = args.threads, wait_ms = args.wait_ms, "Starting probe");

    let mut workers = Vec::with_capacity(args.threads);
    for index in 0..args.threads {
        let runtime = Arc::clone(&runtime);
        let handle = thread::Builder::new()
            .name(format!("probe-worker-{}", index))
            .spawn(move || run_worker(&runtime, wait))
            .context("Failed to spawn probe worker")?;
        workers.push(handle);
    }

    let mut summary = ProbeSummary::default();
    for worker in workers {
        let stats = worker
            .join()
            .map_err(|_| anyhow!("Probe worker panicked"))?;
        summary.merge(stats);
    }

    Ok((summary, runtime.report()))
}

/// Execute the probe command.
pub fn execute(
    args: ProbeArgs,
    config: Option<PathBuf>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let detector_config = load_config(config.as_ref())?;
    let (summary, report) = run_probe(&args, detector_config)?;

    let result = ProbeResult {
        threads: args.threads,
        wait_ms: args.wait_ms,
        summary,
        report,
    };

    match format {
        OutputFormat::Human => {
            if !quiet {
                println!(
                    "Probe: {} threads, {} ms waits ({} completed, {} rejected, {} exit failures)",
                    result.threads,
                    result.wait_ms,
                    summary.completed,
                    summary.rejected,
                    summary.exit_failures
                );
                println!();
            }
            print!("{}", result.report.to_text());
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::JsonCompact => println!("{}", serde_json::to_string(&result)?),
    }

    Ok(())
}
