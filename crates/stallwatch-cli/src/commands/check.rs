//! Check command - validate a detector configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Serialize;

use stallwatch_core::{AllowanceEntry, DetectorConfig};

use crate::OutputFormat;

/// Arguments for the check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Configuration file to check (defaults to --config)
    pub file: Option<PathBuf>,

    /// Print the normalized configuration as TOML
    #[arg(long)]
    pub print: bool,
}

/// Check result.
#[derive(Serialize)]
struct CheckResult {
    path: String,
    valid: bool,
    allowances: Vec<AllowanceEntry>,
    deny_blocking: bool,
    deny_exempt_owners: Vec<String>,
    log_events: bool,
    slow_threshold_ms: Option<u64>,
    collect_events: usize,
    record_metrics: bool,
    call_site_prefix: Option<String>,
}

impl CheckResult {
    fn new(path: &Path, config: DetectorConfig) -> Self {
        Self {
            path: path.display().to_string(),
            valid: true,
            allowances: config.allowances,
            deny_blocking: config.deny_blocking,
            deny_exempt_owners: config.deny_exempt_owners,
            log_events: config.log_events,
            slow_threshold_ms: config.slow_threshold_ms,
            collect_events: config.collect_events,
            record_metrics: config.record_metrics,
            call_site_prefix: config.call_site_prefix,
        }
    }

    fn to_text(&self) -> String {
        let mut output = format!("✓ {} is valid\n", self.path);

        if self.allowances.is_empty() {
            output.push_str("  Allowances: none\n");
        } else {
            output.push_str(&format!("  Allowances: {}\n", self.allowances.len()));
            for entry in &self.allowances {
                output.push_str(&format!("    - {}.{}\n", entry.owner, entry.member));
            }
        }

        output.push_str(&format!("  Deny blocking: {}\n", self.deny_blocking));
        for owner in &self.deny_exempt_owners {
            output.push_str(&format!("    exempt: {}\n", owner));
        }
        output.push_str(&format!("  Log events: {}\n", self.log_events));
        if let Some(ms) = self.slow_threshold_ms {
            output.push_str(&format!("  Slow threshold: {} ms\n", ms));
        }
        if self.collect_events > 0 {
            output.push_str(&format!("  Collect events: up to {}\n", self.collect_events));
        }
        output.push_str(&format!("  Metrics: {}\n", self.record_metrics));
        if let Some(prefix) = &self.call_site_prefix {
            output.push_str(&format!("  Call site prefix: {}\n", prefix));
        }

        output
    }
}

/// Execute the check command.
pub fn execute(args: CheckArgs, config: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let Some(path) = args.file.or(config) else {
        bail!("No configuration file given (pass a path or --config)");
    };

    let config = DetectorConfig::from_file(&path)
        .with_context(|| format!("Invalid configuration: {}", path.display()))?;

    if args.print {
        let text = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
        print!("{}", text);
        return Ok(());
    }

    let result = CheckResult::new(&path, config);

    match format {
        OutputFormat::Human => print!("{}", result.to_text()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::JsonCompact => println!("{}", serde_json::to_string(&result)?),
    }

    Ok(())
}
