//! Configuration types for stallwatch.
//!
//! A [`DetectorConfig`] describes which call sites are allowed to block and
//! which built-in consumers the facade installs. It can be built in code or
//! loaded from TOML:
//!
//! ```toml
//! deny_blocking = true
//! deny_exempt_owners = ["my_app::startup"]
//! log_events = true
//! slow_threshold_ms = 100
//! collect_events = 1000
//!
//! [[allowances]]
//! owner = "my_app::cache::Warmup"
//! member = "run"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};

/// A call site inside which blocking is allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AllowanceEntry {
    /// Owning type name.
    pub owner: String,
    /// Member name.
    pub member: String,
}

impl AllowanceEntry {
    /// Create an allowance entry.
    pub fn new(owner: impl Into<String>, member: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            member: member.into(),
        }
    }
}

/// Configuration for a detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Call sites inside which blocking is not reported.
    pub allowances: Vec<AllowanceEntry>,

    /// Install a consumer that rejects every blocking call.
    ///
    /// The rejection surfaces as an error at the blocking call site.
    pub deny_blocking: bool,

    /// Operation owners the deny consumer lets through.
    pub deny_exempt_owners: Vec<String>,

    /// Log every entry and exit through `tracing`.
    pub log_events: bool,

    /// Exits blocked at least this many milliseconds are logged as warnings.
    pub slow_threshold_ms: Option<u64>,

    /// Keep up to this many blocking events in memory. Zero disables collection.
    pub collect_events: usize,

    /// Record blocking-call metrics.
    pub record_metrics: bool,

    /// Crate prefix the metrics call finder prefers, e.g. `"my_app::"`.
    pub call_site_prefix: Option<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            allowances: Vec::new(),
            deny_blocking: false,
            deny_exempt_owners: Vec::new(),
            log_events: false,
            slow_threshold_ms: None,
            collect_events: 0,
            record_metrics: true,
            call_site_prefix: None,
        }
    }
}

impl DetectorConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow blocking inside `owner.member`.
    pub fn with_allowance(mut self, owner: impl Into<String>, member: impl Into<String>) -> Self {
        self.allowances.push(AllowanceEntry::new(owner, member));
        self
    }

    /// Reject every blocking call.
    pub fn with_deny_blocking(mut self, enabled: bool) -> Self {
        self.deny_blocking = enabled;
        self
    }

    /// Exempt an operation owner from the deny consumer.
    pub fn with_deny_exempt_owner(mut self, owner: impl Into<String>) -> Self {
        self.deny_exempt_owners.push(owner.into());
        self
    }

    /// Enable or disable event logging.
    pub fn with_log_events(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }

    /// Log waits of at least `millis` as warnings.
    pub fn with_slow_threshold_ms(mut self, millis: u64) -> Self {
        self.slow_threshold_ms = Some(millis);
        self
    }

    /// Set the call site prefix used by metrics.
    pub fn with_call_site_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.call_site_prefix = Some(prefix.into());
        self
    }

    /// Set the event collection cap.
    pub fn with_collect_events(mut self, max_events: usize) -> Self {
        self.collect_events = max_events;
        self
    }

    /// Enable or disable metrics.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.record_metrics = enabled;
        self
    }

    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file and validate it.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        debug!(
            path = %path.display(),
            allowances = config.allowances.len(),
            "Loaded detector configuration"
        );
        Ok(config)
    }

    /// Check the configuration for empty names.
    pub fn validate(&self) -> ConfigResult<()> {
        for (index, entry) in self.allowances.iter().enumerate() {
            if entry.owner.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "allowance #{} has an empty owner",
                    index
                )));
            }
            if entry.member.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "allowance #{} for '{}' has an empty member",
                    index, entry.owner
                )));
            }
        }
        if self
            .call_site_prefix
            .as_deref()
            .is_some_and(|p| p.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "call_site_prefix must not be empty".to_string(),
            ));
        }
        if self.deny_exempt_owners.iter().any(|o| o.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "deny_exempt_owners contains an empty owner".to_string(),
            ));
        }
        Ok(())
    }
}
