//! Detection reports.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stallwatch_core::AllowanceEntry;

use crate::events::EventRecord;
use crate::metrics::MetricsSnapshot;

/// Unique identifier for a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReportId(Uuid);

impl ReportId {
    /// Create a new random report ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReportId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ReportId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summary of what a detector observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Unique report ID.
    pub report_id: ReportId,
    /// Allowances in effect.
    pub allowances: Vec<AllowanceEntry>,
    /// Metrics at report time.
    pub metrics: MetricsSnapshot,
    /// Collected events, oldest first.
    pub events: Vec<EventRecord>,
    /// Events dropped by a full collector.
    pub dropped_events: u64,
    /// Blocking calls rejected by policy.
    pub rejected_calls: u64,
}

impl DetectionReport {
    /// Create a report from a metrics snapshot.
    pub fn new(metrics: MetricsSnapshot) -> Self {
        Self {
            report_id: ReportId::new(),
            allowances: Vec::new(),
            metrics,
            events: Vec::new(),
            dropped_events: 0,
            rejected_calls: 0,
        }
    }

    /// Set the allowances in effect.
    pub fn with_allowances(mut self, allowances: Vec<AllowanceEntry>) -> Self {
        self.allowances = allowances;
        self
    }

    /// Attach collected events.
    pub fn with_events(mut self, events: Vec<EventRecord>, dropped: u64) -> Self {
        self.events = events;
        self.dropped_events = dropped;
        self
    }

    /// Set the number of rejected calls.
    pub fn with_rejected_calls(mut self, rejected: u64) -> Self {
        self.rejected_calls = rejected;
        self
    }

    /// Check if no blocking call was observed or rejected.
    pub fn is_clean(&self) -> bool {
        self.metrics.total_calls() == 0 && self.events.is_empty() && self.rejected_calls == 0
    }

    /// Format as human-readable text.
    pub fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Detection Report: {}\n", self.report_id));
        output.push('\n');

        output.push_str(&format!(
            "Blocking calls: {} ({:.3} ms blocked)\n",
            self.metrics.total_calls(),
            self.metrics.total_blocked_time_nanos() as f64 / 1_000_000.0
        ));
        output.push_str(&format!("Storage initializations: {}\n", self.metrics.storage_inits));
        if self.rejected_calls > 0 {
            output.push_str(&format!("Rejected calls: {}\n", self.rejected_calls));
        }

        if !self.metrics.calls.is_empty() {
            output.push_str("\nCall sites:\n");
            for call in &self.metrics.calls {
                output.push_str(&format!(
                    "  {} [{}]: {} calls, {} ns\n",
                    call.call, call.thread_name, call.count, call.blocked_time_nanos
                ));
            }
        }

        if !self.events.is_empty() {
            output.push_str("\nEvents:\n");
            for event in &self.events {
                let raised = if event.outcome.is_raised() { " (raised)" } else { "" };
                output.push_str(&format!(
                    "  {} on {}: {} ns{}\n",
                    event.operation, event.context, event.blocked_time_nanos, raised
                ));
            }
            if self.dropped_events > 0 {
                output.push_str(&format!("  ... {} more dropped\n", self.dropped_events));
            }
        }

        if !self.allowances.is_empty() {
            output.push_str("\nAllowances:\n");
            for entry in &self.allowances {
                output.push_str(&format!("  {}.{}\n", entry.owner, entry.member));
            }
        }

        output
    }

    /// Format as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Format as pretty JSON string.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stallwatch_core::ExitOutcome;

    use crate::metrics::CallMetrics;

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            calls: vec![CallMetrics {
                call: "app.caller".to_string(),
                thread_name: "worker-N".to_string(),
                count: 2,
                blocked_time_nanos: 3_000_000,
            }],
            storage_inits: 5,
        }
    }

    #[test]
    fn test_report_id() {
        assert_ne!(ReportId::new(), ReportId::new());
    }

    #[test]
    fn test_empty_report_is_clean() {
        let report = DetectionReport::new(MetricsSnapshot::default());
        assert!(report.is_clean());
        assert!(report.to_text().contains("Blocking calls: 0"));
    }

    #[test]
    fn test_report_to_text() {
        let report = DetectionReport::new(snapshot())
            .with_allowances(vec![AllowanceEntry::new("app::Warmup", "run")])
            .with_events(
                vec![EventRecord {
                    operation: "X.join".to_string(),
                    context: "custom-1".to_string(),
                    blocked_time_nanos: 10,
                    outcome: ExitOutcome::Raised,
                }],
                4,
            )
            .with_rejected_calls(1);

        let text = report.to_text();
        assert!(!report.is_clean());
        assert!(text.contains("Blocking calls: 2 (3.000 ms blocked)"));
        assert!(text.contains("app.caller [worker-N]: 2 calls"));
        assert!(text.contains("X.join on custom-1: 10 ns (raised)"));
        assert!(text.contains("4 more dropped"));
        assert!(text.contains("app::Warmup.run"));
        assert!(text.contains("Rejected calls: 1"));
    }

    #[test]
    fn test_report_to_json() {
        let report = DetectionReport::new(snapshot());
        let json = report.to_json();

        assert_eq!(json["metrics"]["storage_inits"], 5);
        assert_eq!(json["metrics"]["calls"][0]["call"], "app.caller");
        assert_eq!(json["report_id"], report.report_id.to_string());
    }
}
