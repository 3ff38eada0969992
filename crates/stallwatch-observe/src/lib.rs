//! stallwatch Observability
//!
//! This crate provides consumers that turn blocking calls into something a
//! human or a dashboard can read:
//!
//! - [`LoggingConsumer`]: logs every blocking call through `tracing`
//! - [`CollectingConsumer`]: keeps blocking events for later analysis
//! - [`BlockingMetrics`]: counts calls and blocked time per call site
//! - [`DetectionReport`]: text and JSON summaries
//!
//! # Metrics
//!
//! ```
//! use std::sync::Arc;
//! use stallwatch_observe::BlockingMetrics;
//! use stallwatch_registry::ConsumerRegistry;
//!
//! let consumers = ConsumerRegistry::new();
//! let metrics = Arc::new(BlockingMetrics::new());
//! metrics.install(&consumers);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.total_calls(), 0);
//! ```
//!
//! # Reports
//!
//! ```ignore
//! use stallwatch_observe::DetectionReport;
//!
//! let report = DetectionReport::new(metrics.snapshot())
//!     .with_events(collector.records(), collector.dropped());
//!
//! println!("{}", report.to_text());
//! ```

pub mod events;
pub mod metrics;
pub mod report;

// Re-export main types
pub use events::{CollectingConsumer, EventRecord, LoggingConsumer};
pub use metrics::{
    BacktraceCallFinder, BlockingMetrics, CallFinder, CallMetrics, Frame, MetricsSnapshot,
    UNKNOWN_CALL, find_call, parse_backtrace, sanitize_thread_name,
};
pub use report::{DetectionReport, ReportId};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::events::{CollectingConsumer, LoggingConsumer};
    pub use crate::metrics::{BlockingMetrics, CallFinder, MetricsSnapshot};
    pub use crate::report::DetectionReport;
}
