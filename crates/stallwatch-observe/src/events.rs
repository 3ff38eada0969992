//! Logging and collecting consumers.

use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use stallwatch_core::{BlockingEvent, ConsumerResult, ExitOutcome};
use stallwatch_registry::{EntryConsumer, ExitConsumer};

/// A consumer that logs blocking calls through `tracing`.
///
/// Entry is logged at `debug`. Exit is logged at `debug`, or at `warn` when
/// the wait took at least the slow threshold.
#[derive(Debug, Clone, Default)]
pub struct LoggingConsumer {
    /// Waits at least this long are logged as warnings.
    pub slow_threshold: Option<Duration>,
}

impl LoggingConsumer {
    /// Create a logging consumer without a slow threshold.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slow threshold.
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = Some(threshold);
        self
    }

    fn is_slow(&self, elapsed: Duration) -> bool {
        self.slow_threshold.is_some_and(|t| elapsed >= t)
    }
}

impl EntryConsumer for LoggingConsumer {
    fn on_blocking_call(&self, operation: &str) -> ConsumerResult {
        tracing::debug!(event = "blocking_call", operation = operation, "Blocking call");
        Ok(())
    }
}

impl ExitConsumer for LoggingConsumer {
    fn on_blocking_exit(&self, event: &BlockingEvent) -> ConsumerResult {
        let elapsed = event.elapsed();
        if self.is_slow(elapsed) {
            tracing::warn!(
                event = "blocking_exit",
                operation = %event.operation(),
                context = %event.context(),
                elapsed_us = elapsed.as_micros() as u64,
                raised = event.outcome().is_raised(),
                "Slow blocking call"
            );
        } else {
            tracing::debug!(
                event = "blocking_exit",
                operation = %event.operation(),
                context = %event.context(),
                elapsed_us = elapsed.as_micros() as u64,
                raised = event.outcome().is_raised(),
                "Blocking call finished"
            );
        }
        Ok(())
    }
}

/// Serializable view of a [`BlockingEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Operation string.
    pub operation: String,
    /// Context the wait ran on.
    pub context: String,
    /// Time spent blocked.
    pub blocked_time_nanos: u64,
    /// How the operation left.
    pub outcome: ExitOutcome,
}

impl From<&BlockingEvent> for EventRecord {
    fn from(event: &BlockingEvent) -> Self {
        Self {
            operation: event.method(),
            context: event.context().to_string(),
            blocked_time_nanos: event.blocked_time_nanos(),
            outcome: event.outcome(),
        }
    }
}

/// An exit consumer that keeps blocking events for later analysis.
///
/// Events past the cap are dropped and counted.
pub struct CollectingConsumer {
    events: RwLock<Vec<BlockingEvent>>,
    max_events: usize,
    dropped: RwLock<u64>,
}

impl CollectingConsumer {
    /// Create a collector holding at most `max_events` events.
    pub fn new(max_events: usize) -> Self {
        Self {
            events: RwLock::new(Vec::new()),
            max_events,
            dropped: RwLock::new(0),
        }
    }

    /// Get collected events.
    pub fn events(&self) -> Vec<BlockingEvent> {
        self.events.read().clone()
    }

    /// Get collected events as serializable records.
    pub fn records(&self) -> Vec<EventRecord> {
        self.events.read().iter().map(EventRecord::from).collect()
    }

    /// Number of events dropped because the collector was full.
    pub fn dropped(&self) -> u64 {
        *self.dropped.read()
    }

    /// Clear collected events.
    pub fn clear(&self) {
        self.events.write().clear();
        *self.dropped.write() = 0;
    }

    /// Get event count.
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl ExitConsumer for CollectingConsumer {
    fn on_blocking_exit(&self, event: &BlockingEvent) -> ConsumerResult {
        let mut events = self.events.write();
        if events.len() < self.max_events {
            events.push(event.clone());
        } else {
            *self.dropped.write() += 1;
        }
        Ok(())
    }
}

impl std::fmt::Debug for CollectingConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectingConsumer")
            .field("len", &self.len())
            .field("max_events", &self.max_events)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use stallwatch_core::{ContextId, OperationId};

    fn event(member: &str, elapsed: Duration, outcome: ExitOutcome) -> BlockingEvent {
        let start = Instant::now();
        BlockingEvent::new(
            OperationId::method("X", member.to_string()),
            ContextId::custom(4),
            start,
            start + elapsed,
            outcome,
        )
    }

    #[test]
    fn test_logging_consumer_never_rejects() {
        let logger = LoggingConsumer::new().with_slow_threshold(Duration::from_millis(5));

        assert!(logger.on_blocking_call("X.join").is_ok());
        assert!(logger
            .on_blocking_exit(&event("join", Duration::from_millis(10), ExitOutcome::Raised))
            .is_ok());
        assert!(logger.is_slow(Duration::from_millis(5)));
        assert!(!logger.is_slow(Duration::from_millis(4)));
        assert!(!LoggingConsumer::new().is_slow(Duration::from_secs(60)));
    }

    #[test]
    fn test_collecting_consumer() {
        let collector = CollectingConsumer::new(100);
        collector
            .on_blocking_exit(&event("join", Duration::from_millis(3), ExitOutcome::Returned))
            .unwrap();

        assert_eq!(collector.len(), 1);
        let records = collector.records();
        assert_eq!(records[0].operation, "X.join");
        assert_eq!(records[0].context, "custom-4");
        assert_eq!(records[0].blocked_time_nanos, 3_000_000);
        assert_eq!(records[0].outcome, ExitOutcome::Returned);
    }

    #[test]
    fn test_collecting_consumer_max_events() {
        let collector = CollectingConsumer::new(2);

        for i in 0..5 {
            collector
                .on_blocking_exit(&event(
                    &format!("op_{}", i),
                    Duration::ZERO,
                    ExitOutcome::Returned,
                ))
                .unwrap();
        }

        assert_eq!(collector.len(), 2);
        assert_eq!(collector.dropped(), 3);
        assert_eq!(collector.events()[1].method(), "X.op_1");

        collector.clear();
        assert!(collector.is_empty());
        assert_eq!(collector.dropped(), 0);
    }
}
