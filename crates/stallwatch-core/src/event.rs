//! Blocking events delivered to exit consumers.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::context::ContextId;
use crate::operation::OperationId;

/// How the guarded operation left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitOutcome {
    /// The operation returned normally.
    Returned,
    /// The operation raised an error or panicked.
    Raised,
}

impl ExitOutcome {
    /// Check if the operation raised.
    pub fn is_raised(&self) -> bool {
        matches!(self, ExitOutcome::Raised)
    }
}

/// A completed blocking wait.
///
/// Built by the dispatcher when a tracked operation exits and handed to every
/// exit consumer. Dropped once exit dispatch finishes.
#[derive(Debug, Clone)]
pub struct BlockingEvent {
    operation: OperationId,
    context: ContextId,
    started_at: Instant,
    ended_at: Instant,
    outcome: ExitOutcome,
}

impl BlockingEvent {
    /// Create a blocking event.
    pub fn new(
        operation: OperationId,
        context: ContextId,
        started_at: Instant,
        ended_at: Instant,
        outcome: ExitOutcome,
    ) -> Self {
        Self {
            operation,
            context,
            started_at,
            ended_at,
            outcome,
        }
    }

    /// The operation that blocked.
    pub fn operation(&self) -> &OperationId {
        &self.operation
    }

    /// The operation string, as entry consumers saw it.
    pub fn method(&self) -> String {
        self.operation.to_string()
    }

    /// The context that blocked.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// When the wait started.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// When the wait ended.
    pub fn ended_at(&self) -> Instant {
        self.ended_at
    }

    /// How the operation left.
    pub fn outcome(&self) -> ExitOutcome {
        self.outcome
    }

    /// Time spent blocked. Never negative.
    pub fn elapsed(&self) -> Duration {
        self.ended_at.saturating_duration_since(self.started_at)
    }

    /// Time spent blocked, in nanoseconds.
    pub fn blocked_time_nanos(&self) -> u64 {
        u64::try_from(self.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// The flat field map form of this event.
    pub fn fields(&self) -> BlockingFields {
        BlockingFields {
            method: self.method(),
            blocked_time_nanos: self.blocked_time_nanos(),
        }
    }
}

/// Field map of a [`BlockingEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockingFields {
    /// Operation string.
    pub method: String,
    /// Time spent blocked in nanoseconds.
    pub blocked_time_nanos: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_and_fields() {
        let start = Instant::now();
        let end = start + Duration::from_millis(25);
        let event = BlockingEvent::new(
            OperationId::method("X", "join"),
            ContextId::custom(1),
            start,
            end,
            ExitOutcome::Returned,
        );

        assert_eq!(event.elapsed(), Duration::from_millis(25));
        assert_eq!(
            event.fields(),
            BlockingFields {
                method: "X.join".to_string(),
                blocked_time_nanos: 25_000_000,
            }
        );
    }

    #[test]
    fn test_elapsed_never_negative() {
        let end = Instant::now();
        let start = end + Duration::from_millis(5);
        let event = BlockingEvent::new(
            OperationId::method("X", "join"),
            ContextId::custom(1),
            start,
            end,
            ExitOutcome::Raised,
        );

        assert_eq!(event.elapsed(), Duration::ZERO);
        assert!(event.outcome().is_raised());
    }
}
