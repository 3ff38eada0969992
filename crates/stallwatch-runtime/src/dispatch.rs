//! The dispatch pipeline.
//!
//! An instrumentation engine calls [`Dispatcher::on_enter`] before a
//! designated operation and [`Dispatcher::on_exit`] after it, passing the
//! [`Token`] returned by the entry call. Per (context, operation) the state
//! moves `IDLE → ENTERED → EXITED`:
//!
//! ```text
//! on_enter ──► allowed?  ──yes──► empty token
//!                │no
//!                ▼
//!            armed?      ──yes──► empty token   (nested block)
//!                │no
//!                ▼
//!            would wait? ──no───► empty token   (already satisfied)
//!                │yes
//!                ▼
//!            entry consumers ──error──► EntryRejected, context stays unarmed
//!                │ok
//!                ▼
//!            arm, token{operation, start}
//!
//! on_exit(token) ──empty──► nothing
//!                   │
//!                   ▼
//!            disarm, build BlockingEvent, exit consumers ──error──► ExitFailed
//! ```
//!
//! Arming happens only after every entry consumer succeeded, and disarming
//! happens before any exit consumer runs, so a failing consumer never leaves a
//! context armed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use tracing::trace;

use stallwatch_core::{
    BlockingEvent, ContextId, DetectionError, DetectionResult, ExitOutcome, OperationId,
};
use stallwatch_registry::{AllowanceRegistry, ConsumerRegistry};

use crate::circularity::CircularityLock;
use crate::tracker::StateTracker;

/// Handle returned by [`Dispatcher::on_enter`] and consumed by
/// [`Dispatcher::on_exit`].
///
/// An empty token means the call was not tracked: it was allowed, nested, not
/// actually blocking, or an entry consumer rejected it.
#[derive(Debug)]
#[must_use = "a non-empty token leaves its context armed until passed to on_exit"]
pub struct Token {
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    operation: OperationId,
    started_at: Instant,
}

impl Token {
    /// A token for an untracked call.
    pub fn empty() -> Self {
        Self { pending: None }
    }

    /// Check if the call was not tracked.
    pub fn is_empty(&self) -> bool {
        self.pending.is_none()
    }

    /// The tracked operation.
    pub fn operation(&self) -> Option<&OperationId> {
        self.pending.as_ref().map(|p| &p.operation)
    }

    /// When the tracked wait started.
    pub fn started_at(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.started_at)
    }
}

/// Implements the enter/exit protocol over the shared registries.
pub struct Dispatcher {
    allowances: Arc<AllowanceRegistry>,
    consumers: Arc<ConsumerRegistry>,
    tracker: StateTracker,
    storage_init_lock: CircularityLock,
}

impl Dispatcher {
    /// Create a dispatcher over the given registries.
    pub fn new(allowances: Arc<AllowanceRegistry>, consumers: Arc<ConsumerRegistry>) -> Self {
        Self {
            allowances,
            consumers,
            tracker: StateTracker::new(),
            storage_init_lock: CircularityLock::new(),
        }
    }

    /// The allowance registry.
    pub fn allowances(&self) -> &Arc<AllowanceRegistry> {
        &self.allowances
    }

    /// The consumer registry.
    pub fn consumers(&self) -> &Arc<ConsumerRegistry> {
        &self.consumers
    }

    /// The armed-context tracker.
    pub fn tracker(&self) -> &StateTracker {
        &self.tracker
    }

    /// Entry hook, called before `operation` starts on `context`.
    ///
    /// `would_suspend` tells whether the operation is about to wait, e.g.
    /// whether the awaited result is still pending.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::EntryRejected`] with the first entry
    /// consumer error. Consumers after it are not invoked and the context is
    /// not armed.
    pub fn on_enter(
        &self,
        context: ContextId,
        operation: &OperationId,
        would_suspend: bool,
    ) -> DetectionResult<Token> {
        if self
            .allowances
            .is_suppressed(operation.owner(), operation.member())
        {
            trace!(operation = %operation, "Allowed operation, not tracking");
            return Ok(Token::empty());
        }

        if self.tracker.is_armed(context) {
            return Ok(Token::empty());
        }

        if !would_suspend {
            return Ok(Token::empty());
        }

        let entry = self.consumers.entry().snapshot();
        if !entry.is_empty() {
            let method = operation.to_string();
            for consumer in entry.iter() {
                if let Err(source) = consumer.on_blocking_call(&method) {
                    trace!(operation = %method, error = %source, "Entry consumer rejected call");
                    return Err(DetectionError::EntryRejected {
                        operation: method,
                        source,
                    });
                }
            }
        }

        self.tracker.arm(context);
        trace!(operation = %operation, context = %context, "Blocking call entered");

        Ok(Token {
            pending: Some(Pending {
                operation: operation.clone(),
                started_at: Instant::now(),
            }),
        })
    }

    /// Exit hook, called when the operation leaves, normally or not.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::ExitFailed`] with the first exit consumer
    /// error. The context is already disarmed by then.
    pub fn on_exit(
        &self,
        context: ContextId,
        token: Token,
        outcome: ExitOutcome,
    ) -> DetectionResult<()> {
        let Some(pending) = token.pending else {
            return Ok(());
        };

        self.tracker.disarm(context);

        let event = BlockingEvent::new(
            pending.operation,
            context,
            pending.started_at,
            Instant::now(),
            outcome,
        );

        trace!(
            operation = %event.operation(),
            context = %context,
            elapsed_us = event.elapsed().as_micros() as u64,
            raised = outcome.is_raised(),
            "Blocking call exited"
        );

        for consumer in self.consumers.exit().snapshot().iter() {
            if let Err(source) = consumer.on_blocking_exit(&event) {
                return Err(DetectionError::ExitFailed {
                    operation: event.method(),
                    source,
                });
            }
        }

        Ok(())
    }

    /// Storage-initialization hook.
    ///
    /// Each consumer runs independently; errors and panics are discarded. A
    /// consumer that itself initializes context-local storage on this context
    /// does not trigger a nested dispatch.
    pub fn on_storage_init(&self, context: ContextId) {
        let consumers = self.consumers.storage_init().snapshot();
        if consumers.is_empty() {
            return;
        }

        let Some(_guard) = self.storage_init_lock.try_enter(context) else {
            return;
        };

        for consumer in consumers.iter() {
            match panic::catch_unwind(AssertUnwindSafe(|| consumer.on_storage_init())) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => trace!(error = %err, "Storage init consumer failed"),
                Err(_) => trace!("Storage init consumer panicked"),
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("allowances", &self.allowances.len())
            .field("entry_consumers", &self.consumers.entry().len())
            .field("exit_consumers", &self.consumers.exit().len())
            .field("armed_contexts", &self.tracker.armed_count())
            .finish()
    }
}
