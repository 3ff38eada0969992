//! RAII pairing of the entry and exit hooks.

use std::thread;

use tracing::{trace, warn};

use stallwatch_core::{ContextId, DetectionResult, ExitOutcome, OperationId};

use crate::dispatch::{Dispatcher, Token};

/// Guard for one guarded operation on the current context.
///
/// Dropping the guard runs the exit hook. Exit consumer errors are then only
/// logged; call [`finish`](Self::finish) to receive them instead. A guard
/// dropped while its thread is panicking reports [`ExitOutcome::Raised`].
#[must_use = "the exit hook runs when the guard is dropped"]
#[derive(Debug)]
pub struct BlockingGuard<'a> {
    dispatcher: &'a Dispatcher,
    context: ContextId,
    token: Option<Token>,
}

impl<'a> BlockingGuard<'a> {
    fn new(dispatcher: &'a Dispatcher, context: ContextId, token: Token) -> Self {
        Self {
            dispatcher,
            context,
            token: Some(token),
        }
    }

    /// Check if this guard will report an exit event.
    pub fn is_tracked(&self) -> bool {
        self.token.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// The context the guard was opened on.
    pub fn context(&self) -> ContextId {
        self.context
    }

    /// Run the exit hook for a normal return.
    pub fn finish(self) -> DetectionResult<()> {
        self.finish_with(ExitOutcome::Returned)
    }

    /// Run the exit hook with an explicit outcome.
    pub fn finish_with(mut self, outcome: ExitOutcome) -> DetectionResult<()> {
        match self.token.take() {
            Some(token) => self.dispatcher.on_exit(self.context, token, outcome),
            None => Ok(()),
        }
    }
}

impl Drop for BlockingGuard<'_> {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };
        let outcome = if thread::panicking() {
            ExitOutcome::Raised
        } else {
            ExitOutcome::Returned
        };
        if let Err(err) = self.dispatcher.on_exit(self.context, token, outcome) {
            warn!(error = %err, context = %self.context, "Exit consumer failed during guard drop");
        }
    }
}

/// Scope of an allowed (owner, member) call site.
///
/// While the scope is alive, guarded operations on its context are treated
/// as nested and are not reported.
#[derive(Debug)]
pub struct AllowedScope<'a> {
    dispatcher: &'a Dispatcher,
    context: ContextId,
    armed: bool,
}

impl AllowedScope<'_> {
    /// Check if this scope suppresses reporting (and will release it on drop).
    pub fn is_active(&self) -> bool {
        self.armed
    }
}

impl Drop for AllowedScope<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.dispatcher.tracker().disarm(self.context);
        }
    }
}

impl Dispatcher {
    /// Open a guard for `operation` on the current context.
    ///
    /// # Errors
    ///
    /// Returns the entry consumer error, see [`Dispatcher::on_enter`].
    pub fn enter(
        &self,
        operation: &OperationId,
        would_suspend: bool,
    ) -> DetectionResult<BlockingGuard<'_>> {
        self.enter_on(ContextId::current(), operation, would_suspend)
    }

    /// Open a guard for `operation` on an explicit context.
    pub fn enter_on(
        &self,
        context: ContextId,
        operation: &OperationId,
        would_suspend: bool,
    ) -> DetectionResult<BlockingGuard<'_>> {
        let token = self.on_enter(context, operation, would_suspend)?;
        Ok(BlockingGuard::new(self, context, token))
    }

    /// Run `f` as the body of a guarded operation.
    ///
    /// # Errors
    ///
    /// Returns entry or exit consumer errors. When entry is rejected `f` does
    /// not run.
    pub fn watch<T, F>(
        &self,
        operation: &OperationId,
        would_suspend: bool,
        f: F,
    ) -> DetectionResult<T>
    where
        F: FnOnce() -> T,
    {
        let guard = self.enter(operation, would_suspend)?;
        let value = f();
        guard.finish()?;
        Ok(value)
    }

    /// Like [`watch`](Self::watch) for a fallible body.
    ///
    /// An `Err` from `f` is reported to exit consumers as
    /// [`ExitOutcome::Raised`] and handed back in the inner result.
    pub fn watch_result<T, E, F>(
        &self,
        operation: &OperationId,
        would_suspend: bool,
        f: F,
    ) -> DetectionResult<Result<T, E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let guard = self.enter(operation, would_suspend)?;
        let value = f();
        let outcome = match value {
            Ok(_) => ExitOutcome::Returned,
            Err(_) => ExitOutcome::Raised,
        };
        guard.finish_with(outcome)?;
        Ok(value)
    }

    /// Enter an allowed call site on `context`.
    ///
    /// If (owner, member) is registered as allowed and the context is not
    /// already armed, the context is armed until the returned scope drops.
    pub fn enter_allowed(&self, context: ContextId, owner: &str, member: &str) -> AllowedScope<'_> {
        let armed = self.allowances().is_suppressed(owner, member) && self.tracker().arm(context);
        if armed {
            trace!(owner = owner, member = member, context = %context, "Entered allowed scope");
        }
        AllowedScope {
            dispatcher: self,
            context,
            armed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use stallwatch_core::{BlockingEvent, ConsumerError, ConsumerResult};
    use stallwatch_registry::{AllowanceRegistry, ConsumerRegistry, RecordingConsumer};

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(AllowanceRegistry::new()),
            Arc::new(ConsumerRegistry::new()),
        )
    }

    fn outcomes(dispatcher: &Dispatcher) -> Arc<Mutex<Vec<ExitOutcome>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        dispatcher
            .consumers()
            .add_on_exit_consumer_last(Arc::new(move |event: &BlockingEvent| -> ConsumerResult {
                sink.lock().push(event.outcome());
                Ok(())
            }));
        log
    }

    #[test]
    fn test_guard_reports_on_drop() {
        let dispatcher = dispatcher();
        let outcomes = outcomes(&dispatcher);
        let op = OperationId::method("X", "join");

        {
            let guard = dispatcher.enter(&op, true).unwrap();
            assert!(guard.is_tracked());
            assert!(dispatcher.tracker().is_armed(ContextId::current()));
        }

        assert!(!dispatcher.tracker().is_armed(ContextId::current()));
        assert_eq!(*outcomes.lock(), vec![ExitOutcome::Returned]);
    }

    #[test]
    fn test_guard_drop_during_panic_is_raised() {
        let dispatcher = Arc::new(dispatcher());
        let outcomes = outcomes(&dispatcher);

        let worker = Arc::clone(&dispatcher);
        let result = std::thread::spawn(move || {
            let _guard = worker.enter(&OperationId::method("X", "join"), true).unwrap();
            panic!("wait failed");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(*outcomes.lock(), vec![ExitOutcome::Raised]);
        assert_eq!(dispatcher.tracker().armed_count(), 0);
    }

    #[test]
    fn test_finish_propagates_exit_error() {
        let dispatcher = dispatcher();
        dispatcher
            .consumers()
            .add_on_exit_consumer_last(Arc::new(|_: &BlockingEvent| -> ConsumerResult {
                Err(ConsumerError::new("too slow"))
            }));

        let guard = dispatcher
            .enter(&OperationId::method("X", "join"), true)
            .unwrap();
        let err = guard.finish().unwrap_err();

        assert!(!err.is_entry());
        assert_eq!(err.consumer_error().message(), "too slow");
    }

    #[test]
    fn test_watch_skips_body_on_rejection() {
        let dispatcher = dispatcher();
        dispatcher
            .consumers()
            .add_consumer_last(Arc::new(|_: &str| -> ConsumerResult {
                Err(ConsumerError::new("denied"))
            }));

        let mut ran = false;
        let result = dispatcher.watch(&OperationId::method("X", "join"), true, || ran = true);

        assert!(result.is_err());
        assert!(!ran);
    }

    #[test]
    fn test_watch_result_marks_err_as_raised() {
        let dispatcher = dispatcher();
        let outcomes = outcomes(&dispatcher);
        let op = OperationId::method("X", "join");

        let ok: Result<u32, &str> = dispatcher.watch_result(&op, true, || Ok(1)).unwrap();
        let err: Result<u32, &str> = dispatcher.watch_result(&op, true, || Err("io")).unwrap();

        assert_eq!(ok, Ok(1));
        assert_eq!(err, Err("io"));
        assert_eq!(
            *outcomes.lock(),
            vec![ExitOutcome::Returned, ExitOutcome::Raised]
        );
    }

    #[test]
    fn test_allowed_scope_silences_nested_calls() {
        let dispatcher = dispatcher();
        dispatcher.allowances().allow("app::Warmup", "run");
        let recorder = Arc::new(RecordingConsumer::new());
        dispatcher.consumers().add_consumer_last(recorder.clone());
        let ctx = ContextId::current();
        let op = OperationId::method("X", "join");

        {
            let scope = dispatcher.enter_allowed(ctx, "app::Warmup", "run");
            assert!(scope.is_active());
            dispatcher.watch(&op, true, || ()).unwrap();
        }
        dispatcher.watch(&op, true, || ()).unwrap();

        assert_eq!(recorder.calls(), vec!["X.join"]);
    }

    #[test]
    fn test_allowed_scope_inside_tracked_block_keeps_it_armed() {
        let dispatcher = dispatcher();
        dispatcher.allowances().allow("app::Warmup", "run");
        let ctx = ContextId::current();

        let guard = dispatcher
            .enter(&OperationId::method("X", "join"), true)
            .unwrap();
        {
            let scope = dispatcher.enter_allowed(ctx, "app::Warmup", "run");
            assert!(!scope.is_active());
        }
        assert!(dispatcher.tracker().is_armed(ctx));
        guard.finish().unwrap();
    }

    #[test]
    fn test_unlisted_scope_is_inert() {
        let dispatcher = dispatcher();
        let scope = dispatcher.enter_allowed(ContextId::current(), "app::Other", "run");
        assert!(!scope.is_active());
        assert!(!dispatcher.tracker().is_armed(ContextId::current()));
    }
}
