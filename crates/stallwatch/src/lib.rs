//! # stallwatch - Blocking-Call Detection Runtime
//!
//! stallwatch detects when code waits synchronously on a result that is not
//! ready yet, and tells you about it. Each such wait is reported to entry
//! consumers before it starts and to exit consumers, with the time spent
//! blocked, after it ends. Consumers may also reject a blocking call by
//! returning an error, which surfaces at the call site.
//!
//! ## Features
//!
//! - **Detection**: nested waits report once, already satisfied waits never
//! - **Allowances**: call sites inside which blocking is expected
//! - **Policy**: consumers can forbid blocking, e.g. on executor threads
//! - **Observability**: logging, metrics per call site and reports
//! - **Async aware**: with the `tokio` feature contexts are tasks, not threads
//!
//! ## Quick Start
//!
//! ```
//! use stallwatch::prelude::*;
//!
//! let runtime = Stallwatch::builder()
//!     .with_collect_events(100)
//!     .build()
//!     .unwrap();
//!
//! let recorder = Arc::new(RecordingConsumer::new());
//! runtime.add_consumer_last(recorder.clone());
//!
//! let worker = std::thread::spawn(|| {
//!     std::thread::sleep(Duration::from_millis(10));
//!     2 + 2
//! });
//! let answer = runtime.wait_on(worker).unwrap().unwrap();
//!
//! assert_eq!(answer, 4);
//! assert_eq!(recorder.calls(), vec!["std::thread::JoinHandle.join()"]);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Your Application                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    stallwatch (facade)                      │
//! │                 ┌──────────────────────┐                    │
//! │                 │  Stallwatch Builder  │                    │
//! │                 └──────────┬───────────┘                    │
//! │                            │                                │
//! │  ┌───────────────────┬─────┴──────────────┬──────────────┐  │
//! │  │ stallwatch-runtime│ stallwatch-registry│ stallwatch-  │  │
//! │  │ (dispatch, guards,│ (allowances,       │ observe      │  │
//! │  │  adapters)        │  consumers)        │ (metrics)    │  │
//! │  └───────────────────┴────────────────────┴──────────────┘  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                 stallwatch-core (types)                     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError};
use std::time::Duration;

use tracing::info;

use stallwatch_core::{
    ConfigError, ContextId, DetectionError, DetectionResult, DetectorConfig, OperationId,
};
use stallwatch_observe::{
    BacktraceCallFinder, BlockingMetrics, CallFinder, CollectingConsumer, DetectionReport,
    LoggingConsumer,
};
use stallwatch_registry::{
    AllowanceRegistry, ConsumerRegistry, DenyBlocking, SharedEntryConsumer, SharedExitConsumer,
    SharedStorageInitConsumer,
};
use stallwatch_runtime::{
    AllowedScope, BlockingGuard, ContextLocal, Dispatcher, InstallError, InstallOutcome, Installer,
    Instrumentation, Waitable,
};

// Re-export from sub-crates
pub use stallwatch_core;
pub use stallwatch_observe;
pub use stallwatch_registry;
pub use stallwatch_runtime;

/// Main entry point for stallwatch.
pub struct Stallwatch;

impl Stallwatch {
    /// Create a new detector builder.
    pub fn builder() -> StallwatchBuilder {
        StallwatchBuilder::new()
    }

    /// Create a detector with default configuration.
    pub fn with_defaults() -> Result<StallwatchRuntime, StallwatchError> {
        StallwatchBuilder::new().build()
    }
}

/// Builder for configuring a detector.
pub struct StallwatchBuilder {
    config: DetectorConfig,
    call_finder: Option<Box<dyn CallFinder>>,
    entry_consumers: Vec<SharedEntryConsumer>,
    exit_consumers: Vec<SharedExitConsumer>,
}

impl StallwatchBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self::from_config(DetectorConfig::default())
    }

    /// Create a builder from a loaded configuration.
    pub fn from_config(config: DetectorConfig) -> Self {
        Self {
            config,
            call_finder: None,
            entry_consumers: Vec::new(),
            exit_consumers: Vec::new(),
        }
    }

    // Allowances

    /// Allow blocking inside `owner.member`.
    pub fn with_allowance(mut self, owner: impl Into<String>, member: impl Into<String>) -> Self {
        self.config = self.config.with_allowance(owner, member);
        self
    }

    // Policy

    /// Reject every blocking call.
    pub fn with_deny_blocking(mut self, enabled: bool) -> Self {
        self.config.deny_blocking = enabled;
        self
    }

    /// Let blocking operations owned by `owner` through the deny policy.
    pub fn with_deny_exempt_owner(mut self, owner: impl Into<String>) -> Self {
        self.config = self.config.with_deny_exempt_owner(owner);
        self
    }

    // Observability

    /// Log blocking calls through `tracing`.
    pub fn with_log_events(mut self, enabled: bool) -> Self {
        self.config.log_events = enabled;
        self
    }

    /// Log waits of at least `threshold` as warnings.
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.config.slow_threshold_ms = Some(threshold.as_millis() as u64);
        self
    }

    /// Keep up to `max_events` blocking events for reports.
    pub fn with_collect_events(mut self, max_events: usize) -> Self {
        self.config.collect_events = max_events;
        self
    }

    /// Enable or disable metrics.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.config.record_metrics = enabled;
        self
    }

    /// Prefer call sites under `prefix` in metrics, e.g. `"my_app::"`.
    pub fn with_call_site_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.call_site_prefix = Some(prefix.into());
        self
    }

    /// Use a custom call finder for metrics.
    pub fn with_call_finder(mut self, finder: impl CallFinder + 'static) -> Self {
        self.call_finder = Some(Box::new(finder));
        self
    }

    // Consumers

    /// Add an entry consumer after the built-in observers.
    pub fn with_entry_consumer(mut self, consumer: SharedEntryConsumer) -> Self {
        self.entry_consumers.push(consumer);
        self
    }

    /// Add an exit consumer after the built-in observers.
    pub fn with_exit_consumer(mut self, consumer: SharedExitConsumer) -> Self {
        self.exit_consumers.push(consumer);
        self
    }

    /// Build the detector.
    ///
    /// Consumer order: built-in observers first, then user consumers, then
    /// the deny policy, so observers see every call before it is rejected.
    pub fn build(self) -> Result<StallwatchRuntime, StallwatchError> {
        let config = self.config;
        config.validate()?;

        let allowances = Arc::new(AllowanceRegistry::with_entries(&config.allowances));
        let consumers = Arc::new(ConsumerRegistry::new());

        let metrics = config.record_metrics.then(|| {
            let finder = match self.call_finder {
                Some(finder) => finder,
                None => {
                    let mut finder = BacktraceCallFinder::new();
                    if let Some(prefix) = &config.call_site_prefix {
                        finder = finder.with_preferred_prefix(prefix.clone());
                    }
                    Box::new(finder) as Box<dyn CallFinder>
                }
            };
            let metrics = Arc::new(BlockingMetrics::with_boxed_finder(finder));
            metrics.install(&consumers);
            metrics
        });

        if config.log_events {
            let mut logger = LoggingConsumer::new();
            if let Some(millis) = config.slow_threshold_ms {
                logger = logger.with_slow_threshold(Duration::from_millis(millis));
            }
            let logger = Arc::new(logger);
            consumers.add_consumer_first(logger.clone());
            consumers.add_on_exit_consumer_last(logger);
        }

        let collector = (config.collect_events > 0).then(|| {
            let collector = Arc::new(CollectingConsumer::new(config.collect_events));
            consumers.add_on_exit_consumer_last(collector.clone());
            collector
        });

        for consumer in self.entry_consumers {
            consumers.add_consumer_last(consumer);
        }
        for consumer in self.exit_consumers {
            consumers.add_on_exit_consumer_last(consumer);
        }

        let deny = config.deny_blocking.then(|| {
            let deny = Arc::new(
                DenyBlocking::new().with_exempt_owners(config.deny_exempt_owners.iter().cloned()),
            );
            consumers.add_consumer_last(deny.clone());
            deny
        });

        let dispatcher = Arc::new(Dispatcher::new(allowances, consumers));
        let installer = Installer::new(Arc::clone(&dispatcher));

        info!(
            allowances = config.allowances.len(),
            deny_blocking = config.deny_blocking,
            metrics = config.record_metrics,
            "Blocking-call detector ready"
        );

        Ok(StallwatchRuntime {
            dispatcher,
            installer,
            metrics,
            collector,
            deny,
        })
    }
}

impl Default for StallwatchBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A configured detector.
///
/// Exposes the registration surface (consumers and allowances) and guarded
/// wrappers for standard blocking primitives.
pub struct StallwatchRuntime {
    dispatcher: Arc<Dispatcher>,
    installer: Installer,
    metrics: Option<Arc<BlockingMetrics>>,
    collector: Option<Arc<CollectingConsumer>>,
    deny: Option<Arc<DenyBlocking>>,
}

impl StallwatchRuntime {
    /// Get the dispatcher, for instrumentation engines.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Get the metrics recorder, if enabled.
    pub fn metrics(&self) -> Option<&Arc<BlockingMetrics>> {
        self.metrics.as_ref()
    }

    /// Get the event collector, if enabled.
    pub fn collector(&self) -> Option<&Arc<CollectingConsumer>> {
        self.collector.as_ref()
    }

    fn consumers(&self) -> &ConsumerRegistry {
        self.dispatcher.consumers()
    }

    // Registration

    /// Add an entry consumer ahead of the others.
    pub fn add_consumer_first(&self, consumer: SharedEntryConsumer) {
        self.consumers().add_consumer_first(consumer);
    }

    /// Add an entry consumer after the others.
    pub fn add_consumer_last(&self, consumer: SharedEntryConsumer) {
        self.consumers().add_consumer_last(consumer);
    }

    /// Remove an entry consumer.
    pub fn remove_consumer(&self, consumer: &SharedEntryConsumer) -> bool {
        self.consumers().remove_consumer(consumer)
    }

    /// Add an exit consumer ahead of the others.
    pub fn add_on_exit_consumer_first(&self, consumer: SharedExitConsumer) {
        self.consumers().add_on_exit_consumer_first(consumer);
    }

    /// Add an exit consumer after the others.
    pub fn add_on_exit_consumer_last(&self, consumer: SharedExitConsumer) {
        self.consumers().add_on_exit_consumer_last(consumer);
    }

    /// Remove an exit consumer.
    pub fn remove_on_exit_consumer(&self, consumer: &SharedExitConsumer) -> bool {
        self.consumers().remove_on_exit_consumer(consumer)
    }

    /// Add a storage-initialization consumer.
    pub fn add_storage_init_consumer(&self, consumer: SharedStorageInitConsumer) {
        self.consumers().add_storage_init_consumer(consumer);
    }

    /// Remove a storage-initialization consumer.
    pub fn remove_storage_init_consumer(&self, consumer: &SharedStorageInitConsumer) -> bool {
        self.consumers().remove_storage_init_consumer(consumer)
    }

    /// Remove all entry and exit consumers, built-in ones included.
    pub fn clear_consumers(&self) {
        self.consumers().clear_consumers();
    }

    /// Do not report blocking calls inside `owner.member`.
    pub fn allow_blocking_calls_inside(&self, owner: impl Into<String>, member: impl Into<String>) {
        self.dispatcher.allowances().allow(owner, member);
    }

    /// Report blocking calls inside `owner.member` again.
    pub fn disallow_blocking_calls_inside(&self, owner: &str, member: &str) -> bool {
        self.dispatcher.allowances().disallow(owner, member)
    }

    // Guarded operations

    /// Open a guard around a blocking operation on the current context.
    pub fn enter(
        &self,
        operation: &OperationId,
        would_suspend: bool,
    ) -> DetectionResult<BlockingGuard<'_>> {
        self.dispatcher.enter(operation, would_suspend)
    }

    /// Run `f` as the body of a blocking operation.
    pub fn watch<T>(
        &self,
        operation: &OperationId,
        would_suspend: bool,
        f: impl FnOnce() -> T,
    ) -> DetectionResult<T> {
        self.dispatcher.watch(operation, would_suspend, f)
    }

    /// Wait on a [`Waitable`].
    pub fn wait_on<W: Waitable>(&self, waitable: W) -> DetectionResult<W::Output> {
        self.dispatcher.wait_on(waitable)
    }

    /// Guarded [`Receiver::recv`].
    pub fn recv<T>(&self, receiver: &Receiver<T>) -> DetectionResult<Result<T, RecvError>> {
        self.dispatcher.recv(receiver)
    }

    /// Guarded [`Receiver::recv_timeout`].
    pub fn recv_timeout<T>(
        &self,
        receiver: &Receiver<T>,
        timeout: Duration,
    ) -> DetectionResult<Result<T, RecvTimeoutError>> {
        self.dispatcher.recv_timeout(receiver, timeout)
    }

    /// Enter an allowed call site on the current context.
    pub fn allowed_scope(&self, owner: &str, member: &str) -> AllowedScope<'_> {
        self.dispatcher
            .enter_allowed(ContextId::current(), owner, member)
    }

    /// Create context-local storage reporting its initializations.
    pub fn context_local<T, F>(&self, init: F) -> ContextLocal<T>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        ContextLocal::with_initial(Arc::clone(&self.dispatcher), init)
    }

    /// Attach an instrumentation engine.
    pub fn install(&self, engine: &dyn Instrumentation) -> Result<InstallOutcome, StallwatchError> {
        Ok(self.installer.install(engine)?)
    }

    /// Names of installed engines.
    pub fn installed_engines(&self) -> Vec<String> {
        self.installer.installed()
    }

    // Reporting

    /// Build a report of what was observed so far.
    pub fn report(&self) -> DetectionReport {
        let metrics = self
            .metrics
            .as_ref()
            .map(|m| m.snapshot())
            .unwrap_or_default();
        let mut report = DetectionReport::new(metrics)
            .with_allowances(self.dispatcher.allowances().entries())
            .with_rejected_calls(self.deny.as_ref().map_or(0, |d| d.rejected()));
        if let Some(collector) = &self.collector {
            report = report.with_events(collector.records(), collector.dropped());
        }
        report
    }
}

impl std::fmt::Debug for StallwatchRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StallwatchRuntime")
            .field("dispatcher", &self.dispatcher)
            .field("metrics", &self.metrics.is_some())
            .field("collector", &self.collector.is_some())
            .field("deny", &self.deny.is_some())
            .finish()
    }
}

/// Errors from the stallwatch facade.
#[derive(Debug, thiserror::Error)]
pub enum StallwatchError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A consumer rejected or failed a blocking call.
    #[error("Detection error: {0}")]
    Detection(#[from] DetectionError),

    /// Engine installation error.
    #[error("Install error: {0}")]
    Install(#[from] InstallError),
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Main types
    pub use crate::{Stallwatch, StallwatchBuilder, StallwatchError, StallwatchRuntime};

    // Core types
    pub use stallwatch_core::{
        BlockingEvent, ConsumerError, ConsumerResult, ContextId, DetectionError, DetectorConfig,
        ExitOutcome, OperationId,
    };

    // Registry types
    pub use stallwatch_registry::{
        DenyBlocking, EntryConsumer, ExitConsumer, RecordingConsumer, StorageInitConsumer,
    };

    // Runtime types
    pub use stallwatch_runtime::{
        BlockingGuard, ContextLocal, Dispatcher, InstallOutcome, Instrumentation, Waitable,
    };

    // Observability types
    pub use stallwatch_observe::{
        BlockingMetrics, CallFinder, CollectingConsumer, DetectionReport, LoggingConsumer,
    };

    // Common std types
    pub use std::sync::Arc;
    pub use std::time::Duration;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    use stallwatch_core::{BlockingEvent, ConsumerError, ConsumerResult, ExitOutcome};
    use stallwatch_registry::RecordingConsumer;

    fn fixed_finder(_: &OperationId) -> Option<String> {
        Some(String::from("tests.caller"))
    }

    fn pending_thread(millis: u64) -> thread::JoinHandle<u32> {
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(millis));
            42
        })
    }

    #[test]
    fn test_builder_from_config() {
        let config = DetectorConfig::new()
            .with_allowance("app::Warmup", "run")
            .with_collect_events(10);
        let runtime = StallwatchBuilder::from_config(config).build().unwrap();

        assert!(runtime.metrics().is_some());
        assert!(runtime.collector().is_some());
        assert!(runtime
            .dispatcher()
            .allowances()
            .is_suppressed("app::Warmup", "run"));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = Stallwatch::builder().with_allowance("", "run").build();
        assert!(matches!(result, Err(StallwatchError::Config(_))));
    }

    #[test]
    fn test_join_scenario() {
        let runtime = Stallwatch::builder().with_metrics(false).build().unwrap();
        let recorder = Arc::new(RecordingConsumer::new());
        runtime.add_consumer_last(recorder.clone());
        let op = OperationId::method("X", "join");

        runtime.watch(&op, true, || thread::sleep(Duration::from_millis(5))).unwrap();
        runtime.watch(&op, false, || ()).unwrap();

        assert_eq!(recorder.calls(), vec!["X.join"]);
    }

    #[test]
    fn test_deny_policy_sees_observers_first() {
        let runtime = Stallwatch::builder()
            .with_deny_blocking(true)
            .with_collect_events(10)
            .with_call_finder(fixed_finder)
            .build()
            .unwrap();
        let recorder = Arc::new(RecordingConsumer::new());
        runtime.add_consumer_first(recorder.clone());

        let err = runtime.wait_on(pending_thread(20)).unwrap_err();

        assert!(err.is_entry());
        assert_eq!(recorder.len(), 1);
        let report = runtime.report();
        assert_eq!(report.rejected_calls, 1);
        assert!(report.events.is_empty());
        assert_eq!(report.metrics.total_calls(), 0);
    }

    #[test]
    fn test_deny_exempt_owner() {
        let runtime = Stallwatch::builder()
            .with_deny_blocking(true)
            .with_deny_exempt_owner("std::sync::mpsc::Receiver")
            .build()
            .unwrap();
        let (tx, rx) = mpsc::channel();
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            tx.send(1u8).unwrap();
        });

        assert_eq!(runtime.recv(&rx).unwrap(), Ok(1));
        sender.join().unwrap();
    }

    #[test]
    fn test_report_after_blocking() {
        let runtime = Stallwatch::builder()
            .with_collect_events(10)
            .with_call_finder(fixed_finder)
            .build()
            .unwrap();

        assert_eq!(runtime.wait_on(pending_thread(20)).unwrap().unwrap(), 42);

        let report = runtime.report();
        assert!(!report.is_clean());
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].operation, "std::thread::JoinHandle.join()");
        assert!(report.events[0].blocked_time_nanos > 0);
        let caller = report.metrics.for_call("tests.caller").unwrap();
        assert_eq!(caller.count, 1);
    }

    #[test]
    fn test_allowed_scope_via_runtime() {
        let runtime = Stallwatch::builder().with_metrics(false).build().unwrap();
        runtime.allow_blocking_calls_inside("app::Warmup", "run");
        let recorder = Arc::new(RecordingConsumer::new());
        runtime.add_consumer_last(recorder.clone());

        {
            let _scope = runtime.allowed_scope("app::Warmup", "run");
            runtime.wait_on(pending_thread(20)).unwrap().unwrap();
        }
        assert!(recorder.is_empty());

        assert!(runtime.disallow_blocking_calls_inside("app::Warmup", "run"));
        {
            let _scope = runtime.allowed_scope("app::Warmup", "run");
            runtime.wait_on(pending_thread(20)).unwrap().unwrap();
        }
        assert_eq!(recorder.len(), 1);
    }

    #[test]
    fn test_exit_error_surfaces_and_next_call_reports() {
        let runtime = Stallwatch::builder().with_metrics(false).build().unwrap();
        let recorder = Arc::new(RecordingConsumer::new());
        runtime.add_consumer_last(recorder.clone());
        let failing: SharedExitConsumer = Arc::new(|_: &BlockingEvent| -> ConsumerResult {
            Err(ConsumerError::new("exit failed"))
        });
        runtime.add_on_exit_consumer_last(Arc::clone(&failing));
        let op = OperationId::method("X", "join");

        let err = runtime.watch(&op, true, || ()).unwrap_err();
        assert!(!err.is_entry());

        assert!(runtime.remove_on_exit_consumer(&failing));
        runtime.watch(&op, true, || ()).unwrap();
        assert_eq!(recorder.len(), 2);
    }

    #[test]
    fn test_clear_consumers_silences_everything() {
        let runtime = Stallwatch::builder()
            .with_log_events(true)
            .with_collect_events(10)
            .build()
            .unwrap();
        runtime.clear_consumers();

        runtime.watch(&OperationId::method("X", "join"), true, || ()).unwrap();

        assert!(runtime.report().events.is_empty());
    }

    #[test]
    fn test_context_local_counts_inits() {
        let runtime = Stallwatch::builder()
            .with_call_finder(fixed_finder)
            .build()
            .unwrap();
        let local = runtime.context_local(|| 0u64);

        assert_eq!(local.get(), 0);
        local.set(3);
        assert_eq!(local.get(), 3);

        assert_eq!(runtime.report().metrics.storage_inits, 1);
    }

    #[test]
    fn test_install_engine() {
        struct StdEngine;

        impl Instrumentation for StdEngine {
            fn name(&self) -> &str {
                "std"
            }

            fn install(
                &self,
                _dispatcher: &Arc<Dispatcher>,
            ) -> stallwatch_runtime::InstallResult<()> {
                Ok(())
            }
        }

        let runtime = Stallwatch::with_defaults().unwrap();
        assert_eq!(runtime.install(&StdEngine).unwrap(), InstallOutcome::Installed);
        assert_eq!(
            runtime.install(&StdEngine).unwrap(),
            InstallOutcome::AlreadyInstalled
        );
        assert_eq!(runtime.installed_engines(), vec!["std"]);
    }

    #[test]
    fn test_guard_exit_outcome() {
        let runtime = Stallwatch::builder().with_collect_events(4).build().unwrap();
        let op = OperationId::method("X", "join");

        let guard = runtime.enter(&op, true).unwrap();
        guard.finish_with(ExitOutcome::Raised).unwrap();

        let events = runtime.collector().unwrap().events();
        assert_eq!(events.len(), 1);
        assert!(events[0].outcome().is_raised());
    }

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _runtime = Stallwatch::builder().build().unwrap();
    }

    #[cfg(feature = "tokio")]
    #[tokio::test(flavor = "current_thread")]
    async fn test_tasks_on_one_thread_are_separate_contexts() {
        let runtime = Arc::new(Stallwatch::builder().with_metrics(false).build().unwrap());
        let recorder = Arc::new(RecordingConsumer::new());
        runtime.add_consumer_last(recorder.clone());
        let op = OperationId::method("X", "join");

        let first = {
            let runtime = Arc::clone(&runtime);
            let op = op.clone();
            tokio::spawn(async move {
                let guard = runtime.enter(&op, true).unwrap();
                let tracked = guard.is_tracked();
                tokio::task::yield_now().await;
                guard.finish().unwrap();
                tracked
            })
        };
        let second = {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move {
                let guard = runtime.enter(&op, true).unwrap();
                let tracked = guard.is_tracked();
                guard.finish().unwrap();
                tracked
            })
        };

        assert!(first.await.unwrap());
        assert!(second.await.unwrap());
        assert_eq!(recorder.len(), 2);
    }
}
