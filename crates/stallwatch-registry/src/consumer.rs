//! Consumer traits.
//!
//! Consumers are the observers notified by the dispatcher. They run inline on
//! the blocked context, so they should be fast. A consumer may return an error
//! to enforce a policy; the dispatcher stops invoking the rest of its list and
//! surfaces the error at the blocking call site.
//!
//! Closures implement the traits directly:
//!
//! ```
//! use std::sync::Arc;
//! use stallwatch_core::ConsumerResult;
//! use stallwatch_registry::SharedEntryConsumer;
//!
//! let consumer: SharedEntryConsumer = Arc::new(|operation: &str| -> ConsumerResult {
//!     println!("blocking at {operation}");
//!     Ok(())
//! });
//! # let _ = consumer;
//! ```

use std::sync::Arc;

use stallwatch_core::{BlockingEvent, ConsumerResult};

/// Notified before a guarded operation starts waiting.
pub trait EntryConsumer: Send + Sync {
    /// Called with the operation string of the blocking call.
    fn on_blocking_call(&self, operation: &str) -> ConsumerResult;
}

impl<F> EntryConsumer for F
where
    F: Fn(&str) -> ConsumerResult + Send + Sync,
{
    fn on_blocking_call(&self, operation: &str) -> ConsumerResult {
        self(operation)
    }
}

/// Notified after a guarded operation stopped waiting.
pub trait ExitConsumer: Send + Sync {
    /// Called with the completed blocking event.
    fn on_blocking_exit(&self, event: &BlockingEvent) -> ConsumerResult;
}

impl<F> ExitConsumer for F
where
    F: Fn(&BlockingEvent) -> ConsumerResult + Send + Sync,
{
    fn on_blocking_exit(&self, event: &BlockingEvent) -> ConsumerResult {
        self(event)
    }
}

/// Notified when context-local storage computes an initial value.
///
/// These fire very often. Errors are discarded by the dispatcher.
pub trait StorageInitConsumer: Send + Sync {
    /// Called once per storage initialization.
    fn on_storage_init(&self) -> ConsumerResult;
}

impl<F> StorageInitConsumer for F
where
    F: Fn() -> ConsumerResult + Send + Sync,
{
    fn on_storage_init(&self) -> ConsumerResult {
        self()
    }
}

/// Shared handle to an entry consumer.
pub type SharedEntryConsumer = Arc<dyn EntryConsumer>;

/// Shared handle to an exit consumer.
pub type SharedExitConsumer = Arc<dyn ExitConsumer>;

/// Shared handle to a storage-initialization consumer.
pub type SharedStorageInitConsumer = Arc<dyn StorageInitConsumer>;
