//! stallwatch Registries
//!
//! This crate holds the shared, dynamically reconfigurable state the
//! dispatcher reads on every guarded call:
//!
//! - [`AllowanceRegistry`]: (owner, member) pairs inside which blocking is not reported
//! - [`ConsumerRegistry`]: ordered entry, exit and storage-initialization consumers
//! - [`ConsumerList`]: the copy-on-write list behind each consumer kind
//!
//! # Consumer Ordering
//!
//! Entry and exit lists support insertion at either end. Consumers added with
//! `add_*_first` run before every consumer already registered, consumers added
//! with `add_*_last` after. Registering A (first), B (first), C (last),
//! D (last) yields the dispatch order B, A, C, D.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use stallwatch_registry::{AllowanceRegistry, ConsumerRegistry, RecordingConsumer};
//!
//! let allowances = AllowanceRegistry::new();
//! allowances.allow("my_app::Warmup", "run");
//!
//! let consumers = ConsumerRegistry::new();
//! let recorder = Arc::new(RecordingConsumer::new());
//! consumers.add_consumer_last(recorder.clone());
//!
//! assert!(allowances.is_suppressed("my_app::Warmup", "run"));
//! assert_eq!(consumers.entry().len(), 1);
//! ```

pub mod allowance;
pub mod builtin;
pub mod consumer;
pub mod list;
pub mod registry;

// Re-export main types
pub use allowance::AllowanceRegistry;
pub use builtin::{DenyBlocking, RecordingConsumer};
pub use consumer::{
    EntryConsumer, ExitConsumer, SharedEntryConsumer, SharedExitConsumer,
    SharedStorageInitConsumer, StorageInitConsumer,
};
pub use list::ConsumerList;
pub use registry::ConsumerRegistry;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::allowance::AllowanceRegistry;
    pub use crate::builtin::{DenyBlocking, RecordingConsumer};
    pub use crate::consumer::{EntryConsumer, ExitConsumer, StorageInitConsumer};
    pub use crate::registry::ConsumerRegistry;
}
