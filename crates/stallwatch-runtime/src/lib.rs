//! stallwatch Runtime
//!
//! This crate implements the detection runtime: the protocol an
//! instrumentation engine follows around every designated blocking
//! operation, plus adapters that play that engine for standard primitives.
//!
//! - [`Dispatcher`]: the `on_enter` / `on_exit` / `on_storage_init` hooks
//! - [`StateTracker`]: which contexts are inside a tracked block
//! - [`CircularityLock`]: per-context re-entrancy guard
//! - [`BlockingGuard`] and [`AllowedScope`]: RAII pairing of the hooks
//! - [`Waitable`]: primitives that know whether they would suspend
//! - [`ContextLocal`]: context-local storage reporting its initializations
//! - [`Installer`]: attaches [`Instrumentation`] engines once
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use stallwatch_core::OperationId;
//! use stallwatch_registry::{AllowanceRegistry, ConsumerRegistry, RecordingConsumer};
//! use stallwatch_runtime::Dispatcher;
//!
//! let dispatcher = Dispatcher::new(
//!     Arc::new(AllowanceRegistry::new()),
//!     Arc::new(ConsumerRegistry::new()),
//! );
//! let recorder = Arc::new(RecordingConsumer::new());
//! dispatcher.consumers().add_consumer_last(recorder.clone());
//!
//! let op = OperationId::method("Pool", "acquire");
//! dispatcher.watch(&op, true, || ()).unwrap();
//! dispatcher.watch(&op, false, || ()).unwrap();
//!
//! assert_eq!(recorder.calls(), vec!["Pool.acquire"]);
//! ```

pub mod circularity;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod install;
pub mod local;
pub mod tracker;
pub mod wait;

// Re-export main types
pub use circularity::{CircularityGuard, CircularityLock};
pub use dispatch::{Dispatcher, Token};
pub use error::{InstallError, InstallResult};
pub use guard::{AllowedScope, BlockingGuard};
pub use install::{InstallOutcome, Installer, Instrumentation};
pub use local::ContextLocal;
pub use tracker::StateTracker;
pub use wait::Waitable;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::dispatch::{Dispatcher, Token};
    pub use crate::guard::{AllowedScope, BlockingGuard};
    pub use crate::install::{InstallOutcome, Installer, Instrumentation};
    pub use crate::local::ContextLocal;
    pub use crate::wait::Waitable;
}
