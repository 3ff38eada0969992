//! stallwatch Core - Blocking Call Detection Types
//!
//! This crate provides the types shared by every stallwatch crate:
//!
//! - [`OperationId`]: Names an interceptable operation
//! - [`ContextId`]: Identity of a thread or task whose blocking state is tracked
//! - [`BlockingEvent`]: A completed blocking wait, handed to exit consumers
//! - Error types and the [`DetectorConfig`] configuration
//!
//! # Detection Model
//!
//! An instrumentation engine calls the dispatcher before and after every
//! designated operation. The dispatcher reports the operation only when:
//!
//! 1. **Not allowed**: the (owner, member) pair is not on the allow-list
//! 2. **Not nested**: the context is not already inside a tracked block
//! 3. **Really blocking**: the awaited result was not already available
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              Application                │
//! ├─────────────────────────────────────────┤
//! │          stallwatch (facade)            │
//! ├─────────────────────────────────────────┤
//! │ stallwatch-runtime │ stallwatch-observe │
//! ├─────────────────────────────────────────┤
//! │          stallwatch-registry            │
//! ├─────────────────────────────────────────┤
//! │           stallwatch-core               │
//! └─────────────────────────────────────────┘
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod operation;

// Re-export main types at crate root
pub use config::{AllowanceEntry, DetectorConfig};
pub use context::ContextId;
pub use error::{
    ConfigError, ConfigResult, ConsumerError, ConsumerResult, DetectionError, DetectionResult,
};
pub use event::{BlockingEvent, BlockingFields, ExitOutcome};
pub use operation::OperationId;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::DetectorConfig;
    pub use crate::context::ContextId;
    pub use crate::error::{ConsumerError, ConsumerResult, DetectionError, DetectionResult};
    pub use crate::event::{BlockingEvent, ExitOutcome};
    pub use crate::operation::OperationId;
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let _ = OperationId::method("X", "join");
        let _ = ContextId::current();
        let _ = DetectorConfig::default();
    }
}
