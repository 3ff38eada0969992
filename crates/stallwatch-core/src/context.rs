//! Execution context identity.
//!
//! Blocking state is tracked per execution context. By default a context is
//! an OS thread. With the `tokio` feature, code running inside a tokio task is
//! keyed by the task instead, since a task may resume on a different worker
//! thread after it is woken.

use std::fmt;
use std::thread::{self, ThreadId};

/// Identity of a concurrent execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextId {
    /// An OS thread.
    Thread(ThreadId),
    /// A tokio task.
    #[cfg(feature = "tokio")]
    Task(tokio::task::Id),
    /// An execution unit numbered by an external engine (fibers, green threads).
    Custom(u64),
}

impl ContextId {
    /// The context of the caller.
    pub fn current() -> Self {
        #[cfg(feature = "tokio")]
        {
            if let Some(id) = tokio::task::try_id() {
                return Self::Task(id);
            }
        }
        Self::Thread(thread::current().id())
    }

    /// Context for a specific thread.
    pub fn thread(id: ThreadId) -> Self {
        Self::Thread(id)
    }

    /// Context for an engine-defined execution unit.
    pub fn custom(id: u64) -> Self {
        Self::Custom(id)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextId::Thread(id) => write!(f, "{:?}", id),
            #[cfg(feature = "tokio")]
            ContextId::Task(id) => write!(f, "task-{}", id),
            ContextId::Custom(id) => write!(f, "custom-{}", id),
        }
    }
}
