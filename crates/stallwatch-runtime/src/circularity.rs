//! Circularity lock.
//!
//! Guards code paths that may re-enter themselves on the same context: a
//! storage-initialization consumer that initializes context-local storage, or
//! an instrumentation engine whose own machinery is a target of
//! instrumentation. Like [`StateTracker`](crate::tracker::StateTracker), it is
//! a shared set keyed by context rather than context-local storage.

use dashmap::DashSet;

use stallwatch_core::ContextId;

/// Per-context re-entrancy lock.
#[derive(Debug, Default)]
pub struct CircularityLock {
    holders: DashSet<ContextId>,
}

impl CircularityLock {
    /// Create an unheld lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `context`.
    ///
    /// Returns `false` if `context` already holds it; the caller must then
    /// skip the nested work.
    pub fn acquire(&self, context: ContextId) -> bool {
        self.holders.insert(context)
    }

    /// Release the lock for `context`.
    pub fn release(&self, context: ContextId) {
        self.holders.remove(&context);
    }

    /// Check if `context` holds the lock.
    pub fn is_held(&self, context: ContextId) -> bool {
        self.holders.contains(&context)
    }

    /// Take the lock, releasing it when the guard drops.
    pub fn try_enter(&self, context: ContextId) -> Option<CircularityGuard<'_>> {
        self.acquire(context).then(|| CircularityGuard {
            lock: self,
            context,
        })
    }
}

/// Holds a [`CircularityLock`] for one context.
#[derive(Debug)]
pub struct CircularityGuard<'a> {
    lock: &'a CircularityLock,
    context: ContextId,
}

impl Drop for CircularityGuard<'_> {
    fn drop(&mut self) {
        self.lock.release(self.context);
    }
}
