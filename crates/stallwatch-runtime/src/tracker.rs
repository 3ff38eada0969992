//! Execution-context state tracking.
//!
//! Records which contexts are currently inside a tracked blocking call. The
//! set is keyed by [`ContextId`] and never stored in context-local storage,
//! because context-local storage is itself instrumented and would re-enter
//! the dispatcher.

use dashmap::DashSet;

use stallwatch_core::ContextId;

/// The set of armed contexts.
///
/// A context is armed strictly between a successful entry dispatch and the
/// matching exit dispatch. Only the owning context arms or disarms itself.
#[derive(Debug, Default)]
pub struct StateTracker {
    armed: DashSet<ContextId>,
}

impl StateTracker {
    /// Create a tracker with no armed contexts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if `context` is inside a tracked block.
    pub fn is_armed(&self, context: ContextId) -> bool {
        self.armed.contains(&context)
    }

    /// Mark `context` as inside a tracked block.
    ///
    /// Returns `true` if it was not armed already.
    pub fn arm(&self, context: ContextId) -> bool {
        self.armed.insert(context)
    }

    /// Clear the mark for `context`.
    ///
    /// Returns `true` if it was armed.
    pub fn disarm(&self, context: ContextId) -> bool {
        self.armed.remove(&context).is_some()
    }

    /// Number of armed contexts.
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arm_disarm() {
        let tracker = StateTracker::new();
        let ctx = ContextId::custom(1);

        assert!(!tracker.is_armed(ctx));
        assert!(tracker.arm(ctx));
        assert!(!tracker.arm(ctx));
        assert!(tracker.is_armed(ctx));
        assert_eq!(tracker.armed_count(), 1);

        assert!(tracker.disarm(ctx));
        assert!(!tracker.disarm(ctx));
        assert!(!tracker.is_armed(ctx));
    }

    #[test]
    fn test_contexts_are_independent() {
        let tracker = StateTracker::new();
        tracker.arm(ContextId::custom(1));

        assert!(!tracker.is_armed(ContextId::custom(2)));
        assert!(!tracker.is_armed(ContextId::current()));
    }
}
