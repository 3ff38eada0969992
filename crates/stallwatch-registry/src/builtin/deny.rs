//! Policy consumer that forbids blocking.
//!
//! Register it last so observers added with `add_consumer_first` still see
//! the call before it is rejected.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use stallwatch_core::{ConsumerError, ConsumerResult};

use crate::consumer::EntryConsumer;

/// Rejects every blocking call whose owner is not exempt.
#[derive(Debug, Default)]
pub struct DenyBlocking {
    exempt_owners: Vec<String>,
    rejected: AtomicU64,
}

impl DenyBlocking {
    /// Reject every blocking call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Let blocking calls on operations owned by `owner` through.
    pub fn with_exempt_owner(mut self, owner: impl Into<String>) -> Self {
        self.exempt_owners.push(owner.into());
        self
    }

    /// Exempt several owners at once.
    pub fn with_exempt_owners<I, S>(mut self, owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exempt_owners.extend(owners.into_iter().map(Into::into));
        self
    }

    /// Number of calls rejected so far.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn is_exempt(&self, operation: &str) -> bool {
        self.exempt_owners.iter().any(|owner| {
            operation
                .strip_prefix(owner.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

impl EntryConsumer for DenyBlocking {
    fn on_blocking_call(&self, operation: &str) -> ConsumerResult {
        if self.is_exempt(operation) {
            return Ok(());
        }

        self.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(operation = operation, "Blocking call rejected");
        Err(ConsumerError::new(format!("blocking call at {}", operation)))
    }
}
