//! Copy-on-write consumer lists.
//!
//! Dispatch iterates a list on every blocking call while registration is
//! rare. Readers load the current `Arc<Vec<_>>` without taking a lock; writers
//! serialize on a mutex, build a new vector and swap it in. An iteration that
//! started before a write keeps seeing the old vector.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

/// An ordered list of consumer handles.
///
/// Handles are compared by identity: two separately allocated consumers that
/// behave the same are still distinct entries.
pub struct ConsumerList<C: ?Sized> {
    consumers: ArcSwap<Vec<Arc<C>>>,
    write_lock: Mutex<()>,
}

impl<C: ?Sized> ConsumerList<C> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            consumers: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Insert a consumer at the front.
    pub fn add_first(&self, consumer: Arc<C>) {
        let _guard = self.write_lock.lock();
        let current = self.consumers.load_full();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.push(consumer);
        next.extend(current.iter().cloned());
        self.consumers.store(Arc::new(next));
    }

    /// Append a consumer at the back.
    pub fn add_last(&self, consumer: Arc<C>) {
        let _guard = self.write_lock.lock();
        let current = self.consumers.load_full();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(consumer);
        self.consumers.store(Arc::new(next));
    }

    /// Remove the first occurrence of `consumer`.
    ///
    /// Returns `true` if it was present.
    pub fn remove(&self, consumer: &Arc<C>) -> bool {
        let _guard = self.write_lock.lock();
        let current = self.consumers.load_full();
        let Some(index) = current.iter().position(|c| same_consumer(c, consumer)) else {
            return false;
        };
        let mut next: Vec<Arc<C>> = current.iter().cloned().collect();
        next.remove(index);
        self.consumers.store(Arc::new(next));
        true
    }

    /// Check if `consumer` is registered.
    pub fn contains(&self, consumer: &Arc<C>) -> bool {
        self.consumers
            .load()
            .iter()
            .any(|c| same_consumer(c, consumer))
    }

    /// The consumers in dispatch order at this instant.
    pub fn snapshot(&self) -> Arc<Vec<Arc<C>>> {
        self.consumers.load_full()
    }

    /// Number of registered consumers.
    pub fn len(&self) -> usize {
        self.consumers.load().len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.consumers.load().is_empty()
    }

    /// Remove every consumer.
    pub fn clear(&self) {
        let _guard = self.write_lock.lock();
        self.consumers.store(Arc::new(Vec::new()));
    }
}

impl<C: ?Sized> Default for ConsumerList<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> fmt::Debug for ConsumerList<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerList")
            .field("len", &self.len())
            .finish()
    }
}

/// Identity comparison on the allocation, ignoring trait object metadata.
fn same_consumer<C: ?Sized>(a: &Arc<C>, b: &Arc<C>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
