//! Instrumented context-local storage.
//!
//! [`ContextLocal`] holds one lazily initialized value per execution context.
//! Computing the initial value notifies the storage-initialization consumers
//! first, which lets a metrics consumer count how often such storage is
//! created.
//!
//! Values are keyed by [`ContextId`], not stored in the thread itself, so a
//! value outlives the thread or task that created it. A context that is about
//! to finish should call [`ContextLocal::remove`]; otherwise its value stays
//! until the storage is dropped.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use stallwatch_core::ContextId;

use crate::dispatch::Dispatcher;

type Initializer<T> = Box<dyn Fn() -> T + Send + Sync>;

/// A value per execution context with a lazily computed initial value.
///
/// Values are not dropped when their context ends. Call [`remove`] from the
/// context before it exits.
///
/// [`remove`]: ContextLocal::remove
pub struct ContextLocal<T> {
    values: DashMap<ContextId, T>,
    init: Initializer<T>,
    dispatcher: Arc<Dispatcher>,
}

impl<T> ContextLocal<T> {
    /// Create storage whose initial value comes from `init`.
    pub fn with_initial<F>(dispatcher: Arc<Dispatcher>, init: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            values: DashMap::new(),
            init: Box::new(init),
            dispatcher,
        }
    }

    /// Run `f` with the current context's value, initializing it first if
    /// needed.
    ///
    /// `f` must not access this same storage.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let context = ContextId::current();
        self.ensure(context);
        match self.values.get(&context) {
            Some(value) => f(value.value()),
            None => f(self.values.entry(context).or_insert_with(|| (self.init)()).value()),
        }
    }

    /// Replace the current context's value without running the initializer.
    pub fn set(&self, value: T) -> Option<T> {
        self.values.insert(ContextId::current(), value)
    }

    /// Remove the current context's value. The next access initializes again.
    ///
    /// This is the only way a context's value is released before the storage
    /// itself is dropped.
    pub fn remove(&self) -> Option<T> {
        self.values
            .remove(&ContextId::current())
            .map(|(_, value)| value)
    }

    /// Check if the current context has a value.
    pub fn is_initialized(&self) -> bool {
        self.values.contains_key(&ContextId::current())
    }

    /// Number of contexts holding a value.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if no context holds a value.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn ensure(&self, context: ContextId) {
        if self.values.contains_key(&context) {
            return;
        }
        // no shard lock may be held here, the consumers and the
        // initializer can touch other storage
        self.dispatcher.on_storage_init(context);
        let value = (self.init)();
        self.values.entry(context).or_insert(value);
    }
}

impl<T: Clone> ContextLocal<T> {
    /// The current context's value, initializing it first if needed.
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T> fmt::Debug for ContextLocal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextLocal")
            .field("contexts", &self.values.len())
            .finish()
    }
}
