//! Recording entry consumer.

use parking_lot::Mutex;

use stallwatch_core::ConsumerResult;

use crate::consumer::EntryConsumer;

/// Records the operation string of every blocking call it sees.
#[derive(Debug, Default)]
pub struct RecordingConsumer {
    calls: Mutex<Vec<String>>,
}

impl RecordingConsumer {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded calls, oldest first.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Take the recorded calls, leaving the recorder empty.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock())
    }

    /// Number of recorded calls.
    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    /// Check if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    /// Forget recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl EntryConsumer for RecordingConsumer {
    fn on_blocking_call(&self, operation: &str) -> ConsumerResult {
        self.calls.lock().push(operation.to_string());
        Ok(())
    }
}
