//! Guarded adapters for standard blocking primitives.
//!
//! Each adapter asks the primitive whether it would actually wait before
//! dispatching, so waiting on an already finished thread or an already queued
//! message produces no event.

use std::sync::mpsc::{Receiver, RecvError, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use stallwatch_core::{DetectionResult, OperationId};

use crate::dispatch::Dispatcher;

/// A primitive that may block the calling context until it is ready.
pub trait Waitable {
    /// Result of the wait.
    type Output;

    /// The operation reported for this wait.
    fn operation(&self) -> OperationId;

    /// Check if [`wait`](Self::wait) would return without suspending.
    fn is_ready(&self) -> bool;

    /// Wait until ready.
    fn wait(self) -> Self::Output;
}

impl<T> Waitable for JoinHandle<T> {
    type Output = thread::Result<T>;

    fn operation(&self) -> OperationId {
        OperationId::new("std::thread::JoinHandle", "join", "()")
    }

    fn is_ready(&self) -> bool {
        self.is_finished()
    }

    fn wait(self) -> Self::Output {
        self.join()
    }
}

fn recv_operation() -> OperationId {
    OperationId::new("std::sync::mpsc::Receiver", "recv", "()")
}

fn recv_timeout_operation() -> OperationId {
    OperationId::new("std::sync::mpsc::Receiver", "recv_timeout", "(Duration)")
}

impl Dispatcher {
    /// Wait on `waitable` on the current context.
    ///
    /// # Errors
    ///
    /// Returns entry or exit consumer errors. On an entry rejection the
    /// waitable is dropped without waiting.
    pub fn wait_on<W: Waitable>(&self, waitable: W) -> DetectionResult<W::Output> {
        let operation = waitable.operation();
        let guard = self.enter(&operation, !waitable.is_ready())?;
        let output = waitable.wait();
        guard.finish()?;
        Ok(output)
    }

    /// Guarded [`Receiver::recv`].
    pub fn recv<T>(&self, receiver: &Receiver<T>) -> DetectionResult<Result<T, RecvError>> {
        match receiver.try_recv() {
            Ok(value) => Ok(Ok(value)),
            Err(TryRecvError::Disconnected) => Ok(Err(RecvError)),
            Err(TryRecvError::Empty) => {
                self.watch_result(&recv_operation(), true, || receiver.recv())
            }
        }
    }

    /// Guarded [`Receiver::recv_timeout`].
    pub fn recv_timeout<T>(
        &self,
        receiver: &Receiver<T>,
        timeout: Duration,
    ) -> DetectionResult<Result<T, RecvTimeoutError>> {
        match receiver.try_recv() {
            Ok(value) => Ok(Ok(value)),
            Err(TryRecvError::Disconnected) => Ok(Err(RecvTimeoutError::Disconnected)),
            Err(TryRecvError::Empty) => {
                self.watch_result(&recv_timeout_operation(), true, || {
                    receiver.recv_timeout(timeout)
                })
            }
        }
    }
}
