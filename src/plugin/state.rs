//! Lifecycle State
//!
//! The one piece of mutable state shared between request handlers and the
//! background scan task. It is a plain store: transition rules live in the
//! dispatcher and the executor, never here.

use crate::plugin::types::{RunState, Status};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutex-guarded `Status`, safe to read and write from any task or thread
///
/// The lock is never held across an `.await`.
#[derive(Debug)]
pub struct LifecycleState {
    status: Mutex<Status>,
}

impl LifecycleState {
    pub fn new(initial: Status) -> Self {
        Self {
            status: Mutex::new(initial),
        }
    }

    /// Start in `NotReady`, for scanners that still have to initialize
    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::new(Status::new(RunState::NotReady, message))
    }

    /// Start in `Ready`
    pub fn ready(message: impl Into<String>) -> Self {
        Self::new(Status::new(RunState::Ready, message))
    }

    /// Consistent snapshot of state and message
    pub fn get(&self) -> Status {
        self.lock().clone()
    }

    /// Atomically replace state and message
    pub fn set(&self, status: Status) {
        *self.lock() = status;
    }

    /// Run `f` with exclusive access to the current status
    ///
    /// Lets a caller read and conditionally replace the status without any
    /// other reader or writer interleaving.
    pub fn update<R>(&self, f: impl FnOnce(&mut Status) -> R) -> R {
        let mut guard = self.lock();
        f(&mut *guard)
    }

    // A panic while holding the lock cannot leave a half-written Status
    // behind, so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Status> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
