//! Serialise environment mutations across tests.
//!
//! Changes to process-global state such as `PATH` or `CREATORPATH` must not
//! race between concurrently running tests. `EnvLock` gives every mutation a
//! single global mutex to hold while it edits and restores state.

use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// RAII guard holding the global environment lock.
pub struct EnvLock {
    _guard: MutexGuard<'static, ()>,
}

impl EnvLock {
    /// Acquire the lock serialising environment mutations.
    #[must_use]
    pub fn acquire() -> Self {
        let guard = ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Self { _guard: guard }
    }
}
