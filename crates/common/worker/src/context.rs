// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    cell::{Cell, RefCell},
    fmt,
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::{
    err::{AlreadyUnlockedSnafu, Result},
    trigger::WakeOutcome,
    worker::LoopState,
};

/// The worker lock as seen from inside one wake cycle.
///
/// The guard is parked in a `RefCell` so an [`UnlockHolder`] can drop it and
/// put a fresh one back while the callback keeps using the context.
struct CycleLock<'a> {
    mutex: &'a Mutex<LoopState>,
    guard: RefCell<Option<MutexGuard<'a, LoopState>>>,
}

impl<'a> CycleLock<'a> {
    fn new(mutex: &'a Mutex<LoopState>, guard: MutexGuard<'a, LoopState>) -> Self {
        CycleLock {
            mutex,
            guard: RefCell::new(Some(guard)),
        }
    }

    fn release(&self) -> Result<()> {
        let guard = self.guard.borrow_mut().take();
        snafu::ensure!(guard.is_some(), AlreadyUnlockedSnafu);
        drop(guard);
        Ok(())
    }

    fn reacquire(&self) {
        let guard = self.mutex.lock().unwrap_or_else(PoisonError::into_inner);
        *self.guard.borrow_mut() = Some(guard);
    }

    fn is_held(&self) -> bool { self.guard.borrow().is_some() }
}

/// Per-cycle view handed to the worker callback.
///
/// A fresh context is built for every wake and dropped once the callback
/// returns, which also releases the worker lock.
pub struct ThreadContext<'a> {
    lock:         CycleLock<'a>,
    outcome:      WakeOutcome,
    timeout:      Duration,
    next_timeout: Cell<Duration>,
}

impl<'a> ThreadContext<'a> {
    pub(crate) fn new(
        mutex: &'a Mutex<LoopState>,
        guard: MutexGuard<'a, LoopState>,
        outcome: WakeOutcome,
        timeout: Duration,
    ) -> Self {
        ThreadContext {
            lock: CycleLock::new(mutex, guard),
            outcome,
            timeout,
            next_timeout: Cell::new(timeout),
        }
    }

    /// Returns `true` if this cycle was started by the timeout rather than by
    /// the predicate.
    #[must_use]
    pub fn was_timeout(&self) -> bool { self.outcome.is_timeout() }

    /// Why the worker woke up for this cycle.
    #[must_use]
    pub fn outcome(&self) -> WakeOutcome { self.outcome }

    /// The timeout that was in effect for the wait that just finished.
    #[must_use]
    pub fn get_timeout(&self) -> Duration { self.timeout }

    /// Sets the timeout for the next wait. The current cycle is unaffected.
    ///
    /// Takes `&self` so it can be called while an [`UnlockHolder`] is live.
    pub fn set_timeout(&self, timeout: Duration) { self.next_timeout.set(timeout); }

    /// Releases the worker lock until the returned holder is reset or dropped.
    ///
    /// Wrap any call that may end up in `notify()` on this worker, or that
    /// blocks for a while, in an unlock scope.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::AlreadyUnlocked`](crate::WorkerError) if a
    /// holder from this cycle is still live.
    pub fn unlock(&self) -> Result<UnlockHolder<'_, 'a>> {
        self.lock.release()?;
        Ok(UnlockHolder {
            lock:     &self.lock,
            relocked: false,
        })
    }

    /// Returns `true` while the callback holds the worker lock.
    #[must_use]
    pub fn is_locked(&self) -> bool { self.lock.is_held() }

    pub(crate) fn next_timeout(&self) -> Duration { self.next_timeout.get() }
}

impl fmt::Debug for ThreadContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadContext")
            .field("outcome", &self.outcome)
            .field("timeout", &self.timeout)
            .field("next_timeout", &self.next_timeout.get())
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Scope token that keeps the worker lock released.
///
/// The lock is re-acquired exactly once: on [`UnlockHolder::reset`] or on
/// drop, whichever comes first. Dropping during a panic re-acquires too.
#[must_use = "dropping the holder re-acquires the lock immediately"]
pub struct UnlockHolder<'c, 'a> {
    lock:     &'c CycleLock<'a>,
    relocked: bool,
}

impl UnlockHolder<'_, '_> {
    /// Re-acquires the worker lock now. Further calls do nothing.
    pub fn reset(&mut self) {
        if !self.relocked {
            self.lock.reacquire();
            self.relocked = true;
        }
    }

    /// Returns `true` while this holder keeps the lock released.
    #[must_use]
    pub fn is_active(&self) -> bool { !self.relocked }
}

impl Drop for UnlockHolder<'_, '_> {
    fn drop(&mut self) { self.reset(); }
}

impl fmt::Debug for UnlockHolder<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockHolder")
            .field("active", &self.is_active())
            .finish()
    }
}
