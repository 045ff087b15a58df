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
    any::Any,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, TryLockError},
    thread::{self, JoinHandle},
    time::Duration,
};

use snafu::{ResultExt, ensure};
use tracing::{debug, error, info, warn};

use crate::{
    config::WorkerConfig,
    context::ThreadContext,
    err::{AlreadyStartedSnafu, Result, SpawnThreadSnafu, WorkResult},
    handle::WorkerHandle,
    metrics::{WorkerCounters, WorkerStats},
    trigger::WakeOutcome,
};

/// State guarded by the worker lock.
#[derive(Debug, Default)]
pub(crate) struct LoopState {
    stop: bool,
}

/// Synchronisation shared between the owner, its handles and the thread.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) state:    Mutex<LoopState>,
    pub(crate) cond:     Condvar,
    pub(crate) counters: WorkerCounters,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A single background thread that sleeps until a timeout elapses, a
/// predicate turns true, or the owner stops it, and runs a callback on every
/// wake.
///
/// The callback runs with the worker lock held. It can release the lock for
/// part of its body through [`ThreadContext::unlock`].
///
/// # Example
///
/// ```rust,no_run
/// use std::{
///     sync::{
///         Arc,
///         atomic::{AtomicBool, Ordering},
///     },
///     time::Duration,
/// };
///
/// use snooze_common_worker::{Worker, WorkerConfig};
///
/// let event = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&event);
///
/// let mut worker = Worker::new(WorkerConfig::builder().name("poller").build());
/// worker
///     .start_with_args(
///         Duration::from_secs(1),
///         move || flag.load(Ordering::Acquire),
///         |ctx, label: &String| {
///             println!("{label}: was_timeout = {}", ctx.was_timeout());
///             Ok(())
///         },
///         "abc".to_string(),
///     )
///     .unwrap();
///
/// event.store(true, Ordering::Release);
/// worker.notify();
/// worker.stop();
/// ```
pub struct Worker {
    name:    Arc<str>,
    config:  WorkerConfig,
    shared:  Arc<Shared>,
    thread:  Option<JoinHandle<()>>,
    started: bool,
}

impl Default for Worker {
    fn default() -> Self { Worker::new(WorkerConfig::default()) }
}

impl Worker {
    /// Creates an idle worker. No thread exists until one of the `start`
    /// methods is called.
    #[must_use]
    pub fn new(config: WorkerConfig) -> Self {
        Worker {
            name: Arc::from(config.name()),
            config,
            shared: Arc::default(),
            thread: None,
            started: false,
        }
    }

    /// Starts the thread with a purely timeout-driven wake condition.
    ///
    /// # Errors
    ///
    /// See [`Worker::start_with_args`].
    pub fn start<F>(&mut self, timeout: Duration, mut callback: F) -> Result<()>
    where
        F: FnMut(&mut ThreadContext<'_>) -> WorkResult + Send + 'static,
    {
        self.start_with_args(timeout, || false, move |ctx, _| callback(ctx), ())
    }

    /// Starts the thread, waking early whenever `predicate` returns `true`.
    ///
    /// # Errors
    ///
    /// See [`Worker::start_with_args`].
    pub fn start_with_predicate<P, F>(
        &mut self,
        timeout: Duration,
        predicate: P,
        mut callback: F,
    ) -> Result<()>
    where
        P: FnMut() -> bool + Send + 'static,
        F: FnMut(&mut ThreadContext<'_>) -> WorkResult + Send + 'static,
    {
        self.start_with_args(timeout, predicate, move |ctx, _| callback(ctx), ())
    }

    /// Starts the thread. `args` is moved into the thread once and lent to
    /// every callback invocation.
    ///
    /// A worker can be started only once, even after it has been stopped.
    ///
    /// # Errors
    ///
    /// - [`WorkerError::AlreadyStarted`](crate::WorkerError) if this worker
    ///   was started before.
    /// - [`WorkerError::SpawnThread`](crate::WorkerError) if the thread could
    ///   not be created.
    pub fn start_with_args<P, F, A>(
        &mut self,
        timeout: Duration,
        predicate: P,
        callback: F,
        args: A,
    ) -> Result<()>
    where
        P: FnMut() -> bool + Send + 'static,
        F: FnMut(&mut ThreadContext<'_>, &A) -> WorkResult + Send + 'static,
        A: Send + 'static,
    {
        ensure!(!self.started, AlreadyStartedSnafu { name: &*self.name });

        let mut builder = thread::Builder::new().name(self.name.to_string());
        if let Some(stack_size) = self.config.stack_size() {
            builder = builder.stack_size(stack_size);
        }

        let name = Arc::clone(&self.name);
        let shared = Arc::clone(&self.shared);
        let thread = builder
            .spawn(move || run_loop(&name, &shared, timeout, predicate, callback, &args))
            .context(SpawnThreadSnafu { name: &*self.name })?;

        self.thread = Some(thread);
        self.started = true;
        Ok(())
    }

    /// Wakes the thread so it re-checks its predicate now.
    ///
    /// Does not take the lock, so it is safe to call from any thread,
    /// including from inside the callback.
    pub fn notify(&self) { self.shared.cond.notify_one(); }

    /// Requests stop and blocks until the thread has exited.
    ///
    /// An in-flight callback is allowed to finish first. Calling this again,
    /// or on a worker that was never started, does nothing.
    ///
    /// Called from the worker's own callback, this only requests the stop and
    /// does not join; the thread exits once the callback returns. The callback
    /// must hold an [`UnlockHolder`](crate::UnlockHolder) at that point,
    /// otherwise the request is refused and logged.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };

        if thread.thread().id() == thread::current().id() {
            self.request_stop_from_worker(thread);
            return;
        }

        self.shared.lock().stop = true;
        self.shared.cond.notify_one();

        if thread.join().is_err() {
            error!(worker = %self.name, "worker thread terminated by a panic");
        }
        info!(worker = %self.name, "worker stopped");
    }

    /// The worker lock is not reentrant, so the callback can only set the
    /// stop flag while it has the lock released.
    fn request_stop_from_worker(&mut self, thread: JoinHandle<()>) {
        match self.shared.state.try_lock() {
            Ok(mut state) => state.stop = true,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner().stop = true,
            Err(TryLockError::WouldBlock) => {
                error!(
                    worker = %self.name,
                    "stop called from the worker callback with the lock held, call it inside an unlock() scope"
                );
                self.thread = Some(thread);
                return;
            }
        }
        self.shared.cond.notify_one();
        info!(worker = %self.name, "stop requested from the worker thread, not joining");
    }

    /// Returns a cloneable handle that can notify the worker from elsewhere.
    #[must_use]
    pub fn handle(&self) -> WorkerHandle {
        WorkerHandle::new(Arc::clone(&self.name), Arc::clone(&self.shared))
    }

    /// Snapshot of the worker's counters.
    #[must_use]
    pub fn stats(&self) -> WorkerStats { self.shared.counters.snapshot() }

    #[must_use]
    pub fn name(&self) -> &str { &self.name }

    /// Returns `true` once a `start` method has succeeded.
    #[must_use]
    pub fn is_started(&self) -> bool { self.started }

    /// Returns `true` while the thread is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|thread| !thread.is_finished())
    }
}

impl Drop for Worker {
    fn drop(&mut self) { self.stop(); }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("started", &self.started)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Wait/dispatch loop executed on the worker thread.
fn run_loop<P, F, A>(
    name: &str,
    shared: &Shared,
    mut timeout: Duration,
    mut predicate: P,
    mut callback: F,
    args: &A,
) where
    P: FnMut() -> bool,
    F: FnMut(&mut ThreadContext<'_>, &A) -> WorkResult,
{
    debug!(worker = name, timeout_ms = millis(timeout), "worker thread started");

    // A panicking predicate counts as a failure and as "keep waiting".
    let mut should_wake = || {
        panic::catch_unwind(AssertUnwindSafe(&mut predicate)).unwrap_or_else(|payload| {
            shared.counters.record_failure();
            error!(
                worker = name,
                panic = panic_message(&*payload),
                "worker predicate panicked"
            );
            false
        })
    };

    loop {
        let guard = shared.lock();
        let (guard, wait) = shared
            .cond
            .wait_timeout_while(guard, timeout, |state| !state.stop && !should_wake())
            .unwrap_or_else(PoisonError::into_inner);

        let outcome = WakeOutcome::classify(guard.stop, wait.timed_out());
        if outcome.is_stop() {
            info!(worker = name, "stop requested");
            return;
        }

        shared.counters.record_dispatch(outcome);
        debug!(
            worker = name,
            was_timeout = outcome.is_timeout(),
            timeout_ms = millis(timeout),
            "dispatching worker callback"
        );

        let mut ctx = ThreadContext::new(&shared.state, guard, outcome, timeout);
        match panic::catch_unwind(AssertUnwindSafe(|| callback(&mut ctx, args))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                shared.counters.record_failure();
                warn!(worker = name, error = %err, "worker callback failed");
            }
            Err(payload) => {
                shared.counters.record_failure();
                error!(
                    worker = name,
                    panic = panic_message(&*payload),
                    "worker callback panicked"
                );
            }
        }

        timeout = ctx.next_timeout();
    }
}

fn millis(duration: Duration) -> u64 { u64::try_from(duration.as_millis()).unwrap_or(u64::MAX) }

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
