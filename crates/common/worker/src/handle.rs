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

use std::sync::Arc;

use crate::{metrics::WorkerStats, worker::Shared};

/// Base trait for worker handles, providing access to the worker's name.
///
/// Handles are `Clone`, `Send`, and `Sync` so they can be moved into other
/// threads or into the worker's own callback.
pub trait Handle: Clone + Send + Sync {
    /// Returns the worker's name for identification and logging.
    fn name(&self) -> &str;
}

/// Handle trait for workers that can be woken up on demand.
///
/// # Example
///
/// ```rust,no_run
/// # use std::time::Duration;
/// # use snooze_common_worker::{Notifiable, Worker};
/// let mut worker = Worker::default();
/// worker
///     .start(Duration::from_secs(5), |ctx| {
///         println!("woke up, timeout = {}", ctx.was_timeout());
///         Ok(())
///     })
///     .unwrap();
///
/// let handle = worker.handle();
/// std::thread::spawn(move || handle.notify());
/// ```
pub trait Notifiable: Handle {
    /// Wakes the worker so it re-evaluates its predicate immediately.
    ///
    /// Never takes the worker lock, so calling it from inside the callback is
    /// safe. Wake-ups are level-triggered: several calls may collapse into a
    /// single cycle, and a cycle only dispatches if the predicate holds.
    fn notify(&self);
}

/// Cloneable handle to a [`Worker`](crate::Worker).
///
/// Unlike the worker itself, the handle cannot stop or join the thread.
#[derive(Clone)]
pub struct WorkerHandle {
    name:   Arc<str>,
    shared: Arc<Shared>,
}

impl WorkerHandle {
    pub(crate) fn new(name: Arc<str>, shared: Arc<Shared>) -> Self { WorkerHandle { name, shared } }

    /// Snapshot of the worker's counters.
    #[must_use]
    pub fn stats(&self) -> WorkerStats { self.shared.counters.snapshot() }
}

impl Handle for WorkerHandle {
    fn name(&self) -> &str { &self.name }
}

impl Notifiable for WorkerHandle {
    fn notify(&self) { self.shared.cond.notify_one(); }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
