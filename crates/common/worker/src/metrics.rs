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

use std::sync::atomic::{AtomicU64, Ordering};

use crate::trigger::WakeOutcome;

/// Counters updated by the worker loop, owned by a single worker instance.
#[derive(Debug, Default)]
pub(crate) struct WorkerCounters {
    wakeups:   AtomicU64,
    timeouts:  AtomicU64,
    signalled: AtomicU64,
    failures:  AtomicU64,
}

impl WorkerCounters {
    pub(crate) fn record_dispatch(&self, outcome: WakeOutcome) {
        let counter = match outcome {
            WakeOutcome::TimedOut => &self.timeouts,
            WakeOutcome::Signalled => &self.signalled,
            WakeOutcome::StopRequested => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.wakeups.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) { self.failures.fetch_add(1, Ordering::Relaxed); }

    pub(crate) fn snapshot(&self) -> WorkerStats {
        WorkerStats {
            wakeups:   self.wakeups.load(Ordering::Relaxed),
            timeouts:  self.timeouts.load(Ordering::Relaxed),
            signalled: self.signalled.load(Ordering::Relaxed),
            failures:  self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a worker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Callback dispatches so far.
    pub wakeups:   u64,
    /// Dispatches caused by the timeout.
    pub timeouts:  u64,
    /// Dispatches caused by the predicate.
    pub signalled: u64,
    /// Callback invocations that returned an error or panicked, plus
    /// predicate evaluations that panicked.
    pub failures:  u64,
}
