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

// ============================================================================
// Wake Outcome
// ============================================================================

/// Why the worker thread left its timed wait.
///
/// Computed once per wake cycle. The loop terminates on
/// [`WakeOutcome::StopRequested`] without dispatching, so a callback only ever
/// observes [`WakeOutcome::TimedOut`] or [`WakeOutcome::Signalled`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum WakeOutcome {
    /// The timeout elapsed while the predicate stayed false.
    #[display("timed out")]
    TimedOut,
    /// The predicate became true, observed after a `notify()` or a spurious
    /// wakeup.
    #[display("signalled")]
    Signalled,
    /// The owner asked the worker to stop.
    #[display("stop requested")]
    StopRequested,
}

impl WakeOutcome {
    /// Classifies a finished wait. A pending stop always wins over the other
    /// two causes.
    pub(crate) const fn classify(stop_requested: bool, timed_out: bool) -> Self {
        if stop_requested {
            WakeOutcome::StopRequested
        } else if timed_out {
            WakeOutcome::TimedOut
        } else {
            WakeOutcome::Signalled
        }
    }

    /// Returns `true` if the wait ended because the timeout expired.
    #[must_use]
    pub const fn is_timeout(self) -> bool { matches!(self, WakeOutcome::TimedOut) }

    /// Returns `true` if the worker should leave its loop.
    #[must_use]
    pub const fn is_stop(self) -> bool { matches!(self, WakeOutcome::StopRequested) }
}
