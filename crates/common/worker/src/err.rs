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

use std::fmt;

use snafu::Snafu;

// ============================================================================
// Worker Errors
// ============================================================================

/// Result type for worker lifecycle and context operations.
pub type Result<T, E = WorkerError> = std::result::Result<T, E>;

/// Misuse and lifecycle errors reported by [`Worker`](crate::Worker) and
/// [`ThreadContext`](crate::ThreadContext).
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum WorkerError {
    /// `start` was called on a worker that already owns (or owned) a thread.
    #[snafu(display("Worker '{name}' has already been started"))]
    AlreadyStarted {
        name: String,
        #[snafu(implicit)]
        loc:  snafu::Location,
    },

    /// `unlock` was called while an [`UnlockHolder`](crate::UnlockHolder)
    /// from the same cycle is still live.
    #[snafu(display("Worker lock is already released by a live unlock holder"))]
    AlreadyUnlocked {
        #[snafu(implicit)]
        loc: snafu::Location,
    },

    /// The operating system refused to spawn the worker thread.
    #[snafu(display("Failed to spawn thread for worker '{name}'"))]
    SpawnThread {
        name:   String,
        source: std::io::Error,
        #[snafu(implicit)]
        loc:    snafu::Location,
    },
}

// ============================================================================
// Work Error Types
// ============================================================================

/// Result type returned by worker callbacks.
pub type WorkResult<T = ()> = std::result::Result<T, WorkError>;

/// Failure reported by a worker callback.
///
/// The loop logs it and carries on with the next wait; a failing cycle never
/// stops the worker.
///
/// # Example
///
/// ```rust
/// use snooze_common_worker::{WorkError, WorkResult};
///
/// fn poll_remote() -> WorkResult {
///     if remote_unavailable() {
///         return Err(WorkError::new("remote temporarily unavailable"));
///     }
///     Ok(())
/// }
/// # fn remote_unavailable() -> bool { false }
/// ```
#[derive(Debug)]
pub struct WorkError {
    message: String,
    source:  Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl WorkError {
    /// Creates a new error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        WorkError {
            message: message.into(),
            source:  None,
        }
    }

    /// Creates an error wrapping a source error.
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WorkError {
            message: message.into(),
            source:  Some(Box::new(source)),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str { &self.message }
}

impl fmt::Display for WorkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.message, source),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for WorkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl From<WorkerError> for WorkError {
    fn from(err: WorkerError) -> Self { WorkError::with_source("worker misuse", err) }
}
