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

//! Single background thread driven by a timeout, a wake predicate and an
//! explicit stop request.
//!
//! This crate provides:
//! - **[`Worker`]**: owns one thread, its lock, condition variable and stop
//!   flag; `start`, `notify`, `stop` (also run on drop)
//! - **[`ThreadContext`]**: per-wake view telling the callback why it woke,
//!   letting it change the next timeout and release the lock for a while
//! - **[`UnlockHolder`]**: scope token that keeps the lock released and
//!   re-acquires it on reset or drop
//! - **[`WorkerHandle`]**: cloneable notifier usable from any thread,
//!   including the callback itself
//!
//! Callback failures, returned errors and panics alike, are logged and
//! absorbed; a bad cycle never stops the worker.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use snooze_common_worker::{Notifiable, Worker};
//!
//! let mut worker = Worker::default();
//! let handle = worker.handle();
//!
//! worker
//!     .start(Duration::from_secs(1), move |ctx| {
//!         println!("woke up, was_timeout = {}", ctx.was_timeout());
//!
//!         // Release the lock around anything that may call back into us.
//!         let _unlocked = ctx.unlock()?;
//!         handle.notify();
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! std::thread::sleep(Duration::from_secs(3));
//! worker.stop();
//! ```

mod config;
mod context;
mod err;
mod handle;
mod metrics;
mod trigger;
mod worker;

// Public API
pub use config::{DEFAULT_WORKER_NAME, WorkerConfig};
pub use context::{ThreadContext, UnlockHolder};
pub use err::{Result, WorkError, WorkResult, WorkerError};
pub use handle::{Handle, Notifiable, WorkerHandle};
pub use metrics::WorkerStats;
pub use trigger::WakeOutcome;
pub use worker::Worker;
