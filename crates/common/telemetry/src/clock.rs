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

//! Wall-clock helpers for human-readable output.

use chrono::Local;

/// `strftime` pattern used by [`log_time`].
pub const LOG_TIME_FORMAT: &str = "%T";

/// `strftime` pattern for the timestamp column of text logs.
pub const LOG_TIMESTAMP_FORMAT: &str = "%T%.3f";

/// Current local time as `HH:MM:SS`.
#[must_use]
pub fn log_time() -> String { Local::now().format(LOG_TIME_FORMAT).to_string() }
