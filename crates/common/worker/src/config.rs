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

use bon::Builder;
use smart_default::SmartDefault;

/// Default thread name used when none is configured.
pub const DEFAULT_WORKER_NAME: &str = "snooze-worker";

/// Construction-time settings for a [`Worker`](crate::Worker).
#[derive(Debug, Clone, SmartDefault, Builder)]
#[builder(finish_fn = build)]
pub struct WorkerConfig {
    /// Name given to the spawned OS thread and attached to every log line.
    #[default(DEFAULT_WORKER_NAME.to_string())]
    #[builder(default = DEFAULT_WORKER_NAME.to_string(), into)]
    name: String,

    /// Stack size of the spawned thread in bytes. `None` keeps the platform
    /// default.
    stack_size: Option<usize>,
}

impl WorkerConfig {
    pub(crate) fn name(&self) -> &str { &self.name }

    pub(crate) fn stack_size(&self) -> Option<usize> { self.stack_size }
}
