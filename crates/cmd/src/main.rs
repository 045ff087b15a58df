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
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver},
    },
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use snafu::{ResultExt, Whatever};
use snooze_common_telemetry::{LoggingOptions, init_global_logging, log_time, set_panic_hook};
use snooze_common_worker::{WorkError, Worker, WorkerConfig};

mod build_info;

#[derive(Debug, Parser)]
#[clap(
name = "snooze",
about = "snooze-cmd",
author = build_info::AUTHOR,
version = build_info::FULL_VERSION,
long_version = build_info::LONG_VERSION)]
struct Cli {
    /// Log filter, e.g. `info` or `snooze_common_worker=debug`.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write rolling log files into this directory.
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    commands: Commands,
}

impl Cli {
    fn logging_options(&self) -> LoggingOptions {
        LoggingOptions {
            dir: self.log_dir.clone().unwrap_or_default(),
            level: self.log_level.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    Demo(DemoArgs),
}

#[derive(Debug, Clone, Args)]
#[command(flatten_help = true)]
#[command(long_about = r"

Runs a worker that wakes up every `--timeout-ms`, raises an event after
`--event-after-ms` and keeps going for `--run-for-ms` before stopping.
The event cycle doubles the timeout and fails on purpose; the worker
keeps running. Ctrl-C stops early.
Examples:

snooze demo
snooze demo --timeout-ms 200 --event-after-ms 1000 --run-for-ms 1000

")]
struct DemoArgs {
    /// Initial wait between wake-ups.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Delay before the event flag is raised and the worker notified.
    #[arg(long, default_value_t = 5000)]
    event_after_ms: u64,

    /// How long to keep running after the event.
    #[arg(long, default_value_t = 5000)]
    run_for_ms: u64,

    /// Value handed to every callback invocation.
    #[arg(long, default_value = "abc")]
    arg: String,
}

impl DemoArgs {
    fn run(&self) -> Result<(), Whatever> {
        let (interrupt_tx, interrupt_rx) = mpsc::channel();
        ctrlc::set_handler(move || {
            let _ = interrupt_tx.send(());
        })
        .whatever_context("failed to install Ctrl-C handler")?;

        println!("{} Thread Test", log_time());

        let timeout = Duration::from_millis(self.timeout_ms);
        let event = Arc::new(AtomicBool::new(false));
        let predicate_event = Arc::clone(&event);
        let callback_event = Arc::clone(&event);

        let mut worker = Worker::new(WorkerConfig::builder().name("demo").build());
        worker
            .start_with_args(
                timeout,
                move || predicate_event.load(Ordering::Acquire),
                move |ctx, arg: &String| {
                    println!("{} In the thread {} {}", log_time(), ctx.was_timeout(), arg);
                    let mut unlocked = ctx.unlock()?;
                    if !ctx.was_timeout() && callback_event.load(Ordering::Acquire) {
                        println!("{}   event signaled", log_time());
                        callback_event.store(false, Ordering::Release);
                        ctx.set_timeout(ctx.get_timeout() * 2);
                        return Err(WorkError::new("event handled, failing on purpose"));
                    }
                    unlocked.reset();
                    Ok(())
                },
                self.arg.clone(),
            )
            .whatever_context("failed to start demo worker")?;

        if !interrupted(&interrupt_rx, Duration::from_millis(self.event_after_ms)) {
            event.store(true, Ordering::Release);
            worker.notify();
            println!("{} notify signaled", log_time());

            interrupted(&interrupt_rx, Duration::from_millis(self.run_for_ms));
        }

        println!("{} Stopping...", log_time());
        worker.stop();

        let stats = worker.stats();
        tracing::info!(
            wakeups = stats.wakeups,
            timeouts = stats.timeouts,
            signalled = stats.signalled,
            failures = stats.failures,
            "demo finished"
        );
        Ok(())
    }
}

/// Sleeps for `duration` unless Ctrl-C arrives first. Returns `true` when
/// interrupted.
fn interrupted(interrupt: &Receiver<()>, duration: Duration) -> bool {
    interrupt.recv_timeout(duration).is_ok()
}

fn main() -> Result<(), Whatever> {
    let cli = Cli::parse();
    let _guards = init_global_logging("snooze", &cli.logging_options());
    set_panic_hook();

    match cli.commands {
        Commands::Demo(args) => args.run(),
    }
}
