use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU32, Ordering},
        mpsc,
    },
    thread::sleep,
    time::{Duration, Instant},
};

use snooze_common_telemetry::init_default_ut_logging;
use snooze_common_worker::{
    Handle, Notifiable, WakeOutcome, WorkError, Worker, WorkerConfig, WorkerStats,
};

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

fn named(name: &str) -> Worker { Worker::new(WorkerConfig::builder().name(name).build()) }

fn wait_for_stats(worker: &Worker, done: impl Fn(&WorkerStats) -> bool) -> WorkerStats {
    let deadline = Instant::now() + RECV_TIMEOUT;
    loop {
        let stats = worker.stats();
        if done(&stats) || Instant::now() >= deadline {
            return stats;
        }
        sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_timeout_driven_invocations() {
    init_default_ut_logging();
    let records = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&records);

    let mut worker = named("timeout-driven");
    worker
        .start_with_args(
            Duration::from_millis(300),
            || false,
            move |ctx, arg: &String| {
                sink.lock().unwrap().push((ctx.was_timeout(), arg.clone()));
                Ok(())
            },
            "abc".to_string(),
        )
        .unwrap();

    sleep(Duration::from_millis(1050));
    worker.stop();

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 3, "Expected 3 invocations, got {}", records.len());
    assert!(
        records
            .iter()
            .all(|(was_timeout, arg)| *was_timeout && arg == "abc")
    );
    assert_eq!(worker.stats().timeouts, records.len() as u64);
    assert_eq!(worker.stats().signalled, 0);
}

#[test]
fn test_notify_wakes_before_timeout() {
    init_default_ut_logging();
    let event = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&event);
    let (tx, rx) = mpsc::channel();

    let mut worker = named("notify-wakes");
    worker
        .start_with_predicate(
            Duration::from_secs(30),
            move || flag.load(Ordering::Acquire),
            {
                let event = Arc::clone(&event);
                move |ctx| {
                    event.store(false, Ordering::Release);
                    tx.send((ctx.was_timeout(), ctx.outcome())).unwrap();
                    Ok(())
                }
            },
        )
        .unwrap();

    sleep(Duration::from_millis(50));
    let notified_at = Instant::now();
    event.store(true, Ordering::Release);
    worker.notify();

    let (was_timeout, outcome) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    assert!(!was_timeout);
    assert_eq!(outcome, WakeOutcome::Signalled);
    assert!(notified_at.elapsed() < Duration::from_secs(5));

    // The flag was cleared, so nothing else should fire before the timeout.
    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    worker.stop();
}

#[test]
fn test_set_timeout_applies_to_next_cycle() {
    init_default_ut_logging();
    let (tx, rx) = mpsc::channel();

    let mut worker = named("set-timeout");
    worker
        .start(Duration::from_millis(50), move |ctx| {
            tx.send((Instant::now(), ctx.get_timeout())).unwrap();
            ctx.set_timeout(Duration::from_millis(200));
            Ok(())
        })
        .unwrap();

    let (first_at, first) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    let (second_at, second) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    let (_, third) = rx.recv_timeout(RECV_TIMEOUT).unwrap();
    worker.stop();

    assert_eq!(first, Duration::from_millis(50));
    assert_eq!(second, Duration::from_millis(200));
    assert_eq!(third, Duration::from_millis(200));
    assert!(
        second_at - first_at >= Duration::from_millis(190),
        "Second wait lasted {:?}",
        second_at - first_at
    );
}

#[test]
fn test_failures_do_not_stop_the_loop() {
    init_default_ut_logging();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);

    let mut worker = named("failing");
    worker
        .start(Duration::from_millis(20), move |_ctx| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Err(WorkError::new("first cycle fails")),
                1 => panic!("second cycle panics"),
                _ => Ok(()),
            }
        })
        .unwrap();

    let stats = wait_for_stats(&worker, |stats| stats.wakeups >= 4);
    worker.stop();

    assert!(stats.wakeups >= 4, "Loop stalled after failures: {stats:?}");
    assert_eq!(worker.stats().failures, 2);
    assert!(!worker.is_running());
}

#[test]
fn test_failed_cycle_keeps_new_timeout() {
    init_default_ut_logging();
    let event = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&event);
    let (tx, rx) = mpsc::channel();

    let mut worker = named("failed-keeps-timeout");
    worker
        .start_with_predicate(
            Duration::from_secs(30),
            move || flag.swap(false, Ordering::AcqRel),
            move |ctx| {
                tx.send((ctx.was_timeout(), ctx.get_timeout())).unwrap();
                if !ctx.was_timeout() {
                    ctx.set_timeout(Duration::from_millis(30));
                    return Err(WorkError::new("event handling failed"));
                }
                Ok(())
            },
        )
        .unwrap();

    event.store(true, Ordering::Release);
    worker.notify();

    assert_eq!(
        rx.recv_timeout(RECV_TIMEOUT).unwrap(),
        (false, Duration::from_secs(30))
    );
    // The timeout set before the failure drives the next wait.
    assert_eq!(
        rx.recv_timeout(RECV_TIMEOUT).unwrap(),
        (true, Duration::from_millis(30))
    );
    worker.stop();
    assert!(worker.stats().failures >= 1);
}

#[test]
fn test_notify_while_unlocked() {
    init_default_ut_logging();
    let event = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&event);
    let (unlocked_tx, unlocked_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel::<()>();
    let (done_tx, done_rx) = mpsc::channel();
    let mut first_cycle = true;

    let mut worker = named("unlocked-notify");
    let handle = worker.handle();
    assert_eq!(handle.name(), "unlocked-notify");

    worker
        .start_with_predicate(
            Duration::from_millis(50),
            move || flag.swap(false, Ordering::AcqRel),
            move |ctx| {
                if std::mem::take(&mut first_cycle) {
                    let mut holder = ctx.unlock()?;
                    assert!(!ctx.is_locked());
                    unlocked_tx.send(()).unwrap();
                    resume_rx
                        .recv_timeout(RECV_TIMEOUT)
                        .map_err(|e| WorkError::with_source("main thread went away", e))?;
                    // Notifying ourselves must not deadlock either.
                    handle.notify();
                    holder.reset();
                    assert!(ctx.is_locked());
                }
                done_tx.send(ctx.outcome()).unwrap();
                Ok(())
            },
        )
        .unwrap();

    unlocked_rx.recv_timeout(RECV_TIMEOUT).unwrap();
    event.store(true, Ordering::Release);
    worker.notify();
    resume_tx.send(()).unwrap();

    assert_eq!(done_rx.recv_timeout(RECV_TIMEOUT).unwrap(), WakeOutcome::TimedOut);
    // The flag raised during the unlocked window is picked up right away.
    assert_eq!(done_rx.recv_timeout(RECV_TIMEOUT).unwrap(), WakeOutcome::Signalled);

    drop(resume_tx);
    worker.stop();
    assert_eq!(worker.stats().failures, 0);
}

#[test]
fn test_stop_interrupts_wait() {
    init_default_ut_logging();
    let mut worker = named("stop-while-waiting");
    worker.start(Duration::from_secs(60), |_| Ok(())).unwrap();
    sleep(Duration::from_millis(20));

    let start = Instant::now();
    worker.stop();
    let elapsed = start.elapsed();

    assert!(
        elapsed < Duration::from_secs(1),
        "Stop took {elapsed:?}, expected the wait to be interrupted"
    );
    assert_eq!(worker.stats().wakeups, 0);
    assert!(!worker.is_running());

    // A second stop returns immediately.
    let start = Instant::now();
    worker.stop();
    assert!(start.elapsed() < Duration::from_millis(100));
}

#[test]
fn test_stop_waits_for_in_flight_callback() {
    init_default_ut_logging();
    let finished = Arc::new(AtomicBool::new(false));
    let done = Arc::clone(&finished);
    let (started_tx, started_rx) = mpsc::channel();

    let mut worker = named("stop-mid-callback");
    worker
        .start(Duration::from_millis(10), move |ctx| {
            if done.load(Ordering::Acquire) {
                return Ok(());
            }
            let _ = started_tx.send(());
            let _unlocked = ctx.unlock()?;
            sleep(Duration::from_millis(300));
            done.store(true, Ordering::Release);
            Ok(())
        })
        .unwrap();

    started_rx.recv_timeout(RECV_TIMEOUT).unwrap();
    let start = Instant::now();
    worker.stop();

    assert!(finished.load(Ordering::Acquire), "stop returned mid-callback");
    assert!(start.elapsed() < Duration::from_secs(5));
    let wakeups = worker.stats().wakeups;
    sleep(Duration::from_millis(50));
    assert_eq!(worker.stats().wakeups, wakeups);
}

#[test]
fn test_stop_from_drop() {
    init_default_ut_logging();
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    {
        let mut worker = named("dropped");
        worker
            .start(Duration::from_millis(10), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        sleep(Duration::from_millis(50));
    }

    let after_drop = calls.load(Ordering::SeqCst);
    sleep(Duration::from_millis(50));
    assert_eq!(calls.load(Ordering::SeqCst), after_drop);
}

#[test]
fn test_stop_from_own_callback() {
    init_default_ut_logging();
    let slot = Arc::new(Mutex::new(None::<Worker>));
    let in_callback = Arc::clone(&slot);
    let (tx, rx) = mpsc::channel();

    let mut worker = named("self-stop");
    let handle = worker.handle();
    worker
        .start(Duration::from_millis(10), move |ctx| {
            let _unlocked = ctx.unlock()?;
            let taken = in_callback.lock().unwrap().take();
            if let Some(mut worker) = taken {
                worker.stop();
                tx.send(worker).unwrap();
            }
            Ok(())
        })
        .unwrap();
    *slot.lock().unwrap() = Some(worker);

    let worker = rx
        .recv_timeout(RECV_TIMEOUT)
        .expect("stop inside the callback returned");
    assert!(!worker.is_running());

    sleep(Duration::from_millis(50));
    let wakeups = handle.stats().wakeups;
    sleep(Duration::from_millis(100));
    assert_eq!(handle.stats().wakeups, wakeups);
}

#[test]
fn test_stop_from_callback_with_lock_held_is_refused() {
    init_default_ut_logging();
    let slot = Arc::new(Mutex::new(None::<Worker>));
    let in_callback = Arc::clone(&slot);
    let (tx, rx) = mpsc::channel();

    let mut worker = named("self-stop-locked");
    worker
        .start(Duration::from_millis(10), move |_| {
            let taken = in_callback.lock().unwrap().take();
            if let Some(mut worker) = taken {
                worker.stop();
                tx.send(worker).unwrap();
            }
            Ok(())
        })
        .unwrap();
    *slot.lock().unwrap() = Some(worker);

    let mut worker = rx
        .recv_timeout(RECV_TIMEOUT)
        .expect("stop with the lock held returned");
    let before = worker.stats().wakeups;
    let stats = wait_for_stats(&worker, |stats| stats.wakeups > before + 2);
    assert!(stats.wakeups > before + 2, "loop kept running: {stats:?}");
    assert!(worker.is_running());

    worker.stop();
    assert!(!worker.is_running());
    let wakeups = worker.stats().wakeups;
    sleep(Duration::from_millis(50));
    assert_eq!(worker.stats().wakeups, wakeups);
}

#[test]
fn test_panicking_predicate_is_counted() {
    init_default_ut_logging();
    let evaluations = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&evaluations);

    let mut worker = named("predicate-panic");
    worker
        .start_with_predicate(
            Duration::from_millis(20),
            move || {
                if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("predicate exploded");
                }
                false
            },
            |_| Ok(()),
        )
        .unwrap();

    let stats = wait_for_stats(&worker, |stats| stats.timeouts >= 2);
    assert!(stats.timeouts >= 2, "loop survived the panic: {stats:?}");
    assert_eq!(stats.failures, 1);
    assert!(worker.is_running());
    worker.stop();
}
