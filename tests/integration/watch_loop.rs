//! The async watch loop: stop handle, simulated time, native wake-ups.

use super::test_utils::{t0, TestWorkspace};
use chrono::Duration as ChronoDuration;
use parking_lot::Mutex;
use relwatch::clock::ManualClock;
use relwatch::engine::CycleOutcome;
use relwatch::tooling::{ReleaseWatcher, WatchOptions};
use std::sync::Arc;
use std::time::Duration;

fn options(interval_ms: u64, native_events: bool) -> WatchOptions {
    WatchOptions {
        interval: Duration::from_millis(interval_ms),
        native_events,
        handle_interrupt: false,
    }
}

#[tokio::test]
async fn test_watcher_releases_and_stops_from_hook() {
    let ws = TestWorkspace::new();
    let engine = ws.engine(&ws.config(), 0);
    ws.write("src/a.ts", "a");

    let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let mut watcher = ReleaseWatcher::new(engine, options(10, false));
    let handle = watcher.stop_handle();
    let log = Arc::clone(&seen);
    watcher = watcher.on_cycle(move |outcome| {
        log.lock().push(outcome.to_string());
        if outcome.is_release() {
            handle.stop();
        }
    });

    let summary = tokio::time::timeout(Duration::from_secs(10), watcher.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.releases, 1);
    assert_eq!(summary.last_version.as_deref(), Some("0.0.1"));
    assert_eq!(seen.lock().last().map(String::as_str), Some("released: version 0.0.1"));
    assert_eq!(ws.version(), "0.0.1");
}

#[tokio::test]
async fn test_watcher_uses_injected_clock_for_cooldown() {
    let ws = TestWorkspace::new();
    let engine = ws.engine(&ws.config(), 5);
    ws.write("a.txt", "a");

    let clock = Arc::new(ManualClock::new(t0()));
    let mut watcher = ReleaseWatcher::new(engine, options(5, false)).with_clock(clock.clone());
    let handle = watcher.stop_handle();
    let cycles = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&cycles);
    watcher = watcher.on_cycle(move |outcome| {
        assert!(matches!(outcome, CycleOutcome::Accumulating { .. }));
        let mut n = counter.lock();
        *n += 1;
        if *n == 3 {
            handle.stop();
        }
    });

    let summary = tokio::time::timeout(Duration::from_secs(10), watcher.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.cycles, 3);
    assert_eq!(summary.releases, 0);

    let mut engine = watcher.into_engine();
    assert_eq!(engine.pending().len(), 1);
    clock.set(t0() + ChronoDuration::seconds(5));
    assert!(engine.tick(clock.as_ref()).unwrap().is_release());
}

#[tokio::test]
async fn test_native_events_enabled_still_releases() {
    let ws = TestWorkspace::new();
    let engine = ws.engine(&ws.config(), 0);

    let mut watcher = ReleaseWatcher::new(engine, options(200, true));
    let handle = watcher.stop_handle();
    watcher = watcher.on_cycle(move |outcome| {
        if outcome.is_release() {
            handle.stop();
        }
    });

    let target = ws.path("late.txt");
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(target, "late").unwrap();
    });

    let summary = tokio::time::timeout(Duration::from_secs(10), watcher.run())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.releases, 1);
}

#[test]
fn test_run_blocking_honours_stop() {
    let ws = TestWorkspace::new();
    let engine = ws.engine(&ws.config(), 0);
    let mut watcher = ReleaseWatcher::new(engine, options(10, false));
    let handle = watcher.stop_handle();
    watcher = watcher.on_cycle(move |_| handle.stop());

    let summary = watcher.run_blocking().unwrap();
    assert_eq!(summary.cycles, 1);
    assert_eq!(summary.releases, 0);
}
