//! Freeze calendar files and the override switch.

use super::test_utils::{at, TestWorkspace};
use relwatch::engine::{CycleOutcome, ReleaseEngine};
use relwatch::error::ReleaseError;
use relwatch::types::ReleaseSource;
use std::fs;
use std::time::Duration;

const CALENDAR: &str = "\
freezes:
  - start: 2024-06-01T00:00:00Z
    end: 2024-06-01T18:00:00Z
    reason: launch
  - start: not-a-date
    end: 2024-07-01T00:00:00Z
  - start: 2024-12-20T00:00:00Z
";

#[test]
fn test_calendar_windows_defer_release() {
    let ws = TestWorkspace::new();
    ws.write("release-calendar.yml", CALENDAR);
    let mut engine = ws.engine(&ws.config(), 0);

    let windows = engine.gate().windows();
    assert_eq!(windows.len(), 1);

    ws.write("a.txt", "a");
    assert!(matches!(
        engine.step(at(0)).unwrap(),
        CycleOutcome::Deferred { .. }
    ));
    assert_eq!(engine.pending().len(), 1);
}

#[test]
fn test_calendar_edits_apply_without_restart() {
    let ws = TestWorkspace::new();
    let mut config = ws.config();
    config.freeze.calendar = Some(".relwatch/calendar.yml".into());
    let mut engine = ws.engine(&config, 5);

    ws.write("a.txt", "a");
    engine.step(at(0)).unwrap();
    ws.write(".relwatch/calendar.yml", CALENDAR);
    assert!(matches!(
        engine.step(at(10)).unwrap(),
        CycleOutcome::Deferred { .. }
    ));

    fs::remove_file(ws.path(".relwatch/calendar.yml")).unwrap();
    assert!(engine.step(at(20)).unwrap().is_release());
}

#[test]
fn test_unreadable_calendar_fails_at_start() {
    let ws = TestWorkspace::new();
    fs::create_dir(ws.path("release-calendar.yml")).unwrap();
    let result = ReleaseEngine::open(
        ws.root(),
        &ws.config(),
        ReleaseSource::Watcher,
        Duration::from_secs(5),
    );
    assert!(matches!(
        result,
        Err(ReleaseError::FreezeSourceUnreadable { .. })
    ));
}

#[test]
fn test_environment_override() {
    let ws = TestWorkspace::new();
    ws.write("release-calendar.yml", CALENDAR);
    let mut config = ws.config();
    config.freeze.override_env = "RELWATCH_IT_RELEASE_EXCEPTION".to_string();
    let mut engine = ws.engine(&config, 0);

    ws.write("a.txt", "a");
    assert!(matches!(
        engine.step(at(0)).unwrap(),
        CycleOutcome::Deferred { .. }
    ));

    std::env::set_var("RELWATCH_IT_RELEASE_EXCEPTION", "true");
    let outcome = engine.step(at(1));
    std::env::remove_var("RELWATCH_IT_RELEASE_EXCEPTION");
    assert!(outcome.unwrap().is_release());
}
