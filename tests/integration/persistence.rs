//! Watch state and release record persistence across failures and restarts.

use super::test_utils::{at, TestWorkspace};
use relwatch::engine::{CycleOutcome, ReleaseEngine};
use relwatch::error::{ReleaseError, StorageError};
use relwatch::freeze::FreezeGate;
use relwatch::ignore::{ArtifactSet, IgnoreSet};
use relwatch::release::lock;
use relwatch::release::{EntryBuilder, InMemoryReleaseStore, ReleaseStore, Version};
use relwatch::snapshot::Walker;
use relwatch::state::WatchState;
use std::fs;
use std::time::Duration;

#[test]
fn test_pending_changes_survive_restart() {
    let ws = TestWorkspace::new();
    ws.seed_version("1.0.0");
    let config = ws.config();

    {
        let mut engine = ws.engine(&config, 5);
        ws.write("src/a.ts", "a");
        assert!(matches!(
            engine.step(at(0)).unwrap(),
            CycleOutcome::Accumulating { .. }
        ));
    }

    let mut resumed = ws.engine(&config, 5);
    assert_eq!(resumed.pending().len(), 1);
    let outcome = resumed.step(at(5)).unwrap();
    assert_eq!(outcome.to_string(), "released: version 1.0.1");
}

#[test]
fn test_changes_while_stopped_are_seen_on_restart() {
    let ws = TestWorkspace::new();
    let config = ws.config();

    {
        let mut engine = ws.engine(&config, 0);
        assert_eq!(engine.step(at(0)).unwrap(), CycleOutcome::NoChanges);
    }

    ws.write("offline.txt", "edited while stopped");
    let mut engine = ws.engine(&config, 0);
    assert!(engine.step(at(10)).unwrap().is_release());
    assert_eq!(ws.log()[0]["_files"][0], "added: offline.txt");
}

#[test]
fn test_corrupt_watch_state_rebuilds_baseline() {
    let ws = TestWorkspace::new();
    ws.write("a.txt", "a");
    let config = ws.config();
    ws.write(".relwatch/state.bin", "garbage");

    let mut engine = ws.engine(&config, 0);
    assert!(engine.pending().is_empty());
    assert_eq!(engine.step(at(0)).unwrap(), CycleOutcome::NoChanges);

    let saved = WatchState::load_from_disk(ws.path(".relwatch/state.bin"))
        .unwrap()
        .unwrap();
    assert!(saved.baseline.contains_key("a.txt"));
}

#[test]
fn test_failed_write_keeps_pending_and_recovers() {
    let ws = TestWorkspace::new();
    let config = ws.config();
    let mut engine = ws.engine(&config, 0);

    // A directory where the version record belongs makes every write fail.
    fs::create_dir(ws.path("version.json")).unwrap();
    ws.write("a.txt", "a");
    let err = engine.step(at(0)).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(engine.pending().len(), 1);
    assert!(!ws.path("release-log.json").exists());

    fs::remove_dir(ws.path("version.json")).unwrap();
    let outcome = engine.step(at(1)).unwrap();
    assert_eq!(outcome.to_string(), "released: version 0.0.1");
    assert_eq!(ws.log().len(), 1);
}

#[test]
fn test_injected_persist_failures_retry_until_success() {
    let ws = TestWorkspace::new();
    let mut store = InMemoryReleaseStore::with_version(Version::new(3, 1, 4));
    store.fail_next(2);
    let artifacts = ArtifactSet::new(&[".relwatch".to_string()], &[], &[]).unwrap();
    let walker = Walker::new(
        ws.root().to_path_buf(),
        IgnoreSet::with_defaults(artifacts).unwrap(),
    );
    let mut engine = ReleaseEngine::new(
        walker,
        FreezeGate::open(),
        Box::new(store),
        EntryBuilder::default(),
        Duration::ZERO,
    );
    engine.capture_baseline().unwrap();

    ws.write("a.txt", "a");
    assert!(matches!(
        engine.step(at(0)),
        Err(ReleaseError::PersistFailed(_))
    ));
    assert!(engine.step(at(1)).is_err());
    assert_eq!(engine.pending().len(), 1);

    let outcome = engine.step(at(2)).unwrap();
    assert_eq!(outcome.to_string(), "released: version 3.1.5");
    assert_eq!(engine.store().log(None).unwrap().len(), 1);
}

#[test]
fn test_held_lock_blocks_release_without_losing_changes() {
    let ws = TestWorkspace::new();
    let mut config = ws.config();
    config.release.lock_attempts = 2;
    config.release.lock_backoff_ms = 1;
    let mut engine = ws.engine(&config, 0);

    let held = lock::try_acquire(&ws.path(".relwatch")).unwrap();
    ws.write("a.txt", "a");
    let err = engine.step(at(0)).unwrap_err();
    assert!(matches!(
        err,
        ReleaseError::StorageError(StorageError::LockBusy(_))
    ));
    assert_eq!(engine.pending().len(), 1);

    drop(held);
    assert!(engine.step(at(1)).unwrap().is_release());
}

#[test]
fn test_log_head_ahead_of_version_record() {
    let ws = TestWorkspace::new();
    ws.seed_version("1.0.0");
    ws.write(
        "release-log.json",
        r#"[{"version": "1.0.5", "date": "2024-05-01", "custom": "kept"}]"#,
    );
    let mut engine = ws.engine(&ws.config(), 0);
    assert_eq!(engine.current_version().unwrap(), Version::new(1, 0, 5));

    ws.write("a.txt", "a");
    assert_eq!(
        engine.step(at(0)).unwrap().to_string(),
        "released: version 1.0.6"
    );
    let log = ws.log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1]["custom"], "kept");
    assert_eq!(ws.version(), "1.0.6");
    assert!(ws.read_json("version.json")["buildDate"].is_string());
}
