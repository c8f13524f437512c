//! Release engine
//!
//! One [`ReleaseEngine`] owns everything a watch cycle needs: the baseline
//! snapshot, the debounce aggregator, the freeze gate, the release store
//! and the entry builder. It holds no global state and takes the current
//! instant as an argument, so a cycle can be driven with simulated time.
//!
//! A cycle is: refresh the freeze calendar, snapshot the tree, diff against
//! the baseline, fold the diff into the aggregator, and flush when the
//! aggregator reports the tree quiet and the gate is open. The cycle's
//! snapshot always becomes the new baseline, including when the flush fails,
//! because the failed changes are still held in the pending set.
//!
//! A watcher and one-shot runs may share a root. Every state write and every
//! flush happens under the release lock, and before either the engine
//! compares the release record with the version its own view was built on.
//! If another process released in between, the engine adopts that
//! process's saved baseline and pending set and re-diffs its own snapshot
//! against it, so changes already released are not released again.

use crate::aggregator::{Aggregator, AggregatorState, Poll};
use crate::changeset::{ChangeCounts, ChangeSet};
use crate::clock::Clock;
use crate::config::RelwatchConfig;
use crate::error::ReleaseError;
use crate::freeze::{FreezeGate, FreezeInterval, GateDecision};
use crate::ignore::ArtifactSet;
use crate::release::manifest::ManifestSet;
use crate::release::{
    EntryBuilder, FileReleaseStore, PersistOutcome, ReleaseRecord, ReleaseStore, Version,
};
use crate::snapshot::path::canonicalize_root;
use crate::snapshot::{diff, Snapshot, Walker, WalkerConfig};
use crate::state::WatchState;
use crate::types::{RelPath, ReleaseSource};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Report of one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    NoChanges,
    Accumulating {
        remaining_secs: u64,
        counts: ChangeCounts,
    },
    Deferred {
        until: DateTime<Utc>,
        counts: ChangeCounts,
    },
    Released {
        version: String,
        counts: ChangeCounts,
        manifests: Vec<RelPath>,
    },
    Duplicate {
        version: String,
    },
}

impl CycleOutcome {
    pub fn is_release(&self) -> bool {
        matches!(self, CycleOutcome::Released { .. })
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

fn accumulating(remaining: Duration, counts: ChangeCounts) -> CycleOutcome {
    CycleOutcome::Accumulating {
        remaining_secs: ceil_secs(remaining),
        counts,
    }
}

impl fmt::Display for CycleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleOutcome::NoChanges => f.write_str("no changes"),
            CycleOutcome::Accumulating { remaining_secs, .. } => {
                write!(f, "accumulating changes ({}s until quiet)", remaining_secs)
            }
            CycleOutcome::Deferred { .. } => f.write_str("deferred: in freeze window"),
            CycleOutcome::Released { version, .. } => write!(f, "released: version {}", version),
            CycleOutcome::Duplicate { version } => {
                write!(f, "already released: version {}", version)
            }
        }
    }
}

/// Read-only view for `status`.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub root: PathBuf,
    pub version: String,
    pub log_entries: usize,
    pub build_date: Option<String>,
    pub state: &'static str,
    pub pending: ChangeCounts,
    pub pending_paths: Vec<String>,
    pub unobserved: ChangeCounts,
    pub last_change: Option<DateTime<Utc>>,
    pub frozen_until: Option<DateTime<Utc>>,
    pub override_active: bool,
    pub windows: Vec<FreezeInterval>,
    pub tracked_files: usize,
}

pub struct ReleaseEngine {
    root: PathBuf,
    walker: Walker,
    artifacts: ArtifactSet,
    baseline: Snapshot,
    aggregator: Aggregator,
    gate: FreezeGate,
    store: Box<dyn ReleaseStore>,
    builder: EntryBuilder,
    source: ReleaseSource,
    state_path: Option<PathBuf>,
    /// Release record version the baseline and pending set were built on
    known_version: Option<Version>,
    dirty: bool,
}

impl ReleaseEngine {
    /// Assemble an engine from parts. The baseline is empty until
    /// [`ReleaseEngine::with_baseline`] or [`ReleaseEngine::capture_baseline`].
    pub fn new(
        walker: Walker,
        gate: FreezeGate,
        store: Box<dyn ReleaseStore>,
        builder: EntryBuilder,
        cooldown: Duration,
    ) -> Self {
        let artifacts = walker.ignore().artifacts().clone();
        Self {
            root: walker.root().to_path_buf(),
            walker,
            artifacts,
            baseline: Snapshot::new(),
            aggregator: Aggregator::new(cooldown),
            gate,
            store,
            builder,
            source: ReleaseSource::Watcher,
            state_path: None,
            known_version: None,
            dirty: false,
        }
    }

    pub fn with_baseline(mut self, baseline: Snapshot) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn with_source(mut self, source: ReleaseSource) -> Self {
        self.source = source;
        self
    }

    /// Persist the watch state to `path` after each cycle that changes it.
    pub fn with_state_file(mut self, path: PathBuf) -> Self {
        self.state_path = Some(path);
        self
    }

    /// Resume pending changes from a saved state.
    pub fn with_state(mut self, state: WatchState) -> Self {
        let cooldown = self.aggregator.cooldown();
        self.baseline = state.baseline;
        self.aggregator = Aggregator::restore(cooldown, state.pending, state.last_change);
        self.known_version = state.version;
        self
    }

    /// Take the current tree as the baseline without reporting it.
    pub fn capture_baseline(&mut self) -> Result<usize, ReleaseError> {
        self.baseline = self.walker.snapshot()?;
        self.dirty = true;
        Ok(self.baseline.len())
    }

    /// Build the file-backed engine for `root` from configuration.
    ///
    /// Saved watch state is resumed; without one the current tree becomes
    /// the baseline, so existing files are not reported as added.
    pub fn open(
        root: &Path,
        config: &RelwatchConfig,
        source: ReleaseSource,
        cooldown: Duration,
    ) -> Result<Self, ReleaseError> {
        if !root.is_dir() {
            return Err(ReleaseError::RootMissing(root.to_path_buf()));
        }
        let root = canonicalize_root(root)?;
        let state_dir = config.state_dir(&root);

        let walker = Walker::with_config(
            root.clone(),
            config.ignore_set(&root)?,
            WalkerConfig {
                follow_symlinks: config.watch.follow_symlinks,
                max_depth: None,
                fingerprint: config.watch.fingerprint,
            },
        );
        let gate = FreezeGate::load(&root, &config.freeze)?;
        let manifests = ManifestSet::new(&root, &config.release.manifests, &config.ignore.dirs)?;
        let store = FileReleaseStore::new(&root, &state_dir, &config.release, manifests);
        let builder = EntryBuilder::new(
            Arc::new(config.classifier()),
            Arc::new(crate::release::CountsDescriber),
            config.entry_template(),
        );

        let state_path = WatchState::persistence_path(&state_dir);
        let mut engine = Self::new(walker, gate, Box::new(store), builder, cooldown)
            .with_source(source)
            .with_state_file(state_path.clone());

        let current = match engine.store.load() {
            Ok(record) => Some(record.current),
            Err(e) => {
                warn!(error = %e, "Release record unreadable");
                None
            }
        };

        match WatchState::load_from_disk(&state_path) {
            Ok(Some(state)) => {
                let staged = state.releasing;
                let state = match current {
                    Some(current) => state.resolve(current),
                    None => state,
                };
                debug!(
                    files = state.baseline.len(),
                    pending = state.pending.len(),
                    staged = ?staged,
                    "Resumed watch state"
                );
                engine = engine.with_state(state);
                if staged.is_some() {
                    engine.dirty = true;
                }
            }
            Ok(None) => {
                let files = engine.capture_baseline()?;
                engine.known_version = current;
                info!(files, "Recorded initial snapshot");
            }
            Err(e) => {
                warn!(error = %e, path = %state_path.display(), "Watch state unreadable, recording a new baseline");
                engine.capture_baseline()?;
                engine.known_version = current;
            }
        }

        Ok(engine)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Paths written by releases, never reported as changes.
    pub fn artifacts(&self) -> &ArtifactSet {
        &self.artifacts
    }

    pub fn pending(&self) -> &ChangeSet {
        self.aggregator.pending()
    }

    pub fn aggregator_state(&self) -> AggregatorState {
        self.aggregator.state()
    }

    pub fn baseline(&self) -> &Snapshot {
        &self.baseline
    }

    pub fn store(&self) -> &dyn ReleaseStore {
        self.store.as_ref()
    }

    pub fn gate(&self) -> &FreezeGate {
        &self.gate
    }

    pub fn current_version(&self) -> Result<Version, ReleaseError> {
        Ok(self.store.load()?.current)
    }

    /// Run one cycle at `now`.
    pub fn step(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome, ReleaseError> {
        self.gate.refresh();
        let current = self.walker.snapshot()?;
        let changes = diff(&self.baseline, &current, &self.artifacts);
        if !changes.is_empty() {
            let counts = changes.counts();
            debug!(
                added = counts.added,
                modified = counts.modified,
                removed = counts.removed,
                "Changes observed"
            );
            self.dirty = true;
        }
        self.baseline = current;

        let result = match self.aggregator.observe(&changes, now) {
            Poll::Idle => Ok(CycleOutcome::NoChanges),
            Poll::Waiting { remaining, counts } => Ok(accumulating(remaining, counts)),
            Poll::Ready => {
                self.dirty = true;
                self.flush(now)
            }
        };

        self.save_state();
        result
    }

    /// Run one cycle reading the time from `clock`.
    pub fn tick(&mut self, clock: &dyn Clock) -> Result<CycleOutcome, ReleaseError> {
        self.step(clock.now())
    }

    fn flush(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome, ReleaseError> {
        let counts = self.aggregator.pending().counts();

        if let GateDecision::Frozen { until } = self.gate.check(now) {
            self.aggregator.defer();
            info!(
                until = %until,
                added = counts.added,
                modified = counts.modified,
                removed = counts.removed,
                "In freeze window, release deferred"
            );
            return Ok(CycleOutcome::Deferred { until, counts });
        }

        let _lock = self.store.acquire_lock().map_err(|e| self.keep_pending(e.into()))?;
        let record = self.store.load().map_err(|e| self.keep_pending(e.into()))?;

        if self.reconcile(&record) {
            match self.aggregator.observe(&ChangeSet::new(), now) {
                Poll::Idle => {
                    info!(version = %record.current, "Pending changes already released");
                    self.save_state_locked();
                    return Ok(CycleOutcome::Duplicate {
                        version: record.current.to_string(),
                    });
                }
                Poll::Waiting { remaining, counts } => {
                    self.save_state_locked();
                    return Ok(accumulating(remaining, counts));
                }
                Poll::Ready => {}
            }
        }

        let pending = self.aggregator.pending().clone();
        let counts = pending.counts();
        let next = record.current.advance();
        let entry = self.builder.build(&next, &pending, now, self.source);

        // Staged before the release files are renamed; settled on load by
        // `WatchState::resolve`.
        if let Some(path) = &self.state_path {
            let mut staged = self.watch_state();
            staged.version = Some(record.current);
            staged.releasing = Some(next);
            if let Err(e) = staged.save_to_disk(path) {
                return Err(self.keep_pending(e.into()));
            }
        }

        match self.store.persist(&next, &entry, now) {
            Ok(PersistOutcome::Committed { manifests }) => {
                self.aggregator.complete();
                self.known_version = Some(next);
                self.save_state_locked();
                info!(
                    version = %next,
                    added = counts.added,
                    modified = counts.modified,
                    removed = counts.removed,
                    source = %self.source,
                    "Release recorded"
                );
                Ok(CycleOutcome::Released {
                    version: next.to_string(),
                    counts,
                    manifests,
                })
            }
            Ok(PersistOutcome::Duplicate) => {
                self.aggregator.complete();
                self.known_version = Some(next);
                self.save_state_locked();
                Ok(CycleOutcome::Duplicate {
                    version: next.to_string(),
                })
            }
            Err(e) => {
                let e = self.keep_pending(e);
                self.save_state_locked();
                Err(e)
            }
        }
    }

    /// Flush did not happen: keep the pending set for the next cycle.
    fn keep_pending(&mut self, e: ReleaseError) -> ReleaseError {
        self.aggregator.defer();
        self.dirty = true;
        warn!(
            error = %e,
            pending = self.aggregator.pending().len(),
            "Release failed, changes kept for retry"
        );
        e
    }

    /// Adopt a release another process recorded since this engine's view
    /// was built. Returns true when the pending set was rebuilt from the
    /// saved state. Call with the release lock held.
    fn reconcile(&mut self, record: &ReleaseRecord) -> bool {
        let known = match self.known_version {
            Some(known) if known == record.current => return false,
            Some(known) => known,
            None => {
                self.known_version = Some(record.current);
                return false;
            }
        };
        self.known_version = Some(record.current);
        self.dirty = true;

        let saved = self.state_path.as_ref().and_then(|path| {
            WatchState::load_from_disk(path)
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Watch state unreadable during reconcile");
                    None
                })
                .map(|state| state.resolve(record.current))
        });

        match saved {
            Some(state) if state.version == Some(record.current) => {
                let mut pending = state.pending;
                pending.merge(&diff(&state.baseline, &self.baseline, &self.artifacts));
                let last_change = if pending.is_empty() {
                    None
                } else {
                    state.last_change.max(self.aggregator.last_change())
                };
                info!(
                    from = %known,
                    to = %record.current,
                    pending = pending.len(),
                    "Adopted release recorded by another process"
                );
                self.aggregator = Aggregator::restore(self.aggregator.cooldown(), pending, last_change);
                true
            }
            _ => {
                warn!(
                    from = %known,
                    to = %record.current,
                    "Release record moved without a matching watch state, keeping pending changes"
                );
                false
            }
        }
    }

    fn watch_state(&self) -> WatchState {
        WatchState {
            baseline: self.baseline.clone(),
            pending: self.aggregator.pending().clone(),
            last_change: self.aggregator.last_change(),
            version: self.known_version,
            releasing: None,
        }
    }

    /// Save under the release lock, adopting other processes' releases first.
    fn save_state(&mut self) {
        if !self.dirty {
            return;
        }
        if self.state_path.is_none() {
            self.dirty = false;
            return;
        }
        let _lock = match self.store.acquire_lock() {
            Ok(lock) => lock,
            Err(e) => {
                warn!(error = %e, "Watch state not saved, retrying next cycle");
                return;
            }
        };
        if let Ok(record) = self.store.load() {
            self.reconcile(&record);
        }
        self.save_state_locked();
    }

    /// Write the state file. The caller holds the release lock.
    fn save_state_locked(&mut self) {
        let Some(path) = &self.state_path else {
            self.dirty = false;
            return;
        };
        match self.watch_state().save_to_disk(path) {
            Ok(()) => self.dirty = false,
            Err(e) => error!(error = %e, path = %path.display(), "Failed to save watch state"),
        }
    }

    /// Current record, pending set, gate, and changes not yet observed.
    pub fn status(&self, now: DateTime<Utc>) -> Result<EngineStatus, ReleaseError> {
        let record = match self.store.load() {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Release record unreadable");
                ReleaseRecord::empty()
            }
        };
        let current = self.walker.snapshot()?;
        let unobserved = diff(&self.baseline, &current, &self.artifacts).counts();
        let frozen_until = match self.gate.check(now) {
            GateDecision::Frozen { until } => Some(until),
            _ => None,
        };
        let state = match self.aggregator.state() {
            AggregatorState::Idle => "idle",
            AggregatorState::Accumulating => "accumulating",
            AggregatorState::Flushing => "flushing",
        };
        Ok(EngineStatus {
            root: self.root.clone(),
            version: record.current.to_string(),
            log_entries: record.entries,
            build_date: record.build_date,
            state,
            pending: self.aggregator.pending().counts(),
            pending_paths: self
                .aggregator
                .pending()
                .iter()
                .map(|(path, kind)| format!("{}: {}", kind.as_str(), path))
                .collect(),
            unobserved,
            last_change: self.aggregator.last_change(),
            frozen_until,
            override_active: self.gate.override_active(),
            windows: self.gate.windows(),
            tracked_files: current.len(),
        })
    }
}
