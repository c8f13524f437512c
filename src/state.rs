//! Persisted watch state
//!
//! The baseline snapshot and the pending change-set survive restarts, so a
//! restarted watcher neither loses pending work nor reports the whole tree
//! as new. File format: 4-byte little-endian format version, then the
//! bincode payload.
//!
//! The state also records which release it was written against. A flush
//! stages the state with `releasing` set before the release files are
//! renamed into place, so a restart can tell whether the staged pending set
//! already landed in the release log.

use crate::atomic::write_atomic;
use crate::changeset::ChangeSet;
use crate::error::StorageError;
use crate::release::Version;
use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const WATCH_STATE_VERSION_V2: u32 = 2;

/// File name inside the state directory.
pub const STATE_FILE: &str = "state.bin";

/// Baseline, pending changes, and the instant of the last observed change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchState {
    pub baseline: Snapshot,
    pub pending: ChangeSet,
    pub last_change: Option<DateTime<Utc>>,
    /// Release record version this state was written against
    pub version: Option<Version>,
    /// Version a flush of `pending` was about to commit
    pub releasing: Option<Version>,
}

impl WatchState {
    pub fn new(baseline: Snapshot) -> Self {
        Self {
            baseline,
            pending: ChangeSet::new(),
            last_change: None,
            version: None,
            releasing: None,
        }
    }

    /// Settle a staged flush against the release record's `current` version.
    ///
    /// If the record reached the staged version the pending set was released
    /// and is dropped; otherwise the flush never landed and it is kept.
    pub fn resolve(mut self, current: Version) -> Self {
        if let Some(target) = self.releasing.take() {
            if current >= target {
                self.pending.clear();
                self.last_change = None;
                self.version = Some(target);
            }
        }
        self
    }

    /// Persistence path for a state directory
    pub fn persistence_path(state_dir: &Path) -> PathBuf {
        state_dir.join(STATE_FILE)
    }

    /// Load state from disk. Returns `None` when no state was saved yet.
    pub fn load_from_disk<P: AsRef<Path>>(path: P) -> Result<Option<Self>, StorageError> {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io_at("read watch state from", path, e)),
        };

        if bytes.len() < 4 {
            return Err(StorageError::Serialization(format!(
                "Watch state file {} too short",
                path.display()
            )));
        }
        let version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if version != WATCH_STATE_VERSION_V2 {
            return Err(StorageError::Serialization(format!(
                "Unsupported watch state version: {}",
                version
            )));
        }
        let state: WatchState = bincode::deserialize(&bytes[4..])?;
        Ok(Some(state))
    }

    /// Save state to disk atomically.
    pub fn save_to_disk<P: AsRef<Path>>(&self, path: P) -> Result<(), StorageError> {
        let payload = bincode::serialize(self)?;
        let mut serialized = Vec::with_capacity(4 + payload.len());
        serialized.extend_from_slice(&WATCH_STATE_VERSION_V2.to_le_bytes());
        serialized.extend_from_slice(&payload);
        write_atomic(path.as_ref(), &serialized)
    }
}
