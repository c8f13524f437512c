//! Version state store
//!
//! The version record and the release log are committed as one unit: both
//! are staged to temp files, the log is renamed into place first, then the
//! version record. If the second rename fails the previous log is restored,
//! so a reader never sees a log entry for a version the record does not
//! carry.

use crate::atomic::{self, commit, discard, stage};
use crate::changeset::ChangeSet;
use crate::error::{ReleaseError, StorageError};
use crate::release::entry::{EntryBuilder, ReleaseLogEntry};
use crate::release::lock::{self, LockPolicy, ReleaseLock};
use crate::release::manifest::{to_pretty_json, ManifestSet};
use crate::release::version::Version;
use crate::types::{RelPath, ReleaseSource};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Release file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseConfig {
    /// JSON object holding `version` and `buildDate`
    #[serde(default = "default_version_file")]
    pub version_file: PathBuf,

    /// Newest-first JSON array of release entries
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Globs of JSON manifests whose `version` key follows each release
    #[serde(default)]
    pub manifests: Vec<String>,

    #[serde(default = "default_status")]
    pub status: String,

    #[serde(default = "default_author")]
    pub author: String,

    #[serde(default = "default_lock_attempts")]
    pub lock_attempts: u32,

    #[serde(default = "default_lock_backoff_ms")]
    pub lock_backoff_ms: u64,
}

fn default_version_file() -> PathBuf {
    PathBuf::from("version.json")
}

fn default_log_file() -> PathBuf {
    PathBuf::from("release-log.json")
}

fn default_status() -> String {
    "Stable".to_string()
}

fn default_author() -> String {
    "Local".to_string()
}

fn default_lock_attempts() -> u32 {
    20
}

fn default_lock_backoff_ms() -> u64 {
    100
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            version_file: default_version_file(),
            log_file: default_log_file(),
            manifests: Vec::new(),
            status: default_status(),
            author: default_author(),
            lock_attempts: default_lock_attempts(),
            lock_backoff_ms: default_lock_backoff_ms(),
        }
    }
}

impl ReleaseConfig {
    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy {
            attempts: self.lock_attempts,
            backoff: std::time::Duration::from_millis(self.lock_backoff_ms),
        }
    }
}

/// What is on record before a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseRecord {
    /// Version in effect: the greater of the version record and the log head
    pub current: Version,
    /// Version of the newest log entry
    pub head: Option<Version>,
    pub entries: usize,
    pub build_date: Option<String>,
}

impl ReleaseRecord {
    pub fn empty() -> Self {
        Self {
            current: Version::ZERO,
            head: None,
            entries: 0,
            build_date: None,
        }
    }
}

/// Result of a persist call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Committed { manifests: Vec<RelPath> },
    /// The newest log entry already carries this version; nothing written
    Duplicate,
}

/// Result of a whole flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Released {
        version: Version,
        entry: ReleaseLogEntry,
        manifests: Vec<RelPath>,
    },
    Duplicate {
        version: Version,
    },
    /// Empty change-set; nothing advanced
    NothingToRelease,
}

/// Persistence of the version record and release log.
pub trait ReleaseStore: Send {
    /// Read the current record from the backing store.
    fn load(&self) -> Result<ReleaseRecord, StorageError>;

    /// Commit `next` and `entry` as one unit.
    fn persist(
        &mut self,
        next: &Version,
        entry: &ReleaseLogEntry,
        now: DateTime<Utc>,
    ) -> Result<PersistOutcome, ReleaseError>;

    /// Newest-first log entries, at most `limit`.
    fn log(&self, limit: Option<usize>) -> Result<Vec<ReleaseLogEntry>, StorageError>;

    /// Exclusive lock held for the duration of a flush.
    fn acquire_lock(&self) -> Result<Option<ReleaseLock>, StorageError> {
        Ok(None)
    }

    /// Advance the version for `changes` and record it.
    ///
    /// The record is re-read under the lock, so a concurrent writer's
    /// release is seen before the next version is chosen.
    fn flush(
        &mut self,
        changes: &ChangeSet,
        now: DateTime<Utc>,
        source: ReleaseSource,
        builder: &EntryBuilder,
    ) -> Result<FlushOutcome, ReleaseError> {
        if changes.is_empty() {
            return Ok(FlushOutcome::NothingToRelease);
        }
        let _lock = self.acquire_lock()?;
        let record = self.load()?;
        let next = record.current.advance();
        let entry = builder.build(&next, changes, now, source);
        match self.persist(&next, &entry, now)? {
            PersistOutcome::Committed { manifests } => Ok(FlushOutcome::Released {
                version: next,
                entry,
                manifests,
            }),
            PersistOutcome::Duplicate => Ok(FlushOutcome::Duplicate { version: next }),
        }
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io_at("read", path, e)),
    }
}

fn parse_version_object(path: &Path, bytes: Option<&[u8]>) -> Result<Map<String, Value>, StorageError> {
    let Some(bytes) = bytes else {
        return Ok(Map::new());
    };
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Object(map) => Ok(map),
        _ => Err(StorageError::Serialization(format!(
            "{} is not a JSON object",
            path.display()
        ))),
    }
}

fn parse_log(path: &Path, bytes: Option<&[u8]>) -> Result<Vec<Value>, StorageError> {
    let Some(bytes) = bytes else {
        return Ok(Vec::new());
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    match serde_json::from_slice::<Value>(bytes)? {
        Value::Array(entries) => Ok(entries),
        _ => Err(StorageError::Serialization(format!(
            "{} is not a JSON array",
            path.display()
        ))),
    }
}

fn value_version(value: &Value) -> Option<Version> {
    value
        .get("version")
        .and_then(Value::as_str)
        .map(Version::parse_lenient)
}

/// Rename two staged files into place, first then second. When the second
/// rename fails the first target is put back to `first_previous`.
pub(crate) fn commit_pair<F>(
    first: (&Path, &Path),
    first_previous: Option<&[u8]>,
    second: (&Path, &Path),
    rename: F,
) -> Result<(), ReleaseError>
where
    F: Fn(&Path, &Path) -> Result<(), StorageError>,
{
    let (first_temp, first_target) = first;
    let (second_temp, second_target) = second;

    if let Err(e) = rename(first_temp, first_target) {
        discard(second_temp);
        return Err(ReleaseError::PersistFailed(e.to_string()));
    }

    if let Err(e) = rename(second_temp, second_target) {
        discard(second_temp);
        let restored = match first_previous {
            Some(bytes) => atomic::write_atomic(first_target, bytes),
            None => fs::remove_file(first_target)
                .map_err(|err| StorageError::io_at("remove", first_target, err)),
        };
        if let Err(restore_err) = restored {
            warn!(
                path = %first_target.display(),
                error = %restore_err,
                "Failed to restore release log after aborted commit"
            );
        }
        return Err(ReleaseError::PersistFailed(e.to_string()));
    }

    Ok(())
}

/// File-backed store under one watch root.
#[derive(Debug, Clone)]
pub struct FileReleaseStore {
    state_dir: PathBuf,
    version_file: PathBuf,
    log_file: PathBuf,
    manifests: ManifestSet,
    lock_policy: LockPolicy,
}

impl FileReleaseStore {
    /// Relative file paths in `config` are resolved against `root`.
    pub fn new(root: &Path, state_dir: &Path, config: &ReleaseConfig, manifests: ManifestSet) -> Self {
        let resolve = |p: &Path| {
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                root.join(p)
            }
        };
        Self {
            state_dir: state_dir.to_path_buf(),
            version_file: resolve(&config.version_file),
            log_file: resolve(&config.log_file),
            manifests,
            lock_policy: config.lock_policy(),
        }
    }

    pub fn version_file(&self) -> &Path {
        &self.version_file
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }
}

impl ReleaseStore for FileReleaseStore {
    fn load(&self) -> Result<ReleaseRecord, StorageError> {
        let version_bytes = read_optional(&self.version_file)?;
        let record = parse_version_object(&self.version_file, version_bytes.as_deref())?;
        let log_bytes = read_optional(&self.log_file)?;
        let log = parse_log(&self.log_file, log_bytes.as_deref())?;

        let recorded = record
            .get("version")
            .and_then(Value::as_str)
            .map(Version::parse_lenient);
        let head = log.first().and_then(value_version);
        let current = recorded.into_iter().chain(head).max().unwrap_or(Version::ZERO);

        Ok(ReleaseRecord {
            current,
            head,
            entries: log.len(),
            build_date: record
                .get("buildDate")
                .and_then(Value::as_str)
                .map(str::to_string),
        })
    }

    fn persist(
        &mut self,
        next: &Version,
        entry: &ReleaseLogEntry,
        now: DateTime<Utc>,
    ) -> Result<PersistOutcome, ReleaseError> {
        let previous_log = read_optional(&self.log_file)?;
        let mut log = parse_log(&self.log_file, previous_log.as_deref())?;
        if log.first().and_then(value_version) == Some(*next) {
            info!(version = %next, "Version already released, skipping");
            return Ok(PersistOutcome::Duplicate);
        }

        let version_bytes = read_optional(&self.version_file)?;
        let mut record = parse_version_object(&self.version_file, version_bytes.as_deref())?;
        record.insert("version".to_string(), Value::String(next.to_string()));
        record.insert(
            "buildDate".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );

        let entry_value = serde_json::to_value(entry).map_err(StorageError::from)?;
        log.insert(0, entry_value);

        let log_temp = stage(&self.log_file, &to_pretty_json(&Value::Array(log))?)?;
        let version_temp = match stage(&self.version_file, &to_pretty_json(&Value::Object(record))?) {
            Ok(path) => path,
            Err(e) => {
                discard(&log_temp);
                return Err(ReleaseError::PersistFailed(e.to_string()));
            }
        };

        commit_pair(
            (&log_temp, &self.log_file),
            previous_log.as_deref(),
            (&version_temp, &self.version_file),
            commit,
        )?;
        debug!(version = %next, log = %self.log_file.display(), "Release committed");

        let manifests = self.manifests.update_all(next);
        Ok(PersistOutcome::Committed { manifests })
    }

    fn log(&self, limit: Option<usize>) -> Result<Vec<ReleaseLogEntry>, StorageError> {
        let bytes = read_optional(&self.log_file)?;
        let values = parse_log(&self.log_file, bytes.as_deref())?;
        Ok(values
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<ReleaseLogEntry>(v) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(error = %e, "Skipping unrecognized release log entry");
                    None
                }
            })
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    fn acquire_lock(&self) -> Result<Option<ReleaseLock>, StorageError> {
        lock::acquire(&self.state_dir, self.lock_policy).map(Some)
    }
}

/// In-process store; `fail_next` injects persistence failures.
#[derive(Debug, Clone, Default)]
pub struct InMemoryReleaseStore {
    version: Option<Version>,
    build_date: Option<String>,
    log: Vec<ReleaseLogEntry>,
    failures: usize,
}

impl InMemoryReleaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_version(version: Version) -> Self {
        Self {
            version: Some(version),
            ..Self::default()
        }
    }

    /// Make the next `count` persist calls fail.
    pub fn fail_next(&mut self, count: usize) {
        self.failures = count;
    }

    pub fn entries(&self) -> &[ReleaseLogEntry] {
        &self.log
    }

    /// Prepend an entry without touching the version record.
    pub fn push_log_entry(&mut self, entry: ReleaseLogEntry) {
        self.log.insert(0, entry);
    }
}

impl ReleaseStore for InMemoryReleaseStore {
    fn load(&self) -> Result<ReleaseRecord, StorageError> {
        let head = self.log.first().map(ReleaseLogEntry::parsed_version);
        let current = self.version.into_iter().chain(head).max().unwrap_or(Version::ZERO);
        Ok(ReleaseRecord {
            current,
            head,
            entries: self.log.len(),
            build_date: self.build_date.clone(),
        })
    }

    fn persist(
        &mut self,
        next: &Version,
        entry: &ReleaseLogEntry,
        now: DateTime<Utc>,
    ) -> Result<PersistOutcome, ReleaseError> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(ReleaseError::PersistFailed("injected failure".to_string()));
        }
        if self.log.first().map(ReleaseLogEntry::parsed_version) == Some(*next) {
            return Ok(PersistOutcome::Duplicate);
        }
        self.log.insert(0, entry.clone());
        self.version = Some(*next);
        self.build_date = Some(now.to_rfc3339_opts(SecondsFormat::Millis, true));
        Ok(PersistOutcome::Committed {
            manifests: Vec::new(),
        })
    }

    fn log(&self, limit: Option<usize>) -> Result<Vec<ReleaseLogEntry>, StorageError> {
        Ok(self
            .log
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}
