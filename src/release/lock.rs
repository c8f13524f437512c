//! Advisory release lock.
//!
//! One flush at a time per watch root: a running watcher and a one-shot run
//! take the same exclusive lock on `<state_dir>/release.lock`. The lock is
//! released on drop.

use crate::error::StorageError;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::debug;

pub const LOCK_FILE: &str = "release.lock";

/// Bounded retry policy for lock acquisition.
#[derive(Debug, Clone, Copy)]
pub struct LockPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            backoff: Duration::from_millis(100),
        }
    }
}

pub struct ReleaseLock {
    file: File,
    path: PathBuf,
}

impl ReleaseLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ReleaseLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_lock_file(state_dir: &Path) -> Result<(File, PathBuf), StorageError> {
    fs::create_dir_all(state_dir)
        .map_err(|e| StorageError::io_at("create state directory", state_dir, e))?;
    let path = state_dir.join(LOCK_FILE);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(|e| StorageError::io_at("open lock file", &path, e))?;
    Ok((file, path))
}

/// Try once; `LockBusy` if another holder has it.
pub fn try_acquire(state_dir: &Path) -> Result<ReleaseLock, StorageError> {
    let (file, path) = open_lock_file(state_dir)?;
    match FileExt::try_lock_exclusive(&file) {
        Ok(()) => Ok(ReleaseLock { file, path }),
        Err(_) => Err(StorageError::LockBusy(path)),
    }
}

/// Retry until acquired or the policy is exhausted.
pub fn acquire(state_dir: &Path, policy: LockPolicy) -> Result<ReleaseLock, StorageError> {
    let attempts = policy.attempts.max(1);
    let mut last = None;
    for attempt in 1..=attempts {
        match try_acquire(state_dir) {
            Ok(lock) => return Ok(lock),
            Err(StorageError::LockBusy(path)) => {
                debug!(attempt, path = %path.display(), "Release lock busy");
                last = Some(path);
                if attempt < attempts {
                    thread::sleep(policy.backoff);
                }
            }
            Err(e) => return Err(e),
        }
    }
    Err(StorageError::LockBusy(
        last.unwrap_or_else(|| state_dir.join(LOCK_FILE)),
    ))
}
