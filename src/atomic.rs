//! Temp-file-then-rename writes.
//!
//! Staging files live next to their target with the [`TEMP_SUFFIX`] suffix,
//! so the rename stays on one filesystem and the snapshotter ignores them.

use crate::error::StorageError;
use crate::ignore::TEMP_SUFFIX;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// `<path><TEMP_SUFFIX>`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Write and sync `bytes` to the staging file for `path` and return its location.
pub fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf, StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| StorageError::io_at("create directory", parent, e))?;
        }
    }
    let temp_path = temp_path_for(path);
    let written = File::create(&temp_path).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written {
        discard(&temp_path);
        return Err(StorageError::io_at("write", &temp_path, e));
    }
    Ok(temp_path)
}

/// Rename a staged file into place. The staging file is removed on failure.
pub fn commit(temp_path: &Path, path: &Path) -> Result<(), StorageError> {
    fs::rename(temp_path, path).map_err(|e| {
        let _ = fs::remove_file(temp_path);
        StorageError::io_at("rename into", path, e)
    })
}

/// Stage and commit in one step.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let temp_path = stage(path, bytes)?;
    commit(&temp_path, path)
}

/// Remove a staging file if it is still around.
pub fn discard(temp_path: &Path) {
    let _ = fs::remove_file(temp_path);
}
