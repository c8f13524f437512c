//! Path canonicalization and snapshot key normalization

use crate::error::StorageError;
use crate::types::RelPath;
use std::path::{Component, Path, PathBuf};
use unicode_normalization::UnicodeNormalization;

/// Canonicalize the watch root.
///
/// Uses dunce so Windows roots come back without the `\\?\` prefix.
pub fn canonicalize_root(path: &Path) -> Result<PathBuf, StorageError> {
    dunce::canonicalize(path).map_err(|e| {
        StorageError::InvalidPath(format!(
            "Failed to canonicalize {}: {}",
            path.display(),
            e
        ))
    })
}

/// Build the snapshot key for `path` relative to `root`.
///
/// Keys use forward slashes and NFC Unicode so the same file produces the
/// same key on every platform. Returns `None` for paths outside the root or
/// for the root itself.
pub fn relative_key(root: &Path, path: &Path) -> Option<RelPath> {
    let rel = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_string_lossy().nfc().collect::<String>()),
            Component::CurDir => continue,
            _ => return None,
        }
    }
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Normalize a user-supplied relative path string (config values, ignore entries)
/// into the same shape as snapshot keys.
pub fn normalize_path_string(path: &str) -> String {
    let normalized: String = path.nfc().collect();
    let mut result = normalized.replace('\\', "/");
    while let Some(stripped) = result.strip_prefix("./") {
        result = stripped.to_string();
    }
    while result.len() > 1 && result.ends_with('/') {
        result.pop();
    }
    result
}

/// Final path segment of a key.
pub fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
