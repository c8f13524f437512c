//! Workspace initialization for `relwatch init`.
//!
//! Writes a starter `.relwatch/config.toml` (the built-in defaults, so every
//! key is visible and editable) and an empty `.relwatchignore`. Existing
//! files are skipped unless `force` is set.

use crate::atomic::write_atomic;
use crate::config::RelwatchConfig;
use crate::error::{ReleaseError, StorageError};
use std::path::{Path, PathBuf};
use tracing::info;

/// Workspace config file, relative to the root.
pub const WORKSPACE_CONFIG: &str = ".relwatch/config.toml";

/// Workspace ignore file, relative to the root.
pub const IGNORE_FILE: &str = ".relwatchignore";

const CONFIG_HEADER: &str = "\
# relwatch workspace configuration
#
# Values here override the global config file; RELWATCH__SECTION__KEY
# environment variables override both.

";

const IGNORE_TEMPLATE: &str = "\
# One entry per line. Entries ending in / prune directories, entries with /
# match root-relative paths, anything else matches file names.
";

/// What `init` wrote and what it left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitSummary {
    pub created: Vec<PathBuf>,
    pub overwritten: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
}

/// Default configuration rendered as TOML.
pub fn default_config_toml() -> Result<String, ReleaseError> {
    let body = toml::to_string_pretty(&RelwatchConfig::default())
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(format!("{}{}", CONFIG_HEADER, body))
}

pub fn initialize(root: &Path, force: bool) -> Result<InitSummary, ReleaseError> {
    if !root.is_dir() {
        return Err(ReleaseError::RootMissing(root.to_path_buf()));
    }

    let mut summary = InitSummary::default();
    let files = [
        (root.join(WORKSPACE_CONFIG), default_config_toml()?),
        (root.join(IGNORE_FILE), IGNORE_TEMPLATE.to_string()),
    ];

    for (path, contents) in files {
        let existed = path.exists();
        if existed && !force {
            summary.skipped.push(path);
            continue;
        }
        write_atomic(&path, contents.as_bytes())?;
        info!(path = %path.display(), "Wrote workspace file");
        if existed {
            summary.overwritten.push(path);
        } else {
            summary.created.push(path);
        }
    }

    Ok(summary)
}
