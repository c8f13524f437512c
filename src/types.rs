//! Shared value types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 digest
pub type Hash = [u8; 32];

/// Root-relative path key: forward slashes, NFC-normalized, no leading `./`
pub type RelPath = String;

/// Cheap comparable value used to detect that a file changed between snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Fingerprint {
    /// Modification time in nanoseconds since the Unix epoch, plus byte size
    Stamp { mtime_ns: u64, size: u64 },
    /// Hex-encoded BLAKE3 digest of the file content
    Content { hash: String },
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fingerprint::Stamp { mtime_ns, size } => write!(f, "stamp:{}:{}", mtime_ns, size),
            Fingerprint::Content { hash } => {
                write!(f, "blake3:{}", &hash[..hash.len().min(12)])
            }
        }
    }
}

/// How fingerprints are computed during a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FingerprintMode {
    /// Metadata only (mtime with nanosecond precision + size)
    #[default]
    Stamp,
    /// Full content hash (exact, reads every file)
    Content,
}

/// Which trigger produced a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseSource {
    Watcher,
    Oneshot,
}

impl ReleaseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseSource::Watcher => "watcher",
            ReleaseSource::Oneshot => "oneshot",
        }
    }
}

impl fmt::Display for ReleaseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
