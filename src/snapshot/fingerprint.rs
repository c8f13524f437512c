//! Fingerprint computation for snapshot entries

use crate::types::{Fingerprint, FingerprintMode, Hash};
use blake3::Hasher;
use std::fs::{File, Metadata};
use std::io::Read;
use std::path::Path;
use std::time::UNIX_EPOCH;

/// Compute the fingerprint of a regular file.
///
/// `Stamp` only needs the metadata already fetched by the walker; `Content`
/// streams the file through BLAKE3.
pub fn fingerprint_file(
    path: &Path,
    metadata: &Metadata,
    mode: FingerprintMode,
) -> std::io::Result<Fingerprint> {
    match mode {
        FingerprintMode::Stamp => Ok(stamp(metadata)),
        FingerprintMode::Content => {
            let hash = hash_file(path)?;
            Ok(Fingerprint::Content {
                hash: hex::encode(hash),
            })
        }
    }
}

fn stamp(metadata: &Metadata) -> Fingerprint {
    let mtime_ns = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0);
    Fingerprint::Stamp {
        mtime_ns,
        size: metadata.len(),
    }
}

/// Stream a file through BLAKE3.
pub fn hash_file(path: &Path) -> std::io::Result<Hash> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(*hasher.finalize().as_bytes())
}

/// Compute content hash for in-memory bytes
pub fn compute_content_hash(content: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(content);
    *hasher.finalize().as_bytes()
}
