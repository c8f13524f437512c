//! Three-part version numbers and the patch advance.

use serde::{Deserialize, Serialize};
use std::fmt;

/// `major.minor.patch`. Ordering is numeric, field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub const ZERO: Version = Version::new(0, 0, 0);

    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Lenient parse: components that are missing or not plain digits read
    /// as `0`; anything past the third component is dropped.
    pub fn parse_lenient(raw: &str) -> Self {
        let mut parts = raw
            .trim()
            .split('.')
            .map(|part| {
                if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
                    part.parse::<u64>().unwrap_or(0)
                } else {
                    0
                }
            });
        Self {
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
        }
    }

    /// Next patch release.
    pub fn advance(&self) -> Self {
        Self {
            patch: self.patch.saturating_add(1),
            ..*self
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
