//! Freeze windows: declared blackout periods during which no release fires.
//!
//! Windows come from a calendar file (`start:` / `end:` lines, each `start`
//! paired with the next `end`) and from inline configuration. Entries that
//! fail to parse are skipped one by one; they never disable the others.

use crate::error::ReleaseError;
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Closed interval `[start, end]` of UTC instants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FreezeInterval {
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }
}

/// Inline window in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreezeWindowConfig {
    pub start: String,
    pub end: String,
}

/// Freeze gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreezeConfig {
    /// Calendar file, relative to the watch root unless absolute
    #[serde(default = "default_calendar")]
    pub calendar: Option<PathBuf>,

    #[serde(default)]
    pub windows: Vec<FreezeWindowConfig>,

    /// Release even inside a freeze window
    #[serde(default)]
    pub override_release: bool,

    /// Environment variable that grants the override when set to 1/true/yes
    #[serde(default = "default_override_env")]
    pub override_env: String,
}

fn default_calendar() -> Option<PathBuf> {
    Some(PathBuf::from("release-calendar.yml"))
}

fn default_override_env() -> String {
    "RELEASE_EXCEPTION".to_string()
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            calendar: default_calendar(),
            windows: Vec::new(),
            override_release: false,
            override_env: default_override_env(),
        }
    }
}

/// True when `now` falls inside any interval (both bounds inclusive).
pub fn in_freeze(now: DateTime<Utc>, intervals: &[FreezeInterval]) -> bool {
    intervals.iter().any(|i| i.contains(now))
}

/// Parse an RFC 3339 timestamp, or a naive `YYYY-MM-DDTHH:MM:SS[.fff]`
/// (optionally `Z`-suffixed) taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|n| n.and_utc())
}

fn interval(start: &str, end: &str) -> Option<FreezeInterval> {
    let start_at = parse_timestamp(start)?;
    let end_at = parse_timestamp(end)?;
    if start_at > end_at {
        return None;
    }
    Some(FreezeInterval {
        start: start_at,
        end: end_at,
    })
}

fn calendar_line() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r#"^\s*(?:-\s*)?(start|end)\s*:\s*["']?([^"'#\s]+)["']?"#)
            .expect("freeze calendar line regex")
    })
}

/// Extract intervals from calendar text.
pub fn parse_calendar(text: &str) -> Vec<FreezeInterval> {
    let mut intervals = Vec::new();
    let mut pending_start: Option<String> = None;

    for (lineno, line) in text.lines().enumerate() {
        let Some(caps) = calendar_line().captures(line) else {
            continue;
        };
        let value = caps[2].to_string();
        if &caps[1] == "start" {
            if let Some(orphan) = pending_start.replace(value) {
                debug!(line = lineno + 1, start = %orphan, "Freeze start without end, skipping");
            }
            continue;
        }
        let Some(start) = pending_start.take() else {
            debug!(line = lineno + 1, end = %value, "Freeze end without start, skipping");
            continue;
        };
        match interval(&start, &value) {
            Some(i) => intervals.push(i),
            None => warn!(line = lineno + 1, start = %start, end = %value, "Malformed freeze window, skipping"),
        }
    }

    intervals
}

/// Outcome of consulting the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Open,
    Frozen { until: DateTime<Utc> },
    /// Inside a window, but the override allowed the release
    Overridden,
}

impl GateDecision {
    pub fn allows_release(&self) -> bool {
        !matches!(self, GateDecision::Frozen { .. })
    }
}

/// Freeze gate for one watch root.
#[derive(Debug, Clone)]
pub struct FreezeGate {
    calendar: Option<PathBuf>,
    inline: Vec<FreezeInterval>,
    calendar_windows: Vec<FreezeInterval>,
    override_release: bool,
    override_env: Option<String>,
}

fn read_calendar(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl FreezeGate {
    /// Gate with fixed windows and no calendar or override.
    pub fn from_intervals(intervals: Vec<FreezeInterval>) -> Self {
        Self {
            calendar: None,
            inline: intervals,
            calendar_windows: Vec::new(),
            override_release: false,
            override_env: None,
        }
    }

    pub fn open() -> Self {
        Self::from_intervals(Vec::new())
    }

    /// Build the gate for `root`. A calendar that exists but cannot be read
    /// is fatal here; later refreshes keep the last good windows instead.
    pub fn load(root: &Path, config: &FreezeConfig) -> Result<Self, ReleaseError> {
        let inline = config
            .windows
            .iter()
            .filter_map(|w| {
                let parsed = interval(&w.start, &w.end);
                if parsed.is_none() {
                    warn!(start = %w.start, end = %w.end, "Malformed inline freeze window, skipping");
                }
                parsed
            })
            .collect();

        let calendar = config.calendar.as_ref().map(|c| {
            if c.is_absolute() {
                c.clone()
            } else {
                root.join(c)
            }
        });

        let calendar_windows = match &calendar {
            Some(path) => match read_calendar(path) {
                Ok(Some(text)) => parse_calendar(&text),
                Ok(None) => Vec::new(),
                Err(e) => {
                    return Err(ReleaseError::FreezeSourceUnreadable {
                        path: path.clone(),
                        reason: e.to_string(),
                    })
                }
            },
            None => Vec::new(),
        };

        let override_env = if config.override_env.trim().is_empty() {
            None
        } else {
            Some(config.override_env.clone())
        };

        Ok(Self {
            calendar,
            inline,
            calendar_windows,
            override_release: config.override_release,
            override_env,
        })
    }

    pub fn with_override(mut self, override_release: bool) -> Self {
        self.override_release = override_release;
        self
    }

    /// Re-read the calendar file. A read failure keeps the previous windows.
    pub fn refresh(&mut self) {
        let Some(path) = &self.calendar else {
            return;
        };
        match read_calendar(path) {
            Ok(Some(text)) => self.calendar_windows = parse_calendar(&text),
            Ok(None) => self.calendar_windows.clear(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Freeze calendar unreadable, keeping previous windows")
            }
        }
    }

    /// All windows currently in effect.
    pub fn windows(&self) -> Vec<FreezeInterval> {
        let mut all: Vec<FreezeInterval> = self
            .inline
            .iter()
            .chain(self.calendar_windows.iter())
            .copied()
            .collect();
        all.sort_by_key(|i| (i.start, i.end));
        all
    }

    pub fn calendar_path(&self) -> Option<&Path> {
        self.calendar.as_deref()
    }

    /// Whether the override is granted by config or environment.
    pub fn override_active(&self) -> bool {
        if self.override_release {
            return true;
        }
        self.override_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    }

    /// Decide whether a release may fire at `now`.
    pub fn check(&self, now: DateTime<Utc>) -> GateDecision {
        let windows = self.windows();
        let active: Vec<&FreezeInterval> = windows.iter().filter(|i| i.contains(now)).collect();
        let Some(until) = active.iter().map(|i| i.end).max() else {
            return GateDecision::Open;
        };
        if self.override_active() {
            warn!(until = %until, "Freeze window active, release override in effect");
            return GateDecision::Overridden;
        }
        GateDecision::Frozen { until }
    }
}
