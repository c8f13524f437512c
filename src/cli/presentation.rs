//! CLI presentation: text and json formatters per command.

use crate::engine::{CycleOutcome, EngineStatus};
use crate::error::{ReleaseError, StorageError};
use crate::freeze::{FreezeInterval, GateDecision};
use crate::init::InitSummary;
use crate::release::ReleaseLogEntry;
use crate::tooling::WatchSummary;
use chrono::{DateTime, SecondsFormat, Utc};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::PathBuf;

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ReleaseError> {
    serde_json::to_string_pretty(value).map_err(|e| ReleaseError::from(StorageError::from(e)))
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn counts_line(added: usize, modified: usize, removed: usize) -> String {
    format!("+{} ~{} -{}", added, modified, removed)
}

/// One-line report for a watch cycle.
pub fn format_cycle_line(outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::Released { counts, .. } => format!(
            "{} ({})",
            outcome.to_string().green(),
            counts_line(counts.added, counts.modified, counts.removed)
        ),
        CycleOutcome::Deferred { until, .. } => {
            format!("{} until {}", outcome.to_string().yellow(), timestamp(*until))
        }
        _ => outcome.to_string(),
    }
}

/// Result of `relwatch once`.
pub fn format_once_result(outcome: &CycleOutcome, format: &str) -> Result<String, ReleaseError> {
    if format == "json" {
        return to_json(outcome);
    }
    let mut out = format_cycle_line(outcome);
    if let CycleOutcome::Released { manifests, .. } = outcome {
        for manifest in manifests {
            out.push_str(&format!("\n  updated {}", manifest));
        }
    }
    Ok(out)
}

pub fn format_watch_summary(summary: &WatchSummary) -> String {
    let mut out = format!(
        "Watch stopped after {} cycles: {} released, {} deferred, {} failed",
        summary.cycles, summary.releases, summary.deferred, summary.errors
    );
    if let Some(ref version) = summary.last_version {
        out.push_str(&format!("\nLast release: {}", version));
    }
    out
}

pub fn format_status(status: &EngineStatus, format: &str) -> Result<String, ReleaseError> {
    if format == "json" {
        return to_json(status);
    }
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Release")));
    out.push_str(&format!("  Root: {}\n", status.root.display()));
    out.push_str(&format!("  Version: {}\n", status.version));
    out.push_str(&format!("  Log entries: {}\n", status.log_entries));
    if let Some(ref build_date) = status.build_date {
        out.push_str(&format!("  Build date: {}\n", build_date));
    }
    out.push_str(&format!("  Tracked files: {}\n\n", status.tracked_files));

    out.push_str(&format!("{}\n\n", format_section_heading("Changes")));
    out.push_str(&format!("  State: {}\n", status.state));
    let pending = status.pending;
    out.push_str(&format!(
        "  Pending: {}\n",
        counts_line(pending.added, pending.modified, pending.removed)
    ));
    if let Some(last_change) = status.last_change {
        out.push_str(&format!("  Last change: {}\n", timestamp(last_change)));
    }
    let unobserved = status.unobserved;
    if unobserved.total() > 0 {
        out.push_str(&format!(
            "  Not yet observed: {}\n",
            counts_line(unobserved.added, unobserved.modified, unobserved.removed)
        ));
    }
    if !status.pending_paths.is_empty() {
        out.push('\n');
        let mut table = Table::new();
        table.load_preset(UTF8_BORDERS_ONLY);
        table.set_header(vec!["Change", "Path"]);
        for line in &status.pending_paths {
            let (kind, path) = line.split_once(": ").unwrap_or(("", line.as_str()));
            table.add_row(vec![kind.to_string(), path.to_string()]);
        }
        out.push_str(&format!("{}\n", table));
    }
    out.push('\n');

    out.push_str(&format!("{}\n\n", format_section_heading("Freeze")));
    match status.frozen_until {
        Some(until) if status.override_active => {
            out.push_str(&format!("  Frozen until {} (override active)\n", timestamp(until)))
        }
        Some(until) => out.push_str(&format!("  Frozen until {}\n", timestamp(until))),
        None => out.push_str("  Open\n"),
    }
    out.push_str(&format!("  Windows: {}\n", status.windows.len()));
    Ok(out)
}

pub fn format_log(entries: &[ReleaseLogEntry], format: &str) -> Result<String, ReleaseError> {
    if format == "json" {
        return to_json(&entries);
    }
    if entries.is_empty() {
        return Ok("No releases recorded.".to_string());
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "Version",
        "Date",
        "Time",
        "Changes",
        "Impact",
        "Risk",
        "Categories",
    ]);
    for entry in entries {
        let counts = &entry.counts;
        table.add_row(vec![
            entry.version.clone(),
            entry.date.clone(),
            entry.time.clone(),
            counts_line(counts.added, counts.modified, counts.removed),
            entry.impact.as_str().to_string(),
            entry.risk.as_str().to_string(),
            entry.categories.join(", "),
        ]);
    }
    Ok(format!("{}\n", table))
}

/// Freeze gate report for `relwatch freeze`.
#[derive(Debug, Clone, Serialize)]
pub struct FreezeReport {
    pub now: DateTime<Utc>,
    pub calendar: Option<PathBuf>,
    pub windows: Vec<FreezeInterval>,
    pub decision: &'static str,
    pub frozen_until: Option<DateTime<Utc>>,
    pub override_active: bool,
}

impl FreezeReport {
    pub fn new(
        now: DateTime<Utc>,
        calendar: Option<PathBuf>,
        windows: Vec<FreezeInterval>,
        decision: GateDecision,
        override_active: bool,
    ) -> Self {
        let (decision, frozen_until) = match decision {
            GateDecision::Open => ("open", None),
            GateDecision::Frozen { until } => ("frozen", Some(until)),
            GateDecision::Overridden => ("overridden", None),
        };
        Self {
            now,
            calendar,
            windows,
            decision,
            frozen_until,
            override_active,
        }
    }
}

pub fn format_freeze(report: &FreezeReport, format: &str) -> Result<String, ReleaseError> {
    if format == "json" {
        return to_json(report);
    }
    let mut out = String::new();
    out.push_str(&format!("{}\n\n", format_section_heading("Freeze windows")));
    if let Some(ref calendar) = report.calendar {
        out.push_str(&format!("  Calendar: {}\n", calendar.display()));
    }
    let decision = match report.frozen_until {
        Some(until) => format!("frozen until {}", timestamp(until)),
        None => report.decision.to_string(),
    };
    out.push_str(&format!("  Now: {}\n", decision));
    out.push_str(&format!(
        "  Override: {}\n\n",
        if report.override_active { "active" } else { "inactive" }
    ));
    if report.windows.is_empty() {
        out.push_str("No freeze windows.\n");
        return Ok(out);
    }
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Start", "End", "Active"]);
    for window in &report.windows {
        let active = if window.contains(report.now) { "yes" } else { "" };
        table.add_row(vec![
            timestamp(window.start),
            timestamp(window.end),
            active.to_string(),
        ]);
    }
    out.push_str(&format!("{}\n", table));
    Ok(out)
}

pub fn format_init_summary(summary: &InitSummary) -> String {
    let mut out = String::from("Initializing relwatch workspace...\n\n");
    for path in &summary.created {
        out.push_str(&format!("  ✓ {}\n", path.display()));
    }
    for path in &summary.overwritten {
        out.push_str(&format!("  ✓ {} (overwritten)\n", path.display()));
    }
    for path in &summary.skipped {
        out.push_str(&format!("  ⊘ {} (already exists, skipped)\n", path.display()));
    }
    if summary.created.is_empty() && summary.overwritten.is_empty() {
        out.push_str("\nNothing to do. Use --force to overwrite.\n");
    }
    out
}
