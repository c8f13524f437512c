//! Release log entries.
//!
//! The entry carries structured facts about a release (version, timestamps,
//! counts, categories, changed paths). Prose is left to an
//! [`EntryDescriber`]; the default only restates the counts.

use crate::changeset::{ChangeCounts, ChangeSet};
use crate::classify::{
    assess_impact, assess_risk, rank_categories, Classifier, Impact, PrefixClassifier, Risk,
};
use crate::release::version::Version;
use crate::types::ReleaseSource;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One element of the newest-first release log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseLogEntry {
    pub version: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub datetime: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub description: BTreeMap<String, String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub counts: ChangeCounts,
    #[serde(default)]
    pub impact: Impact,
    #[serde(default)]
    pub risk: Risk,
    #[serde(default)]
    pub files_top: Vec<String>,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(rename = "_files", default)]
    pub files: Vec<String>,
}

impl ReleaseLogEntry {
    pub fn parsed_version(&self) -> Version {
        Version::parse_lenient(&self.version)
    }
}

/// Produces localized descriptions for an entry, keyed by language code.
pub trait EntryDescriber: Send + Sync {
    fn describe(&self, changes: &ChangeSet, categories: &[String]) -> BTreeMap<String, String>;
}

/// Plain English counts line.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountsDescriber;

impl EntryDescriber for CountsDescriber {
    fn describe(&self, changes: &ChangeSet, categories: &[String]) -> BTreeMap<String, String> {
        let counts = changes.counts();
        let mut text = format!(
            "Changes: +{}, ~{}, -{}.",
            counts.added, counts.modified, counts.removed
        );
        if !categories.is_empty() {
            text.push_str(&format!(" Focus: {}.", categories.join(", ")));
        }
        BTreeMap::from([("en".to_string(), text)])
    }
}

/// Fixed entry fields and list limits.
#[derive(Debug, Clone)]
pub struct EntryTemplate {
    pub status: String,
    pub author: String,
    pub top_categories: usize,
    pub top_files: usize,
    pub max_files: usize,
}

impl Default for EntryTemplate {
    fn default() -> Self {
        Self {
            status: "Stable".to_string(),
            author: "Local".to_string(),
            top_categories: 3,
            top_files: 3,
            max_files: 50,
        }
    }
}

/// Assembles [`ReleaseLogEntry`] values from a released change-set.
#[derive(Clone)]
pub struct EntryBuilder {
    classifier: Arc<dyn Classifier>,
    describer: Arc<dyn EntryDescriber>,
    template: EntryTemplate,
}

impl Default for EntryBuilder {
    fn default() -> Self {
        Self::new(
            Arc::new(PrefixClassifier::default()),
            Arc::new(CountsDescriber),
            EntryTemplate::default(),
        )
    }
}

impl EntryBuilder {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        describer: Arc<dyn EntryDescriber>,
        template: EntryTemplate,
    ) -> Self {
        Self {
            classifier,
            describer,
            template,
        }
    }

    pub fn with_describer(mut self, describer: Arc<dyn EntryDescriber>) -> Self {
        self.describer = describer;
        self
    }

    pub fn build(
        &self,
        version: &Version,
        changes: &ChangeSet,
        now: DateTime<Utc>,
        source: ReleaseSource,
    ) -> ReleaseLogEntry {
        let ranked = rank_categories(self.classifier.as_ref(), changes);
        let counts = changes.counts();
        let impact = assess_impact(
            self.classifier.as_ref(),
            ranked.iter().map(|(c, _)| c.as_str()),
        );
        let risk = assess_risk(
            self.classifier.as_ref(),
            ranked.iter().map(|(c, _)| c.as_str()),
            counts,
        );
        let categories: Vec<String> = ranked
            .into_iter()
            .take(self.template.top_categories)
            .map(|(category, _)| category)
            .collect();

        let files_top = changes
            .iter()
            .take(self.template.top_files)
            .map(|(path, _)| path.clone())
            .collect();
        let files = changes
            .iter()
            .take(self.template.max_files)
            .map(|(path, kind)| format!("{}: {}", kind.as_str(), path))
            .collect();

        ReleaseLogEntry {
            version: version.to_string(),
            date: now.format("%Y-%m-%d").to_string(),
            time: now.format("%H:%M").to_string(),
            datetime: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            status: self.template.status.clone(),
            author: self.template.author.clone(),
            description: self.describer.describe(changes, &categories),
            categories,
            counts,
            impact,
            risk,
            files_top,
            sources: vec![source.as_str().to_string()],
            files,
        }
    }
}
