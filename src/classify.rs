//! Category classification for changed paths.
//!
//! Categories are plain labels attached to release log entries. The engine
//! calls a [`Classifier`] but does not own the rules; the default
//! [`PrefixClassifier`] is built from `[[classify]]` configuration rules.
//!
//! Rules may also tag a category with an [`Impact`] and a minimum [`Risk`];
//! entries take the strongest impact and the highest risk among their
//! categories, with risk also raised by the size of the change-set.

use crate::changeset::{ChangeCounts, ChangeSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Category for paths no rule matches.
pub const OTHER: &str = "other";

/// Change-set size above which a release is at least medium risk.
pub const MEDIUM_RISK_PATHS: usize = 8;
/// Change-set size above which a release is high risk.
pub const HIGH_RISK_PATHS: usize = 20;

/// Kind of effect a release has, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Security,
    Feature,
    Ux,
    #[default]
    Chore,
    Quality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    #[default]
    Low,
    Medium,
    High,
}

impl Impact {
    pub fn as_str(&self) -> &'static str {
        match self {
            Impact::Security => "security",
            Impact::Feature => "feature",
            Impact::Ux => "ux",
            Impact::Chore => "chore",
            Impact::Quality => "quality",
        }
    }
}

impl Risk {
    pub fn as_str(&self) -> &'static str {
        match self {
            Risk::Low => "low",
            Risk::Medium => "medium",
            Risk::High => "high",
        }
    }
}

/// Maps a root-relative path to a category label.
pub trait Classifier: Send + Sync {
    fn classify(&self, path: &str) -> String;

    /// Impact attached to `category`, if any.
    fn impact(&self, _category: &str) -> Option<Impact> {
        None
    }

    /// Minimum risk attached to `category`, if any.
    fn risk(&self, _category: &str) -> Option<Risk> {
        None
    }
}

impl<F> Classifier for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn classify(&self, path: &str) -> String {
        self(path)
    }
}

/// One classification rule. A path matches when any listed condition holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifyRule {
    pub category: String,
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub suffixes: Vec<String>,
    #[serde(default)]
    pub exact: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<Impact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<Risk>,
}

impl ClassifyRule {
    fn matches(&self, path: &str) -> bool {
        self.exact.iter().any(|e| e == path)
            || self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
            || self
                .suffixes
                .iter()
                .any(|s| path.to_lowercase().ends_with(&s.to_lowercase()))
    }
}

fn rule(category: &str, prefixes: &[&str], suffixes: &[&str], exact: &[&str]) -> ClassifyRule {
    let owned = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
    ClassifyRule {
        category: category.to_string(),
        prefixes: owned(prefixes),
        suffixes: owned(suffixes),
        exact: owned(exact),
        impact: None,
        risk: None,
    }
}

fn tagged(mut rule: ClassifyRule, impact: Impact, risk: Option<Risk>) -> ClassifyRule {
    rule.impact = Some(impact);
    rule.risk = risk;
    rule
}

/// Rules used when configuration lists none.
pub fn default_rules() -> Vec<ClassifyRule> {
    vec![
        tagged(rule("i18n", &["locales/"], &[], &[]), Impact::Ux, None),
        tagged(rule("automation", &["scripts/"], &[], &[]), Impact::Chore, None),
        tagged(
            rule("styles", &["src/styles/"], &[], &["tailwind.config.js"]),
            Impact::Ux,
            None,
        ),
        tagged(rule("tests", &["tests/"], &[], &[]), Impact::Quality, None),
        tagged(
            rule("config", &[], &[], &["app.config.json"]),
            Impact::Feature,
            Some(Risk::Medium),
        ),
        rule("docs", &[], &[".md"], &[]),
    ]
}

/// First matching rule wins; unmatched paths are [`OTHER`].
#[derive(Debug, Clone)]
pub struct PrefixClassifier {
    rules: Vec<ClassifyRule>,
}

impl PrefixClassifier {
    pub fn new(rules: Vec<ClassifyRule>) -> Self {
        Self { rules }
    }
}

impl Default for PrefixClassifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl Classifier for PrefixClassifier {
    fn classify(&self, path: &str) -> String {
        self.rules
            .iter()
            .find(|r| r.matches(path))
            .map(|r| r.category.clone())
            .unwrap_or_else(|| OTHER.to_string())
    }

    fn impact(&self, category: &str) -> Option<Impact> {
        self.rules
            .iter()
            .filter(|r| r.category == category)
            .find_map(|r| r.impact)
    }

    fn risk(&self, category: &str) -> Option<Risk> {
        self.rules
            .iter()
            .filter(|r| r.category == category)
            .filter_map(|r| r.risk)
            .max()
    }
}

/// Count categories over every changed path, most frequent first.
/// Ties are broken by category name.
pub fn rank_categories(classifier: &dyn Classifier, changes: &ChangeSet) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for (path, _) in changes.iter() {
        *counts.entry(classifier.classify(path)).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Strongest impact among `categories`; [`Impact::Chore`] when none is tagged.
pub fn assess_impact<'a>(
    classifier: &dyn Classifier,
    categories: impl IntoIterator<Item = &'a str>,
) -> Impact {
    categories
        .into_iter()
        .filter_map(|c| classifier.impact(c))
        .min()
        .unwrap_or_default()
}

/// Highest of the category risks and the size-based risk.
pub fn assess_risk<'a>(
    classifier: &dyn Classifier,
    categories: impl IntoIterator<Item = &'a str>,
    counts: ChangeCounts,
) -> Risk {
    let by_size = match counts.total() {
        n if n > HIGH_RISK_PATHS => Risk::High,
        n if n > MEDIUM_RISK_PATHS => Risk::Medium,
        _ => Risk::Low,
    };
    categories
        .into_iter()
        .filter_map(|c| classifier.risk(c))
        .fold(by_size, Risk::max)
}
