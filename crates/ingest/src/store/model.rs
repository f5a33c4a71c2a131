//! Persisted record types.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::pagination::Money;

/// All known records, keyed by server identifier.
pub type ProjectMap = BTreeMap<String, ProjectRecord>;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"kickstarter\.com/projects/([^/]+/[^/?#]+)").unwrap());

/// `creator/project` slug from a project URL.
pub fn extract_slug(url: &str) -> Option<String> {
    SLUG_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// One funding measurement. Never modified once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundingSnapshot {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub backers_count: u64,
    #[serde(default)]
    pub pledged: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub percent_funded: f64,
    #[serde(default)]
    pub deadline_at: Option<i64>,
    /// `pledged` converted to USD, when the rate is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usd_pledged: Option<f64>,
}

impl FundingSnapshot {
    /// History only grows when backers, pledged amount or percentage moved.
    pub fn differs_from(&self, other: &FundingSnapshot) -> bool {
        self.backers_count != other.backers_count
            || self.pledged != other.pledged
            || self.percent_funded != other.percent_funded
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    /// Count of projects the creator has launched, set by enrichment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_projects: Option<u64>,
}

/// Classification flags. These always carry the latest server value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tags {
    #[serde(default)]
    pub is_launched: bool,
    #[serde(default)]
    pub is_project_we_love: bool,
    #[serde(default)]
    pub is_project_of_the_day: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRecord {
    pub id: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usd_goal: Option<f64>,
    #[serde(default)]
    pub creator: Creator,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launched_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_at: Option<i64>,
    #[serde(default)]
    pub funding_history: Vec<FundingSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collaborators: Vec<String>,
    #[serde(rename = "_enriched", default, skip_serializing_if = "std::ops::Not::not")]
    pub enriched: bool,
    pub last_updated: DateTime<Utc>,
    /// Fields written by other tools, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProjectRecord {
    pub fn latest_snapshot(&self) -> Option<&FundingSnapshot> {
        self.funding_history.last()
    }

    /// Deadline from the record, falling back to the latest snapshot.
    pub fn effective_deadline(&self) -> Option<i64> {
        self.deadline_at
            .or_else(|| self.latest_snapshot().and_then(|s| s.deadline_at))
    }

    /// Launched and not yet past its deadline at `now` (unix seconds).
    pub fn is_active(&self, now: i64) -> bool {
        self.tags.is_launched && self.effective_deadline().is_some_and(|deadline| deadline > now)
    }
}
