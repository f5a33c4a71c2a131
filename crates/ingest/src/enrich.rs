//! Per-project enrichment pass.
//!
//! Visits every record that has a slug and has not been enriched yet, asks
//! the endpoint for the creator's launched-project count and the
//! collaborators, and marks the record enriched. Progress is saved every
//! `batch_size` enrichments so an interrupted pass resumes where it stopped.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::client::{ClientError, GraphClient, GraphQuery};
use crate::error::Result;
use crate::pagination::{CreatorNode, random_delay};
use crate::queries::ENRICH_QUERY;
use crate::store::{ProjectRecord, RecordStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Save after this many enrichments.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Stop after this many candidates. `None` visits all of them.
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_batch_size() -> usize {
    10
}

fn default_min_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    3000
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub candidates: usize,
    pub enriched: usize,
    /// The endpoint returned no project for the slug.
    pub missing: usize,
    pub failed: usize,
    pub saves: usize,
}

#[derive(Debug, Default, Deserialize)]
struct ProjectDetails {
    #[serde(default)]
    creator: Option<CreatorNode>,
    #[serde(default)]
    collaborators: Option<Collaborators>,
}

#[derive(Debug, Default, Deserialize)]
struct Collaborators {
    #[serde(default)]
    edges: Vec<CollaboratorEdge>,
}

#[derive(Debug, Deserialize)]
struct CollaboratorEdge {
    node: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: Option<String>,
}

fn apply_details(record: &mut ProjectRecord, details: ProjectDetails) {
    record.creator.previous_projects = Some(
        details
            .creator
            .and_then(|c| c.launched_projects)
            .and_then(|count| count.total_count)
            .unwrap_or(0),
    );
    record.collaborators = details
        .collaborators
        .map(|c| {
            c.edges
                .into_iter()
                .filter_map(|edge| edge.node.and_then(|n| n.name))
                .collect()
        })
        .unwrap_or_default();
    record.enriched = true;
    record.last_updated = Utc::now();
}

/// Enrich every pending record in `store`.
///
/// Failures of a single project are logged and skipped. A failure to derive
/// credentials ends the pass, after saving what was already enriched.
#[instrument(skip_all)]
pub async fn enrich_projects(
    client: &mut GraphClient,
    store: &RecordStore,
    config: &EnrichConfig,
) -> Result<EnrichReport> {
    let mut projects = store.load().await?;
    let mut pending: Vec<(String, String)> = projects
        .values()
        .filter(|p| !p.enriched)
        .filter_map(|p| {
            p.slug
                .as_ref()
                .filter(|s| !s.is_empty())
                .map(|slug| (p.id.clone(), slug.clone()))
        })
        .collect();
    if let Some(limit) = config.limit {
        pending.truncate(limit);
    }

    let mut report = EnrichReport {
        candidates: pending.len(),
        ..Default::default()
    };
    if pending.is_empty() {
        info!("No projects left to enrich");
        return Ok(report);
    }
    info!(count = pending.len(), "Enriching projects");

    let batch_size = config.batch_size.max(1);
    let mut dirty = false;

    for (index, (id, slug)) in pending.iter().enumerate() {
        sleep(random_delay(config.min_delay_ms, config.max_delay_ms)).await;

        let query = GraphQuery::new(ENRICH_QUERY, json!({ "slug": slug }));
        let response = match client.request(&query).await {
            Ok(response) => response,
            Err(ClientError::Refresh(error)) => {
                if dirty {
                    store.save(&projects).await?;
                }
                return Err(ClientError::Refresh(error).into());
            }
            Err(error) => {
                warn!(slug = %slug, error = %error, exhausted = error.is_exhausted(), "Failed to enrich project");
                report.failed += 1;
                continue;
            }
        };

        let Some(value) = response.data_at("project") else {
            warn!(slug = %slug, "No project data found");
            report.missing += 1;
            continue;
        };
        let details: ProjectDetails = match serde_json::from_value(value.clone()) {
            Ok(details) => details,
            Err(error) => {
                warn!(slug = %slug, error = %error, "Unexpected project shape");
                report.failed += 1;
                continue;
            }
        };
        let Some(record) = projects.get_mut(id) else {
            continue;
        };
        apply_details(record, details);
        report.enriched += 1;
        dirty = true;
        info!(slug = %slug, progress = index + 1, total = pending.len(), "Enriched project");

        if report.enriched % batch_size == 0 {
            store.save(&projects).await?;
            report.saves += 1;
            dirty = false;
        }
    }

    if dirty {
        store.save(&projects).await?;
        report.saves += 1;
    }
    info!(
        enriched = report.enriched,
        missing = report.missing,
        failed = report.failed,
        "Enrichment complete"
    );
    Ok(report)
}
