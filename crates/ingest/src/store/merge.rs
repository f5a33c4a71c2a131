//! The batch merge algorithm.

use std::collections::HashMap;
use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde_json::Map;
use tracing::{debug, trace};

use super::model::{Creator, FundingSnapshot, ProjectMap, ProjectRecord, Tags, extract_slug};
use crate::currency::CurrencyConverter;
use crate::pagination::{Edge, ProjectNode};

/// Counters for one or more merges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Records created.
    pub new: usize,
    /// Existing records touched.
    pub updated: usize,
    /// Edges without an identifier.
    pub skipped: usize,
    /// Funding snapshots appended, including the seed snapshot of new records.
    pub snapshots: usize,
}

impl MergeStats {
    pub fn absorb(&mut self, other: MergeStats) {
        self.new += other.new;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.snapshots += other.snapshots;
    }
}

impl AddAssign for MergeStats {
    fn add_assign(&mut self, rhs: Self) {
        self.absorb(rhs);
    }
}

/// Merge `edges` into a copy of `store`.
///
/// Merging the same edges again with the same `now` yields the same map.
pub fn merge_batch(
    store: &ProjectMap,
    edges: &[Edge],
    now: DateTime<Utc>,
    converter: &dyn CurrencyConverter,
) -> (ProjectMap, MergeStats) {
    let mut merged = store.clone();
    let stats = merge_into(&mut merged, edges, now, converter);
    (merged, stats)
}

/// In-place form of [`merge_batch`].
pub fn merge_into(
    store: &mut ProjectMap,
    edges: &[Edge],
    now: DateTime<Utc>,
    converter: &dyn CurrencyConverter,
) -> MergeStats {
    let mut stats = MergeStats::default();

    // Every edge in a batch shares `now`, so only the last sighting of an id counts.
    let last_seen: HashMap<&str, usize> = edges
        .iter()
        .enumerate()
        .filter_map(|(index, edge)| edge.id().map(|id| (id, index)))
        .collect();

    for (index, edge) in edges.iter().enumerate() {
        let (Some(id), Some(node)) = (edge.id(), edge.node.as_ref()) else {
            trace!("Skipping edge without an id");
            stats.skipped += 1;
            continue;
        };
        if last_seen.get(id) != Some(&index) {
            trace!(id, "Superseded by a later edge in the batch");
            continue;
        }

        match store.get_mut(id) {
            None => {
                let snapshot = snapshot_of(node, None, now, converter);
                if snapshot.is_some() {
                    stats.snapshots += 1;
                }
                store.insert(id.to_string(), new_record(id, node, snapshot, now, converter));
                stats.new += 1;
            }
            Some(record) => {
                if update_record(record, node, now, converter) {
                    stats.snapshots += 1;
                }
                stats.updated += 1;
            }
        }
    }

    debug!(
        new = stats.new,
        updated = stats.updated,
        skipped = stats.skipped,
        "Merged batch"
    );
    stats
}

/// Funding figures observed on `node`, with absent fields carried over from
/// `previous`. `None` when the node carries no funding figures at all.
fn snapshot_of(
    node: &ProjectNode,
    previous: Option<&FundingSnapshot>,
    now: DateTime<Utc>,
    converter: &dyn CurrencyConverter,
) -> Option<FundingSnapshot> {
    let pledged = node.pledged.as_ref();
    let amount = pledged.and_then(|m| m.amount);
    if node.backers_count.is_none() && amount.is_none() && node.percent_funded.is_none() {
        return None;
    }

    let amount = amount.or(previous.map(|p| p.pledged)).unwrap_or(0.0);
    let currency = pledged
        .and_then(|m| m.currency.clone())
        .or_else(|| node.currency.clone())
        .or_else(|| previous.and_then(|p| p.currency.clone()));
    let usd_pledged = currency
        .as_deref()
        .and_then(|code| converter.to_usd(amount, code));

    Some(FundingSnapshot {
        timestamp: now,
        backers_count: node
            .backers_count
            .or(previous.map(|p| p.backers_count))
            .unwrap_or(0),
        pledged: amount,
        currency,
        percent_funded: node
            .percent_funded
            .or(previous.map(|p| p.percent_funded))
            .unwrap_or(0.0),
        deadline_at: node.deadline_at.or(previous.and_then(|p| p.deadline_at)),
        usd_pledged,
    })
}

fn usd_goal_of(node: &ProjectNode, converter: &dyn CurrencyConverter) -> Option<f64> {
    let goal = node.goal.as_ref()?;
    let currency = goal.currency.as_deref().or(node.currency.as_deref())?;
    converter.to_usd(goal.amount?, currency)
}

fn slug_of(node: &ProjectNode) -> Option<String> {
    node.slug
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| node.url.as_deref().and_then(extract_slug))
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.clone().filter(|s| !s.is_empty())
}

fn new_record(
    id: &str,
    node: &ProjectNode,
    snapshot: Option<FundingSnapshot>,
    now: DateTime<Utc>,
    converter: &dyn CurrencyConverter,
) -> ProjectRecord {
    let creator = node.creator.as_ref();
    ProjectRecord {
        id: id.to_string(),
        slug: slug_of(node),
        url: node.url.clone().unwrap_or_default(),
        name: node.name.clone().unwrap_or_default(),
        description: node.description.clone().unwrap_or_default(),
        category: node.category.as_ref().and_then(|c| non_empty(&c.name)),
        currency: non_empty(&node.currency),
        goal: node.goal.clone(),
        usd_goal: usd_goal_of(node, converter),
        creator: Creator {
            name: creator.and_then(|c| c.name.clone()).unwrap_or_default(),
            url: creator.and_then(|c| c.url.clone()).unwrap_or_default(),
            previous_projects: creator
                .and_then(|c| c.launched_projects.as_ref())
                .and_then(|count| count.total_count),
        },
        tags: Tags {
            is_launched: node.is_launched.unwrap_or(false),
            is_project_we_love: node.is_project_we_love.unwrap_or(false),
            is_project_of_the_day: node.is_project_of_the_day.unwrap_or(false),
        },
        state: non_empty(&node.state),
        launched_at: node.launched_at,
        deadline_at: node.deadline_at,
        funding_history: snapshot.into_iter().collect(),
        collaborators: Vec::new(),
        enriched: false,
        last_updated: now,
        extra: Map::new(),
    }
}

fn fill_string(field: &mut String, incoming: Option<&String>) {
    if field.is_empty()
        && let Some(value) = incoming.filter(|v| !v.is_empty())
    {
        field.clone_from(value);
    }
}

fn fill_option<T: Clone>(field: &mut Option<T>, incoming: Option<T>) {
    if field.is_none() {
        *field = incoming;
    }
}

/// Returns whether a snapshot was appended.
fn update_record(
    record: &mut ProjectRecord,
    node: &ProjectNode,
    now: DateTime<Utc>,
    converter: &dyn CurrencyConverter,
) -> bool {
    // Descriptive fields: first non-empty value wins.
    fill_string(&mut record.name, node.name.as_ref());
    fill_string(&mut record.description, node.description.as_ref());
    fill_string(&mut record.url, node.url.as_ref());
    if record.slug.as_deref().is_none_or(str::is_empty) {
        record.slug = slug_of(node);
    }
    fill_option(
        &mut record.category,
        node.category.as_ref().and_then(|c| non_empty(&c.name)),
    );
    fill_option(&mut record.currency, non_empty(&node.currency));
    fill_option(&mut record.goal, node.goal.clone());
    fill_option(&mut record.usd_goal, usd_goal_of(node, converter));
    if let Some(creator) = &node.creator {
        fill_string(&mut record.creator.name, creator.name.as_ref());
        fill_string(&mut record.creator.url, creator.url.as_ref());
    }

    // Classification flags and timestamps follow the server.
    if let Some(flag) = node.is_launched {
        record.tags.is_launched = flag;
    }
    if let Some(flag) = node.is_project_we_love {
        record.tags.is_project_we_love = flag;
    }
    if let Some(flag) = node.is_project_of_the_day {
        record.tags.is_project_of_the_day = flag;
    }
    if let Some(state) = non_empty(&node.state) {
        record.state = Some(state);
    }
    if node.launched_at.is_some() {
        record.launched_at = node.launched_at;
    }
    if node.deadline_at.is_some() {
        record.deadline_at = node.deadline_at;
    }

    let previous = record.latest_snapshot();
    let appended = match snapshot_of(node, previous, now, converter) {
        Some(snapshot) if previous.is_none_or(|last| snapshot.differs_from(last)) => {
            record.funding_history.push(snapshot);
            true
        }
        _ => false,
    };

    record.last_updated = now;
    appended
}
