//! The pagination driver.

use std::time::Duration;

use async_trait::async_trait;
use rand::RngExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

use super::model::Edge;
use super::source::PageSource;
use crate::client::ClientError;
use crate::store::{MergeStats, StoreError};

/// Receives full batches of edges.
#[async_trait]
pub trait BatchSink: Send {
    async fn flush(&mut self, edges: Vec<Edge>) -> Result<MergeStats, StoreError>;
}

/// Early-termination rule, checked against every edge before it is batched.
pub type StopPredicate<'a> = &'a (dyn Fn(&Edge) -> bool + Send + Sync);

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("Request failed: {0}")]
    Client(#[from] ClientError),

    #[error("Flush failed: {0}")]
    Store(#[from] StoreError),

    #[error("batch_size must be at least 1")]
    InvalidBatchSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Cursor to resume from. `None` starts at the first page.
    #[serde(default)]
    pub start_cursor: Option<String>,
    /// Page ceiling. `0` means no ceiling.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Flush threshold.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Lower bound of the politeness delay between pages, in milliseconds.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    /// Upper bound of the politeness delay between pages, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_pages() -> u32 {
    100
}

fn default_batch_size() -> usize {
    50
}

fn default_min_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    3000
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            start_cursor: None,
            max_pages: default_max_pages(),
            batch_size: default_batch_size(),
            min_delay_ms: default_min_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl PaginationConfig {
    /// Settings for a full discovery run.
    pub fn full_scrape() -> Self {
        Self {
            max_pages: 1000,
            ..Default::default()
        }
    }

    /// Settings for an incremental "newest first" run.
    pub fn incremental() -> Self {
        Self {
            max_pages: 20,
            batch_size: 20,
            min_delay_ms: 1000,
            max_delay_ms: 2000,
            ..Default::default()
        }
    }

    /// Uniformly random delay in `[min_delay, max_delay]`.
    pub fn page_delay(&self) -> Duration {
        random_delay(self.min_delay_ms, self.max_delay_ms)
    }
}

/// Uniformly random duration between two millisecond bounds, in either order.
pub(crate) fn random_delay(a_ms: u64, b_ms: u64) -> Duration {
    let (lo, hi) = (a_ms.min(b_ms), a_ms.max(b_ms));
    if lo == hi {
        return Duration::from_millis(lo);
    }
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}

/// What a pagination run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationReport {
    /// Edges handed to the sink.
    pub total_edges: usize,
    pub pages: u32,
    pub flushes: u32,
    /// The stop predicate matched.
    pub stopped_early: bool,
    /// Last cursor handed out by the server, for resuming.
    pub last_cursor: Option<String>,
    pub merge: MergeStats,
}

async fn flush_batch<K>(
    sink: &mut K,
    batch: &mut Vec<Edge>,
    report: &mut PaginationReport,
) -> Result<(), StoreError>
where
    K: BatchSink + ?Sized,
{
    let edges = std::mem::take(batch);
    debug!(edges = edges.len(), "Flushing batch");
    let stats = sink.flush(edges).await?;
    report.flushes += 1;
    report.merge.absorb(stats);
    Ok(())
}

/// Walk `source` from `config.start_cursor`, flushing every `batch_size`
/// edges into `sink`.
///
/// Stops on an empty page, when no next page exists, at `max_pages`, or when
/// `stop` matches an edge. In the last case the matching edge and the rest of
/// its page are dropped, the pending batch is flushed and no further page is
/// fetched. Client and sink failures halt the run; the driver never retries a
/// page itself.
#[instrument(skip_all, fields(max_pages = config.max_pages, batch_size = config.batch_size))]
pub async fn drive_pagination<S, K>(
    source: &mut S,
    sink: &mut K,
    config: &PaginationConfig,
    stop: Option<StopPredicate<'_>>,
) -> Result<PaginationReport, PaginationError>
where
    S: PageSource + ?Sized,
    K: BatchSink + ?Sized,
{
    if config.batch_size == 0 {
        return Err(PaginationError::InvalidBatchSize);
    }

    let mut report = PaginationReport::default();
    let mut cursor = config.start_cursor.clone();
    let mut batch: Vec<Edge> = Vec::with_capacity(config.batch_size);

    'pages: loop {
        let page = source.fetch_page(cursor.as_deref()).await?;
        report.pages += 1;

        if page.edges.is_empty() {
            info!(page = report.pages, "Page returned no edges; stream exhausted");
            break;
        }
        info!(page = report.pages, edges = page.edges.len(), "Fetched page");

        let next = page.page_info.next_cursor().map(str::to_owned);
        if let Some(end) = &page.page_info.end_cursor {
            report.last_cursor = Some(end.clone());
        }

        for edge in page.edges {
            if let Some(stop) = stop
                && stop(&edge)
            {
                info!(id = edge.id().unwrap_or("?"), "Stop condition matched; ending run");
                report.stopped_early = true;
                break 'pages;
            }
            batch.push(edge);
            report.total_edges += 1;
            if batch.len() >= config.batch_size {
                flush_batch(sink, &mut batch, &mut report).await?;
            }
        }

        let Some(next) = next else {
            debug!("No further pages");
            break;
        };
        if config.max_pages > 0 && report.pages >= config.max_pages {
            info!(max_pages = config.max_pages, "Reached max page limit");
            break;
        }

        cursor = Some(next);
        let delay = config.page_delay();
        if !delay.is_zero() {
            debug!(delay_ms = delay.as_millis() as u64, "Pausing between pages");
            sleep(delay).await;
        }
    }

    if !batch.is_empty() {
        flush_batch(sink, &mut batch, &mut report).await?;
    }

    info!(
        total = report.total_edges,
        pages = report.pages,
        flushes = report.flushes,
        "Pagination finished"
    );
    Ok(report)
}
