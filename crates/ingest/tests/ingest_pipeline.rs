//! End-to-end runs: request client, pagination driver and record store
//! against an in-process transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use ksr_ingest::client::{RawResponse, RetryPolicy, Transport, TransportError};
use ksr_ingest::credentials::{CredentialStore, MemoryCredentialStore, RefreshError};
use ksr_ingest::pagination::{ConnectionQuery, Edge, PaginationConfig};
use ksr_ingest::queries::{NEWEST_QUERY, with_project_fields};
use ksr_ingest::{
    CredentialPair, CredentialRefresher, GraphClient, GraphQuery, RecordStore, drive_pagination,
};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Serves `ids` in pages of `page_size`, keyed by the `nextCursor` variable.
/// Rejects the first call with 401 and any call whose session is not `fresh-*`.
struct CatalogTransport {
    ids: Vec<String>,
    page_size: usize,
    backers: u64,
    calls: AtomicU32,
}

impl CatalogTransport {
    fn new(ids: &[&str], page_size: usize, backers: u64) -> Self {
        Self {
            ids: ids.iter().map(|s| s.to_string()).collect(),
            page_size,
            backers,
            calls: AtomicU32::new(0),
        }
    }

    fn page(&self, cursor: Option<&str>) -> Value {
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(self.ids.len());
        let edges: Vec<Value> = self.ids[start..end]
            .iter()
            .map(|id| {
                json!({
                    "cursor": id,
                    "node": {
                        "id": id,
                        "name": format!("Project {id}"),
                        "url": format!("https://www.kickstarter.com/projects/maker/{id}"),
                        "backersCount": self.backers,
                        "percentFunded": 10,
                        "pledged": { "amount": "150.0", "currency": "GBP" },
                        "isLaunched": true
                    }
                })
            })
            .collect();
        json!({ "data": { "projects": {
            "edges": edges,
            "pageInfo": { "hasNextPage": end < self.ids.len(), "endCursor": end.to_string() }
        } } })
    }
}

#[async_trait]
impl Transport for CatalogTransport {
    async fn send(
        &self,
        query: &GraphQuery,
        credentials: &CredentialPair,
    ) -> Result<RawResponse, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if n == 0 || !credentials.session_token().unwrap_or("").starts_with("fresh-") {
            return Ok(RawResponse::new(401, "unauthorized"));
        }
        let cursor = query.variables.get("nextCursor").and_then(Value::as_str);
        Ok(RawResponse::new(200, self.page(cursor).to_string()))
    }
}

struct CountingRefresher {
    store: Arc<MemoryCredentialStore>,
    calls: AtomicU32,
}

#[async_trait]
impl CredentialRefresher for CountingRefresher {
    async fn refresh(&self) -> Result<CredentialPair, RefreshError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        let pair = CredentialPair::new(format!("fresh-{n}"), "csrf");
        self.store.save(&pair).await?;
        Ok(pair)
    }
}

fn client(transport: CatalogTransport) -> (GraphClient, Arc<CountingRefresher>) {
    let creds = Arc::new(MemoryCredentialStore::with_pair(CredentialPair::new(
        "expired", "csrf",
    )));
    let refresher = Arc::new(CountingRefresher {
        store: Arc::clone(&creds),
        calls: AtomicU32::new(0),
    });
    let client = GraphClient::new(transport, creds, refresher.clone())
        .with_policy(RetryPolicy::immediate(5));
    (client, refresher)
}

fn quick(batch_size: usize) -> PaginationConfig {
    PaginationConfig {
        batch_size,
        max_pages: 0,
        min_delay_ms: 0,
        max_delay_ms: 0,
        ..Default::default()
    }
}

#[tokio::test]
async fn full_run_recovers_auth_and_persists_every_record() {
    let temp = TempDir::new().unwrap();
    let mut store = RecordStore::new(temp.path().join("projects.json"));
    let ids: Vec<String> = (1..=12).map(|i| format!("p{i:02}")).collect();
    let ids: Vec<&str> = ids.iter().map(String::as_str).collect();

    let (mut client, refresher) = client(CatalogTransport::new(&ids, 5, 3));
    let query = with_project_fields(NEWEST_QUERY);
    let mut source = ConnectionQuery::new(&mut client, query);

    let report = drive_pagination(&mut source, &mut store, &quick(4), None)
        .await
        .unwrap();

    assert_eq!(report.total_edges, 12);
    assert_eq!(report.pages, 3);
    assert_eq!(report.flushes, 3);
    assert_eq!(report.merge.new, 12);
    assert_eq!(refresher.calls.load(Ordering::Relaxed), 1);

    let map = store.load().await.unwrap();
    assert_eq!(map.len(), 12);
    let record = &map["p01"];
    assert_eq!(record.slug.as_deref(), Some("maker/p01"));
    assert_eq!(record.funding_history.len(), 1);
    assert_eq!(record.funding_history[0].pledged, 150.0);
    assert_eq!(record.funding_history[0].currency.as_deref(), Some("GBP"));
}

#[tokio::test]
async fn rerun_is_idempotent_and_incremental_run_stops_at_known_record() {
    let temp = TempDir::new().unwrap();
    let mut store = RecordStore::new(temp.path().join("projects.json"));

    let (mut first, _) = client(CatalogTransport::new(&["c", "d", "e"], 2, 3));
    let mut source = ConnectionQuery::new(&mut first, NEWEST_QUERY);
    drive_pagination(&mut source, &mut store, &quick(10), None)
        .await
        .unwrap();

    // Same data again: no new records, no history growth.
    let (mut again, _) = client(CatalogTransport::new(&["c", "d", "e"], 2, 3));
    let mut source = ConnectionQuery::new(&mut again, NEWEST_QUERY);
    let report = drive_pagination(&mut source, &mut store, &quick(10), None)
        .await
        .unwrap();
    assert_eq!(report.merge.new, 0);
    assert_eq!(report.merge.snapshots, 0);

    // Newest first: two unseen projects, then a known one.
    let known = store.known_ids().await.unwrap();
    let stop = move |edge: &Edge| edge.id().is_some_and(|id| known.contains(id));
    let (mut update, _) = client(CatalogTransport::new(&["a", "b", "c", "d", "e"], 2, 3));
    let mut source = ConnectionQuery::new(&mut update, NEWEST_QUERY);
    let report = drive_pagination(&mut source, &mut store, &quick(20), Some(&stop))
        .await
        .unwrap();

    assert!(report.stopped_early);
    assert_eq!(report.total_edges, 2);
    assert_eq!(report.pages, 2);

    let map = store.load().await.unwrap();
    assert_eq!(map.len(), 5);
    assert!(map.values().all(|p| p.funding_history.len() == 1));
}
