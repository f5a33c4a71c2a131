use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use ksr_ingest::client::{HttpTransport, RateLimiter, SessionHandle};
use ksr_ingest::credentials::{
    CredentialRefresher, CredentialStore, FileCredentialStore, HttpSessionRefresher,
};
use ksr_ingest::currency::{StaticRates, currencies};
use ksr_ingest::enrich::enrich_projects;
use ksr_ingest::filter::active_projects;
use ksr_ingest::pagination::{ConnectionQuery, Edge};
use ksr_ingest::queries::{DISCOVER_QUERY, NEWEST_QUERY, with_project_fields};
use ksr_ingest::{GraphClient, PaginationConfig, PaginationReport, RecordStore, drive_pagination};
use tracing::{info, warn};

use crate::cli::PageOptions;
use crate::config::AppConfig;
use crate::error::{AppError, Result};

pub struct CommandExecutor {
    config: AppConfig,
    rates: Arc<StaticRates>,
}

fn apply_page_options(mut config: PaginationConfig, options: &PageOptions) -> PaginationConfig {
    if let Some(max_pages) = options.max_pages {
        config.max_pages = max_pages;
    }
    if let Some(batch_size) = options.batch_size {
        config.batch_size = batch_size;
    }
    if options.cursor.is_some() {
        config.start_cursor.clone_from(&options.cursor);
    }
    if let Some(min) = options.min_delay_ms {
        config.min_delay_ms = min;
    }
    if let Some(max) = options.max_delay_ms {
        config.max_delay_ms = max;
    }
    config
}

async fn load_query(path: Option<&Path>, builtin: &str) -> Result<String> {
    let text = match path {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => builtin.to_string(),
    };
    Ok(with_project_fields(&text))
}

fn print_report(label: &str, report: &PaginationReport) {
    println!(
        "{label}: {} projects over {} pages ({} new, {} updated, {} skipped)",
        report.total_edges, report.pages, report.merge.new, report.merge.updated, report.merge.skipped
    );
    if report.stopped_early {
        println!("Stopped at the first project already in the store");
    }
    if let Some(cursor) = &report.last_cursor {
        println!("Last cursor: {cursor}");
    }
}

impl CommandExecutor {
    pub fn new(config: AppConfig) -> Self {
        let rates = Arc::new(StaticRates::with_overrides(&config.currency.rates));
        Self { config, rates }
    }

    fn record_store(&self) -> RecordStore {
        RecordStore::new(&self.config.storage.projects_path).with_converter(self.rates.clone())
    }

    fn credential_store(&self) -> Arc<dyn CredentialStore> {
        Arc::new(FileCredentialStore::new(
            &self.config.storage.cookies_path,
            &self.config.storage.headers_path,
        ))
    }

    fn refresher(
        &self,
        session: &Arc<SessionHandle>,
        store: Arc<dyn CredentialStore>,
    ) -> Result<HttpSessionRefresher> {
        let endpoint = session.config();
        Ok(HttpSessionRefresher::new(
            Arc::clone(session),
            store,
            endpoint.origin()?.to_string(),
            endpoint.refresh_timeout(),
        ))
    }

    fn build_client(&self, session: Arc<SessionHandle>) -> Result<GraphClient> {
        let store = self.credential_store();
        let refresher = Arc::new(self.refresher(&session, Arc::clone(&store))?);
        let transport = HttpTransport::new(Arc::clone(&session))?;
        Ok(GraphClient::new(transport, store, refresher)
            .with_policy(self.config.retry.clone())
            .with_rate_limiter(RateLimiter::from_config(&self.config.rate_limit))
            .with_session(session))
    }

    /// Run `f` with a client whose HTTP session is released afterwards,
    /// whether `f` succeeds or not.
    async fn with_client<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(GraphClient) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        SessionHandle::scoped(self.config.endpoint.clone(), |session| async move {
            let client: GraphClient = self.build_client(session)?;
            f(client).await
        })
        .await
    }

    async fn paginate(
        &self,
        query: String,
        config: PaginationConfig,
        stop: Option<&(dyn Fn(&Edge) -> bool + Send + Sync)>,
    ) -> Result<PaginationReport> {
        let mut store = self.record_store();
        self.with_client(|mut client| async move {
            let result = {
                let mut source = ConnectionQuery::new(&mut client, query);
                drive_pagination(&mut source, &mut store, &config, stop).await
            };
            client.close();
            Ok::<_, AppError>(result?)
        })
        .await
    }

    pub async fn scrape(&self, options: &PageOptions) -> Result<()> {
        let config = apply_page_options(self.config.scrape.clone(), options);
        let query = load_query(options.query.as_deref(), DISCOVER_QUERY).await?;
        info!(max_pages = config.max_pages, batch_size = config.batch_size, "Fetching projects");

        let report = self.paginate(query, config, None).await?;
        print_report("Scrape complete", &report);
        Ok(())
    }

    pub async fn update(&self, options: &PageOptions) -> Result<()> {
        let config = apply_page_options(self.config.update.clone(), options);
        let query = load_query(options.query.as_deref(), NEWEST_QUERY).await?;

        let known = self.record_store().known_ids().await?;
        info!(known = known.len(), "Checking for new projects");
        let stop = move |edge: &Edge| match edge.id() {
            Some(id) if known.contains(id) => {
                let name = edge.node.as_ref().and_then(|n| n.name.as_deref());
                info!(id, name = name.unwrap_or(""), "Found existing project");
                true
            }
            _ => false,
        };

        let report = self.paginate(query, config, Some(&stop)).await?;
        print_report("Incremental update complete", &report);
        Ok(())
    }

    pub async fn enrich(&self, limit: Option<usize>, batch_size: Option<usize>) -> Result<()> {
        let mut config = self.config.enrich.clone();
        if limit.is_some() {
            config.limit = limit;
        }
        if let Some(batch_size) = batch_size {
            config.batch_size = batch_size;
        }
        let store = self.record_store();

        let report = self
            .with_client(|mut client| async move {
                let result = enrich_projects(&mut client, &store, &config).await;
                client.close();
                Ok::<_, AppError>(result?)
            })
            .await?;

        println!(
            "Enrichment complete: {} of {} projects enriched ({} missing, {} failed)",
            report.enriched, report.candidates, report.missing, report.failed
        );
        Ok(())
    }

    pub async fn filter_active(&self, output: Option<&Path>) -> Result<()> {
        let projects = self.record_store().load().await?;
        let active = active_projects(&projects, Utc::now().timestamp());

        let output = output.unwrap_or(self.config.storage.active_path.as_path());
        RecordStore::new(output).save(&active).await?;
        println!("Saved {} active projects to {}", active.len(), output.display());
        Ok(())
    }

    pub async fn currencies(&self) -> Result<()> {
        let projects = self.record_store().load().await?;
        let codes = currencies(&projects);
        if codes.is_empty() {
            println!("No currencies found");
            return Ok(());
        }
        println!("Currencies found:");
        for code in codes {
            match self.rates.rate(&code) {
                Some(rate) => println!("  {code}  1 {code} = {rate} USD"),
                None => println!("  {code}  (no USD rate)"),
            }
        }
        Ok(())
    }

    pub async fn auth(&self) -> Result<()> {
        let store = self.credential_store();
        SessionHandle::scoped(self.config.endpoint.clone(), |session| async move {
            let refresher = self.refresher(&session, store)?;
            if let Err(e) = refresher.refresh().await {
                if e.is_transient() {
                    warn!("Session refresh hit a transient failure; retrying later may succeed");
                }
                return Err(AppError::from(e));
            }
            Ok::<(), AppError>(())
        })
        .await?;

        println!(
            "Saved session credentials to {} and {}",
            self.config.storage.cookies_path.display(),
            self.config.storage.headers_path.display()
        );
        Ok(())
    }
}
