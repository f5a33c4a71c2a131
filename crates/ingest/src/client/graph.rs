//! The authenticated request client and its retry state machine.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use super::error::ClientError;
use super::outcome::{GraphResponse, Outcome};
use super::rate_limit::RateLimiter;
use super::retry::RetryPolicy;
use super::session::SessionHandle;
use super::transport::{GraphQuery, Transport};
use crate::credentials::{CredentialPair, CredentialRefresher, CredentialStore};

/// Issues GraphQL operations with credentials attached, refreshing and
/// retrying per [`RetryPolicy`].
pub struct GraphClient {
    transport: Box<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    refresher: Arc<dyn CredentialRefresher>,
    limiter: RateLimiter,
    policy: RetryPolicy,
    session: Option<Arc<SessionHandle>>,
}

impl GraphClient {
    pub fn new(
        transport: impl Transport + 'static,
        store: Arc<dyn CredentialStore>,
        refresher: Arc<dyn CredentialRefresher>,
    ) -> Self {
        Self {
            transport: Box::new(transport),
            store,
            refresher,
            limiter: RateLimiter::unlimited(),
            policy: RetryPolicy::default(),
            session: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// Attach the session resource so [`close`](Self::close) can release it.
    pub fn with_session(mut self, session: Arc<SessionHandle>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Stored credentials, or a freshly derived pair when either half is missing.
    async fn credentials(&mut self) -> Result<CredentialPair, ClientError> {
        let pair = self.store.load().await;
        if pair.is_complete() {
            return Ok(pair);
        }
        info!("No usable stored credentials; deriving a fresh session");
        self.refresh().await
    }

    /// The session fetch hits the same site, so it is paced like any request.
    async fn refresh(&mut self) -> Result<CredentialPair, ClientError> {
        self.limiter.acquire().await;
        Ok(self.refresher.refresh().await?)
    }

    /// Run one operation to a terminal result.
    ///
    /// `Success` and `ProtocolErrors` return the payload. The three failure
    /// tracks retry until the shared attempt counter reaches the ceiling and
    /// then fail with the error matching the last outcome.
    #[instrument(skip_all, fields(operation = %query.operation_name()))]
    pub async fn request(&mut self, query: &GraphQuery) -> Result<GraphResponse, ClientError> {
        let max = self.policy.attempts();
        let mut attempt: u32 = 0;

        loop {
            let credentials = self.credentials().await?;
            self.limiter.acquire().await;

            let outcome = Outcome::classify(self.transport.send(query, &credentials).await);
            debug!(attempt = attempt + 1, max, outcome = outcome.label(), "Attempt finished");

            let last_attempt = attempt + 1 >= max;
            match outcome {
                Outcome::Success(response) => return Ok(response),
                Outcome::ProtocolErrors(response) => {
                    warn!(
                        count = response.errors.len(),
                        errors = %response.error_summary(),
                        "GraphQL returned errors"
                    );
                    return Ok(response);
                }
                Outcome::AuthRejected { status } => {
                    if last_attempt {
                        return Err(ClientError::AuthExhausted { attempts: max });
                    }
                    warn!(status, attempt = attempt + 1, max, "Credentials rejected; refreshing session");
                    self.store.clear().await?;
                    self.refresh().await?;
                }
                Outcome::RateLimited => {
                    if last_attempt {
                        return Err(ClientError::RetryExhausted { attempts: max });
                    }
                    let delay = self.policy.backoff_delay(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max,
                        delay_ms = delay.as_millis() as u64,
                        "429 Too Many Requests; backing off"
                    );
                    sleep(delay).await;
                }
                Outcome::TransportFailure(reason) => {
                    if last_attempt {
                        return Err(ClientError::TransportExhausted {
                            attempts: max,
                            reason,
                        });
                    }
                    let delay = self.policy.transport_delay();
                    warn!(
                        attempt = attempt + 1,
                        max,
                        delay_ms = delay.as_millis() as u64,
                        error = %reason,
                        "Request failed; retrying"
                    );
                    sleep(delay).await;
                }
            }

            attempt += 1;
        }
    }

    /// Release the session resource, if one is attached.
    pub fn close(self) {
        if let Some(session) = &self.session {
            session.release();
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::client::transport::{RawResponse, TransportError};
    use crate::credentials::{MemoryCredentialStore, MockCredentialRefresher, RefreshError};

    /// Replays canned responses and records the credentials of every call.
    /// Once the script runs out it keeps returning the fallback.
    pub(crate) struct ScriptedTransport {
        script: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
        fallback: RawResponse,
        pub(crate) seen: Arc<Mutex<Vec<CredentialPair>>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(script: Vec<Result<RawResponse, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback: RawResponse::new(429, ""),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn always(response: RawResponse) -> Self {
            Self {
                fallback: response,
                ..Self::new(Vec::new())
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            _query: &GraphQuery,
            credentials: &CredentialPair,
        ) -> Result<RawResponse, TransportError> {
            self.seen.lock().push(credentials.clone());
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Ok(self.fallback.clone()))
        }
    }

    /// Refresher honoring the persistence contract: every refresh saves a new pair.
    pub(crate) struct SavingRefresher {
        store: Arc<MemoryCredentialStore>,
        calls: AtomicU32,
    }

    impl SavingRefresher {
        pub(crate) fn new(store: Arc<MemoryCredentialStore>) -> Self {
            Self {
                store,
                calls: AtomicU32::new(0),
            }
        }

        pub(crate) fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl CredentialRefresher for SavingRefresher {
        async fn refresh(&self) -> Result<CredentialPair, RefreshError> {
            let n = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
            let pair = CredentialPair::new(format!("session-{n}"), format!("csrf-{n}"));
            self.store.save(&pair).await?;
            Ok(pair)
        }
    }

    fn ok_body() -> RawResponse {
        RawResponse::new(200, r#"{"data":{"project":{"id":"1"}}}"#)
    }

    fn query() -> GraphQuery {
        GraphQuery::new("query Project { project { id } }", json!({}))
    }

    fn stale_store() -> Arc<MemoryCredentialStore> {
        Arc::new(MemoryCredentialStore::with_pair(CredentialPair::new(
            "stale", "stale",
        )))
    }

    #[tokio::test]
    async fn test_success_returns_payload() {
        let store = stale_store();
        let refresher = Arc::new(SavingRefresher::new(Arc::clone(&store)));
        let mut client = GraphClient::new(
            ScriptedTransport::new(vec![Ok(ok_body())]),
            store,
            refresher.clone(),
        )
        .with_policy(RetryPolicy::immediate(5));

        let response = client.request(&query()).await.unwrap();
        assert_eq!(response.data["project"]["id"], "1");
        assert_eq!(refresher.calls(), 0);
    }

    #[tokio::test]
    async fn test_rate_limited_exhausts_after_max_attempts() {
        let transport = ScriptedTransport::always(RawResponse::new(429, ""));
        let seen = Arc::clone(&transport.seen);
        let store = stale_store();
        let refresher = Arc::new(SavingRefresher::new(Arc::clone(&store)));
        let mut client = GraphClient::new(transport, store, refresher)
            .with_policy(RetryPolicy::immediate(5));

        let err = client.request(&query()).await.unwrap_err();

        assert!(matches!(err, ClientError::RetryExhausted { attempts: 5 }));
        assert_eq!(seen.lock().len(), 5);
    }

    #[tokio::test]
    async fn test_auth_rejection_refreshes_and_recovers() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(403, "")), Ok(ok_body())]);
        let seen = Arc::clone(&transport.seen);
        let store = stale_store();
        let refresher = Arc::new(SavingRefresher::new(Arc::clone(&store)));
        let mut client = GraphClient::new(transport, store.clone(), refresher.clone())
            .with_policy(RetryPolicy::immediate(5));

        let response = client.request(&query()).await.unwrap();

        assert_eq!(response.data["project"]["id"], "1");
        assert_eq!(refresher.calls(), 1);
        let seen = seen.lock();
        assert_eq!(seen[0], CredentialPair::new("stale", "stale"));
        assert_eq!(seen[1], CredentialPair::new("session-1", "csrf-1"));
        assert_eq!(store.snapshot(), CredentialPair::new("session-1", "csrf-1"));
    }

    #[tokio::test]
    async fn test_auth_rejection_exhausts() {
        let store = stale_store();
        let refresher = Arc::new(SavingRefresher::new(Arc::clone(&store)));
        let mut client = GraphClient::new(
            ScriptedTransport::always(RawResponse::new(401, "")),
            store,
            refresher.clone(),
        )
        .with_policy(RetryPolicy::immediate(3));

        let err = client.request(&query()).await.unwrap_err();

        assert!(matches!(err, ClientError::AuthExhausted { attempts: 3 }));
        // No refresh after the final rejection.
        assert_eq!(refresher.calls(), 2);
    }

    #[tokio::test]
    async fn test_transport_failures_exhaust() {
        let script = (0..4)
            .map(|i| Err(TransportError::Connection(format!("reset {i}"))))
            .collect();
        let store = stale_store();
        let refresher = Arc::new(SavingRefresher::new(Arc::clone(&store)));
        let mut client = GraphClient::new(ScriptedTransport::new(script), store, refresher)
            .with_policy(RetryPolicy::immediate(4));

        let err = client.request(&query()).await.unwrap_err();

        match err {
            ClientError::TransportExhausted { attempts, reason } => {
                assert_eq!(attempts, 4);
                assert!(reason.contains("reset 3"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failure_tracks_share_one_counter() {
        let script = vec![
            Ok(RawResponse::new(429, "")),
            Err(TransportError::Connection("reset".into())),
            Ok(RawResponse::new(403, "")),
        ];
        let store = stale_store();
        let refresher = Arc::new(SavingRefresher::new(Arc::clone(&store)));
        let mut client = GraphClient::new(ScriptedTransport::new(script), store, refresher)
            .with_policy(RetryPolicy::immediate(3));

        let err = client.request(&query()).await.unwrap_err();

        assert!(matches!(err, ClientError::AuthExhausted { attempts: 3 }));
    }

    #[tokio::test]
    async fn test_protocol_errors_are_returned_not_raised() {
        let body = r#"{"data":{"project":null},"errors":[{"message":"Not found"}]}"#;
        let store = stale_store();
        let refresher = Arc::new(SavingRefresher::new(Arc::clone(&store)));
        let mut client = GraphClient::new(
            ScriptedTransport::new(vec![Ok(RawResponse::new(200, body))]),
            store,
            refresher,
        )
        .with_policy(RetryPolicy::immediate(5));

        let response = client.request(&query()).await.unwrap();
        assert_eq!(response.error_summary(), "Not found");
    }

    #[tokio::test]
    async fn test_missing_credentials_are_derived_first() {
        let mut refresher = MockCredentialRefresher::new();
        refresher
            .expect_refresh()
            .times(1)
            .returning(|| Ok(CredentialPair::new("fresh", "token")));
        let transport = ScriptedTransport::new(vec![Ok(ok_body())]);
        let seen = Arc::clone(&transport.seen);
        let mut client = GraphClient::new(
            transport,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(refresher),
        )
        .with_policy(RetryPolicy::immediate(5));

        client.request(&query()).await.unwrap();

        assert_eq!(seen.lock()[0], CredentialPair::new("fresh", "token"));
    }

    #[tokio::test]
    async fn test_refresh_failure_is_fatal() {
        let mut refresher = MockCredentialRefresher::new();
        refresher
            .expect_refresh()
            .times(1)
            .returning(|| Err(RefreshError::MissingCsrf));
        let transport = ScriptedTransport::new(vec![Ok(ok_body())]);
        let seen = Arc::clone(&transport.seen);
        let mut client = GraphClient::new(
            transport,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(refresher),
        );

        let err = client.request(&query()).await.unwrap_err();

        assert!(matches!(err, ClientError::Refresh(RefreshError::MissingCsrf)));
        assert!(seen.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_is_paced_by_rate_limiter() {
        let transport = ScriptedTransport::new(vec![Ok(RawResponse::new(403, "")), Ok(ok_body())]);
        let store = stale_store();
        let refresher = Arc::new(SavingRefresher::new(Arc::clone(&store)));
        let mut client = GraphClient::new(transport, store, refresher.clone())
            .with_policy(RetryPolicy::immediate(5))
            .with_rate_limiter(RateLimiter::new(Duration::from_secs(2)));

        let start = Instant::now();
        client.request(&query()).await.unwrap();

        // Rejected request, session fetch, retried request: two full intervals.
        assert_eq!(refresher.calls(), 1);
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_derive_is_paced_by_rate_limiter() {
        let store = Arc::new(MemoryCredentialStore::new());
        let refresher = Arc::new(SavingRefresher::new(Arc::clone(&store)));
        let mut client = GraphClient::new(
            ScriptedTransport::new(vec![Ok(ok_body())]),
            store,
            refresher.clone(),
        )
        .with_rate_limiter(RateLimiter::new(Duration::from_secs(2)));

        let start = Instant::now();
        client.request(&query()).await.unwrap();

        assert_eq!(refresher.calls(), 1);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
