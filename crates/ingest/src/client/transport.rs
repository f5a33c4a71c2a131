//! Wire transport for GraphQL operations.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue, ORIGIN, REFERER};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::session::SessionHandle;
use crate::config::EndpointConfig;
use crate::credentials::{CSRF_HEADER, CredentialPair, SESSION_COOKIE};
use crate::error::Result;

/// One GraphQL operation, serialized as `{query, variables}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQuery {
    pub query: String,
    pub variables: Value,
}

impl GraphQuery {
    pub fn new(query: impl Into<String>, variables: Value) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }

    /// Operation name for logging: the text after `query`, or `anonymous`.
    pub fn operation_name(&self) -> &str {
        self.query
            .trim_start()
            .strip_prefix("query")
            .map(str::trim_start)
            .and_then(|rest| rest.split(|c: char| !c.is_alphanumeric() && c != '_').next())
            .filter(|name| !name.is_empty())
            .unwrap_or("anonymous")
    }
}

/// Status code and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Connection-level failure: no HTTP status was obtained.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid value for header {0}")]
    InvalidHeader(&'static str),

    #[error("Connection failed: {0}")]
    Connection(String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        query: &GraphQuery,
        credentials: &CredentialPair,
    ) -> std::result::Result<RawResponse, TransportError>;
}

/// POSTs operations to the GraphQL endpoint over the shared session, carrying
/// the session cookie and the CSRF header.
pub struct HttpTransport {
    session: Arc<SessionHandle>,
    graph_url: String,
    origin: String,
}

impl HttpTransport {
    pub fn new(session: Arc<SessionHandle>) -> Result<Self> {
        let config: &EndpointConfig = session.config();
        let graph_url = config.graph_url()?.to_string();
        let origin = config.origin_header();
        Ok(Self {
            session,
            graph_url,
            origin,
        })
    }

    fn headers(&self, credentials: &CredentialPair) -> std::result::Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            ORIGIN,
            HeaderValue::from_str(&self.origin).map_err(|_| TransportError::InvalidHeader("Origin"))?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{}/", self.origin))
                .map_err(|_| TransportError::InvalidHeader("Referer"))?,
        );

        if let Some(csrf) = credentials.csrf_token() {
            headers.insert(
                HeaderName::from_static("x-csrf-token"),
                HeaderValue::from_str(csrf).map_err(|_| TransportError::InvalidHeader(CSRF_HEADER))?,
            );
        }
        if let Some(session) = credentials.session_token() {
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&format!("{SESSION_COOKIE}={session}"))
                    .map_err(|_| TransportError::InvalidHeader("Cookie"))?,
            );
        }
        Ok(headers)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        query: &GraphQuery,
        credentials: &CredentialPair,
    ) -> std::result::Result<RawResponse, TransportError> {
        let client = self.session.client()?;
        let response = client
            .post(&self.graph_url)
            .headers(self.headers(credentials)?)
            .json(query)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(status, bytes = body.len(), "GraphQL response received");
        Ok(RawResponse { status, body })
    }
}
