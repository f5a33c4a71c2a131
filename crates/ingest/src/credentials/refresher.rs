//! Credential re-derivation.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{HeaderMap, SET_COOKIE};
use tracing::{debug, error, info, instrument};

use super::error::RefreshError;
use super::store::CredentialStore;
use super::types::{CredentialPair, SESSION_COOKIE};
use crate::client::SessionHandle;

static CSRF_META_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta\s+[^>]*name=["']csrf-token["'][^>]*content=["']([^"']+)["']"#).unwrap()
});

static CSRF_META_REVERSED_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<meta\s+[^>]*content=["']([^"']+)["'][^>]*name=["']csrf-token["']"#).unwrap()
});

/// Derives a fresh credential pair.
///
/// Implementations must persist the pair through [`CredentialStore::save`]
/// before returning it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh(&self) -> Result<CredentialPair, RefreshError>;
}

/// Derives credentials by loading the site home page over the shared session:
/// the session cookie comes from `Set-Cookie`, the CSRF token from the
/// `csrf-token` meta tag.
pub struct HttpSessionRefresher {
    session: Arc<SessionHandle>,
    store: Arc<dyn CredentialStore>,
    home_url: String,
    timeout: Duration,
}

impl HttpSessionRefresher {
    pub fn new(
        session: Arc<SessionHandle>,
        store: Arc<dyn CredentialStore>,
        home_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            session,
            store,
            home_url: home_url.into(),
            timeout,
        }
    }

    async fn derive(&self) -> Result<CredentialPair, RefreshError> {
        let client = self.session.client()?;
        let response = client.get(&self.home_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status(status.as_u16()));
        }

        let session = extract_session_cookie(response.headers())
            .ok_or(RefreshError::MissingCookie(SESSION_COOKIE))?;
        let body = response.text().await?;
        let csrf = extract_csrf_token(&body).ok_or(RefreshError::MissingCsrf)?;

        Ok(CredentialPair::new(session, csrf))
    }
}

#[async_trait]
impl CredentialRefresher for HttpSessionRefresher {
    #[instrument(skip(self), fields(url = %self.home_url))]
    async fn refresh(&self) -> Result<CredentialPair, RefreshError> {
        info!("Refreshing session credentials");

        let pair = match tokio::time::timeout(self.timeout, self.derive()).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                error!(error = %e, "Failed to refresh credentials");
                return Err(e);
            }
            Err(_) => {
                error!(timeout = ?self.timeout, "Timed out refreshing credentials");
                return Err(RefreshError::Timeout(self.timeout));
            }
        };

        self.store.save(&pair).await?;
        info!("Session refresh successful");
        Ok(pair)
    }
}

/// Find the session cookie among `Set-Cookie` response headers.
pub fn extract_session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, value)| name.trim() == SESSION_COOKIE && !value.trim().is_empty())
        .map(|(_, value)| {
            debug!("Received session cookie");
            value.trim().to_owned()
        })
}

/// Pull the CSRF token out of the page's `<meta name="csrf-token">` tag.
pub fn extract_csrf_token(html: &str) -> Option<String> {
    CSRF_META_REGEX
        .captures(html)
        .or_else(|| CSRF_META_REVERSED_REGEX.captures(html))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_owned())
}
