//! Credential error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while persisting credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CredentialError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while deriving a fresh credential pair.
#[derive(Debug, Error)]
pub enum RefreshError {
    /// The session cookie was not handed out by the site.
    #[error("Could not find {0} cookie")]
    MissingCookie(&'static str),

    /// The page carried no CSRF meta tag.
    #[error("Could not extract CSRF token")]
    MissingCsrf,

    #[error("Session derivation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Unexpected status {0} while deriving session")]
    Status(u16),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to persist refreshed credentials: {0}")]
    Store(#[from] CredentialError),
}

impl RefreshError {
    /// Check if this error is transient and a later attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Timeout(_) | Self::Status(500..=599))
    }
}
