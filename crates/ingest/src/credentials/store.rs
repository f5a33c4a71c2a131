//! Credential persistence.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::error::CredentialError;
use super::types::{CookieFile, CredentialPair, HeaderFile};
use crate::fs;

/// Pure storage for the current credential pair. No retry logic lives here.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Read the persisted pair. Missing or unparsable state yields an empty pair.
    async fn load(&self) -> CredentialPair;

    /// Persist both halves. Last writer wins.
    async fn save(&self, pair: &CredentialPair) -> Result<(), CredentialError>;

    /// Drop the persisted pair after the server rejected it.
    async fn clear(&self) -> Result<(), CredentialError>;
}

/// File-backed store using the cookie file / header file pair.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    cookies_path: PathBuf,
    headers_path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(cookies_path: impl Into<PathBuf>, headers_path: impl Into<PathBuf>) -> Self {
        Self {
            cookies_path: cookies_path.into(),
            headers_path: headers_path.into(),
        }
    }

    pub fn cookies_path(&self) -> &Path {
        &self.cookies_path
    }

    pub fn headers_path(&self) -> &Path {
        &self.headers_path
    }

    async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
        let text = match fs::read_optional(path).await {
            Ok(Some(text)) => text,
            Ok(None) => {
                debug!(path = %path.display(), "Credential file not found");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read credential file");
                return None;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unparsable credential file");
                None
            }
        }
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> CredentialPair {
        let cookie: Option<CookieFile> = Self::read_json(&self.cookies_path).await;
        let header: Option<HeaderFile> = Self::read_json(&self.headers_path).await;
        match (cookie, header) {
            (Some(cookie), Some(header)) => CredentialPair {
                session_token: cookie.session,
                csrf_token: header.csrf,
            },
            _ => CredentialPair::empty(),
        }
    }

    async fn save(&self, pair: &CredentialPair) -> Result<(), CredentialError> {
        let cookie = serde_json::to_vec_pretty(&CookieFile {
            session: pair.session_token.clone(),
        })?;
        let header = serde_json::to_vec_pretty(&HeaderFile {
            csrf: pair.csrf_token.clone(),
        })?;

        fs::write_atomic(&self.cookies_path, &cookie)
            .await
            .map_err(|e| CredentialError::io(&self.cookies_path, e))?;
        fs::write_atomic(&self.headers_path, &header)
            .await
            .map_err(|e| CredentialError::io(&self.headers_path, e))?;

        info!("Saved session cookie and CSRF token to disk");
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialError> {
        fs::remove_if_exists(&self.cookies_path)
            .await
            .map_err(|e| CredentialError::io(&self.cookies_path, e))?;
        fs::remove_if_exists(&self.headers_path)
            .await
            .map_err(|e| CredentialError::io(&self.headers_path, e))?;
        debug!("Cleared persisted credentials");
        Ok(())
    }
}

/// In-process store, for one-shot runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    pair: Mutex<CredentialPair>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: Mutex::new(pair),
        }
    }

    /// Current contents without going through the async trait.
    pub fn snapshot(&self) -> CredentialPair {
        self.pair.lock().clone()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> CredentialPair {
        self.snapshot()
    }

    async fn save(&self, pair: &CredentialPair) -> Result<(), CredentialError> {
        *self.pair.lock() = pair.clone();
        Ok(())
    }

    async fn clear(&self) -> Result<(), CredentialError> {
        *self.pair.lock() = CredentialPair::empty();
        Ok(())
    }
}
