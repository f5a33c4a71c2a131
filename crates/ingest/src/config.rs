//! Endpoint, proxy and storage configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

/// Where requests go and how the HTTP session is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Site origin, e.g. `https://www.kickstarter.com`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Path of the GraphQL endpoint relative to `base_url`.
    #[serde(default = "default_graph_path")]
    pub graph_path: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// Per-request timeout in seconds. `0` disables the timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Upper bound on deriving a fresh session.
    #[serde(default = "default_refresh_timeout_secs")]
    pub refresh_timeout_secs: u64,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

fn default_base_url() -> String {
    "https://www.kickstarter.com".to_string()
}

fn default_graph_path() -> String {
    "/graph".to_string()
}

fn default_user_agent() -> String {
    DEFAULT_UA.to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_refresh_timeout_secs() -> u64 {
    60
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            graph_path: default_graph_path(),
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            request_timeout_secs: default_request_timeout_secs(),
            refresh_timeout_secs: default_refresh_timeout_secs(),
            proxy: None,
        }
    }
}

impl EndpointConfig {
    /// Parsed site origin.
    pub fn origin(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| Error::config(format!("invalid base_url {:?}: {e}", self.base_url)))
    }

    /// Absolute GraphQL endpoint URL.
    pub fn graph_url(&self) -> Result<Url> {
        self.origin()?
            .join(&self.graph_path)
            .map_err(|e| Error::config(format!("invalid graph_path {:?}: {e}", self.graph_path)))
    }

    /// Origin without a trailing slash, as sent in the `Origin` header.
    pub fn origin_header(&self) -> String {
        self.base_url.trim_end_matches('/').to_string()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.refresh_timeout_secs)
    }
}

/// Outbound proxy for every request made through the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub url: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Locations of the durable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_projects_path")]
    pub projects_path: PathBuf,
    #[serde(default = "default_cookies_path")]
    pub cookies_path: PathBuf,
    #[serde(default = "default_headers_path")]
    pub headers_path: PathBuf,
    #[serde(default = "default_active_path")]
    pub active_path: PathBuf,
}

fn default_projects_path() -> PathBuf {
    PathBuf::from("projects.json")
}

fn default_cookies_path() -> PathBuf {
    PathBuf::from("cookies.json")
}

fn default_headers_path() -> PathBuf {
    PathBuf::from("headers.json")
}

fn default_active_path() -> PathBuf {
    PathBuf::from("active_projects.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            projects_path: default_projects_path(),
            cookies_path: default_cookies_path(),
            headers_path: default_headers_path(),
            active_path: default_active_path(),
        }
    }
}
