use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ksr_ingest::client::RateLimitConfig;
use ksr_ingest::config::{EndpointConfig, ProxyConfig, StorageConfig};
use ksr_ingest::enrich::EnrichConfig;
use ksr_ingest::{PaginationConfig, RetryPolicy};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyConfig {
    /// USD per unit, overriding the built-in table.
    #[serde(default)]
    pub rates: HashMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default = "PaginationConfig::full_scrape")]
    pub scrape: PaginationConfig,
    #[serde(default = "PaginationConfig::incremental")]
    pub update: PaginationConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub currency: CurrencyConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: EndpointConfig::default(),
            storage: StorageConfig::default(),
            retry: RetryPolicy::default(),
            rate_limit: RateLimitConfig::default(),
            scrape: PaginationConfig::full_scrape(),
            update: PaginationConfig::incremental(),
            enrich: EnrichConfig::default(),
            currency: CurrencyConfig::default(),
        }
    }
}

impl AppConfig {
    /// `<config dir>/ksr/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("ksr").join("config.toml"))
    }

    /// Load from `path`, or from the default location when `path` is `None`.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (Some(path.to_path_buf()), true),
            None => (Self::default_path(), false),
        };
        let Some(path) = path else {
            return Ok(Self::default());
        };

        match std::fs::read_to_string(&path) {
            Ok(text) => {
                debug!(path = %path.display(), "Loaded configuration");
                Self::parse(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => Ok(Self::default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::Config(format!(
                "configuration file {} not found",
                path.display()
            ))),
            Err(e) => Err(e.into()),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, pages) in [("scrape", &self.scrape), ("update", &self.update)] {
            if pages.batch_size == 0 {
                return Err(AppError::Config(format!("{name}.batch_size must be at least 1")));
            }
        }
        if self.enrich.batch_size == 0 {
            return Err(AppError::Config("enrich.batch_size must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Replace the configured proxy with one given on the command line.
    pub fn override_proxy(
        &mut self,
        url: Option<String>,
        username: Option<String>,
        password: Option<String>,
    ) {
        if let Some(url) = url {
            self.endpoint.proxy = Some(ProxyConfig {
                url,
                username,
                password,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.scrape.max_pages, 1000);
        assert_eq!(config.update.batch_size, 20);
        assert_eq!(config.retry.max_retries, 5);
    }

    #[test]
    fn test_partial_sections_keep_other_defaults() {
        let config = AppConfig::parse(
            r#"
            [endpoint]
            proxy = { url = "http://127.0.0.1:8080" }

            [scrape]
            max_pages = 3

            [currency.rates]
            EUR = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(config.scrape.max_pages, 3);
        assert_eq!(config.scrape.batch_size, 50);
        assert_eq!(config.endpoint.base_url, "https://www.kickstarter.com");
        assert_eq!(config.endpoint.proxy.unwrap().url, "http://127.0.0.1:8080");
        assert_eq!(config.currency.rates.get("EUR"), Some(&1.5));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = AppConfig::parse("[update]\nbatch_size = 0\n").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        assert!(AppConfig::load(Some(&missing)).is_err());

        let present = temp.path().join("ksr.toml");
        std::fs::write(&present, "[rate_limit]\nmin_interval_ms = 250\n").unwrap();
        let config = AppConfig::load(Some(&present)).unwrap();
        assert_eq!(config.rate_limit.min_interval_ms, 250);
    }

    #[test]
    fn test_cli_proxy_override() {
        let mut config = AppConfig::default();
        config.override_proxy(Some("socks5://proxy:1080".to_string()), Some("u".into()), None);
        let proxy = config.endpoint.proxy.unwrap();
        assert_eq!(proxy.url, "socks5://proxy:1080");
        assert_eq!(proxy.username.as_deref(), Some("u"));
    }
}
