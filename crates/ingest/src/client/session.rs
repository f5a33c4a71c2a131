//! The HTTP session resource.
//!
//! One [`SessionHandle`] owns at most one live `reqwest::Client`. It is built
//! lazily on first use and released explicitly via [`SessionHandle::release`],
//! when the handle is dropped, or at the end of [`SessionHandle::scoped`].

use std::future::Future;
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use crate::config::{EndpointConfig, ProxyConfig};

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate got there first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

fn apply_proxy_config(
    builder: reqwest::ClientBuilder,
    proxy_config: Option<&ProxyConfig>,
) -> reqwest::ClientBuilder {
    let Some(proxy_config) = proxy_config else {
        return builder;
    };

    match reqwest::Proxy::all(&proxy_config.url) {
        Ok(mut proxy) => {
            if let (Some(username), Some(password)) = (
                proxy_config.username.as_ref(),
                proxy_config.password.as_ref(),
            ) {
                proxy = proxy.basic_auth(username, password);
            }
            builder.proxy(proxy)
        }
        Err(error) => {
            warn!(
                proxy_url = %proxy_config.url,
                error = %error,
                "Invalid proxy URL; disabling proxy"
            );
            builder.no_proxy()
        }
    }
}

fn build_client(config: &EndpointConfig) -> Result<Client, reqwest::Error> {
    install_rustls_provider();

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&config.accept_language) {
        headers.insert(ACCEPT_LANGUAGE, value);
    }

    let mut builder = Client::builder()
        .user_agent(&config.user_agent)
        .default_headers(headers);
    if !config.request_timeout().is_zero() {
        builder = builder.timeout(config.request_timeout());
    }
    apply_proxy_config(builder, config.proxy.as_ref()).build()
}

/// Explicitly owned, lazily initialized HTTP session.
pub struct SessionHandle {
    config: EndpointConfig,
    client: Mutex<Option<Client>>,
}

impl SessionHandle {
    pub fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            client: Mutex::new(None),
        }
    }

    /// Run `f` with a fresh session and release it afterwards, on success and
    /// on failure alike.
    pub async fn scoped<F, Fut, T>(config: EndpointConfig, f: F) -> T
    where
        F: FnOnce(Arc<SessionHandle>) -> Fut,
        Fut: Future<Output = T>,
    {
        let handle = Arc::new(Self::new(config));
        let output = f(Arc::clone(&handle)).await;
        handle.release();
        output
    }

    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// The live client, building it on first use.
    pub fn client(&self) -> Result<Client, reqwest::Error> {
        let mut slot = self.client.lock();
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = build_client(&self.config)?;
        debug!(base_url = %self.config.base_url, "Opened HTTP session");
        *slot = Some(client.clone());
        Ok(client)
    }

    pub fn is_live(&self) -> bool {
        self.client.lock().is_some()
    }

    /// Close the live client, if any. A later [`client`](Self::client) call opens a new one.
    pub fn release(&self) {
        if self.client.lock().take().is_some() {
            info!("Released HTTP session");
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.release();
    }
}
