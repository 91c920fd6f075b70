use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use super::image::Image;
use super::proxy::ProxyConfig;

/// Browser-like identifying header sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";

/// Largest body accepted from a single retrieval (enclosures included).
const MAX_RESOURCE_SIZE: usize = 64 * 1024 * 1024; // 64MB

/// Reasons a retrieval produced nothing.
///
/// These never cross the [`Fetch`] contract: [`ResourceFetcher`] logs them
/// and hands the caller an empty result instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    #[error("Invalid proxy configuration: {0}")]
    Proxy(String),
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large")]
    ResponseTooLarge,
}

/// One blocking-from-the-caller's-view network retrieval.
///
/// Implementations never fail outward: any problem is logged and reported
/// as a zero-length body. Callers treat "empty" uniformly as "got nothing".
#[async_trait]
pub trait Fetch: Send + Sync + 'static {
    /// Retrieve `url`, routing through `proxy` when it is enabled.
    async fn fetch(&self, url: &str, proxy: &ProxyConfig) -> Vec<u8>;

    /// Convenience wrapper returning [`Image::empty`] on any failure,
    /// including payloads that are not images.
    async fn fetch_image(&self, url: &str, proxy: &ProxyConfig) -> Image {
        Image::from_bytes(self.fetch(url, proxy).await)
    }
}

/// Transport settings for [`ResourceFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub user_agent: String,
    /// Transport-level timeout. The fetcher itself adds no timeout of its own.
    pub timeout: Duration,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP implementation of [`Fetch`] on top of `reqwest`.
///
/// One `reqwest::Client` is built per distinct proxy setup and reused for
/// every later request through that proxy.
pub struct ResourceFetcher {
    settings: FetchSettings,
    clients: Mutex<HashMap<String, reqwest::Client>>,
}

impl ResourceFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        Self {
            settings,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    fn client_for(&self, proxy: &ProxyConfig) -> Result<reqwest::Client, FetchError> {
        let key = proxy.client_key();
        let mut clients = self
            .clients
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(client) = clients.get(&key) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder()
            .user_agent(self.settings.user_agent.as_str())
            .timeout(self.settings.timeout);

        if proxy.is_enabled() {
            let mut upstream = reqwest::Proxy::all(proxy.endpoint())
                .map_err(|e| FetchError::Proxy(e.to_string()))?;
            if proxy.has_credentials() {
                upstream = upstream.basic_auth(&proxy.username, proxy.password_str());
            }
            builder = builder.proxy(upstream);
        } else {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(FetchError::Network)?;
        clients.insert(key, client.clone());
        Ok(client)
    }

    /// The fallible core of [`Fetch::fetch`].
    pub async fn try_fetch(&self, url: &str, proxy: &ProxyConfig) -> Result<Vec<u8>, FetchError> {
        let parsed = url::Url::parse(url)?;
        match parsed.scheme() {
            "http" | "https" => {}
            scheme => return Err(FetchError::UnsupportedScheme(scheme.to_owned())),
        }

        let client = self.client_for(proxy)?;
        let response = client.get(parsed).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_RESOURCE_SIZE).await
    }
}

impl Default for ResourceFetcher {
    fn default() -> Self {
        Self::new(FetchSettings::default())
    }
}

#[async_trait]
impl Fetch for ResourceFetcher {
    async fn fetch(&self, url: &str, proxy: &ProxyConfig) -> Vec<u8> {
        match self.try_fetch(url, proxy).await {
            Ok(bytes) => {
                tracing::debug!(url = %url, bytes = bytes.len(), "Fetched resource");
                bytes
            }
            Err(e) => {
                tracing::warn!(url = %url, proxied = proxy.is_enabled(), error = %e, "Resource fetch failed");
                Vec::new()
            }
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    // Fast path: check Content-Length header
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
