//! HTTP client with retry and request spacing
//!
//! Provides the single outbound-call wrapper used by every component:
//! - Bounded retries with growing backoff on throttle responses
//! - Fixed short retry interval on transport failures
//! - `422` treated as a definitive end-of-data signal
//! - Minimum spacing between requests
//! - Credential injection as a query parameter

use super::rate_limit::RequestSpacer;
use crate::config::{ApiConfig, FeedConfig, HttpConfig};
use crate::error::{Error, Result};
use crate::types::BackoffType;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Something that can fetch and decode one JSON document
///
/// `Ok(None)` means the upstream definitively has nothing more for this
/// request (e.g. an out-of-range offset); it is not an error.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a URL (absolute, or relative to the fetcher's base URL)
    async fn fetch_json(&self, url: &str) -> Result<Option<Value>>;
}

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative request paths
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Total attempts per request
    pub max_retries: u32,
    /// Backoff shape for throttle responses
    pub backoff_type: BackoffType,
    /// First throttle wait
    pub initial_backoff: Duration,
    /// Increment per attempt (linear backoff)
    pub backoff_step: Duration,
    /// Upper bound for one throttle wait
    pub max_backoff: Duration,
    /// Fixed wait after a transport failure or 5xx
    pub transient_delay: Duration,
    /// Statuses treated as throttling
    pub throttle_statuses: Vec<u16>,
    /// Minimum spacing between requests (`None` = unpaced)
    pub min_request_interval: Option<Duration>,
    /// Headers sent on every request
    pub default_headers: BTreeMap<String, String>,
    /// Credential query parameter `(name, value)`
    pub credential: Option<(String, String)>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from_settings(&HttpConfig::default(), &ApiConfig::default())
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    /// Build from the file configuration sections
    pub fn from_settings(http: &HttpConfig, api: &ApiConfig) -> Self {
        Self {
            base_url: Some(api.base_url.clone()),
            timeout: Duration::from_secs(http.timeout_secs),
            max_retries: http.max_retries,
            backoff_type: http.backoff_type,
            initial_backoff: Duration::from_secs(http.rate_limit_base_secs),
            backoff_step: Duration::from_secs(http.rate_limit_step_secs),
            max_backoff: Duration::from_secs(http.rate_limit_max_secs),
            transient_delay: Duration::from_secs(http.transient_retry_secs),
            throttle_statuses: http.throttle_statuses.clone(),
            min_request_interval: (http.min_request_interval_ms > 0)
                .then(|| Duration::from_millis(http.min_request_interval_ms)),
            default_headers: api.headers.clone(),
            credential: None,
        }
    }

    /// Build for the cursor feed, which has its own host and headers
    pub fn from_feed_settings(http: &HttpConfig, feed: &FeedConfig) -> Self {
        Self {
            base_url: Some(feed.base_url.clone()),
            default_headers: feed.headers.clone(),
            ..Self::from_settings(http, &ApiConfig::default())
        }
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set total attempts per request
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set throttle backoff configuration
    pub fn backoff(
        mut self,
        backoff_type: BackoffType,
        initial: Duration,
        step: Duration,
        max: Duration,
    ) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.backoff_step = step;
        self.config.max_backoff = max;
        self
    }

    /// Set the transport-failure retry interval
    pub fn transient_delay(mut self, delay: Duration) -> Self {
        self.config.transient_delay = delay;
        self
    }

    /// Set statuses treated as throttling
    pub fn throttle_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.config.throttle_statuses = statuses;
        self
    }

    /// Set minimum spacing between requests
    pub fn min_request_interval(mut self, interval: Duration) -> Self {
        self.config.min_request_interval = Some(interval);
        self
    }

    /// Disable request spacing
    pub fn no_rate_limit(mut self) -> Self {
        self.config.min_request_interval = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Drop all default headers
    pub fn clear_headers(mut self) -> Self {
        self.config.default_headers.clear();
        self
    }

    /// Inject a credential query parameter on every request
    pub fn credential(mut self, param: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.credential = Some((param.into(), value.into()));
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP client with retry and request spacing
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    spacer: Option<RequestSpacer>,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let spacer = config.min_request_interval.and_then(RequestSpacer::new);

        Ok(Self {
            client,
            config,
            spacer,
        })
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Check if request spacing is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.spacer.is_some()
    }

    /// Fetch a URL with retries
    pub async fn get_json(&self, url: &str) -> Result<Option<Value>> {
        let full_url = self.build_url(url)?;
        let max_attempts = self.config.max_retries.max(1);

        for attempt in 0..max_attempts {
            let has_next = attempt + 1 < max_attempts;

            if let Some(ref spacer) = self.spacer {
                spacer.wait().await;
            }

            let mut req = self.client.get(&full_url);
            for (key, value) in &self.config.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let body = match response.text().await {
                            Ok(body) => body,
                            Err(e) => {
                                warn!(
                                    "Failed reading body of {full_url}, attempt {}/{max_attempts}: {e}",
                                    attempt + 1
                                );
                                if has_next {
                                    tokio::time::sleep(self.config.transient_delay).await;
                                }
                                continue;
                            }
                        };
                        debug!("GET {full_url} -> {}", status.as_u16());
                        let value = serde_json::from_str(&body).map_err(|e| {
                            Error::decode(format!("Invalid JSON from {full_url}: {e}"))
                        })?;
                        return Ok(Some(value));
                    }

                    if status == StatusCode::UNPROCESSABLE_ENTITY {
                        // Invalid pagination parameters: nothing more to read here
                        debug!("Upstream rejected request (422): {full_url}");
                        return Ok(None);
                    }

                    if self.is_throttle_status(status) {
                        let delay = self.calculate_backoff(attempt);
                        let throttled = Error::RateLimited {
                            status: status.as_u16(),
                            wait_secs: delay.as_secs(),
                        };
                        warn!("{throttled}, attempt {}/{max_attempts}", attempt + 1);
                        if has_next {
                            tokio::time::sleep(delay).await;
                        }
                        continue;
                    }

                    if status.is_server_error() {
                        warn!(
                            "Server error {}, attempt {}/{max_attempts}, retrying in {:?}",
                            status.as_u16(),
                            attempt + 1,
                            self.config.transient_delay
                        );
                        if has_next {
                            tokio::time::sleep(self.config.transient_delay).await;
                        }
                        continue;
                    }

                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::http_status(status.as_u16(), body));
                }
                Err(e) => {
                    if e.is_builder() {
                        return Err(Error::Http(e));
                    }
                    warn!(
                        "Connection error, attempt {}/{max_attempts}, retrying in {:?}: {e}",
                        attempt + 1,
                        self.config.transient_delay
                    );
                    if has_next {
                        tokio::time::sleep(self.config.transient_delay).await;
                    }
                }
            }
        }

        warn!("Giving up on {full_url} after {max_attempts} attempts");
        Err(Error::UpstreamUnavailable {
            url: full_url,
            attempts: max_attempts,
        })
    }

    /// Fetch a URL, treating an end-of-data rejection as an error
    pub async fn get_json_strict(&self, url: &str) -> Result<Value> {
        self.get_json(url)
            .await?
            .ok_or_else(|| Error::InvalidRequest {
                url: url.to_string(),
            })
    }

    /// Resolve a path against the base URL and inject the credential
    ///
    /// Absolute URLs (e.g. cursors) are kept byte-for-byte; the credential is
    /// only appended when the URL does not already carry it.
    pub fn build_url(&self, url: &str) -> Result<String> {
        let full = if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            match &self.config.base_url {
                Some(base) => {
                    let base = base.trim_end_matches('/');
                    let path = url.trim_start_matches('/');
                    format!("{base}/{path}")
                }
                None => url.to_string(),
            }
        };

        let Some((param, value)) = &self.config.credential else {
            return Ok(full);
        };

        let parsed = Url::parse(&full)?;
        if parsed.query_pairs().any(|(k, _)| k == param.as_str()) {
            return Ok(full);
        }

        let pair = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(param, value)
            .finish();
        let separator = match parsed.query() {
            Some(q) if !q.is_empty() => "&",
            Some(_) => "",
            None => "?",
        };
        Ok(format!("{full}{separator}{pair}"))
    }

    /// Calculate the throttle backoff for a zero-based attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff + self.config.backoff_step * attempt,
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.config.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.config.max_backoff)
    }

    fn is_throttle_status(&self, status: StatusCode) -> bool {
        self.config.throttle_statuses.contains(&status.as_u16())
    }
}

#[async_trait]
impl Fetcher for HttpClient {
    async fn fetch_json(&self, url: &str) -> Result<Option<Value>> {
        self.get_json(url).await
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.config.base_url)
            .field("max_retries", &self.config.max_retries)
            .field("has_credential", &self.config.credential.is_some())
            .field("spacer", &self.spacer)
            .finish_non_exhaustive()
    }
}
