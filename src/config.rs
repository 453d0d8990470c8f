//! Run configuration
//!
//! All settings have defaults matching the upstream's observed limits, so an
//! empty YAML document is a valid configuration.

use crate::error::{Error, Result};
use crate::types::{BackoffType, SortOrder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete harvest configuration loaded from YAML
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Upstream API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Fetch/retry settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Offset-paginated catalog settings
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Record extraction settings
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Cursor-paginated feed settings
    #[serde(default)]
    pub feed: FeedConfig,
}

impl HarvestConfig {
    /// Parse a configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Check values that would make pagination loop or stall
    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(Error::missing_field("api.base_url"));
        }
        if self.catalog.page_size == 0 {
            return Err(Error::config("catalog.page_size must be greater than 0"));
        }
        if self.feed.page_size == 0 {
            return Err(Error::config("feed.page_size must be greater than 0"));
        }
        if self.http.max_retries == 0 {
            return Err(Error::config("http.max_retries must be at least 1"));
        }
        if self.catalog.sort_orders.is_empty() {
            return Err(Error::config("catalog.sort_orders must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// API Config
// ============================================================================

/// Upstream API endpoints and request identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the catalog API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Headers sent on every request, verbatim
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,

    /// Query parameter carrying the client credential (e.g. "client_id")
    #[serde(default)]
    pub credential_param: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            headers: default_headers(),
            credential_param: None,
        }
    }
}

fn default_base_url() -> String {
    "https://www.nts.live/api/v2".to_string()
}

/// Browser-emulation headers the upstream expects
pub fn default_headers() -> BTreeMap<String, String> {
    [
        (
            "User-Agent",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
        ("Accept", "application/json"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Referer", "https://www.nts.live/"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

// ============================================================================
// HTTP Config
// ============================================================================

/// Retry and pacing configuration for the fetcher
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Total attempts per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff shape for throttle responses
    #[serde(default)]
    pub backoff_type: BackoffType,

    /// First throttle wait in seconds
    #[serde(default = "default_rate_limit_base")]
    pub rate_limit_base_secs: u64,

    /// Added per attempt (linear) in seconds
    #[serde(default = "default_rate_limit_step")]
    pub rate_limit_step_secs: u64,

    /// Upper bound for a single throttle wait in seconds
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max_secs: u64,

    /// Fixed wait after a transport failure, in seconds
    #[serde(default = "default_transient_retry")]
    pub transient_retry_secs: u64,

    /// Statuses treated as throttling
    #[serde(default = "default_throttle_statuses")]
    pub throttle_statuses: Vec<u16>,

    /// Minimum spacing between consecutive requests, in milliseconds
    #[serde(default = "default_min_request_interval")]
    pub min_request_interval_ms: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_type: BackoffType::default(),
            rate_limit_base_secs: default_rate_limit_base(),
            rate_limit_step_secs: default_rate_limit_step(),
            rate_limit_max_secs: default_rate_limit_max(),
            transient_retry_secs: default_transient_retry(),
            throttle_statuses: default_throttle_statuses(),
            min_request_interval_ms: default_min_request_interval(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_rate_limit_base() -> u64 {
    30
}

fn default_rate_limit_step() -> u64 {
    30
}

fn default_rate_limit_max() -> u64 {
    300
}

fn default_transient_retry() -> u64 {
    5
}

fn default_throttle_statuses() -> Vec<u16> {
    vec![429]
}

fn default_min_request_interval() -> u64 {
    1000
}

fn default_timeout() -> u64 {
    30
}

// ============================================================================
// Catalog Config
// ============================================================================

/// Offset-paginated parent/child catalog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Path of the parent listing endpoint
    #[serde(default = "default_parents_path")]
    pub parents_path: String,

    /// Path template of a parent's children; `{alias}` is replaced
    #[serde(default = "default_children_path")]
    pub children_path: String,

    /// Field holding a parent's alias
    #[serde(default = "default_alias_field")]
    pub alias_field: String,

    /// Field holding a parent's display name
    #[serde(default = "default_name_field")]
    pub name_field: String,

    /// Records per request; the upstream rejects larger pages
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Largest offset the upstream accepts
    #[serde(default = "default_max_offset")]
    pub max_offset: u32,

    /// Delay between parent listing pages, in milliseconds
    #[serde(default = "default_parent_page_delay")]
    pub parent_page_delay_ms: u64,

    /// Delay between child pages, in milliseconds
    #[serde(default = "default_child_page_delay")]
    pub child_page_delay_ms: u64,

    /// Listing passes used to reach parents beyond the offset ceiling
    #[serde(default = "default_sort_orders")]
    pub sort_orders: Vec<SortOrder>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            parents_path: default_parents_path(),
            children_path: default_children_path(),
            alias_field: default_alias_field(),
            name_field: default_name_field(),
            page_size: default_page_size(),
            max_offset: default_max_offset(),
            parent_page_delay_ms: default_parent_page_delay(),
            child_page_delay_ms: default_child_page_delay(),
            sort_orders: default_sort_orders(),
        }
    }
}

impl CatalogConfig {
    /// Delay between parent listing pages
    pub fn parent_page_delay(&self) -> Duration {
        Duration::from_millis(self.parent_page_delay_ms)
    }

    /// Delay between child pages
    pub fn child_page_delay(&self) -> Duration {
        Duration::from_millis(self.child_page_delay_ms)
    }

    /// Children path for a parent alias
    pub fn children_path_for(&self, alias: &str) -> String {
        self.children_path.replace("{alias}", alias)
    }
}

fn default_parents_path() -> String {
    "/shows".to_string()
}

fn default_children_path() -> String {
    "/shows/{alias}/episodes".to_string()
}

fn default_alias_field() -> String {
    "show_alias".to_string()
}

fn default_name_field() -> String {
    "name".to_string()
}

fn default_page_size() -> u32 {
    12
}

fn default_max_offset() -> u32 {
    1000
}

fn default_parent_page_delay() -> u64 {
    2000
}

fn default_child_page_delay() -> u64 {
    1000
}

fn default_sort_orders() -> Vec<SortOrder> {
    vec![SortOrder::Default, SortOrder::Param("-name".to_string())]
}

// ============================================================================
// Extract Config
// ============================================================================

/// Record extraction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Source-type tag a media entry must carry to be kept
    #[serde(default = "default_provider")]
    pub provider: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
        }
    }
}

fn default_provider() -> String {
    "soundcloud".to_string()
}

// ============================================================================
// Feed Config
// ============================================================================

/// Cursor-paginated feed configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Base URL of the feed API
    #[serde(default = "default_feed_base_url")]
    pub base_url: String,

    /// Path template of an account's items; `{account}` is replaced
    #[serde(default = "default_feed_path")]
    pub path: String,

    /// Path resolving a profile URL to the account's numeric id
    #[serde(default = "default_resolve_path")]
    pub resolve_path: String,

    /// Public profile URL prefix; `{profile_base}/{account}` is resolved
    #[serde(default = "default_profile_base")]
    pub profile_base: String,

    /// Headers sent on every feed request, verbatim
    #[serde(default = "default_feed_headers")]
    pub headers: BTreeMap<String, String>,

    /// Items per page
    #[serde(default = "default_feed_page_size")]
    pub page_size: u32,

    /// Delay between pages, in milliseconds
    #[serde(default = "default_feed_page_delay")]
    pub page_delay_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: default_feed_base_url(),
            path: default_feed_path(),
            resolve_path: default_resolve_path(),
            profile_base: default_profile_base(),
            headers: default_feed_headers(),
            page_size: default_feed_page_size(),
            page_delay_ms: default_feed_page_delay(),
        }
    }
}

impl FeedConfig {
    /// First-page URL for an account (before credential injection)
    pub fn initial_url(&self, account: &str) -> String {
        format!(
            "{}{}?limit={}&linked_partitioning=1",
            self.base_url.trim_end_matches('/'),
            self.path.replace("{account}", account),
            self.page_size
        )
    }

    /// Resolve URL for an account name (before credential injection)
    pub fn resolve_url(&self, account: &str) -> String {
        let profile = format!("{}/{}", self.profile_base.trim_end_matches('/'), account);
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("url", &profile)
            .finish();
        format!(
            "{}{}?{}",
            self.base_url.trim_end_matches('/'),
            self.resolve_path,
            query
        )
    }

    /// Delay between pages
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

fn default_feed_base_url() -> String {
    "https://api-v2.soundcloud.com".to_string()
}

fn default_feed_path() -> String {
    "/users/{account}/tracks".to_string()
}

fn default_resolve_path() -> String {
    "/resolve".to_string()
}

fn default_profile_base() -> String {
    "https://soundcloud.com".to_string()
}

/// Browser-emulation headers the feed upstream expects
pub fn default_feed_headers() -> BTreeMap<String, String> {
    [
        (
            "User-Agent",
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36",
        ),
        ("Accept", "application/json, text/javascript, */*; q=0.01"),
        ("Accept-Language", "en-US,en;q=0.9"),
        ("Referer", "https://soundcloud.com/"),
        ("Origin", "https://soundcloud.com"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_feed_page_size() -> u32 {
    50
}

fn default_feed_page_delay() -> u64 {
    2000
}
