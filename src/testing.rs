//! Test doubles shared by unit tests

use crate::error::Result;
use crate::http::Fetcher;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;
use url::Url;

type Handler = Box<dyn Fn(&str) -> Result<Option<Value>> + Send + Sync>;

/// Fetcher answering from a closure and recording every requested URL
pub(crate) struct FakeFetcher {
    handler: Handler,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub(crate) fn new(
        handler: impl Fn(&str) -> Result<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Option<Value>> {
        self.requests.lock().unwrap().push(url.to_string());
        (self.handler)(url)
    }
}

/// Parse a (possibly relative) request URL
pub(crate) fn parse(url: &str) -> Url {
    if url.starts_with("http") {
        Url::parse(url).unwrap()
    } else {
        Url::parse(&format!("http://fake.local{url}")).unwrap()
    }
}

/// Read a query parameter from a request URL
pub(crate) fn query(url: &str, key: &str) -> Option<String> {
    parse(url)
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Serve an offset listing the way the upstream does, rejecting offsets past the ceiling
pub(crate) fn offset_page(items: &[Value], url: &str, max_offset: u64) -> Option<Value> {
    let offset: u64 = query(url, "offset").and_then(|v| v.parse().ok()).unwrap_or(0);
    let limit: u64 = query(url, "limit").and_then(|v| v.parse().ok()).unwrap_or(12);
    if offset > max_offset {
        return None;
    }

    let ordered: Vec<Value> = if query(url, "sort").as_deref() == Some("-name") {
        items.iter().rev().cloned().collect()
    } else {
        items.to_vec()
    };

    let start = (offset as usize).min(ordered.len());
    let end = ((offset + limit) as usize).min(ordered.len());
    Some(json!({
        "results": ordered[start..end],
        "metadata": {"resultset": {"count": items.len(), "offset": offset, "limit": limit}}
    }))
}

/// `n` parent listing entries named `show-0000`..
pub(crate) fn shows(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({"show_alias": format!("show-{i:04}"), "name": format!("Show {i}")}))
        .collect()
}

/// An episode payload carrying a SoundCloud source
pub(crate) fn episode(show: &str, alias: &str) -> Value {
    json!({
        "episode_alias": alias,
        "show_alias": show,
        "name": format!("Episode {alias}"),
        "broadcast": "2024-03-01T10:00:00Z",
        "genres": [{"id": "g1", "value": "Ambient"}],
        "moods": [],
        "audio_sources": [
            {"source": "mixcloud", "url": format!("https://mixcloud.com/{alias}")},
            {"source": "soundcloud", "url": format!("https://soundcloud.com/nts/{alias}")}
        ],
        "media": {"picture_large": format!("https://img.example.com/{alias}-large.jpg")}
    })
}
