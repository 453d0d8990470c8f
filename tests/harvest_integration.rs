//! Integration tests using a mock HTTP server
//!
//! Tests the full end-to-end flow: mock API → HttpClient → Harvester → DuckDB

use catalog_harvest::config::HarvestConfig;
use catalog_harvest::engine::{HarvestReport, Harvester, NoopObserver};
use catalog_harvest::http::{HttpClient, HttpClientConfig};
use catalog_harvest::state::CheckpointManager;
use catalog_harvest::store::{DuckDbStore, RecordStore};
use catalog_harvest::types::SortOrder;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

// ============================================================================
// Mock Catalog
// ============================================================================

/// Serves `/shows` and `/shows/{alias}/episodes` with offset pagination
struct CatalogResponder {
    shows: Vec<(String, usize, bool)>,
}

impl CatalogResponder {
    /// (alias, episode count, hosted on soundcloud)
    fn new(shows: &[(&str, usize, bool)]) -> Self {
        Self {
            shows: shows
                .iter()
                .map(|(alias, n, hosted)| (alias.to_string(), *n, *hosted))
                .collect(),
        }
    }

    fn page(items: Vec<Value>, request: &Request) -> ResponseTemplate {
        let param = |key: &str| {
            request
                .url
                .query_pairs()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.parse::<usize>().ok())
        };
        let offset = param("offset").unwrap_or(0);
        let limit = param("limit").unwrap_or(12);
        if offset > 1000 {
            return ResponseTemplate::new(422);
        }

        let start = offset.min(items.len());
        let end = (offset + limit).min(items.len());
        ResponseTemplate::new(200).set_body_json(json!({
            "results": items[start..end],
            "metadata": {"resultset": {"count": items.len(), "offset": offset, "limit": limit}}
        }))
    }

    fn episodes(alias: &str, count: usize, hosted: bool) -> Vec<Value> {
        (0..count)
            .map(|i| {
                let source = if hosted { "soundcloud" } else { "mixcloud" };
                json!({
                    "episode_alias": format!("{alias}-ep-{i:02}"),
                    "name": format!("{alias} episode {i}"),
                    "broadcast": "2024-03-01T10:00:00Z",
                    "genres": [{"id": "g1", "value": "Ambient"}],
                    "audio_sources": [
                        {"source": source, "url": format!("https://{source}.com/{alias}/{i}")}
                    ]
                })
            })
            .collect()
    }
}

impl Respond for CatalogResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let segments: Vec<&str> = request.url.path().trim_matches('/').split('/').collect();
        match segments.as_slice() {
            ["shows"] => {
                let listing = self
                    .shows
                    .iter()
                    .map(|(alias, _, _)| json!({"show_alias": alias, "name": alias.to_uppercase()}))
                    .collect();
                Self::page(listing, request)
            }
            ["shows", alias, "episodes"] => match self.shows.iter().find(|(a, _, _)| a == alias) {
                Some((alias, count, hosted)) => {
                    Self::page(Self::episodes(alias, *count, *hosted), request)
                }
                None => ResponseTemplate::new(404),
            },
            _ => ResponseTemplate::new(404),
        }
    }
}

fn config_for(server: &MockServer) -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.api.base_url = server.uri();
    config.http.max_retries = 2;
    config.http.transient_retry_secs = 0;
    config.http.rate_limit_base_secs = 0;
    config.http.rate_limit_step_secs = 0;
    config.http.min_request_interval_ms = 0;
    config.catalog.parent_page_delay_ms = 0;
    config.catalog.child_page_delay_ms = 0;
    config.catalog.sort_orders = vec![SortOrder::Default];
    config.feed.base_url = server.uri();
    config.feed.page_size = 2;
    config.feed.page_delay_ms = 0;
    config
}

/// Client for feed requests, carrying the feed headers and a credential
fn feed_client(config: &HarvestConfig, client_id: &str) -> HttpClient {
    let mut http = HttpClientConfig::from_feed_settings(&config.http, &config.feed);
    http.credential = Some(("client_id".to_string(), client_id.to_string()));
    HttpClient::with_config(http).unwrap()
}

async fn run_catalog(config: &HarvestConfig, db: &Path) -> HarvestReport {
    let store = Arc::new(DuckDbStore::open(db).unwrap());
    let client =
        HttpClient::with_config(HttpClientConfig::from_settings(&config.http, &config.api)).unwrap();
    let checkpoints = CheckpointManager::new(store.clone());
    Harvester::new(Arc::new(client), store, checkpoints, config.clone())
        .with_observer(Arc::new(NoopObserver))
        .run_catalog()
        .await
        .unwrap()
}

// ============================================================================
// Catalog Harvest
// ============================================================================

#[tokio::test]
async fn test_catalog_harvest_into_duckdb() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(CatalogResponder::new(&[
            ("alpha", 3, true),
            ("bravo", 0, true),
            ("charlie", 14, true),
            ("delta", 1, false),
            ("echo", 2, true),
        ]))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let db = dir.path().join("harvest.duckdb");
    let config = config_for(&server);

    let report = run_catalog(&config, &db).await;
    assert!(report.completed);
    assert!(!report.cancelled);
    assert_eq!(report.stats.parents_examined, 5);
    assert_eq!(report.stats.parents_updated, 3);
    // delta is walked but none of its episodes qualify
    assert_eq!(report.stats.parents_up_to_date, 1);
    assert_eq!(report.stats.parents_empty, 1);
    assert_eq!(report.stats.records_written, 19);
    assert_eq!(report.stats.new_records, 19);
    assert_eq!(report.stats.unreachable, 0);
    assert_eq!(report.processed_count, 0);

    let store = DuckDbStore::open(&db).unwrap();
    assert_eq!(store.total_count().await.unwrap(), 19);
    let counts = store.counts_by_parent().await.unwrap();
    assert_eq!(counts.get("charlie"), Some(&14));
    assert_eq!(counts.get("delta"), None);

    let record = store.get("alpha-ep-01").await.unwrap().unwrap();
    assert_eq!(record.parent_alias.as_deref(), Some("alpha"));
    assert_eq!(record.parent_name.as_deref(), Some("ALPHA"));
    assert_eq!(record.media_url, "https://soundcloud.com/alpha/1");
}

#[tokio::test]
async fn test_catalog_rerun_is_idempotent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(CatalogResponder::new(&[
            ("alpha", 3, true),
            ("bravo", 0, true),
            ("charlie", 14, true),
            ("delta", 1, false),
        ]))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let db = dir.path().join("harvest.duckdb");
    let config = config_for(&server);

    let first = run_catalog(&config, &db).await;
    assert_eq!(first.stats.records_written, 17);

    let second = run_catalog(&config, &db).await;
    assert!(second.completed);
    // Nothing of delta qualifies, so it is walked again but gains nothing
    assert_eq!(second.stats.parents_up_to_date, 3);
    assert_eq!(second.stats.parents_empty, 1);
    assert_eq!(second.stats.parents_updated, 0);
    assert_eq!(second.stats.records_written, 0);
    assert_eq!(second.stats.new_records, 0);

    let store = DuckDbStore::open(&db).unwrap();
    assert_eq!(store.total_count().await.unwrap(), 17);
}

#[tokio::test]
async fn test_catalog_listing_unavailable_fails_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shows"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = config_for(&server);
    let store = Arc::new(DuckDbStore::open(dir.path().join("harvest.duckdb")).unwrap());
    let client =
        HttpClient::with_config(HttpClientConfig::from_settings(&config.http, &config.api)).unwrap();
    let checkpoints = CheckpointManager::new(store.clone());

    let err = Harvester::new(Arc::new(client), store, checkpoints, config)
        .with_observer(Arc::new(NoopObserver))
        .run_catalog()
        .await
        .unwrap_err();
    assert!(matches!(err, catalog_harvest::Error::Enumeration { .. }));
}

// ============================================================================
// Cursor Feed
// ============================================================================

#[tokio::test]
async fn test_feed_follows_cursor_with_credential() {
    let server = MockServer::start().await;
    let next = format!(
        "{}/users/42/tracks?offset=AbC%2F%3D%3D&limit=2&linked_partitioning=1",
        server.uri()
    );

    let first = json!({
        "collection": [
            {"id": 1, "title": "One", "permalink_url": "https://soundcloud.com/a/one",
             "genre": " Techno ", "tag_list": "dub \"deep house\"", "duration": 1000},
            {"id": 2, "title": "Two", "permalink_url": "https://soundcloud.com/a/two",
             "streamable": false}
        ],
        "next_href": next
    });
    let second = json!({
        "collection": [
            {"id": 3, "title": "Three", "permalink_url": "https://soundcloud.com/a/three",
             "created_at": "2013/03/07 18:34:38 +0000"}
        ],
        "next_href": null
    });

    Mock::given(method("GET"))
        .and(path("/users/42/tracks"))
        .and(header("Referer", "https://soundcloud.com/"))
        .respond_with(move |request: &Request| {
            let cursor = request.url.query_pairs().any(|(k, _)| k == "offset");
            ResponseTemplate::new(200).set_body_json(if cursor { &second } else { &first })
        })
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = config_for(&server);
    let store = Arc::new(DuckDbStore::open(dir.path().join("harvest.duckdb")).unwrap());
    let client = feed_client(&config, "secret");
    let checkpoints = CheckpointManager::new(store.clone());

    let report = Harvester::new(Arc::new(client), store.clone(), checkpoints, config)
        .with_observer(Arc::new(NoopObserver))
        .run_feed("42")
        .await
        .unwrap();

    assert!(report.completed);
    assert_eq!(report.stats.pages_fetched, 2);
    assert_eq!(report.stats.records_written, 3);
    assert_eq!(store.total_count().await.unwrap(), 3);

    let blocked = store.get("2").await.unwrap().unwrap();
    assert_eq!(blocked.is_streamable, Some(false));

    let track = store.get("1").await.unwrap().unwrap();
    assert_eq!(track.parent_alias.as_deref(), Some("42"));
    assert_eq!(track.duration_ms, Some(1000));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|r| r.url.query_pairs().any(|(k, v)| k == "client_id" && v == "secret")));
    // The cursor is replayed byte-for-byte
    assert!(requests[1].url.as_str().contains("offset=AbC%2F%3D%3D"));
}

#[tokio::test]
async fn test_feed_resolves_account_name_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/resolve"))
        .and(query_param("url", "https://soundcloud.com/nts-latest"))
        .and(query_param("client_id", "secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"kind": "user", "id": 995174173, "username": "nts-latest"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/995174173/tracks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "collection": [
                {"id": 10, "title": "Ten", "permalink_url": "https://soundcloud.com/nts-latest/ten",
                 "playback_count": 88}
            ],
            "next_href": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = config_for(&server);
    let store = Arc::new(DuckDbStore::open(dir.path().join("harvest.duckdb")).unwrap());
    let checkpoints = CheckpointManager::new(store.clone());

    let report = Harvester::new(
        Arc::new(feed_client(&config, "secret")),
        store.clone(),
        checkpoints.clone(),
        config,
    )
    .with_observer(Arc::new(NoopObserver))
    .run_feed("nts-latest")
    .await
    .unwrap();

    assert!(report.completed);
    assert_eq!(report.target, "feed:nts-latest");

    let track = store.get("10").await.unwrap().unwrap();
    assert_eq!(track.parent_alias.as_deref(), Some("995174173"));
    assert_eq!(track.play_count, Some(88));

    let stored = checkpoints.all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].identity.as_deref(), Some("995174173"));
}
