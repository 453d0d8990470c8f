//! Tests for pagination module

use super::*;
use crate::decode::{PageDecoder, PageLayout, RawPage};
use crate::error::Error;
use crate::testing::{offset_page, query, FakeFetcher};
use crate::types::{ParentEntity, RawRecord};
use futures::TryStreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn numbered(n: usize) -> Vec<Value> {
    (0..n).map(|i| json!({"id": i})).collect()
}

fn page_of(n: usize, total: Option<u64>) -> RawPage {
    RawPage {
        items: (0..n).map(|i| RawRecord::new(json!({"id": i}), None)).collect(),
        reported_total: total,
        next_cursor: None,
    }
}

fn ids(records: &[RawRecord]) -> Vec<u64> {
    records
        .iter()
        .filter_map(|r| r.get("id").and_then(Value::as_u64))
        .collect()
}

// ============================================================================
// NextPage / PaginationState Tests
// ============================================================================

#[test]
fn test_next_page_predicates() {
    let next = NextPage::Continue(PageRequest::url("/shows?offset=12"));
    assert!(next.is_continue());
    assert!(!next.is_done());
    assert!(NextPage::Done.is_done());
}

#[test]
fn test_pagination_state_constructors() {
    let state = PaginationState::new();
    assert_eq!(state.offset, 0);
    assert!(state.cursor.is_none());
    assert!(!state.done);

    assert_eq!(PaginationState::at_offset(24).offset, 24);
    assert_eq!(
        PaginationState::from_cursor("https://api.example.com/next").cursor,
        Some("https://api.example.com/next".to_string())
    );
}

#[test]
fn test_unreachable_only_when_ceiling_reached() {
    let mut state = PaginationState::at_offset(1012);
    state.reported_total = Some(2000);
    assert_eq!(state.unreachable(), 0);

    state.ceiling_reached = true;
    assert_eq!(state.unreachable(), 988);
}

// ============================================================================
// OffsetPaginator Tests
// ============================================================================

#[test]
fn test_offset_url_for() {
    let paginator = OffsetPaginator::new("/shows", 12).with_param("sort", "-name");
    assert_eq!(paginator.url_for(24), "/shows?limit=12&offset=24&sort=-name");
}

#[test]
fn test_offset_reachable_window() {
    let paginator = OffsetPaginator::new("/shows", 12).with_max_offset(1000);
    assert_eq!(paginator.reachable_window(), Some(1012));
    assert_eq!(OffsetPaginator::new("/shows", 12).reachable_window(), None);
}

#[test]
fn test_offset_first_request_clamps_past_ceiling() {
    let paginator = OffsetPaginator::new("/shows", 12).with_max_offset(1000);

    let mut state = PaginationState::at_offset(1008);
    let request = paginator.first_request(&mut state).unwrap();
    assert_eq!(request.offset, Some(1000));
    assert_eq!(request.skip, 8);

    let mut state = PaginationState::at_offset(1012);
    assert!(paginator.first_request(&mut state).is_none());
    assert!(state.done);
    assert!(state.ceiling_reached);
}

#[test]
fn test_offset_stops_at_reported_total() {
    let paginator = OffsetPaginator::new("/shows", 12);
    let mut state = PaginationState::new();
    let request = paginator.first_request(&mut state).unwrap();

    let next = paginator.process_page(&page_of(12, Some(20)), &request, &mut state);
    let NextPage::Continue(next) = next else {
        panic!("Expected Continue");
    };
    assert_eq!(next.offset, Some(12));

    let done = paginator.process_page(&page_of(8, Some(20)), &next, &mut state);
    assert!(done.is_done());
    assert_eq!(state.offset, 20);
    assert_eq!(state.total_fetched, 20);
    assert!(!state.ceiling_reached);
}

#[test]
fn test_offset_stops_on_empty_page() {
    let paginator = OffsetPaginator::new("/shows", 12);
    let mut state = PaginationState::new();
    let request = paginator.first_request(&mut state).unwrap();

    let next = paginator.process_page(&page_of(0, None), &request, &mut state);
    assert!(next.is_done());
    assert!(state.done);
}

// ============================================================================
// Offset walks
// ============================================================================

#[tokio::test]
async fn test_offset_walk_reaches_exactly_the_window() {
    let items = numbered(2000);
    let fetcher = FakeFetcher::new(move |url| Ok(offset_page(&items, url, 1000)));
    let paginator = OffsetPaginator::new("/shows", 12).with_max_offset(1000);
    let decoder = PageDecoder::new(PageLayout::offset_results());

    let mut walker = PageWalker::new(&fetcher, &paginator, &decoder);
    let records = walker.collect_records().await.unwrap();

    let seen = ids(&records);
    let unique: HashSet<u64> = seen.iter().copied().collect();
    assert_eq!(seen.len(), 1012);
    assert_eq!(unique.len(), 1012);
    assert_eq!(seen.last(), Some(&1011));

    let state = walker.state();
    assert!(state.ceiling_reached);
    assert_eq!(state.total_fetched, 1012);
    assert_eq!(state.unreachable(), 988);

    // Never asked for an offset the upstream rejects
    let last = fetcher.requests().last().cloned().unwrap();
    assert_eq!(query(&last, "offset").as_deref(), Some("1000"));
}

#[tokio::test]
async fn test_offset_walk_short_listing() {
    let items = numbered(30);
    let fetcher = FakeFetcher::new(move |url| Ok(offset_page(&items, url, 1000)));
    let paginator = OffsetPaginator::new("/shows", 12).with_max_offset(1000);
    let decoder = PageDecoder::new(PageLayout::offset_results());

    let mut walker = PageWalker::new(&fetcher, &paginator, &decoder);
    let records = walker.collect_records().await.unwrap();

    assert_eq!(ids(&records), (0..30).collect::<Vec<u64>>());
    assert_eq!(fetcher.request_count(), 3);
    assert_eq!(walker.state().unreachable(), 0);
}

#[tokio::test]
async fn test_end_of_data_mid_walk_ends_normally() {
    let items = numbered(100);
    let fetcher = FakeFetcher::new(move |url| {
        if query(url, "offset").as_deref() == Some("24") {
            return Ok(None);
        }
        Ok(offset_page(&items, url, 1000))
    });
    let paginator = OffsetPaginator::new("/shows", 12);
    let decoder = PageDecoder::new(PageLayout::offset_results());

    let mut walker = PageWalker::new(&fetcher, &paginator, &decoder);
    let records = walker.collect_records().await.unwrap();

    assert_eq!(records.len(), 24);
    assert!(walker.state().done);
    assert!(walker.next_page().await.unwrap().is_none());
    assert_eq!(fetcher.request_count(), 3);
}

#[tokio::test]
async fn test_resume_from_offset() {
    let items = numbered(40);
    let fetcher = FakeFetcher::new(move |url| Ok(offset_page(&items, url, 1000)));
    let paginator = OffsetPaginator::new("/shows", 12);
    let decoder = PageDecoder::new(PageLayout::offset_results());

    let mut walker =
        PageWalker::new(&fetcher, &paginator, &decoder).resume_from(PaginationState::at_offset(24));
    let records = walker.collect_records().await.unwrap();

    assert_eq!(ids(&records), (24..40).collect::<Vec<u64>>());
    assert_eq!(query(&fetcher.requests()[0], "offset").as_deref(), Some("24"));
}

#[tokio::test]
async fn test_walker_attaches_parent() {
    let items = numbered(3);
    let fetcher = FakeFetcher::new(move |url| Ok(offset_page(&items, url, 1000)));
    let paginator = OffsetPaginator::new("/shows/x/episodes", 12);
    let decoder = PageDecoder::new(PageLayout::offset_results());
    let parent = ParentEntity::new("x", "Show X");

    let mut walker = PageWalker::new(&fetcher, &paginator, &decoder).with_parent(parent.clone());
    let records = walker.collect_records().await.unwrap();

    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r.parent.as_ref() == Some(&parent)));
}

#[tokio::test]
async fn test_fetch_error_retries_same_page() {
    let items = numbered(20);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let fetcher = FakeFetcher::new(move |url| {
        if query(url, "offset").as_deref() == Some("12")
            && counter.fetch_add(1, Ordering::SeqCst) == 0
        {
            return Err(Error::UpstreamUnavailable {
                url: url.to_string(),
                attempts: 5,
            });
        }
        Ok(offset_page(&items, url, 1000))
    });
    let paginator = OffsetPaginator::new("/shows", 12);
    let decoder = PageDecoder::new(PageLayout::offset_results());

    let mut walker = PageWalker::new(&fetcher, &paginator, &decoder);
    assert_eq!(walker.next_page().await.unwrap().unwrap().len(), 12);
    assert!(walker.next_page().await.is_err());

    let page = walker.next_page().await.unwrap().unwrap();
    assert_eq!(ids(&page.items), (12..20).collect::<Vec<u64>>());
    assert!(walker.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn test_into_stream_yields_pages() {
    let items = numbered(30);
    let fetcher = FakeFetcher::new(move |url| Ok(offset_page(&items, url, 1000)));
    let paginator = OffsetPaginator::new("/shows", 12);
    let decoder = PageDecoder::new(PageLayout::offset_results());

    let pages: Vec<RawPage> = PageWalker::new(&fetcher, &paginator, &decoder)
        .into_stream()
        .try_collect()
        .await
        .unwrap();

    let sizes: Vec<usize> = pages.iter().map(RawPage::len).collect();
    assert_eq!(sizes, vec![12, 12, 6]);
}

// ============================================================================
// Cursor walks
// ============================================================================

const FIRST: &str = "https://api.example.com/users/7/tracks?limit=50&linked_partitioning=1";
const SECOND: &str =
    "https://api.example.com/users/7/tracks?offset=AbC%2F%3D%3D&limit=50&linked_partitioning=1";
const THIRD: &str = "https://api.example.com/users/7/tracks?offset=Zz_-9&limit=50";

fn cursor_feed(url: &str) -> Option<Value> {
    let body = match url {
        FIRST => json!({"collection": [{"id": 1}, {"id": 2}], "next_href": SECOND}),
        SECOND => json!({"collection": [{"id": 3}], "next_href": THIRD}),
        THIRD => json!({"collection": [{"id": 4}], "next_href": null}),
        other => panic!("unexpected url {other}"),
    };
    Some(body)
}

#[tokio::test]
async fn test_cursor_replayed_verbatim() {
    let fetcher = FakeFetcher::new(|url| Ok(cursor_feed(url)));
    let paginator = CursorPaginator::new(FIRST);
    let decoder = PageDecoder::new(PageLayout::cursor_collection());

    let mut walker = PageWalker::new(&fetcher, &paginator, &decoder);
    let records = walker.collect_records().await.unwrap();

    assert_eq!(ids(&records), vec![1, 2, 3, 4]);
    assert_eq!(fetcher.requests(), vec![FIRST, SECOND, THIRD]);
    assert!(walker.state().cursor.is_none());
}

#[tokio::test]
async fn test_cursor_state_tracks_continuation() {
    let fetcher = FakeFetcher::new(|url| Ok(cursor_feed(url)));
    let paginator = CursorPaginator::new(FIRST);
    let decoder = PageDecoder::new(PageLayout::cursor_collection());

    let mut walker = PageWalker::new(&fetcher, &paginator, &decoder);
    walker.next_page().await.unwrap();
    assert_eq!(walker.state().cursor.as_deref(), Some(SECOND));
}

#[tokio::test]
async fn test_cursor_resume_from_stored_cursor() {
    let fetcher = FakeFetcher::new(|url| Ok(cursor_feed(url)));
    let paginator = CursorPaginator::new(FIRST);
    let decoder = PageDecoder::new(PageLayout::cursor_collection());

    let mut walker = PageWalker::new(&fetcher, &paginator, &decoder)
        .resume_from(PaginationState::from_cursor(SECOND));
    let records = walker.collect_records().await.unwrap();

    assert_eq!(ids(&records), vec![3, 4]);
    assert_eq!(fetcher.requests(), vec![SECOND, THIRD]);
}

#[tokio::test]
async fn test_cursor_self_reference_terminates() {
    let fetcher = FakeFetcher::new(|_| Ok(Some(json!({"collection": [{"id": 1}], "next_href": FIRST}))));
    let paginator = CursorPaginator::new(FIRST);
    let decoder = PageDecoder::new(PageLayout::cursor_collection());

    let mut walker = PageWalker::new(&fetcher, &paginator, &decoder);
    let records = walker.collect_records().await.unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(fetcher.request_count(), 1);
}
