//! Paging behavior of the incremental loader.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use icy_gallery::{
    BootstrapPolicy, FetchError, LoadStatus, LoaderConfig, LoaderEvent, LoaderState, MediaRecord, PageLoader, PageQuery, RecordKey, SentinelProbe,
    VecSource, loader::MAX_PAGE_SIZE,
};

fn near() -> SentinelProbe {
    SentinelProbe {
        distance: 0.0,
        viewport_filled: false,
    }
}

fn near_filled() -> SentinelProbe {
    SentinelProbe {
        distance: 100.0,
        viewport_filled: true,
    }
}

fn loader_for<S: icy_gallery::PageSource<MediaRecord>>(source: Arc<S>, config: LoaderConfig) -> PageLoader<MediaRecord, S> {
    PageLoader::new(source, tokio::runtime::Handle::current(), config, PageQuery::new("a", ""))
}

fn paged(page_size: usize) -> LoaderConfig {
    LoaderConfig {
        page_size,
        ..Default::default()
    }
}

#[tokio::test]
async fn loads_until_an_empty_page() {
    let source = Arc::new(ScriptedSource::new());
    source.push_page("a", records(0..100), None);
    source.push_page("a", records(100..200), None);
    source.push_page("a", records(200..237), None);
    let mut loader = loader_for(source.clone(), paged(100));
    assert_eq!(loader.status(), LoadStatus::Ready);

    for expected in [100, 200, 237] {
        assert!(loader.maybe_load(near()));
        assert_eq!(loader.status(), LoadStatus::Loading);
        match loader.recv().await {
            Some(LoaderEvent::Appended { items, .. }) => assert_eq!(items.len(), expected),
            other => panic!("unexpected event {other:?}"),
        }
    }
    // a short page is not the end
    assert!(!loader.is_done());

    assert!(loader.maybe_load(near()));
    assert!(matches!(loader.recv().await, Some(LoaderEvent::Exhausted)));
    assert!(loader.is_done());
    assert_eq!(loader.status(), LoadStatus::Exhausted);

    assert!(!loader.maybe_load(near()));
    let offsets: Vec<usize> = source.calls().iter().map(|call| call.offset).collect();
    assert_eq!(offsets, vec![0, 100, 200, 237]);
}

#[tokio::test]
async fn one_request_at_a_time() {
    let source = Arc::new(ScriptedSource::new());
    source.push_page("a", records(0..10), None);
    let mut loader = loader_for(source.clone(), paged(10));

    assert!(loader.maybe_load(near()));
    assert!(!loader.maybe_load(near()));
    assert!(loader.is_loading());
    loader.recv().await;
    assert_eq!(source.call_count(), 1);
    assert_eq!(loader.fetch_count(), 1);
}

#[tokio::test]
async fn empty_first_page_means_empty() {
    let source = Arc::new(ScriptedSource::new());
    let mut loader = loader_for(source.clone(), paged(50));

    assert!(loader.maybe_load(near()));
    assert!(matches!(loader.recv().await, Some(LoaderEvent::Exhausted)));
    assert!(loader.is_done());
    assert_eq!(loader.status(), LoadStatus::Empty);
    assert!(!loader.maybe_load(near()));
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn duplicates_are_dropped() {
    let source = Arc::new(ScriptedSource::new());
    source.push_page("a", records(0..10), None);
    source.push_page("a", records(5..15), None);
    source.push_page("a", records(0..5), None);
    let mut loader = loader_for(source.clone(), paged(10));

    loader.maybe_load(near());
    loader.recv().await;
    loader.maybe_load(near());
    match loader.recv().await {
        Some(LoaderEvent::Appended { items, inserted }) => {
            assert_eq!(inserted, 5);
            assert_eq!(items.len(), 15);
        }
        other => panic!("unexpected event {other:?}"),
    }

    loader.maybe_load(near());
    match loader.recv().await {
        Some(LoaderEvent::Appended { items, inserted }) => {
            assert_eq!(inserted, 0);
            assert_eq!(items.len(), 15);
        }
        other => panic!("unexpected event {other:?}"),
    }
    // the offset follows what the source returned, duplicates included
    assert_eq!(loader.offset(), 25);
    assert!(!loader.is_done());
}

#[tokio::test]
async fn failure_waits_for_retry() {
    let source = Arc::new(ScriptedSource::new());
    source.push_error("a", FetchError::Network("offline".to_string()));
    source.push_page("a", records(0..10), None);
    let mut loader = loader_for(source.clone(), paged(10));

    loader.maybe_load(near());
    assert!(matches!(loader.recv().await, Some(LoaderEvent::Failed(FetchError::Network(_)))));
    assert_eq!(loader.state(), LoaderState::Failed);
    assert!(!loader.is_done());
    assert_eq!(loader.offset(), 0);
    match loader.status() {
        LoadStatus::Error(message) => assert!(message.contains("offline")),
        other => panic!("unexpected status {other:?}"),
    }
    assert!(!loader.maybe_load(near()));

    assert!(loader.retry());
    assert!(matches!(loader.recv().await, Some(LoaderEvent::Appended { inserted: 10, .. })));
    assert!(loader.last_error().is_none());
    let offsets: Vec<usize> = source.calls().iter().map(|call| call.offset).collect();
    assert_eq!(offsets, vec![0, 0]);
    assert!(!loader.retry());
}

#[tokio::test(start_paused = true)]
async fn reset_drops_responses_of_the_old_query() {
    let source = Arc::new(ScriptedSource::new().with_delay(Duration::from_millis(50)));
    source.push_page("a", records(0..5), None);
    source.push_page("b", records(100..103), None);
    let mut loader = loader_for(source.clone(), paged(10));

    assert!(loader.maybe_load(near()));
    let old_request = loader.current_request_id();
    let items = loader.reset(PageQuery::new("b", ""));
    assert!(items.is_empty());
    assert!(loader.current_request_id() > old_request);

    assert!(loader.maybe_load(near()));
    match loader.recv().await {
        Some(LoaderEvent::Appended { items, inserted }) => {
            assert_eq!(inserted, 3);
            let ids: Vec<_> = items.iter().filter_map(|record| record.id.clone()).collect();
            assert_eq!(ids, vec!["100", "101", "102"]);
        }
        other => panic!("unexpected event {other:?}"),
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(loader.poll().is_empty());
    assert_eq!(loader.items().len(), 3);
    assert_eq!(loader.query().scope, "b");
}

#[tokio::test]
async fn reset_forgets_seen_records() {
    let source = Arc::new(ScriptedSource::new());
    source.push_page("a", records(0..10), None);
    source.push_page("a", records(0..10), None);
    let mut loader = loader_for(source.clone(), paged(10));

    loader.maybe_load(near());
    loader.recv().await;
    loader.reset(PageQuery::new("a", ""));
    loader.maybe_load(near());
    assert!(matches!(loader.recv().await, Some(LoaderEvent::Appended { inserted: 10, .. })));
    assert_eq!(loader.offset(), 10);
}

#[tokio::test]
async fn bootstrap_until_filled() {
    let source = Arc::new(VecSource::new(records(0..100)));
    let mut loader = loader_for(source, paged(10));

    // the first page of a session is always allowed
    assert!(loader.maybe_load(near_filled()));
    loader.recv().await;

    assert!(!loader.maybe_load(near_filled()));
    assert!(loader.maybe_load(near()));
    loader.recv().await;

    loader.note_user_scroll();
    assert!(loader.maybe_load(near_filled()));
    loader.recv().await;
    assert!(!loader.maybe_load(near_filled()));
    assert_eq!(loader.items().len(), 30);
}

#[tokio::test]
async fn bootstrap_require_scroll() {
    let source = Arc::new(VecSource::new(records(0..100)));
    let config = LoaderConfig {
        page_size: 10,
        bootstrap: BootstrapPolicy::RequireScroll,
        ..Default::default()
    };
    let mut loader = loader_for(source, config);

    assert!(loader.maybe_load(near()));
    loader.recv().await;
    assert!(!loader.maybe_load(near()));
    loader.note_user_scroll();
    assert!(loader.maybe_load(near()));
}

#[tokio::test]
async fn bootstrap_always() {
    let source = Arc::new(VecSource::new(records(0..100)));
    let config = LoaderConfig {
        page_size: 10,
        bootstrap: BootstrapPolicy::Always,
        ..Default::default()
    };
    let mut loader = loader_for(source, config);

    assert!(loader.maybe_load(near_filled()));
    loader.recv().await;
    assert!(loader.maybe_load(near_filled()));
}

#[tokio::test]
async fn far_sentinel_does_not_load() {
    let source = Arc::new(VecSource::new(records(0..100)));
    let mut loader = loader_for(source, paged(10));

    let far = SentinelProbe {
        distance: 801.0,
        viewport_filled: false,
    };
    assert!(!loader.maybe_load(far));
    let edge = SentinelProbe {
        distance: 800.0,
        viewport_filled: false,
    };
    assert!(loader.maybe_load(edge));
}

#[tokio::test]
async fn total_is_only_advisory() {
    let source = Arc::new(ScriptedSource::new());
    source.push_page("a", records(0..10), Some(10));
    source.push_page("a", records(10..15), Some(10));
    let mut loader = loader_for(source.clone(), paged(10));

    loader.maybe_load(near());
    loader.recv().await;
    assert_eq!(loader.total(), Some(10));
    assert!(!loader.is_done());

    assert!(loader.maybe_load(near()));
    loader.recv().await;
    assert_eq!(loader.items().len(), 15);
}

#[tokio::test]
async fn page_size_is_clamped() {
    let source = Arc::new(ScriptedSource::new());
    let mut loader = loader_for(source.clone(), paged(10_000));
    loader.maybe_load(near());
    loader.recv().await;

    let mut tiny = loader_for(source.clone(), paged(0));
    tiny.maybe_load(near());
    tiny.recv().await;

    let limits: Vec<usize> = source.calls().iter().map(|call| call.limit).collect();
    assert_eq!(limits, vec![MAX_PAGE_SIZE, 1]);
}

#[tokio::test]
async fn removed_records_stay_out() {
    let source = Arc::new(ScriptedSource::new());
    source.push_page("a", records(0..10), None);
    source.push_page("a", records(3..4).into_iter().chain(records(10..11)).collect(), None);
    let mut loader = loader_for(source.clone(), paged(10));

    loader.maybe_load(near());
    loader.recv().await;

    let key = RecordKey::id("3");
    let items = loader.remove(&key).expect("record removed");
    assert_eq!(items.len(), 9);
    assert!(loader.remove(&key).is_none());

    loader.maybe_load(near());
    assert!(matches!(loader.recv().await, Some(LoaderEvent::Appended { inserted: 1, .. })));
    assert!(loader.items().iter().all(|record| record.id.as_deref() != Some("3")));
}

#[tokio::test]
async fn dispose_ignores_late_responses() {
    let source = Arc::new(ScriptedSource::new());
    source.push_page("a", records(0..10), None);
    let mut loader = loader_for(source.clone(), paged(10));

    loader.maybe_load(near());
    loader.dispose();
    loader.dispose();
    assert!(loader.recv().await.is_none());
    tokio::task::yield_now().await;
    assert!(loader.poll().is_empty());
    assert!(loader.items().is_empty());
    assert!(!loader.maybe_load(near()));
}
