//! End-to-end sync over in-memory stores: backfill, then live capture.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use serde_json::{json, Map, Value};

use jobsight_core::{
    Collection, CrawlRequest, Document, DocumentStore, EntityType, KeyValueStore,
};
use jobsight_db::{MemoryDocumentStore, MemoryKvStore, MemorySink};
use jobsight_inference::mock::MockClassifier;
use jobsight_jobs::{
    BackfillConfig, BackfillState, CrawlConfig, CrawlPipeline, EnrichmentConfig, ListenerConfig,
    PipelineConfig, RetryPolicy, SimulatedCrawlSource, SyncConfig, Synchronizer,
};

fn fields(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn seeker(id: &str, secs: i64) -> Document {
    Document::new(
        Collection::JobSeekers,
        id,
        Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap() + ChronoDuration::seconds(secs),
        fields(json!({"name": format!("Seeker {}", id), "email": format!("{}@example.com", id)})),
    )
}

fn config() -> SyncConfig {
    SyncConfig::default()
        .with_collections(vec![Collection::JobSeekers])
        .with_backfill(
            BackfillConfig::default()
                .with_record_delay(Duration::ZERO)
                .with_retry(RetryPolicy::new(2, Duration::from_millis(1))),
        )
        .with_listener(
            ListenerConfig::default()
                .with_retry(RetryPolicy::new(2, Duration::from_millis(1)))
                .with_pending_retry_interval(Duration::from_millis(20)),
        )
        .with_retry_interval(Duration::from_millis(20))
}

async fn wait_for<F: Fn() -> bool>(cond: F) {
    for _ in 0..300 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_backfill_then_live_capture() {
    let store = MemoryDocumentStore::new();
    let sink = MemorySink::new();
    let kv = Arc::new(MemoryKvStore::new());
    for i in 0..3 {
        store.insert(seeker(&format!("s-{}", i), i)).await.unwrap();
    }

    let sync = Synchronizer::new(
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
        kv.clone(),
        config(),
    );
    let handle = sync.start(&[Collection::JobSeekers]);

    wait_for(|| sink.rows(EntityType::JobSeeker).len() == 3).await;
    store.insert(seeker("s-live", 100)).await.unwrap();
    wait_for(|| sink.row(EntityType::JobSeeker, "s-live").is_some()).await;

    let mut status = handle.status().await;
    for _ in 0..300 {
        if status[0].watermark.as_deref() == Some("2026-02-01T09:01:40.000Z") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        status = handle.status().await;
    }
    assert_eq!(status.len(), 1);
    assert_eq!(status[0].backfill, BackfillState::Complete);
    assert_eq!(status[0].watermark.as_deref(), Some("2026-02-01T09:01:40.000Z"));
    // Snapshot replays of backfilled rows are filtered by the watermark.
    assert_eq!(status[0].listener.skipped, 3);
    assert_eq!(status[0].listener.forwarded, 1);

    handle.shutdown().await;
    assert!(handle.is_shutdown());
    assert_eq!(
        kv.get("backfill_completed:jobSeekers").await.unwrap().as_deref(),
        Some("true")
    );

    let row = sink.row(EntityType::JobSeeker, "s-live").unwrap();
    assert_eq!(row.get("email"), Some("s-live@example.com"));
}

#[tokio::test]
async fn test_restart_does_not_backfill_again() {
    let store = MemoryDocumentStore::new();
    let sink = MemorySink::new();
    let kv = Arc::new(MemoryKvStore::new());
    store.insert(seeker("s-1", 1)).await.unwrap();

    let first = Synchronizer::new(
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
        kv.clone(),
        config(),
    )
    .start(&[Collection::JobSeekers]);
    wait_for(|| sink.len() == 1).await;
    first.shutdown().await;
    let list_calls = store.list_calls();

    let second = Synchronizer::new(
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
        kv.clone(),
        config(),
    )
    .start(&[Collection::JobSeekers]);
    store.insert(seeker("s-2", 2)).await.unwrap();
    wait_for(|| sink.len() == 2).await;

    assert_eq!(store.list_calls(), list_calls);
    second.shutdown().await;
}

#[tokio::test]
async fn test_backfill_retries_until_store_is_available() {
    let store = MemoryDocumentStore::new();
    let sink = MemorySink::new();
    store.insert(seeker("s-1", 1)).await.unwrap();
    store.set_unavailable(true);

    let handle = Synchronizer::new(
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
        Arc::new(MemoryKvStore::new()),
        config(),
    )
    .start(&[Collection::JobSeekers]);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.is_empty());
    assert_eq!(handle.status().await[0].backfill, BackfillState::NotStarted);

    store.set_unavailable(false);
    wait_for(|| sink.len() == 1).await;
    handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_capture() {
    let store = MemoryDocumentStore::new();
    let sink = MemorySink::new();
    let handle = Synchronizer::new(
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
        Arc::new(MemoryKvStore::new()),
        config(),
    )
    .start(&[Collection::JobSeekers]);

    handle.shutdown().await;

    store.insert(seeker("after", 1)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_persisted_postings_sync_without_loss_or_drift() {
    let store = MemoryDocumentStore::new();
    let sink = MemorySink::new();
    let pipeline = CrawlPipeline::new(
        Arc::new(SimulatedCrawlSource::new()),
        Arc::new(MockClassifier::new()),
        Arc::new(sink.clone()),
        PipelineConfig::default()
            .with_persist_documents(true)
            .with_crawl(CrawlConfig::default().with_page_delay(Duration::ZERO))
            .with_enrichment(EnrichmentConfig::default().with_batch_delay(Duration::ZERO)),
    )
    .with_document_store(Arc::new(store.clone()));
    let crawl = |keyword: &str| CrawlRequest {
        keyword: keyword.to_string(),
        max_pages: Some(1),
    };

    pipeline.run(crawl("rust")).await.unwrap();
    let crawled = sink.rows(EntityType::JobPosting);
    assert_eq!(crawled.len(), store.count(Collection::JobPostings));

    let handle = Synchronizer::new(
        Arc::new(store.clone()),
        Arc::new(sink.clone()),
        Arc::new(MemoryKvStore::new()),
        config().with_collections(vec![Collection::JobPostings]),
    )
    .start(&[Collection::JobPostings]);

    let mut status = handle.status().await;
    for _ in 0..300 {
        if status[0].backfill == BackfillState::Complete && status[0].listener.active {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        status = handle.status().await;
    }
    assert_eq!(status[0].backfill, BackfillState::Complete);
    // Rows rebuilt from stored documents are identical to the pipeline's.
    assert_eq!(sink.rows(EntityType::JobPosting), crawled);

    // A whole page shares one scrape timestamp; every new posting is forwarded.
    let stored_before = store.count(Collection::JobPostings);
    pipeline.run(crawl("python")).await.unwrap();
    let added = store.count(Collection::JobPostings) - stored_before;
    assert!(added > 1);

    let mut forwarded = 0;
    for _ in 0..300 {
        forwarded = handle.status().await[0].listener.forwarded;
        if forwarded as usize == added {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(forwarded as usize, added);
    assert_eq!(
        sink.rows(EntityType::JobPosting).len(),
        store.count(Collection::JobPostings)
    );

    handle.shutdown().await;
}
