//! Router behavior over in-memory stores and the mock classifier.

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use jobsight_api::{router, AppConfig, AppState};
use jobsight_core::{Collection, EntityType};
use jobsight_db::{MemoryDocumentStore, MemoryKvStore, MemorySink};
use jobsight_inference::mock::MockClassifier;
use jobsight_jobs::{
    BackfillConfig, CrawlConfig, CrawlPipeline, EnrichmentConfig, PipelineConfig,
    SimulatedCrawlSource, SyncConfig, Synchronizer,
};

struct TestApp {
    app: Router,
    sink: MemorySink,
    classifier: MockClassifier,
}

fn pipeline(source: SimulatedCrawlSource, classifier: &MockClassifier, sink: &MemorySink) -> CrawlPipeline {
    CrawlPipeline::new(
        Arc::new(source),
        Arc::new(classifier.clone()),
        Arc::new(sink.clone()),
        PipelineConfig::default()
            .with_crawl(CrawlConfig::default().with_page_delay(Duration::ZERO))
            .with_enrichment(EnrichmentConfig::default().with_batch_delay(Duration::ZERO)),
    )
}

fn test_app() -> TestApp {
    test_app_with(SimulatedCrawlSource::new())
}

fn test_app_with(source: SimulatedCrawlSource) -> TestApp {
    let sink = MemorySink::new();
    let classifier = MockClassifier::new();
    let state = AppState::new(Arc::new(pipeline(source, &classifier, &sink)));
    TestApp {
        app: router(state, &AppConfig::default()),
        sink,
        classifier,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_crawl(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/crawl")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_crawl_with_defaults() {
    let t = test_app();
    let (status, body) = send(&t.app, post_crawl(json!({"keyword": "developer"}))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["keyword"], "developer");
    assert_eq!(body["total"], 40);
    assert_eq!(body["enriched"], 40);
    assert_eq!(body["pages_fetched"], 2);
    assert_eq!(body["failed_batches"], 0);
    assert_eq!(body["sink_failures"], 0);
    assert_eq!(body["sample"].as_array().unwrap().len(), 5);
    assert!(!body["categories"].as_array().unwrap().is_empty());
    assert_eq!(t.classifier.call_count(), 14);
    assert!(!t.sink.rows(EntityType::JobPosting).is_empty());
}

#[tokio::test]
async fn test_blank_keyword_is_400() {
    let t = test_app();
    let (status, body) = send(&t.app, post_crawl(json!({"keyword": "  "}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("keyword"));
    assert_eq!(t.classifier.call_count(), 0);
}

#[tokio::test]
async fn test_missing_keyword_is_400_json() {
    let t = test_app();
    let (status, body) = send(&t.app, post_crawl(json!({"max_pages": 1}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_max_pages_over_limit_is_400() {
    let t = test_app();
    let (status, _) = send(
        &t.app,
        post_crawl(json!({"keyword": "rust", "max_pages": 50})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unavailable_source_hides_detail() {
    let t = test_app_with(SimulatedCrawlSource::new().with_failing_page(1));
    let (status, body) = send(&t.app, post_crawl(json!({"keyword": "rust"}))).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "job listing source unavailable");
}

#[tokio::test]
async fn test_usage_endpoint() {
    let t = test_app();
    let (status, body) = send(&t.app, get("/api/crawl")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["method"], "POST");
    assert_eq!(body["defaults"]["max_pages"], 2);
    assert_eq!(body["defaults"]["page_size"], 20);
    assert_eq!(body["defaults"]["batch_size"], 3);
    assert_eq!(body["limits"]["max_pages"], 10);
}

#[tokio::test]
async fn test_health() {
    let t = test_app();
    let (status, body) = send(&t.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["sync_enabled"], false);
}

#[tokio::test]
async fn test_sync_status_disabled() {
    let t = test_app();
    let (status, body) = send(&t.app, get("/api/sync/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);
    assert_eq!(body["collections"], json!([]));
}

#[tokio::test]
async fn test_sync_status_reports_collections() {
    let store = MemoryDocumentStore::new();
    let sink = MemorySink::new();
    let classifier = MockClassifier::new();
    let handle = Arc::new(
        Synchronizer::new(
            Arc::new(store.clone()),
            Arc::new(sink.clone()),
            Arc::new(MemoryKvStore::new()),
            SyncConfig::default()
                .with_backfill(BackfillConfig::default().with_record_delay(Duration::ZERO)),
        )
        .start(&[Collection::Employers, Collection::Portfolios]),
    );
    let state = AppState::new(Arc::new(pipeline(
        SimulatedCrawlSource::new(),
        &classifier,
        &sink,
    )))
    .with_sync(handle.clone());
    let app = router(state, &AppConfig::default());

    let mut body = Value::Null;
    for _ in 0..100 {
        let (status, b) = send(&app, get("/api/sync/status")).await;
        assert_eq!(status, StatusCode::OK);
        body = b;
        if body["collections"][0]["listener"]["active"] == true
            && body["collections"][1]["listener"]["active"] == true
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(body["enabled"], true);
    let collections = body["collections"].as_array().unwrap();
    assert_eq!(collections.len(), 2);
    assert_eq!(collections[0]["collection"], "employers");
    assert_eq!(collections[0]["backfill"], "complete");
    assert_eq!(collections[0]["watermark"], "1970-01-01T00:00:00.000Z");
    assert_eq!(collections[1]["collection"], "portfolios");

    handle.shutdown().await;
}
