//! HttpCrawlSource against a mock listing endpoint.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jobsight_core::{CrawlQuery, CrawlSource, Error};
use jobsight_jobs::{CrawlConfig, Crawler, HttpCrawlSource, HttpSourceConfig};

fn source(server: &MockServer) -> HttpCrawlSource {
    HttpCrawlSource::new(
        HttpSourceConfig::new(format!("{}/listings", server.uri()))
            .with_timeout_seconds(5)
            .with_source_name("jobboard"),
    )
    .unwrap()
}

fn query() -> CrawlQuery {
    CrawlQuery {
        keyword: "rust".to_string(),
        page_size: 2,
    }
}

#[tokio::test]
async fn test_fetch_page_parses_wrapped_listings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listings"))
        .and(query_param("keyword", "rust"))
        .and(query_param("page", "1"))
        .and(query_param("size", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"title": "Backend Developer", "company": "Acme", "location": "Seoul",
                 "salaryText": "80k - 100k USD / year", "workType": "Full-time",
                 "url": "https://jobs.example.com/1"},
                {"title": "Data Engineer", "company": "Globex"},
                {"company": "missing title"}
            ]
        })))
        .mount(&server)
        .await;

    let records = source(&server).fetch_page(&query(), 1).await.unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].title, "Backend Developer");
    assert_eq!(records[0].salary_text, "80k - 100k USD / year");
    assert_eq!(records[0].source, "jobboard");
    assert_eq!(records[1].company, "Globex");
    assert_ne!(records[0].id, records[1].id);
}

#[tokio::test]
async fn test_non_success_status_is_source_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listings"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = source(&server).fetch_page(&query(), 1).await;
    assert!(matches!(result, Err(Error::SourceUnavailable(_))));
}

#[tokio::test]
async fn test_crawler_keeps_pages_before_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listings"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"title": "QA Engineer", "company": "Initech"},
            {"title": "Product Designer", "company": "Hooli"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/listings"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let crawler = Crawler::new(
        Arc::new(source(&server)),
        CrawlConfig::default()
            .with_page_size(2)
            .with_page_delay(Duration::ZERO),
    );
    let outcome = crawler.crawl("rust", 3).await.unwrap();

    assert_eq!(outcome.records.len(), 2);
    assert_eq!(outcome.pages_fetched, 1);
    assert!(outcome.aborted);
}
