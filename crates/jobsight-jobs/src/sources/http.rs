//! Crawl source backed by a JSON listing endpoint.
//!
//! The endpoint is queried as `GET <base_url>?keyword=..&page=..&size=..` and
//! may answer with a bare array of listings or an object wrapping one under
//! `items`, `results` or `jobs`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use jobsight_core::defaults::CRAWL_HTTP_TIMEOUT_SECS;
use jobsight_core::{CrawlQuery, CrawlSource, Error, RawRecord, Result};

/// Configuration for [`HttpCrawlSource`].
#[derive(Debug, Clone)]
pub struct HttpSourceConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Tag stamped on produced records.
    pub source_name: String,
}

impl HttpSourceConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_seconds: CRAWL_HTTP_TIMEOUT_SECS,
            source_name: "http".to_string(),
        }
    }

    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CRAWL_SOURCE_URL` | (required) | Listing endpoint |
    /// | `CRAWL_HTTP_TIMEOUT_SECS` | `20` | Request timeout |
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("CRAWL_SOURCE_URL")
            .ok()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                Error::Config("CRAWL_SOURCE_URL is required when CRAWL_SOURCE=http".to_string())
            })?;
        let mut config = Self::new(base_url);
        config.timeout_seconds = std::env::var("CRAWL_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(CRAWL_HTTP_TIMEOUT_SECS);
        Ok(config)
    }

    pub fn with_timeout_seconds(mut self, secs: u64) -> Self {
        self.timeout_seconds = secs;
        self
    }

    pub fn with_source_name(mut self, name: impl Into<String>) -> Self {
        self.source_name = name.into();
        self
    }
}

/// Listing as returned by the endpoint. Only `title` and `company` are required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Listing {
    title: String,
    company: String,
    #[serde(default)]
    location: String,
    #[serde(default, alias = "salary")]
    salary_text: String,
    #[serde(default, alias = "employmentType")]
    work_type: String,
    #[serde(default)]
    url: String,
}

pub struct HttpCrawlSource {
    client: Client,
    config: HttpSourceConfig,
}

impl HttpCrawlSource {
    pub fn new(config: HttpSourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(HttpSourceConfig::from_env()?)
    }

    fn listings(body: Value) -> Result<Vec<Value>> {
        match body {
            Value::Array(items) => Ok(items),
            Value::Object(mut map) => ["items", "results", "jobs"]
                .iter()
                .find_map(|key| match map.remove(*key) {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                })
                .ok_or_else(|| {
                    Error::SourceUnavailable("listing response has no item array".to_string())
                }),
            _ => Err(Error::SourceUnavailable(
                "listing response is not a JSON array or object".to_string(),
            )),
        }
    }
}

#[async_trait]
impl CrawlSource for HttpCrawlSource {
    async fn fetch_page(&self, query: &CrawlQuery, page: u32) -> Result<Vec<RawRecord>> {
        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("keyword", query.keyword.clone()),
                ("page", page.to_string()),
                ("size", query.page_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("listing request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SourceUnavailable(format!(
                "listing endpoint returned {} for page {}",
                status, page
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::SourceUnavailable(format!("listing body is not JSON: {}", e)))?;

        let scraped_at = Utc::now();
        let mut records = Vec::new();
        for item in Self::listings(body)? {
            match serde_json::from_value::<Listing>(item) {
                Ok(listing) => records.push(RawRecord {
                    id: Uuid::now_v7(),
                    title: listing.title,
                    company: listing.company,
                    location: listing.location,
                    salary_text: listing.salary_text,
                    work_type: listing.work_type,
                    url: listing.url,
                    source: self.config.source_name.clone(),
                    scraped_at,
                }),
                Err(e) => warn!(
                    subsystem = "crawl",
                    component = "http_source",
                    page,
                    error = %e,
                    "Skipping malformed listing"
                ),
            }
        }

        debug!(
            subsystem = "crawl",
            component = "http_source",
            page,
            record_count = records.len(),
            "Fetched listing page"
        );
        Ok(records)
    }

    fn name(&self) -> &str {
        &self.config.source_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_listings_accepts_wrapped_and_bare() {
        assert_eq!(HttpCrawlSource::listings(json!([1, 2])).unwrap().len(), 2);
        assert_eq!(
            HttpCrawlSource::listings(json!({"results": [1]})).unwrap().len(),
            1
        );
        assert!(HttpCrawlSource::listings(json!({"data": [1]})).is_err());
        assert!(HttpCrawlSource::listings(json!("nope")).is_err());
    }

    #[test]
    fn test_listing_aliases() {
        let listing: Listing = serde_json::from_value(json!({
            "title": "Backend Developer",
            "company": "Acme",
            "salary": "100k",
            "employmentType": "Full-time"
        }))
        .unwrap();
        assert_eq!(listing.salary_text, "100k");
        assert_eq!(listing.work_type, "Full-time");
        assert!(listing.location.is_empty());
    }
}
