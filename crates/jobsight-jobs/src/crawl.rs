//! Paged crawl driver.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use jobsight_core::defaults::{CRAWL_PAGE_DELAY_MS, CRAWL_PAGE_SIZE};
use jobsight_core::{CrawlQuery, CrawlSource, Error, Pacer, RawRecord, Result};

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub page_size: usize,
    /// Minimum spacing between page fetches.
    pub page_delay: Duration,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            page_size: CRAWL_PAGE_SIZE,
            page_delay: Duration::from_millis(CRAWL_PAGE_DELAY_MS),
        }
    }
}

impl CrawlConfig {
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CRAWL_PAGE_SIZE` | `20` | Records per page |
    /// | `CRAWL_PAGE_DELAY_MS` | `1000` | Pause between pages |
    pub fn from_env() -> Self {
        let page_size = std::env::var("CRAWL_PAGE_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(CRAWL_PAGE_SIZE);
        let delay_ms = std::env::var("CRAWL_PAGE_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(CRAWL_PAGE_DELAY_MS);
        Self {
            page_size,
            page_delay: Duration::from_millis(delay_ms),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }
}

/// Records gathered by one crawl.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub records: Vec<RawRecord>,
    pub pages_fetched: u32,
    /// Set when a page error cut the crawl short.
    pub aborted: bool,
}

/// Walks a source page by page.
pub struct Crawler {
    source: Arc<dyn CrawlSource>,
    pacer: Pacer,
    page_size: usize,
}

impl Crawler {
    pub fn new(source: Arc<dyn CrawlSource>, config: CrawlConfig) -> Self {
        Self {
            source,
            pacer: Pacer::new(config.page_delay),
            page_size: config.page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch pages `1..=max_pages`.
    ///
    /// Stops early on an empty page. A page error ends the crawl with what was
    /// collected so far; it is only returned as an error when nothing was.
    pub async fn crawl(&self, keyword: &str, max_pages: u32) -> Result<CrawlOutcome> {
        let query = CrawlQuery {
            keyword: keyword.trim().to_string(),
            page_size: self.page_size,
        };
        let start = Instant::now();
        let mut records = Vec::new();
        let mut pages_fetched = 0u32;
        let mut page_error = None;

        for page in 1..=max_pages {
            self.pacer.acquire().await;

            match self.source.fetch_page(&query, page).await {
                Ok(batch) if batch.is_empty() => break,
                Ok(batch) => {
                    pages_fetched += 1;
                    records.extend(batch);
                }
                Err(e) => {
                    warn!(
                        subsystem = "crawl",
                        component = "crawler",
                        source = self.source.name(),
                        page,
                        collected = records.len(),
                        error = %e,
                        "Page fetch failed; aborting remaining pages"
                    );
                    page_error = Some(e);
                    break;
                }
            }
        }

        if records.is_empty() {
            if let Some(e) = page_error {
                return Err(match e {
                    Error::SourceUnavailable(_) => e,
                    other => Error::SourceUnavailable(other.to_string()),
                });
            }
        }

        info!(
            subsystem = "crawl",
            component = "crawler",
            source = self.source.name(),
            keyword = %query.keyword,
            pages_fetched,
            record_count = records.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Crawl finished"
        );

        Ok(CrawlOutcome {
            records,
            pages_fetched,
            aborted: page_error.is_some(),
        })
    }
}
