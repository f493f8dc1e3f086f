//! Request-triggered crawl → enrich → sink pipeline.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use jobsight_core::defaults::{
    CRAWL_MAX_PAGES, CRAWL_MAX_PAGES_LIMIT, SUMMARY_SAMPLE_SIZE,
};
use jobsight_core::{
    Classifier, CrawlRequest, CrawlSource, CrawlSummary, DocumentStore, EnrichedRecord, Error,
    Result, SinkRow, SinkWriter,
};

use crate::crawl::{CrawlConfig, Crawler};
use crate::enrichment::{EnrichmentBatchProcessor, EnrichmentConfig};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub crawl: CrawlConfig,
    pub enrichment: EnrichmentConfig,
    pub default_max_pages: u32,
    pub max_pages_limit: u32,
    pub sample_size: usize,
    /// Also insert postings into the primary store's `jobPostings` collection.
    pub persist_documents: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crawl: CrawlConfig::default(),
            enrichment: EnrichmentConfig::default(),
            default_max_pages: CRAWL_MAX_PAGES,
            max_pages_limit: CRAWL_MAX_PAGES_LIMIT,
            sample_size: SUMMARY_SAMPLE_SIZE,
            persist_documents: false,
        }
    }
}

impl PipelineConfig {
    /// Reads the crawl and enrichment variables plus:
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `CRAWL_PERSIST_DOCUMENTS` | `false` | Also write postings to the primary store |
    pub fn from_env() -> Self {
        let persist_documents = std::env::var("CRAWL_PERSIST_DOCUMENTS")
            .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
            .unwrap_or(false);
        Self {
            crawl: CrawlConfig::from_env(),
            enrichment: EnrichmentConfig::from_env(),
            persist_documents,
            ..Self::default()
        }
    }

    pub fn with_crawl(mut self, crawl: CrawlConfig) -> Self {
        self.crawl = crawl;
        self
    }

    pub fn with_enrichment(mut self, enrichment: EnrichmentConfig) -> Self {
        self.enrichment = enrichment;
        self
    }

    pub fn with_persist_documents(mut self, persist: bool) -> Self {
        self.persist_documents = persist;
        self
    }
}

/// Accepted parameters, defaults and limits, served by `GET /api/crawl`.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlUsage {
    pub method: &'static str,
    pub parameters: Vec<UsageParameter>,
    pub defaults: UsageDefaults,
    pub limits: UsageLimits,
    pub source: String,
    pub classifier: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageParameter {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageDefaults {
    pub max_pages: u32,
    pub page_size: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageLimits {
    pub max_pages: u32,
}

pub struct CrawlPipeline {
    crawler: Crawler,
    enrichment: EnrichmentBatchProcessor,
    sink: Arc<dyn SinkWriter>,
    documents: Option<Arc<dyn DocumentStore>>,
    classifier_name: String,
    config: PipelineConfig,
}

impl CrawlPipeline {
    pub fn new(
        source: Arc<dyn CrawlSource>,
        classifier: Arc<dyn Classifier>,
        sink: Arc<dyn SinkWriter>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            crawler: Crawler::new(source, config.crawl.clone()),
            classifier_name: classifier.model_name().to_string(),
            enrichment: EnrichmentBatchProcessor::new(classifier, config.enrichment.clone()),
            sink,
            documents: None,
            config,
        }
    }

    /// Primary store used when `persist_documents` is on.
    pub fn with_document_store(mut self, documents: Arc<dyn DocumentStore>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn usage(&self) -> CrawlUsage {
        CrawlUsage {
            method: "POST",
            parameters: vec![
                UsageParameter {
                    name: "keyword",
                    kind: "string",
                    required: true,
                    description: "Search keyword; must not be blank",
                },
                UsageParameter {
                    name: "max_pages",
                    kind: "integer",
                    required: false,
                    description: "Pages to crawl",
                },
            ],
            defaults: UsageDefaults {
                max_pages: self.config.default_max_pages,
                page_size: self.crawler.page_size(),
                batch_size: self.enrichment.batch_size(),
            },
            limits: UsageLimits {
                max_pages: self.config.max_pages_limit,
            },
            source: self.crawler.source_name().to_string(),
            classifier: self.classifier_name.clone(),
        }
    }

    /// Check the request and resolve `max_pages`.
    pub fn validate(&self, request: &CrawlRequest) -> Result<(String, u32)> {
        let keyword = request.keyword.trim();
        if keyword.is_empty() {
            return Err(Error::InvalidInput("keyword must not be empty".to_string()));
        }
        let max_pages = request.max_pages.unwrap_or(self.config.default_max_pages);
        if max_pages == 0 || max_pages > self.config.max_pages_limit {
            return Err(Error::InvalidInput(format!(
                "max_pages must be between 1 and {}",
                self.config.max_pages_limit
            )));
        }
        Ok((keyword.to_string(), max_pages))
    }

    pub async fn run(&self, request: CrawlRequest) -> Result<CrawlSummary> {
        let (keyword, max_pages) = self.validate(&request)?;
        let start = Instant::now();
        info!(
            subsystem = "crawl",
            component = "pipeline",
            op = "start",
            keyword = %keyword,
            max_pages,
            "Crawl pipeline started"
        );

        let crawled = self.crawler.crawl(&keyword, max_pages).await?;
        let report = self.enrichment.process(crawled.records).await;

        let mut sink_failures = 0usize;
        for record in &report.records {
            let row = SinkRow::from_enriched(record);
            if let Err(e) = self.sink.upsert(&row).await {
                sink_failures += 1;
                error!(
                    subsystem = "crawl",
                    component = "pipeline",
                    record_id = %record.raw.id,
                    row_key = %row.key,
                    error = %e,
                    "Sink write failed for job posting"
                );
            }
        }

        if self.config.persist_documents {
            self.persist(&report.records).await;
        }

        let summary = summarize(
            keyword,
            report.records,
            self.config.sample_size,
            crawled.pages_fetched,
            report.failed_batches,
            sink_failures,
        );

        info!(
            subsystem = "crawl",
            component = "pipeline",
            op = "complete",
            keyword = %summary.keyword,
            total = summary.total,
            enriched = summary.enriched,
            pages_fetched = summary.pages_fetched,
            failed_batches = summary.failed_batches,
            sink_failures = summary.sink_failures,
            duration_ms = start.elapsed().as_millis() as u64,
            "Crawl pipeline finished"
        );
        Ok(summary)
    }

    async fn persist(&self, records: &[EnrichedRecord]) {
        let Some(documents) = &self.documents else {
            warn!(
                subsystem = "crawl",
                component = "pipeline",
                "Document persistence enabled without a document store"
            );
            return;
        };
        for record in records {
            let result = match record.to_document() {
                Ok(doc) => documents.insert(doc).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                warn!(
                    subsystem = "crawl",
                    component = "pipeline",
                    record_id = %record.raw.id,
                    error = %e,
                    "Failed to persist job posting document"
                );
            }
        }
    }
}

fn summarize(
    keyword: String,
    records: Vec<EnrichedRecord>,
    sample_size: usize,
    pages_fetched: u32,
    failed_batches: usize,
    sink_failures: usize,
) -> CrawlSummary {
    let categories: BTreeSet<String> = records
        .iter()
        .filter_map(|r| r.category.clone())
        .collect();
    let confidences: Vec<f32> = records
        .iter()
        .filter(|r| r.analyzed)
        .filter_map(|r| r.category_confidence)
        .collect();
    let average_confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };

    CrawlSummary {
        keyword,
        total: records.len(),
        enriched: records.iter().filter(|r| r.analyzed).count(),
        sample: records.into_iter().take(sample_size).collect(),
        categories: categories.into_iter().collect(),
        average_confidence,
        pages_fetched,
        failed_batches,
        sink_failures,
    }
}
