//! Mock classifier for deterministic testing.
//!
//! Produces enrichments derived from each record's title, and can be told to
//! fail specific calls, stall, drop ids, reorder output or add stray entries
//! so the batch processor's matching and isolation paths can be exercised.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use jobsight_inference::mock::MockClassifier;
//!
//! let classifier = MockClassifier::new().fail_on_call(2);
//! // third classify() call returns Error::Classifier
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use jobsight_core::{Classifier, Enrichment, Error, RawRecord, Result, SalaryInfo};

/// Mock classifier for testing.
#[derive(Clone)]
pub struct MockClassifier {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    model: String,
    confidence: f32,
    failing_calls: HashSet<usize>,
    failing_titles: Vec<String>,
    latency_ms: u64,
    echo_ids: bool,
    reverse_output: bool,
    stray_entry: bool,
}

/// One recorded `classify` call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub record_ids: Vec<Uuid>,
    pub timestamp: std::time::Instant,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            model: "mock-classifier".to_string(),
            confidence: 0.8,
            failing_calls: HashSet::new(),
            failing_titles: Vec::new(),
            latency_ms: 0,
            echo_ids: true,
            reverse_output: false,
            stray_entry: false,
        }
    }
}

impl Default for MockClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClassifier {
    /// Create a new mock classifier with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).model = model.into();
        self
    }

    /// Confidence reported on every enrichment (not clamped here).
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        Arc::make_mut(&mut self.config).confidence = confidence;
        self
    }

    /// Fail the call with this zero-based index.
    pub fn fail_on_call(mut self, index: usize) -> Self {
        Arc::make_mut(&mut self.config).failing_calls.insert(index);
        self
    }

    /// Fail any batch containing a title with this substring.
    pub fn fail_when_title_contains(mut self, needle: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .failing_titles
            .push(needle.into());
        self
    }

    /// Sleep before answering.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Omit echoed ids so matching falls back to title and company.
    pub fn without_ids(mut self) -> Self {
        Arc::make_mut(&mut self.config).echo_ids = false;
        self
    }

    /// Return enrichments in reverse input order.
    pub fn reversed(mut self) -> Self {
        Arc::make_mut(&mut self.config).reverse_output = true;
        self
    }

    /// Append an enrichment that matches no input record.
    pub fn with_stray_entry(mut self) -> Self {
        Arc::make_mut(&mut self.config).stray_entry = true;
        self
    }

    fn calls(&self) -> MutexGuard<'_, Vec<MockCall>> {
        self.call_log.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls().clone()
    }

    /// Number of classify calls made.
    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    /// Category derived from a title.
    pub fn category_for(title: &str) -> &'static str {
        let title = title.to_lowercase();
        if title.contains("data") || title.contains("ml") {
            "Data & AI"
        } else if title.contains("developer") || title.contains("engineer") {
            "Software Engineering"
        } else if title.contains("designer") {
            "Design"
        } else if title.contains("marketing") {
            "Marketing"
        } else {
            "Other"
        }
    }

    fn enrichment_for(&self, record: &RawRecord) -> Enrichment {
        Enrichment {
            id: self.config.echo_ids.then_some(record.id),
            title: record.title.clone(),
            company: record.company.clone(),
            category: Self::category_for(&record.title).to_string(),
            category_confidence: self.config.confidence,
            skills: vec![format!("{} fundamentals", record.title)],
            requirements: vec!["2+ years experience".to_string()],
            benefits: vec!["remote friendly".to_string()],
            salary: Some(SalaryInfo {
                min: Some(40_000_000),
                max: Some(60_000_000),
                currency: Some("KRW".to_string()),
                period: Some("year".to_string()),
            }),
            model: self.config.model.clone(),
            analyzed_at: Utc::now(),
        }
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    async fn classify(&self, batch: &[RawRecord]) -> Result<Vec<Enrichment>> {
        let index = {
            let mut calls = self.calls();
            calls.push(MockCall {
                record_ids: batch.iter().map(|r| r.id).collect(),
                timestamp: std::time::Instant::now(),
            });
            calls.len() - 1
        };

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.config.failing_calls.contains(&index) {
            return Err(Error::Classifier(format!("mock failure on call {}", index)));
        }
        if batch.iter().any(|r| {
            self.config
                .failing_titles
                .iter()
                .any(|needle| r.title.contains(needle.as_str()))
        }) {
            return Err(Error::Classifier("mock failure on title".to_string()));
        }

        let mut out: Vec<Enrichment> = batch.iter().map(|r| self.enrichment_for(r)).collect();
        if self.config.reverse_output {
            out.reverse();
        }
        if let (true, Some(first)) = (self.config.stray_entry, batch.first()) {
            out.push(Enrichment {
                id: Some(Uuid::now_v7()),
                title: "Hallucinated Role".to_string(),
                company: "Nowhere Inc".to_string(),
                ..self.enrichment_for(first)
            });
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
