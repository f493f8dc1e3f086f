//! Batched classification with per-batch failure isolation.
//!
//! Records are split into fixed-size batches, one classifier call each. A
//! failing or timed-out batch passes its records through unenriched; the
//! output always has one entry per input record, in input order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use jobsight_core::defaults::{ENRICH_BATCH_DELAY_MS, ENRICH_BATCH_SIZE, ENRICH_BATCH_TIMEOUT_SECS};
use jobsight_core::{
    normalize, Classifier, EnrichedRecord, Enrichment, Error, Pacer, RawRecord, Result,
};

#[derive(Debug, Clone)]
pub struct EnrichmentConfig {
    /// Records per classifier call. Zero is treated as one.
    pub batch_size: usize,
    pub batch_timeout: Duration,
    /// Minimum spacing between classifier calls.
    pub batch_delay: Duration,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            batch_size: ENRICH_BATCH_SIZE,
            batch_timeout: Duration::from_secs(ENRICH_BATCH_TIMEOUT_SECS),
            batch_delay: Duration::from_millis(ENRICH_BATCH_DELAY_MS),
        }
    }
}

impl EnrichmentConfig {
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ENRICH_BATCH_SIZE` | `3` | Records per classifier call |
    /// | `ENRICH_BATCH_TIMEOUT_SECS` | `30` | Upper bound per call |
    /// | `ENRICH_BATCH_DELAY_MS` | `0` | Pause between calls |
    pub fn from_env() -> Self {
        let batch_size = std::env::var("ENRICH_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(ENRICH_BATCH_SIZE);
        let timeout_secs = std::env::var("ENRICH_BATCH_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(ENRICH_BATCH_TIMEOUT_SECS);
        let delay_ms = std::env::var("ENRICH_BATCH_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(ENRICH_BATCH_DELAY_MS);
        Self {
            batch_size: batch_size.max(1),
            batch_timeout: Duration::from_secs(timeout_secs),
            batch_delay: Duration::from_millis(delay_ms),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_batch_timeout(mut self, timeout: Duration) -> Self {
        self.batch_timeout = timeout;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }
}

/// Output of [`EnrichmentBatchProcessor::process`].
#[derive(Debug, Clone)]
pub struct EnrichmentReport {
    pub records: Vec<EnrichedRecord>,
    pub batches: usize,
    pub failed_batches: usize,
}

impl EnrichmentReport {
    pub fn enriched_count(&self) -> usize {
        self.records.iter().filter(|r| r.analyzed).count()
    }
}

pub struct EnrichmentBatchProcessor {
    classifier: Arc<dyn Classifier>,
    batch_size: usize,
    batch_timeout: Duration,
    pacer: Pacer,
}

impl EnrichmentBatchProcessor {
    pub fn new(classifier: Arc<dyn Classifier>, config: EnrichmentConfig) -> Self {
        Self {
            classifier,
            batch_size: config.batch_size.max(1),
            batch_timeout: config.batch_timeout,
            pacer: Pacer::new(config.batch_delay),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Classify `records` in batches. Never fails; classifier errors are
    /// logged and counted in the report.
    pub async fn process(&self, records: Vec<RawRecord>) -> EnrichmentReport {
        let start = Instant::now();
        let total = records.len();
        let mut out = Vec::with_capacity(total);
        let mut batches = 0usize;
        let mut failed_batches = 0usize;

        let mut remaining = records.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<RawRecord> = remaining.by_ref().take(self.batch_size).collect();
            batches += 1;
            self.pacer.acquire().await;

            match self.classify_batch(&batch).await {
                Ok(enrichments) => out.extend(self.merge(batch, enrichments)),
                Err(e) => {
                    failed_batches += 1;
                    warn!(
                        subsystem = "enrichment",
                        component = "batch_processor",
                        batch_index = batches,
                        batch_size = batch.len(),
                        error = %e,
                        "Classifier batch failed; passing records through"
                    );
                    out.extend(batch.into_iter().map(EnrichedRecord::plain));
                }
            }
        }

        let report = EnrichmentReport {
            records: out,
            batches,
            failed_batches,
        };
        info!(
            subsystem = "enrichment",
            component = "batch_processor",
            model = self.classifier.model_name(),
            record_count = total,
            enriched = report.enriched_count(),
            batches,
            failed_batches,
            duration_ms = start.elapsed().as_millis() as u64,
            "Enrichment finished"
        );
        report
    }

    async fn classify_batch(&self, batch: &[RawRecord]) -> Result<Vec<Enrichment>> {
        match tokio::time::timeout(self.batch_timeout, self.classifier.classify(batch)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Classifier(format!(
                "batch timed out after {}s",
                self.batch_timeout.as_secs_f32()
            ))),
        }
    }

    /// Pair each raw record with its enrichment: by echoed id first, then by
    /// normalized (title, company) among entries not yet claimed.
    fn merge(&self, batch: Vec<RawRecord>, enrichments: Vec<Enrichment>) -> Vec<EnrichedRecord> {
        let mut slots: Vec<Option<Enrichment>> = enrichments.into_iter().map(Some).collect();

        // Claim id matches before identity matching so a duplicate title
        // cannot steal another record's entry.
        let mut claimed: Vec<Option<Enrichment>> = batch
            .iter()
            .map(|raw| {
                slots
                    .iter()
                    .position(|slot| slot.as_ref().is_some_and(|e| e.id == Some(raw.id)))
                    .and_then(|i| slots[i].take())
            })
            .collect();

        for (raw, entry) in batch.iter().zip(claimed.iter_mut()) {
            if entry.is_some() {
                continue;
            }
            let identity = raw.identity();
            *entry = slots
                .iter()
                .position(|slot| {
                    slot.as_ref()
                        .is_some_and(|e| (normalize(&e.title), normalize(&e.company)) == identity)
                })
                .and_then(|i| slots[i].take());
        }

        for stray in slots.iter().flatten() {
            warn!(
                subsystem = "enrichment",
                component = "batch_processor",
                title = %stray.title,
                company = %stray.company,
                "Classifier returned an entry matching no record; dropped"
            );
        }

        batch
            .into_iter()
            .zip(claimed)
            .map(|(raw, entry)| match entry {
                Some(enrichment) => EnrichedRecord::enriched(raw, enrichment),
                None => {
                    debug!(
                        subsystem = "enrichment",
                        component = "batch_processor",
                        record_id = %raw.id,
                        "No enrichment for record"
                    );
                    EnrichedRecord::plain(raw)
                }
            })
            .collect()
    }
}
