//! Live change capture for one collection.
//!
//! The listener consumes a snapshot-then-tail subscription and mirrors each
//! document newer than the collection's watermark into the sink, advancing
//! the watermark after every successful write.
//!
//! Records whose write keeps failing go to a bounded in-memory pending queue.
//! While anything is pending the persisted watermark stays put (so a restart
//! replays the pending records from the next snapshot); successes in the
//! meantime are remembered and applied once the queue drains. A full queue
//! ends the run with [`ListenerExit::Backlogged`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use jobsight_core::defaults::{LISTENER_MAX_PENDING, LISTENER_RETRY_INTERVAL_SECS};
use jobsight_core::{
    format_timestamp, ChangeSubscription, Collection, Document, Result, SinkRow, SinkWriter,
};

use crate::retry::{write_with_retry, RetryPolicy, WriteOutcome};
use crate::watermark::{Watermark, WatermarkStore};

/// Listener tuning.
#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Retry policy for each forward.
    pub retry: RetryPolicy,
    /// How often pending records are retried when no events arrive.
    pub pending_retry_interval: Duration,
    /// Pending records held before the run ends as backlogged.
    pub max_pending: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            pending_retry_interval: Duration::from_secs(LISTENER_RETRY_INTERVAL_SECS),
            max_pending: LISTENER_MAX_PENDING,
        }
    }
}

impl ListenerConfig {
    /// Retry settings come from [`RetryPolicy::from_env`], plus:
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `LISTENER_RETRY_INTERVAL_SECS` | `30` | Pending-queue retry tick |
    /// | `LISTENER_MAX_PENDING` | `1000` | Pending records before resubscribing |
    pub fn from_env() -> Self {
        let interval_secs = std::env::var("LISTENER_RETRY_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(LISTENER_RETRY_INTERVAL_SECS);
        let max_pending = std::env::var("LISTENER_MAX_PENDING")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(LISTENER_MAX_PENDING);
        Self {
            retry: RetryPolicy::from_env(),
            pending_retry_interval: Duration::from_secs(interval_secs),
            max_pending,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pending_retry_interval(mut self, interval: Duration) -> Self {
        self.pending_retry_interval = interval;
        self
    }

    /// Clamped to at least one.
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(1);
        self
    }
}

/// Counters exposed through sync status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListenerStats {
    /// Whether a subscription is currently being consumed.
    pub active: bool,
    pub forwarded: u64,
    pub skipped: u64,
    /// Forwards that exhausted their retries (including later-recovered ones).
    pub failed: u64,
    pub pending: usize,
}

/// Why [`ChangeCaptureListener::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerExit {
    Cancelled,
    /// The subscription ended; the owner should resubscribe.
    FeedEnded,
    /// The pending queue filled up. The watermark is still held below every
    /// parked record, so the owner resubscribes later and the snapshot
    /// replays them.
    Backlogged,
}

/// Per-run state; rebuilt from the persisted watermark on every subscription.
struct RunState {
    position: Watermark,
    pending: VecDeque<Document>,
    /// Successful forwards not yet reflected in the watermark.
    deferred: Option<Watermark>,
}

impl RunState {
    fn defer(&mut self, doc: &Document) {
        match &mut self.deferred {
            Some(w) => {
                w.absorb(doc.created_at, &doc.id);
            }
            None => self.deferred = Some(Watermark::single(doc.created_at, doc.id.clone())),
        }
    }
}

/// Result of handling one event.
enum Step {
    Continue,
    Cancelled,
    Backlogged,
}

/// Mirrors one collection's additions into the sink.
pub struct ChangeCaptureListener {
    collection: Collection,
    watermarks: WatermarkStore,
    sink: Arc<dyn SinkWriter>,
    config: ListenerConfig,
    stats: Arc<Mutex<ListenerStats>>,
}

impl ChangeCaptureListener {
    pub fn new(
        collection: Collection,
        watermarks: WatermarkStore,
        sink: Arc<dyn SinkWriter>,
        config: ListenerConfig,
    ) -> Self {
        Self {
            collection,
            watermarks,
            sink,
            config,
            stats: Arc::new(Mutex::new(ListenerStats::default())),
        }
    }

    pub fn collection(&self) -> Collection {
        self.collection
    }

    fn stats_mut(&self) -> MutexGuard<'_, ListenerStats> {
        self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> ListenerStats {
        self.stats_mut().clone()
    }

    /// Consume `subscription` until it ends, `cancel` fires, or the pending
    /// queue reaches `max_pending`.
    ///
    /// Errors only when the starting watermark cannot be read; individual
    /// forward failures are logged and never end the run.
    pub async fn run(
        &self,
        mut subscription: ChangeSubscription,
        cancel: &CancellationToken,
    ) -> Result<ListenerExit> {
        let mut state = RunState {
            position: self.watermarks.position(self.collection).await?,
            pending: VecDeque::new(),
            deferred: None,
        };

        info!(
            subsystem = "sync",
            component = "listener",
            collection = %self.collection,
            watermark = %format_timestamp(&state.position.at),
            "Change capture listener started"
        );
        self.stats_mut().active = true;

        let mut tick = tokio::time::interval(self.config.pending_retry_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick.tick().await;

        let exit = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break ListenerExit::Cancelled,
                _ = tick.tick(), if !state.pending.is_empty() => {
                    if !self.retry_pending(&mut state, cancel).await {
                        break ListenerExit::Cancelled;
                    }
                }
                event = subscription.next() => {
                    let Some(doc) = event else {
                        break ListenerExit::FeedEnded;
                    };
                    if !self.retry_pending(&mut state, cancel).await {
                        break ListenerExit::Cancelled;
                    }
                    match self.handle(doc, &mut state, cancel).await {
                        Step::Continue => {}
                        Step::Cancelled => break ListenerExit::Cancelled,
                        Step::Backlogged => break ListenerExit::Backlogged,
                    }
                }
            }
        };

        subscription.unsubscribe();
        {
            let mut stats = self.stats_mut();
            stats.active = false;
            stats.pending = 0;
        }
        if !state.pending.is_empty() {
            warn!(
                subsystem = "sync",
                component = "listener",
                collection = %self.collection,
                pending = state.pending.len(),
                "Listener stopped with unsynced records; they replay on next subscription"
            );
        }
        info!(
            subsystem = "sync",
            component = "listener",
            collection = %self.collection,
            exit = ?exit,
            "Change capture listener stopped"
        );
        Ok(exit)
    }

    /// Process one delivered document.
    async fn handle(&self, doc: Document, state: &mut RunState, cancel: &CancellationToken) -> Step {
        if state.position.covers(doc.created_at, &doc.id) {
            debug!(
                subsystem = "sync",
                component = "listener",
                collection = %self.collection,
                record_id = %doc.id,
                "Already covered by watermark"
            );
            self.stats_mut().skipped += 1;
            return Step::Continue;
        }

        let row = SinkRow::from_document(&doc);
        match write_with_retry(self.sink.as_ref(), &row, self.config.retry, cancel).await {
            WriteOutcome::Cancelled => Step::Cancelled,
            WriteOutcome::Written => {
                self.stats_mut().forwarded += 1;
                if state.pending.is_empty() {
                    self.advance(state, Watermark::single(doc.created_at, doc.id)).await;
                } else {
                    state.defer(&doc);
                }
                Step::Continue
            }
            WriteOutcome::Failed(e) => {
                error!(
                    subsystem = "sync",
                    component = "listener",
                    collection = %self.collection,
                    record_id = %doc.id,
                    error = %e,
                    "Forward failed after retries; holding watermark"
                );
                state.pending.push_back(doc);
                {
                    let mut stats = self.stats_mut();
                    stats.failed += 1;
                    stats.pending = state.pending.len();
                }
                if state.pending.len() >= self.config.max_pending {
                    warn!(
                        subsystem = "sync",
                        component = "listener",
                        collection = %self.collection,
                        pending = state.pending.len(),
                        "Pending queue full; ending subscription"
                    );
                    return Step::Backlogged;
                }
                Step::Continue
            }
        }
    }

    /// One attempt per pending record. Returns `false` if cancelled.
    async fn retry_pending(&self, state: &mut RunState, cancel: &CancellationToken) -> bool {
        if state.pending.is_empty() {
            return true;
        }

        let mut still_pending = VecDeque::with_capacity(state.pending.len());
        while let Some(doc) = state.pending.pop_front() {
            let row = SinkRow::from_document(&doc);
            match write_with_retry(self.sink.as_ref(), &row, RetryPolicy::once(), cancel).await {
                WriteOutcome::Cancelled => {
                    still_pending.push_back(doc);
                    still_pending.extend(state.pending.drain(..));
                    state.pending = still_pending;
                    return false;
                }
                WriteOutcome::Written => {
                    info!(
                        subsystem = "sync",
                        component = "listener",
                        collection = %self.collection,
                        record_id = %doc.id,
                        "Pending record forwarded"
                    );
                    self.stats_mut().forwarded += 1;
                    state.defer(&doc);
                }
                WriteOutcome::Failed(_) => still_pending.push_back(doc),
            }
        }
        state.pending = still_pending;
        self.stats_mut().pending = state.pending.len();

        if state.pending.is_empty() {
            if let Some(deferred) = state.deferred.take() {
                self.advance(state, deferred).await;
            }
        }
        true
    }

    async fn advance(&self, state: &mut RunState, proposed: Watermark) {
        match self.watermarks.advance(self.collection, &proposed).await {
            Ok(_) => {
                state.position.merge(&proposed);
            }
            Err(e) => {
                // The row is in the sink; a stale watermark only means a replay.
                error!(
                    subsystem = "sync",
                    component = "listener",
                    collection = %self.collection,
                    watermark = %format_timestamp(&proposed.at),
                    error = %e,
                    "Failed to persist watermark"
                );
            }
        }
    }
}
