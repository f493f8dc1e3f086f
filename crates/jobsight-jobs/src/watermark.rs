//! Persistent sync progress: per-collection watermarks and backfill flags.
//!
//! Both stores sit on the same [`KeyValueStore`]. Keys are
//! `watermark:<collection>` (RFC 3339), `watermark_ids:<collection>` (JSON
//! array of ids forwarded at exactly the watermark) and
//! `backfill_completed:<collection>`.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, warn};

use jobsight_core::{format_timestamp, Collection, Error, KeyValueStore, Result};

fn watermark_key(collection: Collection) -> String {
    format!("watermark:{}", collection)
}

fn frontier_key(collection: Collection) -> String {
    format!("watermark_ids:{}", collection)
}

fn backfill_key(collection: Collection) -> String {
    format!("backfill_completed:{}", collection)
}

/// Sync position of one collection.
///
/// `at` is the newest forwarded creation timestamp at the millisecond
/// precision it is persisted with; `ids` are the records already forwarded
/// with that exact timestamp. A record is covered when it is older than `at`,
/// or carries `at` and its id is in `ids`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub at: DateTime<Utc>,
    pub ids: BTreeSet<String>,
}

impl Watermark {
    pub fn epoch() -> Self {
        Self::at(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Position with no ids recorded at `ts`.
    pub fn at(ts: DateTime<Utc>) -> Self {
        Self {
            at: ts.trunc_subsecs(3),
            ids: BTreeSet::new(),
        }
    }

    /// Position right after forwarding the record `id` created at `ts`.
    pub fn single(ts: DateTime<Utc>, id: impl Into<String>) -> Self {
        let mut w = Self::at(ts);
        w.ids.insert(id.into());
        w
    }

    pub fn covers(&self, created_at: DateTime<Utc>, id: &str) -> bool {
        let created_at = created_at.trunc_subsecs(3);
        created_at < self.at || (created_at == self.at && self.ids.contains(id))
    }

    /// Fold `other` in. Returns whether the position moved.
    pub fn merge(&mut self, other: &Watermark) -> bool {
        if other.at > self.at {
            *self = other.clone();
            true
        } else if other.at == self.at {
            let before = self.ids.len();
            self.ids.extend(other.ids.iter().cloned());
            self.ids.len() > before
        } else {
            false
        }
    }

    /// Record one forwarded document.
    pub fn absorb(&mut self, created_at: DateTime<Utc>, id: &str) -> bool {
        self.merge(&Watermark::single(created_at, id))
    }
}

/// Forward-only map of collection to sync position.
#[derive(Clone)]
pub struct WatermarkStore {
    kv: Arc<dyn KeyValueStore>,
}

impl WatermarkStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Stored watermark timestamp, or the Unix epoch when none was ever written.
    pub async fn get(&self, collection: Collection) -> Result<DateTime<Utc>> {
        match self.kv.get(&watermark_key(collection)).await? {
            None => Ok(DateTime::<Utc>::UNIX_EPOCH),
            Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| {
                    Error::Serialization(format!(
                        "watermark for {} is not RFC 3339 ({:?}): {}",
                        collection, raw, e
                    ))
                }),
        }
    }

    /// Full position: timestamp plus the ids forwarded at it.
    pub async fn position(&self, collection: Collection) -> Result<Watermark> {
        let mut position = Watermark::at(self.get(collection).await?);
        if let Some(raw) = self.kv.get(&frontier_key(collection)).await? {
            position.ids = serde_json::from_str(&raw).map_err(|e| {
                Error::Serialization(format!(
                    "watermark ids for {} are not a JSON string array ({:?}): {}",
                    collection, raw, e
                ))
            })?;
        }
        Ok(position)
    }

    /// Merge `proposed` into the stored position. Returns `false` without
    /// writing when it adds nothing.
    pub async fn advance(&self, collection: Collection, proposed: &Watermark) -> Result<bool> {
        let mut current = self.position(collection).await?;
        let moved_forward = proposed.at > current.at;
        if !current.merge(proposed) {
            debug!(
                subsystem = "sync",
                component = "watermark",
                collection = %collection,
                watermark = %format_timestamp(&current.at),
                proposed = %format_timestamp(&proposed.at),
                "Watermark not advanced"
            );
            return Ok(false);
        }
        if moved_forward {
            self.kv
                .set(&watermark_key(collection), &format_timestamp(&current.at))
                .await?;
        }
        self.kv
            .set(&frontier_key(collection), &serde_json::to_string(&current.ids)?)
            .await?;
        Ok(true)
    }

    /// Advance the timestamp alone. Returns `false` without writing when
    /// `ts` is not newer than the stored value.
    pub async fn set(&self, collection: Collection, ts: DateTime<Utc>) -> Result<bool> {
        self.advance(collection, &Watermark::at(ts)).await
    }

    /// Operator action: forget the watermark so the next subscription
    /// re-forwards the whole collection.
    pub async fn reset(&self, collection: Collection) -> Result<()> {
        warn!(
            subsystem = "sync",
            component = "watermark",
            collection = %collection,
            "Resetting watermark"
        );
        self.kv.remove(&watermark_key(collection)).await?;
        self.kv.remove(&frontier_key(collection)).await
    }
}

/// Per-collection `backfill_completed` flags. Flags are never cleared.
#[derive(Clone)]
pub struct SyncStateStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SyncStateStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub async fn is_backfill_completed(&self, collection: Collection) -> Result<bool> {
        match self.kv.get(&backfill_key(collection)).await?.as_deref() {
            None | Some("false") => Ok(false),
            Some("true") => Ok(true),
            Some(other) => Err(Error::Serialization(format!(
                "backfill flag for {} is neither true nor false: {:?}",
                collection, other
            ))),
        }
    }

    pub async fn mark_backfill_completed(&self, collection: Collection) -> Result<()> {
        self.kv.set(&backfill_key(collection), "true").await
    }
}
