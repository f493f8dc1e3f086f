//! Bounded, cancellable sink writes with linear backoff.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use jobsight_core::defaults::{SINK_RETRY_ATTEMPTS, SINK_RETRY_BACKOFF_MS};
use jobsight_core::{Error, SinkRow, SinkWriter};

/// How many times to try a sink write, and how long to wait between tries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Wait after attempt `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: SINK_RETRY_ATTEMPTS,
            backoff: Duration::from_millis(SINK_RETRY_BACKOFF_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    /// Single attempt, no waiting.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `SINK_RETRY_ATTEMPTS` | `3` | Attempts per record |
    /// | `SINK_RETRY_BACKOFF_MS` | `500` | Linear backoff step |
    pub fn from_env() -> Self {
        let attempts = std::env::var("SINK_RETRY_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(SINK_RETRY_ATTEMPTS);
        let backoff_ms = std::env::var("SINK_RETRY_BACKOFF_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(SINK_RETRY_BACKOFF_MS);
        Self::new(attempts, Duration::from_millis(backoff_ms))
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

/// Result of [`write_with_retry`].
#[derive(Debug)]
pub enum WriteOutcome {
    Written,
    /// Every attempt failed; carries the last error.
    Failed(Error),
    /// Cancellation fired before a write succeeded.
    Cancelled,
}

/// Upsert `row`, retrying per `policy`. Cancellation abandons an in-flight
/// write or backoff wait immediately.
pub async fn write_with_retry(
    sink: &dyn SinkWriter,
    row: &SinkRow,
    policy: RetryPolicy,
    cancel: &CancellationToken,
) -> WriteOutcome {
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return WriteOutcome::Cancelled,
            result = sink.upsert(row) => result,
        };

        let err = match result {
            Ok(()) => return WriteOutcome::Written,
            Err(e) => e,
        };

        warn!(
            subsystem = "sync",
            component = "sink_writer",
            entity = %row.entity,
            record_id = %row.key,
            attempt,
            max_attempts = attempts,
            error = %err,
            "Sink write failed"
        );

        if attempt >= attempts {
            return WriteOutcome::Failed(err);
        }

        let delay = policy.delay_after(attempt);
        if !delay.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return WriteOutcome::Cancelled,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jobsight_db::MemorySink;

    fn row() -> SinkRow {
        SinkRow::login_event("l-1", "u-1", "seeker", Utc::now())
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_millis(500));
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_within_attempts() {
        let sink = MemorySink::new();
        sink.fail_next(2);
        let outcome = write_with_retry(
            &sink,
            &row(),
            RetryPolicy::new(3, Duration::from_millis(500)),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(outcome, WriteOutcome::Written));
        assert_eq!(sink.attempts(), 3);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_attempts() {
        let sink = MemorySink::new();
        sink.set_failing(true);
        let outcome = write_with_retry(
            &sink,
            &row(),
            RetryPolicy::new(3, Duration::from_millis(10)),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(outcome, WriteOutcome::Failed(Error::Sink(_))));
        assert_eq!(sink.attempts(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_before_write() {
        let sink = MemorySink::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = write_with_retry(&sink, &row(), RetryPolicy::default(), &cancel).await;
        assert!(matches!(outcome, WriteOutcome::Cancelled));
        assert_eq!(sink.attempts(), 0);
    }
}
