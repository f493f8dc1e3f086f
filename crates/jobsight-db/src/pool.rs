//! Postgres pool sizing.
//!
//! Each live document subscription keeps one connection for its `LISTEN`
//! for as long as it runs, so the pool is the query/sink budget plus one
//! reserved connection per watched collection. Without the reserve, a
//! handful of listeners can starve crawl-time sink writes.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use jobsight_core::{Error, Result};

const DEFAULT_QUERY_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 10;
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections for document reads, sync-state and sink writes.
    pub query_connections: u32,
    /// Connections pinned by change-feed listeners.
    pub listener_connections: u32,
    /// How long a caller waits for a free connection before failing.
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            query_connections: DEFAULT_QUERY_CONNECTIONS,
            listener_connections: 0,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DB_MAX_CONNECTIONS` | `10` | Query/sink connections |
    /// | `DB_CONNECT_TIMEOUT_SECS` | `10` | Acquire timeout |
    ///
    /// Listener connections are not read here; the binary reserves one per
    /// watched collection with [`PoolConfig::with_listener_connections`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let query_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.query_connections);
        let acquire_timeout = std::env::var("DB_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.acquire_timeout);

        defaults
            .with_query_connections(query_connections)
            .with_acquire_timeout(acquire_timeout)
    }

    /// Clamped to at least one.
    pub fn with_query_connections(mut self, n: u32) -> Self {
        self.query_connections = n.max(1);
        self
    }

    pub fn with_listener_connections(mut self, n: u32) -> Self {
        self.listener_connections = n;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Pool ceiling handed to sqlx.
    pub fn max_connections(&self) -> u32 {
        self.query_connections.saturating_add(self.listener_connections)
    }
}

/// Open a pool sized by `config`.
pub async fn connect_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let start = Instant::now();
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections())
        .min_connections(1)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(IDLE_TIMEOUT)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "connect",
        max_connections = config.max_connections(),
        listener_connections = config.listener_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database pool ready"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listeners_are_reserved_on_top_of_queries() {
        let config = PoolConfig::default().with_listener_connections(4);
        assert_eq!(config.query_connections, 10);
        assert_eq!(config.max_connections(), 14);
    }

    #[test]
    fn test_zero_query_connections_clamped() {
        let config = PoolConfig::default()
            .with_query_connections(0)
            .with_acquire_timeout(Duration::from_secs(3));
        assert_eq!(config.max_connections(), 1);
        assert_eq!(config.acquire_timeout, Duration::from_secs(3));
    }
}
