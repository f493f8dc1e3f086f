//! Server configuration.

use axum::http::HeaderValue;
use tracing::warn;

use jobsight_core::defaults::{SERVER_HOST, SERVER_PORT, SYNC_STATE_PATH};
use jobsight_core::{Error, Result};

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

/// Where sync watermarks and backfill flags are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStateBackend {
    File(String),
    Postgres,
}

/// Which crawl source serves `POST /api/crawl`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlSourceKind {
    Simulated,
    Http,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub sync_state: SyncStateBackend,
    pub crawl_source: CrawlSourceKind,
    pub allowed_origins: Vec<HeaderValue>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: SERVER_HOST.to_string(),
            port: SERVER_PORT,
            database_url: None,
            sync_state: SyncStateBackend::File(SYNC_STATE_PATH.to_string()),
            crawl_source: CrawlSourceKind::Simulated,
            allowed_origins: parse_allowed_origins(DEFAULT_ALLOWED_ORIGINS),
        }
    }
}

impl AppConfig {
    /// Load from environment variables.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `HOST` | `0.0.0.0` | Listen host |
    /// | `PORT` | `3000` | Listen port |
    /// | `DATABASE_URL` | (none) | Postgres URL; checked by the binary |
    /// | `SYNC_STATE_BACKEND` | `file` | `file` or `postgres` |
    /// | `SYNC_STATE_PATH` | `./data/sync_state.json` | File backend path |
    /// | `CRAWL_SOURCE` | `simulated` | `simulated` or `http` |
    /// | `ALLOWED_ORIGINS` | localhost dev origins | Comma-separated CORS origins |
    pub fn from_env() -> Result<Self> {
        let host = std::env::var("HOST").unwrap_or_else(|_| SERVER_HOST.to_string());
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| Error::Config(format!("PORT is not a valid port: {:?}", raw)))?,
            Err(_) => SERVER_PORT,
        };

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|u| !u.trim().is_empty());

        let sync_state = match std::env::var("SYNC_STATE_BACKEND")
            .unwrap_or_else(|_| "file".to_string())
            .trim()
            .to_lowercase()
            .as_str()
        {
            "file" => SyncStateBackend::File(
                std::env::var("SYNC_STATE_PATH").unwrap_or_else(|_| SYNC_STATE_PATH.to_string()),
            ),
            "postgres" => SyncStateBackend::Postgres,
            other => {
                return Err(Error::Config(format!(
                    "SYNC_STATE_BACKEND must be file or postgres, got {:?}",
                    other
                )))
            }
        };

        let crawl_source = match std::env::var("CRAWL_SOURCE")
            .unwrap_or_else(|_| "simulated".to_string())
            .trim()
            .to_lowercase()
            .as_str()
        {
            "simulated" => CrawlSourceKind::Simulated,
            "http" => CrawlSourceKind::Http,
            other => {
                return Err(Error::Config(format!(
                    "CRAWL_SOURCE must be simulated or http, got {:?}",
                    other
                )))
            }
        };

        let allowed_origins = parse_allowed_origins(
            &std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| DEFAULT_ALLOWED_ORIGINS.to_string()),
        );

        Ok(Self {
            host,
            port,
            database_url,
            sync_state,
            crawl_source,
            allowed_origins,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse a comma-separated origin list, skipping invalid entries.
pub fn parse_allowed_origins(raw: &str) -> Vec<HeaderValue> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect()
}
