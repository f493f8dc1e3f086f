//! # jobsight-db
//!
//! Storage layer for jobsight.
//!
//! This crate provides:
//! - Connection pool management
//! - The primary document store with `document_added` notifications
//! - Sync state (watermarks, backfill flags) in PostgreSQL or a JSON file
//! - The tabular analytics sink, one upsert-keyed table per entity
//! - In-memory versions of every store for tests and local runs
//!
//! ## Example
//!
//! ```rust,ignore
//! use jobsight_db::Database;
//! use jobsight_core::{DocumentStore, Collection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/jobsight").await?;
//!     let employers = db.documents.list(Collection::Employers).await?;
//!     println!("{} employers", employers.len());
//!     Ok(())
//! }
//! ```

pub mod documents;
pub mod file_state;
pub mod memory;
pub mod pool;
pub mod sink;
pub mod sync_state;
pub mod test_fixtures;

pub use documents::{PgDocumentStore, DOCUMENT_ADDED_CHANNEL};
pub use file_state::FileKvStore;
pub use memory::{MemoryDocumentStore, MemoryKvStore, MemorySink};
pub use pool::{connect_pool, PoolConfig};
pub use sink::PgSinkWriter;
pub use sync_state::PgKvStore;

#[cfg(feature = "migrations")]
use jobsight_core::Error;
use jobsight_core::Result;

/// Bundle of the PostgreSQL-backed stores sharing one pool.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Primary document store.
    pub documents: PgDocumentStore,
    /// Sync progress markers.
    pub sync_state: PgKvStore,
    /// Tabular analytics sink.
    pub sink: PgSinkWriter,
}

impl Database {
    /// Create a new Database from an existing pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            documents: PgDocumentStore::new(pool.clone()),
            sync_state: PgKvStore::new(pool.clone()),
            sink: PgSinkWriter::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, PoolConfig::default()).await
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = connect_pool(url, &config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
