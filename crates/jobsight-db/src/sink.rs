//! Tabular analytics sink on PostgreSQL.
//!
//! Each entity type maps to one table, `sink_<entity>`, with a `row_key`
//! primary key and one text column per schema column. Writes are upserts on
//! `row_key`, so replays and re-crawls update rows in place.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use tracing::debug;

use jobsight_core::{EntityType, Error, Result, SinkRow, SinkWriter};

const ALL_ENTITIES: [EntityType; 7] = [
    EntityType::JobSeeker,
    EntityType::Employer,
    EntityType::Portfolio,
    EntityType::JobInquiry,
    EntityType::LoginEvent,
    EntityType::ViewEvent,
    EntityType::JobPosting,
];

/// Table holding rows of one entity type.
pub fn table_name(entity: EntityType) -> String {
    format!("sink_{}", entity.as_str())
}

/// Build the upsert statement for an entity.
///
/// `$1` is the row key; `$2..` bind the schema columns in order.
pub fn upsert_sql(entity: EntityType) -> String {
    let columns: Vec<String> = entity
        .columns()
        .iter()
        .map(|c| format!("\"{}\"", c))
        .collect();
    let placeholders: Vec<String> = (2..=columns.len() + 1).map(|i| format!("${}", i)).collect();
    let updates: Vec<String> = columns
        .iter()
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();

    format!(
        "INSERT INTO {table} (row_key, {columns}, synced_at) VALUES ($1, {placeholders}, now()) \
         ON CONFLICT (row_key) DO UPDATE SET {updates}, synced_at = now()",
        table = table_name(entity),
        columns = columns.join(", "),
        placeholders = placeholders.join(", "),
        updates = updates.join(", "),
    )
}

/// PostgreSQL implementation of [`SinkWriter`].
#[derive(Clone)]
pub struct PgSinkWriter {
    pool: Pool<Postgres>,
    statements: HashMap<EntityType, String>,
}

impl PgSinkWriter {
    pub fn new(pool: Pool<Postgres>) -> Self {
        let statements = ALL_ENTITIES
            .iter()
            .map(|entity| (*entity, upsert_sql(*entity)))
            .collect();
        Self { pool, statements }
    }

    /// Number of rows stored for an entity.
    pub async fn count(&self, entity: EntityType) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {}",
            table_name(entity)
        ))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

#[async_trait]
impl SinkWriter for PgSinkWriter {
    async fn upsert(&self, row: &SinkRow) -> Result<()> {
        if row.values.len() != row.entity.columns().len() {
            return Err(Error::InvalidInput(format!(
                "{} row {} has {} values for {} columns",
                row.entity,
                row.key,
                row.values.len(),
                row.entity.columns().len()
            )));
        }
        let sql = self
            .statements
            .get(&row.entity)
            .ok_or_else(|| Error::Internal(format!("no statement for {}", row.entity)))?;

        let start = Instant::now();
        let mut query = sqlx::query(sql).bind(&row.key);
        for value in &row.values {
            query = query.bind(value);
        }
        query
            .execute(&self.pool)
            .await
            .map_err(|e| Error::Sink(format!("{} upsert of {} failed: {}", row.entity, row.key, e)))?;

        debug!(
            subsystem = "db",
            component = "sink",
            op = "upsert",
            entity = %row.entity,
            record_id = %row.key,
            duration_ms = start.elapsed().as_millis() as u64,
            "Sink row written"
        );
        Ok(())
    }
}
