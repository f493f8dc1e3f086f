//! Primary document store on PostgreSQL.
//!
//! Documents live in one `documents` table keyed by `(collection, id)`.
//! An `AFTER INSERT` trigger raises `pg_notify('document_added', ...)` with
//! the collection and id, which subscriptions consume through a dedicated
//! [`PgListener`] connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value as JsonValue};
use sqlx::postgres::{PgListener, PgRow};
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, warn};

use jobsight_core::defaults::SUBSCRIPTION_CHANNEL_CAPACITY;
use jobsight_core::{ChangeSubscription, Collection, Document, DocumentStore, Error, Result};

/// Notification channel raised by the insert trigger.
pub const DOCUMENT_ADDED_CHANNEL: &str = "document_added";

/// Payload of a `document_added` notification.
#[derive(Debug, Deserialize)]
struct AddedNotification {
    collection: String,
    id: String,
}

/// PostgreSQL implementation of [`DocumentStore`].
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: Pool<Postgres>,
}

impl PgDocumentStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Fetch one document by id.
    pub async fn get(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, created_at, fields FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| parse_document_row(collection, r)).transpose()
    }
}

fn parse_document_row(collection: Collection, row: PgRow) -> Result<Document> {
    let id: String = row.try_get("id")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let fields: JsonValue = row.try_get("fields")?;
    let fields = match fields {
        JsonValue::Object(map) => map,
        JsonValue::Null => JsonMap::new(),
        other => {
            return Err(Error::Serialization(format!(
                "document {} fields are not an object: {}",
                id, other
            )))
        }
    };
    Ok(Document::new(collection, id, created_at, fields))
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, created_at, fields
            FROM documents
            WHERE collection = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| parse_document_row(collection, row))
            .collect()
    }

    async fn subscribe(&self, collection: Collection) -> Result<ChangeSubscription> {
        // LISTEN before taking the snapshot: anything inserted in between is
        // seen twice, never zero times.
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(DOCUMENT_ADDED_CHANNEL).await?;
        let snapshot = self.list(collection).await?;

        let (tx, subscription) =
            ChangeSubscription::channel(collection, SUBSCRIPTION_CHANNEL_CAPACITY);
        let store = self.clone();

        tokio::spawn(async move {
            for doc in snapshot {
                if !tx.send(doc).await {
                    return;
                }
            }

            loop {
                let received = tokio::select! {
                    _ = tx.closed() => return,
                    received = listener.recv() => received,
                };

                let notification = match received {
                    Ok(n) => n,
                    Err(e) => {
                        // Ending the subscription makes the owner resubscribe,
                        // and the new snapshot covers anything missed here.
                        warn!(
                            subsystem = "db",
                            component = "documents",
                            collection = %collection,
                            error = %e,
                            "Document listener connection failed; ending subscription"
                        );
                        return;
                    }
                };

                let added: AddedNotification = match serde_json::from_str(notification.payload())
                {
                    Ok(added) => added,
                    Err(e) => {
                        warn!(
                            subsystem = "db",
                            component = "documents",
                            payload = notification.payload(),
                            error = %e,
                            "Ignoring malformed document notification"
                        );
                        continue;
                    }
                };
                if added.collection != collection.as_str() {
                    continue;
                }

                match store.get(collection, &added.id).await {
                    Ok(Some(doc)) => {
                        debug!(
                            subsystem = "db",
                            component = "documents",
                            collection = %collection,
                            record_id = %doc.id,
                            "Document added"
                        );
                        if !tx.send(doc).await {
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(
                            subsystem = "db",
                            component = "documents",
                            collection = %collection,
                            record_id = %added.id,
                            error = %e,
                            "Failed to load added document; ending subscription"
                        );
                        return;
                    }
                }
            }
        });

        Ok(subscription)
    }

    async fn insert(&self, document: Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, created_at, fields)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (collection, id) DO UPDATE SET fields = EXCLUDED.fields
            "#,
        )
        .bind(document.collection.as_str())
        .bind(&document.id)
        .bind(document.created_at)
        .bind(JsonValue::Object(document.fields))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
