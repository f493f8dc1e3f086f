//! PostgreSQL store integration tests.
//!
//! Need a migrated database at `DATABASE_URL`; run with `cargo slow`.

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jobsight_core::{Collection, Document, DocumentStore, EntityType, KeyValueStore, SinkRow, SinkWriter};
use jobsight_db::test_fixtures::{employer_fields, TestDatabase};

#[tokio::test]
#[ignore]
async fn test_sync_state_round_trip() {
    let test_db = TestDatabase::new().await;
    let key = format!("watermark:{}", test_db.id("employers"));

    assert_eq!(test_db.db.sync_state.get(&key).await.unwrap(), None);
    test_db
        .db
        .sync_state
        .set(&key, "2026-03-01T00:00:00.000Z")
        .await
        .unwrap();
    test_db
        .db
        .sync_state
        .set(&key, "2026-03-02T00:00:00.000Z")
        .await
        .unwrap();
    assert_eq!(
        test_db.db.sync_state.get(&key).await.unwrap().as_deref(),
        Some("2026-03-02T00:00:00.000Z")
    );

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_list_orders_by_created_at() {
    let test_db = TestDatabase::new().await;
    let now = Utc::now();
    let later = test_db.id("later");
    let earlier = test_db.id("earlier");

    test_db
        .db
        .documents
        .insert(Document::new(Collection::Employers, &later, now, employer_fields("Later Co")))
        .await
        .unwrap();
    test_db
        .db
        .documents
        .insert(Document::new(
            Collection::Employers,
            &earlier,
            now - ChronoDuration::minutes(5),
            employer_fields("Earlier Co"),
        ))
        .await
        .unwrap();

    let docs = test_db.db.documents.list(Collection::Employers).await.unwrap();
    let ours: Vec<&str> = docs
        .iter()
        .map(|d| d.id.as_str())
        .filter(|id| id.starts_with(&test_db.run_id))
        .collect();
    assert_eq!(ours, vec![earlier.as_str(), later.as_str()]);

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_subscription_sees_new_insert() {
    let test_db = TestDatabase::new().await;
    let mut sub = test_db
        .db
        .documents
        .subscribe(Collection::Portfolios)
        .await
        .unwrap();

    let id = test_db.id("portfolio");
    test_db
        .db
        .documents
        .insert(Document::new(Collection::Portfolios, &id, Utc::now(), Default::default()))
        .await
        .unwrap();

    let found = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(doc) = sub.next().await {
            if doc.id == id {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(found, "inserted document never arrived on the subscription");

    sub.unsubscribe();
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore]
async fn test_sink_upsert_updates_in_place() {
    let test_db = TestDatabase::new().await;
    let key = test_db.id("login");

    let first = SinkRow::login_event(&key, "u-1", "seeker", Utc::now());
    let second = SinkRow::login_event(&key, "u-1", "employer", Utc::now());
    test_db.db.sink.upsert(&first).await.unwrap();
    test_db.db.sink.upsert(&second).await.unwrap();

    let (count, user_type): (i64, String) = sqlx::query_as(
        r#"SELECT COUNT(*) OVER (), "userType" FROM sink_login_event WHERE row_key = $1"#,
    )
    .bind(&key)
    .fetch_one(&test_db.pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
    assert_eq!(user_type, "employer");
    assert!(test_db.db.sink.count(EntityType::LoginEvent).await.unwrap() >= 1);

    test_db.cleanup().await;
}
