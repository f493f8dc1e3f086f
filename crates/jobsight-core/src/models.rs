//! Core data models for jobsight.
//!
//! These types are shared across all jobsight crates: primary-store
//! documents, crawled and enriched job postings, and the fixed-schema rows
//! written to the tabular sink.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};

// =============================================================================
// PRIMARY STORE
// =============================================================================

/// A watched collection in the primary document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    JobSeekers,
    Employers,
    Portfolios,
    JobInquiries,
    JobPostings,
}

impl Collection {
    /// Collections mirrored by default: the system's own records.
    ///
    /// `JobPostings` is excluded; crawled postings reach the sink directly
    /// and only flow through the primary store when persistence is enabled.
    pub const SYSTEM: [Collection; 4] = [
        Collection::JobSeekers,
        Collection::Employers,
        Collection::Portfolios,
        Collection::JobInquiries,
    ];

    /// Wire/storage name of the collection.
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::JobSeekers => "jobSeekers",
            Collection::Employers => "employers",
            Collection::Portfolios => "portfolios",
            Collection::JobInquiries => "jobInquiries",
            Collection::JobPostings => "jobPostings",
        }
    }

    /// Sink entity that mirrors this collection.
    pub fn entity_type(&self) -> EntityType {
        match self {
            Collection::JobSeekers => EntityType::JobSeeker,
            Collection::Employers => EntityType::Employer,
            Collection::Portfolios => EntityType::Portfolio,
            Collection::JobInquiries => EntityType::JobInquiry,
            Collection::JobPostings => EntityType::JobPosting,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "jobSeekers" => Ok(Collection::JobSeekers),
            "employers" => Ok(Collection::Employers),
            "portfolios" => Ok(Collection::Portfolios),
            "jobInquiries" => Ok(Collection::JobInquiries),
            "jobPostings" => Ok(Collection::JobPostings),
            other => Err(Error::InvalidInput(format!("Unknown collection: {}", other))),
        }
    }
}

/// An entry in the primary document store.
///
/// `created_at` is the change-capture ordering key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub collection: Collection,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub fields: JsonMap<String, JsonValue>,
}

impl Document {
    pub fn new(
        collection: Collection,
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        fields: JsonMap<String, JsonValue>,
    ) -> Self {
        Self {
            id: id.into(),
            collection,
            created_at,
            fields,
        }
    }
}

// =============================================================================
// SINK
// =============================================================================

/// Row kinds written to the tabular analytics sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    JobSeeker,
    Employer,
    Portfolio,
    JobInquiry,
    LoginEvent,
    ViewEvent,
    JobPosting,
}

const JOB_SEEKER_COLUMNS: &[&str] = &[
    "id",
    "name",
    "email",
    "phone",
    "desiredJob",
    "region",
    "experience",
    "createdAt",
];

const EMPLOYER_COLUMNS: &[&str] = &[
    "id",
    "companyName",
    "contactName",
    "email",
    "phone",
    "industry",
    "createdAt",
];

const PORTFOLIO_COLUMNS: &[&str] = &[
    "id",
    "ownerId",
    "title",
    "description",
    "skills",
    "url",
    "createdAt",
];

const JOB_INQUIRY_COLUMNS: &[&str] = &[
    "id",
    "employerId",
    "jobSeekerId",
    "message",
    "status",
    "createdAt",
];

const LOGIN_EVENT_COLUMNS: &[&str] = &["id", "userId", "userType", "loggedInAt"];

const VIEW_EVENT_COLUMNS: &[&str] = &["id", "userId", "targetType", "targetId", "viewedAt"];

const JOB_POSTING_COLUMNS: &[&str] = &[
    "id",
    "title",
    "company",
    "location",
    "salaryText",
    "workType",
    "url",
    "source",
    "scrapedAt",
    "category",
    "categoryConfidence",
    "skills",
    "requirements",
    "benefits",
    "salaryMin",
    "salaryMax",
    "salaryCurrency",
    "classifier",
    "analyzedAt",
    "analyzed",
];

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::JobSeeker => "job_seeker",
            EntityType::Employer => "employer",
            EntityType::Portfolio => "portfolio",
            EntityType::JobInquiry => "job_inquiry",
            EntityType::LoginEvent => "login_event",
            EntityType::ViewEvent => "view_event",
            EntityType::JobPosting => "job_posting",
        }
    }

    /// Fixed column schema, in sheet order. The first column is the row key.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            EntityType::JobSeeker => JOB_SEEKER_COLUMNS,
            EntityType::Employer => EMPLOYER_COLUMNS,
            EntityType::Portfolio => PORTFOLIO_COLUMNS,
            EntityType::JobInquiry => JOB_INQUIRY_COLUMNS,
            EntityType::LoginEvent => LOGIN_EVENT_COLUMNS,
            EntityType::ViewEvent => VIEW_EVENT_COLUMNS,
            EntityType::JobPosting => JOB_POSTING_COLUMNS,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row destined for the tabular sink.
///
/// `values` always has exactly one entry per column of `entity`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkRow {
    pub entity: EntityType,
    pub key: String,
    pub values: Vec<String>,
}

impl SinkRow {
    /// Build a row by looking up each schema column with `lookup`.
    pub fn build<F>(entity: EntityType, key: impl Into<String>, mut lookup: F) -> Self
    where
        F: FnMut(&str) -> String,
    {
        let key = key.into();
        let values = entity
            .columns()
            .iter()
            .map(|column| match *column {
                "id" => key.clone(),
                other => lookup(other),
            })
            .collect();
        Self {
            entity,
            key,
            values,
        }
    }

    /// Project a primary-store document onto its entity's column schema.
    ///
    /// Missing fields become empty cells; fields outside the schema are dropped.
    /// Job postings written by [`EnrichedRecord::to_document`] are decoded back
    /// and rendered exactly as [`SinkRow::from_enriched`] renders them, so both
    /// write paths produce the same row.
    pub fn from_document(doc: &Document) -> Self {
        if doc.collection == Collection::JobPostings {
            match serde_json::from_value::<EnrichedRecord>(JsonValue::Object(doc.fields.clone())) {
                Ok(record) => return Self::from_enriched(&record),
                Err(e) => tracing::warn!(
                    subsystem = "sync",
                    record_id = %doc.id,
                    error = %e,
                    "Job posting document is not an enriched record; projecting fields as-is"
                ),
            }
        }

        let created_at = format_timestamp(&doc.created_at);
        Self::build(doc.collection.entity_type(), doc.id.clone(), |column| {
            if column == "createdAt" {
                return created_at.clone();
            }
            doc.fields.get(column).map(cell_text).unwrap_or_default()
        })
    }

    /// Row for a crawled (and possibly enriched) job posting.
    pub fn from_enriched(record: &EnrichedRecord) -> Self {
        let raw = &record.raw;
        let salary = record.salary.clone().unwrap_or_default();
        Self::build(EntityType::JobPosting, raw.posting_key(), |column| {
            match column {
                "title" => raw.title.clone(),
                "company" => raw.company.clone(),
                "location" => raw.location.clone(),
                "salaryText" => raw.salary_text.clone(),
                "workType" => raw.work_type.clone(),
                "url" => raw.url.clone(),
                "source" => raw.source.clone(),
                "scrapedAt" => format_timestamp(&raw.scraped_at),
                "category" => record.category.clone().unwrap_or_default(),
                "categoryConfidence" => record
                    .category_confidence
                    .map(|c| format!("{:.2}", c))
                    .unwrap_or_default(),
                "skills" => record.skills.join(", "),
                "requirements" => record.requirements.join(", "),
                "benefits" => record.benefits.join(", "),
                "salaryMin" => salary.min.map(|v| v.to_string()).unwrap_or_default(),
                "salaryMax" => salary.max.map(|v| v.to_string()).unwrap_or_default(),
                "salaryCurrency" => salary.currency.clone().unwrap_or_default(),
                "classifier" => record.classifier.clone().unwrap_or_default(),
                "analyzedAt" => record
                    .analyzed_at
                    .as_ref()
                    .map(format_timestamp)
                    .unwrap_or_default(),
                "analyzed" => record.analyzed.to_string(),
                _ => String::new(),
            }
        })
    }

    /// Row recording a user login.
    pub fn login_event(
        id: impl Into<String>,
        user_id: &str,
        user_type: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self::build(EntityType::LoginEvent, id, |column| match column {
            "userId" => user_id.to_string(),
            "userType" => user_type.to_string(),
            "loggedInAt" => format_timestamp(&at),
            _ => String::new(),
        })
    }

    /// Row recording a profile or posting view.
    pub fn view_event(
        id: impl Into<String>,
        user_id: &str,
        target_type: &str,
        target_id: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self::build(EntityType::ViewEvent, id, |column| match column {
            "userId" => user_id.to_string(),
            "targetType" => target_type.to_string(),
            "targetId" => target_id.to_string(),
            "viewedAt" => format_timestamp(&at),
            _ => String::new(),
        })
    }

    /// Value of a named column, if the column is part of the schema.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.entity
            .columns()
            .iter()
            .position(|c| *c == column)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }
}

/// Render a JSON field as a sheet cell.
fn cell_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(items) => items.iter().map(cell_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// RFC 3339 with millisecond precision, the format used for every sink timestamp.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

// =============================================================================
// CRAWL AND ENRICHMENT
// =============================================================================

/// A job posting as collected from an external listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRecord {
    /// Stable identifier assigned at crawl time, echoed by the classifier.
    pub id: Uuid,
    pub title: String,
    pub company: String,
    pub location: String,
    pub salary_text: String,
    pub work_type: String,
    pub url: String,
    pub source: String,
    pub scraped_at: DateTime<Utc>,
}

impl RawRecord {
    /// Composite identity used to match classifier output back to input.
    pub fn identity(&self) -> (String, String) {
        (normalize(&self.title), normalize(&self.company))
    }

    /// Stable sink key: the same posting re-crawled maps to the same row.
    pub fn posting_key(&self) -> String {
        let (title, company) = self.identity();
        // Length-prefixed so no title/company split can collide with another.
        let mut hasher = Sha256::new();
        for part in [&title, &company] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        hex::encode(&hasher.finalize()[..16])
    }
}

/// Lowercase and collapse whitespace for identity comparisons.
pub fn normalize(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Structured salary extracted by the classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SalaryInfo {
    #[serde(default)]
    pub min: Option<i64>,
    #[serde(default)]
    pub max: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    /// "year", "month", "hour", ...
    #[serde(default)]
    pub period: Option<String>,
}

/// Classifier output for one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrichment {
    /// Echo of [`RawRecord::id`]; absent when the model dropped it.
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub category_confidence: f32,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub salary: Option<SalaryInfo>,
    #[serde(default)]
    pub model: String,
    #[serde(default = "Utc::now")]
    pub analyzed_at: DateTime<Utc>,
}

/// A raw record plus whatever the classifier added.
///
/// Pass-through records (classifier failed or skipped them) carry
/// `analyzed = false` and empty enrichment fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub raw: RawRecord,
    pub category: Option<String>,
    pub category_confidence: Option<f32>,
    pub skills: Vec<String>,
    pub requirements: Vec<String>,
    pub benefits: Vec<String>,
    pub salary: Option<SalaryInfo>,
    pub classifier: Option<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub analyzed: bool,
}

impl EnrichedRecord {
    /// Merge an enrichment onto its raw record.
    pub fn enriched(raw: RawRecord, enrichment: Enrichment) -> Self {
        let category = enrichment.category.trim().to_string();
        Self {
            raw,
            category: (!category.is_empty()).then_some(category),
            category_confidence: Some(enrichment.category_confidence.clamp(0.0, 1.0)),
            skills: enrichment.skills,
            requirements: enrichment.requirements,
            benefits: enrichment.benefits,
            salary: enrichment.salary,
            classifier: (!enrichment.model.is_empty()).then_some(enrichment.model),
            analyzed_at: Some(enrichment.analyzed_at),
            analyzed: true,
        }
    }

    /// Pass a raw record through without enrichment.
    pub fn plain(raw: RawRecord) -> Self {
        Self {
            raw,
            category: None,
            category_confidence: None,
            skills: Vec::new(),
            requirements: Vec::new(),
            benefits: Vec::new(),
            salary: None,
            classifier: None,
            analyzed_at: None,
            analyzed: false,
        }
    }

    /// Primary-store representation for the `jobPostings` collection.
    pub fn to_document(&self) -> Result<Document> {
        let fields = match serde_json::to_value(self)? {
            JsonValue::Object(map) => map,
            _ => return Err(Error::Internal("record did not serialize to an object".into())),
        };
        Ok(Document::new(
            Collection::JobPostings,
            self.raw.posting_key(),
            self.raw.scraped_at,
            fields,
        ))
    }
}

/// Trigger parameters for one crawl-and-enrich run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlRequest {
    pub keyword: String,
    #[serde(default)]
    pub max_pages: Option<u32>,
}

/// Outcome of a crawl-and-enrich run, as returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlSummary {
    pub keyword: String,
    /// Records produced (enriched or passed through).
    pub total: usize,
    /// Records the classifier actually enriched.
    pub enriched: usize,
    pub sample: Vec<EnrichedRecord>,
    pub categories: Vec<String>,
    pub average_confidence: f32,
    pub pages_fetched: u32,
    pub failed_batches: usize,
    pub sink_failures: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn raw(title: &str, company: &str) -> RawRecord {
        RawRecord {
            id: Uuid::now_v7(),
            title: title.to_string(),
            company: company.to_string(),
            location: "Seoul".to_string(),
            salary_text: "50,000,000 KRW".to_string(),
            work_type: "full-time".to_string(),
            url: "https://jobs.example.com/1".to_string(),
            source: "simulated".to_string(),
            scraped_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
        }
    }

    #[test]
    fn test_collection_round_trip_names() {
        for c in Collection::SYSTEM {
            assert_eq!(c.as_str().parse::<Collection>().unwrap(), c);
        }
        assert!("candidates".parse::<Collection>().is_err());
    }

    #[test]
    fn test_every_schema_starts_with_id() {
        for entity in [
            EntityType::JobSeeker,
            EntityType::Employer,
            EntityType::Portfolio,
            EntityType::JobInquiry,
            EntityType::LoginEvent,
            EntityType::ViewEvent,
            EntityType::JobPosting,
        ] {
            assert_eq!(entity.columns()[0], "id", "{}", entity);
        }
    }

    #[test]
    fn test_row_from_document_projects_schema() {
        let fields = json!({
            "name": "Kim Minji",
            "email": "minji@example.com",
            "experience": 3,
            "favouriteColour": "blue"
        });
        let doc = Document::new(
            Collection::JobSeekers,
            "seeker-1",
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            fields.as_object().unwrap().clone(),
        );

        let row = SinkRow::from_document(&doc);
        assert_eq!(row.entity, EntityType::JobSeeker);
        assert_eq!(row.key, "seeker-1");
        assert_eq!(row.values.len(), EntityType::JobSeeker.columns().len());
        assert_eq!(row.get("id"), Some("seeker-1"));
        assert_eq!(row.get("name"), Some("Kim Minji"));
        assert_eq!(row.get("experience"), Some("3"));
        assert_eq!(row.get("phone"), Some(""));
        assert_eq!(row.get("createdAt"), Some("2026-03-01T09:00:00.000Z"));
        assert_eq!(row.get("favouriteColour"), None);
    }

    #[test]
    fn test_array_fields_join_into_one_cell() {
        let doc = Document::new(
            Collection::Portfolios,
            "p-1",
            Utc::now(),
            json!({"skills": ["Rust", "SQL"]}).as_object().unwrap().clone(),
        );
        assert_eq!(SinkRow::from_document(&doc).get("skills"), Some("Rust, SQL"));
    }

    #[test]
    fn test_posting_key_ignores_case_and_spacing() {
        let a = raw("Backend  Developer", "Acme");
        let b = raw("backend developer", " ACME ");
        assert_ne!(a.id, b.id);
        assert_eq!(a.posting_key(), b.posting_key());
        assert_ne!(a.posting_key(), raw("Frontend Developer", "Acme").posting_key());
    }

    #[test]
    fn test_posting_key_separator_in_fields_does_not_collide() {
        assert_ne!(
            raw("Engineer | Platform", "Acme").posting_key(),
            raw("Engineer", "Platform | Acme").posting_key()
        );
        assert_ne!(raw("a|b", "c").posting_key(), raw("a", "b|c").posting_key());
    }

    fn analyzed(record: RawRecord) -> EnrichedRecord {
        let enrichment = Enrichment {
            id: Some(record.id),
            title: record.title.clone(),
            company: record.company.clone(),
            category: "Backend".to_string(),
            category_confidence: 0.85,
            skills: vec!["Rust".to_string(), "Postgres".to_string()],
            requirements: vec!["3+ years".to_string()],
            benefits: vec!["Remote".to_string()],
            salary: Some(SalaryInfo {
                min: Some(100),
                max: Some(150),
                currency: Some("USD".to_string()),
                period: Some("year".to_string()),
            }),
            model: "gemini-1.5-flash".to_string(),
            analyzed_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 5, 0).unwrap()
                + chrono::Duration::nanoseconds(188_042),
        };
        EnrichedRecord::enriched(record, enrichment)
    }

    #[test]
    fn test_posting_document_row_matches_pipeline_row() {
        let mut record = raw("Backend Developer", "Acme");
        record.scraped_at += chrono::Duration::nanoseconds(80_188_042);
        let enriched = analyzed(record.clone());
        let plain = EnrichedRecord::plain(record);

        for rec in [enriched, plain] {
            let from_store = SinkRow::from_document(&rec.to_document().unwrap());
            let from_pipeline = SinkRow::from_enriched(&rec);
            assert_eq!(from_store, from_pipeline);
        }

        let row = SinkRow::from_document(&analyzed(raw("SRE", "Hooli")).to_document().unwrap());
        assert_eq!(row.get("salaryMin"), Some("100"));
        assert_eq!(row.get("salaryCurrency"), Some("USD"));
        assert_eq!(row.get("categoryConfidence"), Some("0.85"));
        assert_eq!(row.get("scrapedAt"), Some("2026-01-02T03:04:05.000Z"));
    }

    #[test]
    fn test_foreign_posting_document_falls_back_to_fields() {
        let doc = Document::new(
            Collection::JobPostings,
            "manual-1",
            Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            json!({"title": "Designer", "company": "Initech"}).as_object().unwrap().clone(),
        );
        let row = SinkRow::from_document(&doc);
        assert_eq!(row.key, "manual-1");
        assert_eq!(row.get("title"), Some("Designer"));
        assert_eq!(row.get("salaryMin"), Some(""));
    }

    #[test]
    fn test_enriched_clamps_confidence() {
        let record = raw("Data Engineer", "Globex");
        let enrichment = Enrichment {
            id: Some(record.id),
            title: record.title.clone(),
            company: record.company.clone(),
            category: "Data".to_string(),
            category_confidence: 1.7,
            skills: vec!["Spark".to_string()],
            requirements: vec![],
            benefits: vec![],
            salary: None,
            model: "gemini-1.5-flash".to_string(),
            analyzed_at: Utc::now(),
        };
        let enriched = EnrichedRecord::enriched(record, enrichment);
        assert!(enriched.analyzed);
        assert_eq!(enriched.category_confidence, Some(1.0));
        assert_eq!(enriched.classifier.as_deref(), Some("gemini-1.5-flash"));
    }

    #[test]
    fn test_plain_record_row_marks_unanalyzed() {
        let row = SinkRow::from_enriched(&EnrichedRecord::plain(raw("QA Engineer", "Initech")));
        assert_eq!(row.entity, EntityType::JobPosting);
        assert_eq!(row.get("analyzed"), Some("false"));
        assert_eq!(row.get("category"), Some(""));
        assert_eq!(row.get("title"), Some("QA Engineer"));
    }

    #[test]
    fn test_enriched_record_serializes_flat() {
        let value = serde_json::to_value(EnrichedRecord::plain(raw("SRE", "Hooli"))).unwrap();
        assert_eq!(value["title"], "SRE");
        assert_eq!(value["analyzed"], false);
        assert!(value.get("raw").is_none());
    }

    #[test]
    fn test_to_document_uses_posting_key() {
        let record = EnrichedRecord::plain(raw("SRE", "Hooli"));
        let doc = record.to_document().unwrap();
        assert_eq!(doc.collection, Collection::JobPostings);
        assert_eq!(doc.id, record.raw.posting_key());
        assert_eq!(doc.created_at, record.raw.scraped_at);
    }

    #[test]
    fn test_event_rows() {
        let at = Utc.with_ymd_and_hms(2026, 5, 5, 12, 0, 0).unwrap();
        let login = SinkRow::login_event("l-1", "u-1", "employer", at);
        assert_eq!(login.get("userType"), Some("employer"));
        let view = SinkRow::view_event("v-1", "u-1", "portfolio", "p-9", at);
        assert_eq!(view.get("targetId"), Some("p-9"));
        assert_eq!(view.get("viewedAt"), Some("2026-05-05T12:00:00.000Z"));
    }
}
