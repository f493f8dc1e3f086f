//! Classification prompt construction and response parsing.
//!
//! The batch goes out as a JSON array of slim posting objects; the model is
//! asked to answer with a JSON array of enrichments that echo each `id`.
//! Parsing tolerates markdown code fences, a wrapping object, and individual
//! malformed entries, which are dropped rather than failing the batch.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::warn;
use uuid::Uuid;

use jobsight_core::{Enrichment, Error, RawRecord, Result};

/// Category vocabulary the classifier must pick from.
pub const CATEGORIES: &[&str] = &[
    "Software Engineering",
    "Data & AI",
    "Design",
    "Product Management",
    "Marketing",
    "Sales",
    "Finance & Accounting",
    "Operations",
    "Customer Support",
    "Human Resources",
    "Other",
];

/// System prompt for batch classification.
pub fn system_prompt() -> String {
    format!(
        "You are a recruiting analyst. You classify job postings and extract structured \
         fields from them.\n\
         Respond with ONLY a JSON array containing one object per input posting, with keys:\n\
         - \"id\": copied unchanged from the input\n\
         - \"title\", \"company\": copied unchanged from the input\n\
         - \"category\": exactly one of {}\n\
         - \"categoryConfidence\": number between 0 and 1\n\
         - \"skills\", \"requirements\", \"benefits\": arrays of short strings\n\
         - \"salary\": {{\"min\": integer|null, \"max\": integer|null, \"currency\": string|null, \
         \"period\": \"year\"|\"month\"|\"hour\"|null}} or null\n\
         Do not add commentary.",
        CATEGORIES
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ")
    )
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PromptPosting<'a> {
    id: Uuid,
    title: &'a str,
    company: &'a str,
    location: &'a str,
    salary_text: &'a str,
    work_type: &'a str,
}

/// User prompt carrying the batch.
pub fn batch_prompt(batch: &[RawRecord]) -> Result<String> {
    let postings: Vec<PromptPosting<'_>> = batch
        .iter()
        .map(|r| PromptPosting {
            id: r.id,
            title: &r.title,
            company: &r.company,
            location: &r.location,
            salary_text: &r.salary_text,
            work_type: &r.work_type,
        })
        .collect();
    Ok(format!(
        "Classify these {} job postings:\n{}",
        postings.len(),
        serde_json::to_string_pretty(&postings)?
    ))
}

fn code_fence() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("fence pattern is valid")
    })
}

/// Strip a markdown code fence if the model wrapped its answer in one.
pub fn strip_code_fence(text: &str) -> &str {
    match code_fence().captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

/// Parse model output into enrichments.
///
/// Returns an error only when no JSON array can be found at all.
pub fn parse_enrichments(text: &str) -> Result<Vec<Enrichment>> {
    let body = strip_code_fence(text);
    let value: JsonValue = serde_json::from_str(body).or_else(|_| {
        // Prose around a bare array: take the outermost brackets.
        match (body.find('['), body.rfind(']')) {
            (Some(start), Some(end)) if start < end => serde_json::from_str(&body[start..=end]),
            _ => serde_json::from_str::<JsonValue>(body),
        }
    })?;

    let items = match value {
        JsonValue::Array(items) => items,
        JsonValue::Object(map) => map
            .into_iter()
            .find_map(|(_, v)| match v {
                JsonValue::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| Error::Classifier("response object holds no array".into()))?,
        other => {
            return Err(Error::Classifier(format!(
                "expected a JSON array, got {}",
                json_kind(&other)
            )))
        }
    };

    Ok(items.into_iter().filter_map(parse_entry).collect())
}

fn parse_entry(mut item: JsonValue) -> Option<Enrichment> {
    match serde_json::from_value::<Enrichment>(item.clone()) {
        Ok(e) => Some(e),
        Err(first) => {
            // A mangled id should not cost the whole entry; identity matching
            // can still place it.
            if let Some(obj) = item.as_object_mut() {
                obj.remove("id");
            }
            match serde_json::from_value::<Enrichment>(item) {
                Ok(e) => Some(e),
                Err(_) => {
                    warn!(
                        subsystem = "inference",
                        component = "classifier",
                        error = %first,
                        "Dropping unparseable enrichment entry"
                    );
                    None
                }
            }
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
