//! Deterministic, vocabulary-sampled job listings.
//!
//! Field content for a given `(keyword, page)` never changes between runs, so
//! re-crawling produces the same postings and the sink upserts them in place.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use jobsight_core::defaults::CRAWL_SIMULATED_SOURCE;
use jobsight_core::{CrawlQuery, CrawlSource, Error, RawRecord, Result};

const SENIORITY: &[&str] = &["Junior", "Mid-level", "Senior", "Lead", "Principal"];

const ROLES: &[&str] = &[
    "Backend Developer",
    "Frontend Developer",
    "Full Stack Engineer",
    "Data Engineer",
    "ML Engineer",
    "Product Designer",
    "DevOps Engineer",
    "Marketing Specialist",
    "QA Engineer",
    "Mobile Developer",
];

const COMPANIES: &[&str] = &[
    "Acme",
    "Globex",
    "Initech",
    "Umbrella Labs",
    "Stark Industries",
    "Wayne Analytics",
    "Hooli",
    "Pied Piper",
    "Vandelay Imports",
    "Soylent Systems",
];

const LOCATIONS: &[&str] = &[
    "Seoul",
    "Busan",
    "Berlin",
    "London",
    "New York",
    "San Francisco",
    "Toronto",
    "Singapore",
    "Remote",
];

const WORK_TYPES: &[&str] = &["Full-time", "Part-time", "Contract", "Internship", "Remote"];

const CURRENCIES: &[&str] = &["USD", "EUR", "GBP", "KRW"];

/// Produces `page_size` records per page from a fixed vocabulary.
pub struct SimulatedCrawlSource {
    failing_pages: HashSet<u32>,
    page_limit: Option<u32>,
}

impl Default for SimulatedCrawlSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedCrawlSource {
    pub fn new() -> Self {
        Self {
            failing_pages: HashSet::new(),
            page_limit: None,
        }
    }

    /// Make `page` fail with [`Error::SourceUnavailable`].
    pub fn with_failing_page(mut self, page: u32) -> Self {
        self.failing_pages.insert(page);
        self
    }

    /// Return empty pages after `last_page`, as an exhausted listing would.
    pub fn with_page_limit(mut self, last_page: u32) -> Self {
        self.page_limit = Some(last_page);
        self
    }

    fn rng_for(keyword: &str, page: u32) -> StdRng {
        let digest = Sha256::digest(format!("{}|{}", keyword.trim().to_lowercase(), page));
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&digest);
        StdRng::from_seed(seed)
    }

    fn pick<'a>(rng: &mut StdRng, values: &[&'a str]) -> &'a str {
        values.choose(rng).copied().unwrap_or_default()
    }

    fn salary_text(rng: &mut StdRng) -> String {
        if rng.gen_bool(0.2) {
            return "Negotiable".to_string();
        }
        let currency = Self::pick(rng, CURRENCIES);
        let low = rng.gen_range(3..=12) * 10;
        let high = low + rng.gen_range(1..=4) * 10;
        if currency == "KRW" {
            format!("{}00만 - {}00만 KRW / year", low / 10, high / 10)
        } else {
            format!("{}k - {}k {} / year", low, high, currency)
        }
    }
}

#[async_trait]
impl CrawlSource for SimulatedCrawlSource {
    async fn fetch_page(&self, query: &CrawlQuery, page: u32) -> Result<Vec<RawRecord>> {
        if self.failing_pages.contains(&page) {
            return Err(Error::SourceUnavailable(format!(
                "simulated listing page {} unavailable",
                page
            )));
        }
        if self.page_limit.is_some_and(|limit| page > limit) {
            return Ok(Vec::new());
        }

        let keyword = query.keyword.trim();
        let mut rng = Self::rng_for(keyword, page);
        let scraped_at = Utc::now();

        let records = (0..query.page_size)
            .map(|i| {
                let seniority = Self::pick(&mut rng, SENIORITY);
                let role = Self::pick(&mut rng, ROLES);
                let title = if rng.gen_bool(0.5) {
                    format!("{} {}", seniority, role)
                } else {
                    format!("{} {} ({})", seniority, role, keyword)
                };
                let company = Self::pick(&mut rng, COMPANIES).to_string();
                let location = Self::pick(&mut rng, LOCATIONS).to_string();
                let work_type = Self::pick(&mut rng, WORK_TYPES).to_string();
                let salary_text = Self::salary_text(&mut rng);
                let slug = format!("{}-{}", page, i);

                RawRecord {
                    id: Uuid::now_v7(),
                    url: format!(
                        "https://jobs.example.com/{}/{}",
                        keyword.replace(' ', "-").to_lowercase(),
                        slug
                    ),
                    title,
                    company,
                    location,
                    salary_text,
                    work_type,
                    source: CRAWL_SIMULATED_SOURCE.to_string(),
                    scraped_at,
                }
            })
            .collect();
        Ok(records)
    }

    fn name(&self) -> &str {
        CRAWL_SIMULATED_SOURCE
    }
}
