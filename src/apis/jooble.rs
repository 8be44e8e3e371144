use crate::error::{Result, ScraperError};
use crate::types::{JobApi, RawPosting};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};
use std::env;
use tracing::{debug, info, instrument, warn};

const BASE_URL: &str = "https://jooble.org/api";
const RESULTS_PER_PAGE: u64 = 50;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d.,]+").unwrap());

pub struct JoobleClient {
    client: reqwest::Client,
    api_key: String,
    max_pages: u32,
    page_delay_ms: u64,
}

impl JoobleClient {
    pub fn from_env(max_pages: u32, page_delay_ms: u64) -> Result<Self> {
        let api_key = env::var("JOOBLE_API_KEY").map_err(|_| {
            ScraperError::Config("JOOBLE_API_KEY not set; check your .env".to_string())
        })?;

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()?,
            api_key,
            max_pages,
            page_delay_ms,
        })
    }

    async fn search_page(&self, what: &str, where_: &str, page: u32) -> Result<Value> {
        let url = format!("{BASE_URL}/{}", self.api_key);
        let payload = json!({
            "keywords": what,
            "location": where_,
            "page": page.to_string(),
            "ResultOnPage": RESULTS_PER_PAGE.to_string(),
            "companysearch": "false",
        });

        let response = self.client.post(&url).json(&payload).send().await?;
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Pull (min, max) out of Jooble's free-text salary field, e.g.
    /// "$80,000 - $95,000" or "from 60k". Unparseable text yields no bounds
    /// but keeps the text for the unit corrector downstream.
    fn parse_salary(salary_text: &str) -> (Option<f64>, Option<f64>) {
        let mut values = NUMBER_RE
            .find_iter(salary_text)
            .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok());
        let min = values.next();
        let max = values.next();
        (min, max)
    }

    fn transform(&self, job: &Value, query: &str, location: &str) -> Option<RawPosting> {
        let job_id = match job.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return None,
        };

        let salary_text = job
            .get("salary")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string);
        let (salary_min, salary_max) = salary_text
            .as_deref()
            .map(Self::parse_salary)
            .unwrap_or((None, None));

        let posted_date = job
            .get("updated")
            .and_then(|v| v.as_str())
            .map(|s| s.split('T').next().unwrap_or(s).to_string());

        // Jooble aggregates other boards; keep the upstream board name when
        // it reports one.
        let source = job
            .get("source")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("Jooble")
            .to_string();

        Some(RawPosting {
            job_id,
            source,
            title: job.get("title").and_then(|v| v.as_str()).map(str::to_string),
            company: job
                .get("company")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            location: job
                .get("location")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            salary_text,
            salary_min,
            salary_max,
            job_type: job.get("type").and_then(|v| v.as_str()).map(str::to_string),
            posted_date,
            search_query: Some(query.to_string()),
            search_location: Some(location.to_string()),
            scraped_at: Utc::now(),
        })
    }
}

#[async_trait::async_trait]
impl JobApi for JoobleClient {
    fn api_name(&self) -> &'static str {
        super::JOOBLE_API
    }

    #[instrument(skip(self))]
    async fn fetch_postings(&self, query: &str, location: &str) -> Result<Vec<RawPosting>> {
        let mut postings = Vec::new();

        for page in 1..=self.max_pages {
            let response = match self.search_page(query, location, page).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Jooble page {} failed: {}", page, e);
                    break;
                }
            };

            let jobs = response
                .get("jobs")
                .and_then(|j| j.as_array())
                .cloned()
                .unwrap_or_default();
            if jobs.is_empty() {
                debug!("No more results on page {}, stopping", page);
                break;
            }

            for job in &jobs {
                if let Some(posting) = self.transform(job, query, location) {
                    postings.push(posting);
                }
            }

            let total = response
                .get("totalCount")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            let last_page = total / RESULTS_PER_PAGE + 1;
            if u64::from(page) >= last_page {
                debug!("Reached last page ({} of {})", page, last_page);
                break;
            }

            if page < self.max_pages {
                tokio::time::sleep(std::time::Duration::from_millis(self.page_delay_ms)).await;
            }
        }

        info!(
            "Jooble: collected {} postings for '{}' in '{}'",
            postings.len(),
            query,
            location
        );
        Ok(postings)
    }
}
