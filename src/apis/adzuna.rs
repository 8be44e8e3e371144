use super::salary_text_from_bounds;
use crate::error::{Result, ScraperError};
use crate::types::{JobApi, RawPosting};
use chrono::Utc;
use serde_json::Value;
use std::env;
use tracing::{debug, info, instrument, warn};

const BASE_URL: &str = "https://api.adzuna.com/v1/api/jobs";
const RESULTS_PER_PAGE: u64 = 50;

pub struct AdzunaClient {
    client: reqwest::Client,
    app_id: String,
    app_key: String,
    country: String,
    max_pages: u32,
    page_delay_ms: u64,
}

impl AdzunaClient {
    pub fn from_env(max_pages: u32, page_delay_ms: u64) -> Result<Self> {
        let app_id = env::var("ADZUNA_API_ID").map_err(|_| {
            ScraperError::Config("ADZUNA_API_ID not set; check your .env".to_string())
        })?;
        let app_key = env::var("ADZUNA_API_KEY").map_err(|_| {
            ScraperError::Config("ADZUNA_API_KEY not set; check your .env".to_string())
        })?;

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()?,
            app_id,
            app_key,
            country: "us".to_string(),
            max_pages,
            page_delay_ms,
        })
    }

    async fn search_page(&self, what: &str, where_: &str, page: u32) -> Result<Value> {
        let url = format!("{BASE_URL}/{}/search", self.country);
        let page_str = page.to_string();
        let results_per_page = RESULTS_PER_PAGE.to_string();
        let mut params = vec![
            ("what", what),
            ("where", where_),
            ("results_per_page", results_per_page.as_str()),
            ("app_id", self.app_id.as_str()),
            ("app_key", self.app_key.as_str()),
        ];
        if page > 1 {
            params.push(("page", page_str.as_str()));
        }

        let response = self.client.get(&url).query(&params).send().await?;
        match response.status().as_u16() {
            429 => {
                return Err(ScraperError::Api {
                    message: "Adzuna rate limit exceeded".to_string(),
                })
            }
            401 => {
                return Err(ScraperError::Api {
                    message: "Adzuna authentication failed".to_string(),
                })
            }
            _ => {}
        }
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Map one Adzuna result into the common raw posting shape. Records
    /// without an id are unusable and skipped.
    fn transform(&self, job: &Value, query: &str, location: &str) -> Option<RawPosting> {
        let job_id = match job.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return None,
        };

        let display_location = job
            .get("location")
            .and_then(|l| l.get("display_name"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| {
                let area: Vec<&str> = job
                    .get("location")
                    .and_then(|l| l.get("area"))
                    .and_then(|a| a.as_array())
                    .map(|a| a.iter().filter_map(|v| v.as_str()).collect())
                    .unwrap_or_default();
                if area.is_empty() {
                    None
                } else {
                    Some(area.join(", "))
                }
            });

        let salary_min = job.get("salary_min").and_then(|v| v.as_f64());
        let salary_max = job.get("salary_max").and_then(|v| v.as_f64());

        let contract_type = job
            .get("contract_type")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let job_type = match contract_type.to_lowercase().as_str() {
            "full_time" | "permanent" => Some("Full-time".to_string()),
            "part_time" => Some("Part-time".to_string()),
            "contract" => Some("Contract".to_string()),
            "" => None,
            other => Some(other.to_string()),
        };

        let posted_date = job
            .get("created")
            .and_then(|v| v.as_str())
            .map(|s| s.split('T').next().unwrap_or(s).to_string());

        Some(RawPosting {
            job_id,
            source: "Adzuna".to_string(),
            title: job.get("title").and_then(|v| v.as_str()).map(str::to_string),
            company: job
                .get("company")
                .and_then(|c| c.get("display_name"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            location: display_location,
            salary_text: salary_text_from_bounds(salary_min, salary_max),
            salary_min,
            salary_max,
            job_type,
            posted_date,
            search_query: Some(query.to_string()),
            search_location: Some(location.to_string()),
            scraped_at: Utc::now(),
        })
    }
}

#[async_trait::async_trait]
impl JobApi for AdzunaClient {
    fn api_name(&self) -> &'static str {
        super::ADZUNA_API
    }

    #[instrument(skip(self))]
    async fn fetch_postings(&self, query: &str, location: &str) -> Result<Vec<RawPosting>> {
        let mut postings = Vec::new();

        for page in 1..=self.max_pages {
            let response = match self.search_page(query, location, page).await {
                Ok(response) => response,
                Err(e) => {
                    // Keep what earlier pages returned
                    warn!("Adzuna page {} failed: {}", page, e);
                    break;
                }
            };

            let results = response
                .get("results")
                .and_then(|r| r.as_array())
                .cloned()
                .unwrap_or_default();
            if results.is_empty() {
                debug!("No more results on page {}, stopping", page);
                break;
            }

            for job in &results {
                if let Some(posting) = self.transform(job, query, location) {
                    postings.push(posting);
                }
            }

            let total = response.get("count").and_then(|v| v.as_u64()).unwrap_or(0);
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
            "Adzuna: collected {} postings for '{}' in '{}'",
            postings.len(),
            query,
            location
        );
        Ok(postings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> AdzunaClient {
        AdzunaClient {
            client: reqwest::Client::new(),
            app_id: "id".to_string(),
            app_key: "key".to_string(),
            country: "us".to_string(),
            max_pages: 1,
            page_delay_ms: 0,
        }
    }

    #[test]
    fn transform_maps_the_full_shape() {
        let job = json!({
            "id": 12345,
            "title": "Data Scientist",
            "company": {"display_name": "Acme"},
            "location": {"display_name": "Houston, TX"},
            "salary_min": 100000.0,
            "salary_max": 130000.0,
            "contract_type": "full_time",
            "created": "2025-01-02T08:00:00Z"
        });

        let posting = client().transform(&job, "data scientist", "TX").unwrap();

        assert_eq!(posting.job_id, "12345");
        assert_eq!(posting.source, "Adzuna");
        assert_eq!(posting.company.as_deref(), Some("Acme"));
        assert_eq!(posting.location.as_deref(), Some("Houston, TX"));
        assert_eq!(
            posting.salary_text.as_deref(),
            Some("$100,000 - $130,000 a year")
        );
        assert_eq!(posting.job_type.as_deref(), Some("Full-time"));
        assert_eq!(posting.posted_date.as_deref(), Some("2025-01-02"));
        assert_eq!(posting.search_location.as_deref(), Some("TX"));
    }

    #[test]
    fn transform_falls_back_to_area_and_tolerates_gaps() {
        let job = json!({
            "id": "abc",
            "location": {"area": ["US", "Texas", "Houston"]}
        });

        let posting = client().transform(&job, "q", "TX").unwrap();

        assert_eq!(posting.location.as_deref(), Some("US, Texas, Houston"));
        assert_eq!(posting.salary_text, None);
        assert_eq!(posting.job_type, None);
    }

    #[test]
    fn transform_without_id_is_skipped() {
        let job = json!({"title": "No id"});
        assert!(client().transform(&job, "q", "TX").is_none());
    }
}
