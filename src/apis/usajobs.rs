use super::format_usd;
use crate::error::{Result, ScraperError};
use crate::types::{JobApi, RawPosting};
use chrono::Utc;
use serde_json::Value;
use std::env;
use tracing::{debug, info, instrument, warn};

const BASE_URL: &str = "https://data.usajobs.gov/api";
const RESULTS_PER_PAGE: u64 = 500;

pub struct UsaJobsClient {
    client: reqwest::Client,
    api_key: String,
    email: String,
    max_pages: u32,
    page_delay_ms: u64,
}

impl UsaJobsClient {
    pub fn from_env(max_pages: u32, page_delay_ms: u64) -> Result<Self> {
        let api_key = env::var("USAJOBS_API_KEY").map_err(|_| {
            ScraperError::Config("USAJOBS_API_KEY not set; check your .env".to_string())
        })?;
        let email = env::var("USAJOBS_EMAIL").map_err(|_| {
            ScraperError::Config("USAJOBS_EMAIL not set; check your .env".to_string())
        })?;

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()?,
            api_key,
            email,
            max_pages,
            page_delay_ms,
        })
    }

    async fn search_page(&self, keyword: &str, location: &str, page: u32) -> Result<Value> {
        let url = format!("{BASE_URL}/search");
        let page_str = page.to_string();
        let results_per_page = RESULTS_PER_PAGE.to_string();
        let params = [
            ("Keyword", keyword),
            ("LocationName", location),
            ("ResultsPerPage", results_per_page.as_str()),
            ("Page", page_str.as_str()),
            ("DatePosted", "30"),
        ];

        let response = self
            .client
            .get(&url)
            .header("Authorization-Key", &self.api_key)
            .header("User-Agent", &self.email)
            .header("Host", "data.usajobs.gov")
            .query(&params)
            .send()
            .await?;
        match response.status().as_u16() {
            401 => {
                return Err(ScraperError::Api {
                    message: "USAJobs authentication failed, check your API key".to_string(),
                })
            }
            403 => {
                return Err(ScraperError::Api {
                    message: "USAJobs access forbidden, check the email in User-Agent".to_string(),
                })
            }
            _ => {}
        }
        let response = response.error_for_status()?;
        Ok(response.json().await?)
    }

    /// Map one USAJobs `SearchResultItem` into the common raw posting shape.
    fn transform(&self, item: &Value, query: &str, location: &str) -> Option<RawPosting> {
        let descriptor = item.get("MatchedObjectDescriptor")?;

        let job_id = descriptor
            .get("PositionID")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())?
            .to_string();

        let company = descriptor
            .get("OrganizationName")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .or_else(|| descriptor.get("DepartmentName").and_then(|v| v.as_str()))
            .map(str::to_string);

        // First listed duty location
        let posting_location = descriptor
            .get("PositionLocation")
            .and_then(|l| l.as_array())
            .and_then(|l| l.first())
            .and_then(|loc| {
                let city = loc.get("CityName").and_then(|v| v.as_str()).unwrap_or("");
                let state = loc.get("StateName").and_then(|v| v.as_str()).unwrap_or("");
                match (city.is_empty(), state.is_empty()) {
                    (false, false) => Some(format!("{city}, {state}")),
                    (false, true) => Some(city.to_string()),
                    (true, false) => Some(state.to_string()),
                    (true, true) => None,
                }
            });

        let mut salary_text = None;
        let mut salary_min = None;
        let mut salary_max = None;
        if let Some(remuneration) = descriptor
            .get("PositionRemuneration")
            .and_then(|r| r.as_array())
            .and_then(|r| r.first())
        {
            salary_min = remuneration
                .get("MinimumRange")
                .and_then(value_as_f64)
                .filter(|v| *v > 0.0);
            salary_max = remuneration
                .get("MaximumRange")
                .and_then(value_as_f64)
                .filter(|v| *v > 0.0);
            salary_text = match (salary_min, salary_max) {
                (Some(min), Some(max)) => {
                    Some(format!("{} - {} a year", format_usd(min), format_usd(max)))
                }
                (Some(min), None) => Some(format!("From {} a year", format_usd(min))),
                _ => None,
            };

            // Non-annual rate intervals keep their code visible in the text
            // rather than being silently presented as annual figures.
            let interval = remuneration
                .get("RateIntervalCode")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            if !matches!(interval, "PA" | "PER YEAR" | "") {
                salary_text = salary_text.map(|text| format!("{text} ({interval})"));
            }
        }

        let job_type = descriptor
            .get("PositionOfferingType")
            .and_then(|t| t.as_array())
            .and_then(|t| t.first())
            .and_then(|o| o.get("Name"))
            .and_then(|v| v.as_str())
            .map(|name| match name {
                "Permanent" => "Full-time".to_string(),
                "Temporary" => "Temporary".to_string(),
                "Term" => "Contract".to_string(),
                "Intermittent" => "Part-time".to_string(),
                other => other.to_string(),
            });

        let posted_date = descriptor
            .get("PublicationStartDate")
            .and_then(|v| v.as_str())
            .map(|s| s.split('T').next().unwrap_or(s).to_string());

        Some(RawPosting {
            job_id,
            source: "USAJobs".to_string(),
            title: descriptor
                .get("PositionTitle")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            company,
            location: posting_location,
            salary_text,
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

/// USAJobs returns salary bounds as strings ("55000.0")
fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait::async_trait]
impl JobApi for UsaJobsClient {
    fn api_name(&self) -> &'static str {
        super::USAJOBS_API
    }

    #[instrument(skip(self))]
    async fn fetch_postings(&self, query: &str, location: &str) -> Result<Vec<RawPosting>> {
        let mut postings = Vec::new();

        for page in 1..=self.max_pages {
            let response = match self.search_page(query, location, page).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("USAJobs page {} failed: {}", page, e);
                    break;
                }
            };

            let items = response
                .get("SearchResult")
                .and_then(|r| r.get("SearchResultItems"))
                .and_then(|i| i.as_array())
                .cloned()
                .unwrap_or_default();
            if items.is_empty() {
                debug!("No more results on page {}, stopping", page);
                break;
            }

            for item in &items {
                if let Some(posting) = self.transform(item, query, location) {
                    postings.push(posting);
                }
            }

            if (items.len() as u64) < RESULTS_PER_PAGE {
                break;
            }

            if page < self.max_pages {
                tokio::time::sleep(std::time::Duration::from_millis(self.page_delay_ms)).await;
            }
        }

        info!(
            "USAJobs: collected {} postings for '{}' in '{}'",
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

    fn client() -> UsaJobsClient {
        UsaJobsClient {
            client: reqwest::Client::new(),
            api_key: "key".to_string(),
            email: "dev@example.com".to_string(),
            max_pages: 1,
            page_delay_ms: 0,
        }
    }

    #[test]
    fn transform_maps_descriptor_fields() {
        let item = json!({
            "MatchedObjectDescriptor": {
                "PositionID": "ABC-123",
                "PositionTitle": "Data Scientist",
                "OrganizationName": "Forest Service",
                "PositionLocation": [{"CityName": "Houston", "StateName": "Texas"}],
                "PositionRemuneration": [{
                    "MinimumRange": "88000.0",
                    "MaximumRange": "114000.0",
                    "RateIntervalCode": "PA"
                }],
                "PositionOfferingType": [{"Name": "Permanent"}],
                "PublicationStartDate": "2025-01-05T00:00:00.0000000"
            }
        });

        let posting = client().transform(&item, "data scientist", "TX").unwrap();

        assert_eq!(posting.job_id, "ABC-123");
        assert_eq!(posting.source, "USAJobs");
        assert_eq!(posting.location.as_deref(), Some("Houston, Texas"));
        assert_eq!(posting.salary_min, Some(88_000.0));
        assert_eq!(posting.salary_max, Some(114_000.0));
        assert_eq!(
            posting.salary_text.as_deref(),
            Some("$88,000 - $114,000 a year")
        );
        assert_eq!(posting.job_type.as_deref(), Some("Full-time"));
        assert_eq!(posting.posted_date.as_deref(), Some("2025-01-05"));
    }

    #[test]
    fn hourly_rate_interval_stays_visible_in_salary_text() {
        let item = json!({
            "MatchedObjectDescriptor": {
                "PositionID": "H-1",
                "PositionRemuneration": [{
                    "MinimumRange": "25.0",
                    "MaximumRange": "32.0",
                    "RateIntervalCode": "PH"
                }]
            }
        });

        let posting = client().transform(&item, "q", "TX").unwrap();

        assert_eq!(posting.salary_text.as_deref(), Some("$25 - $32 a year (PH)"));
    }

    #[test]
    fn item_without_position_id_is_skipped() {
        let item = json!({"MatchedObjectDescriptor": {"PositionTitle": "No id"}});
        assert!(client().transform(&item, "q", "TX").is_none());
    }
}
