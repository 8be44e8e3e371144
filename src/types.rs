use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One scraped job advertisement, exactly as a provider client emitted it.
///
/// `job_id` is the source-assigned identifier and is required; everything else
/// tolerates absence because the providers disagree about what they return.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPosting {
    pub job_id: String,
    pub source: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub salary_text: Option<String>,
    #[serde(default)]
    pub salary_min: Option<f64>,
    #[serde(default)]
    pub salary_max: Option<f64>,
    #[serde(default)]
    pub job_type: Option<String>,
    #[serde(default)]
    pub posted_date: Option<String>,
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub search_location: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// Canonical job-type categories produced by job-type canonicalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobCategory {
    #[serde(rename = "Full-time")]
    FullTime,
    #[serde(rename = "Part-time")]
    PartTime,
    Contract,
    Temporary,
    Internship,
}

impl JobCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobCategory::FullTime => "Full-time",
            JobCategory::PartTime => "Part-time",
            JobCategory::Contract => "Contract",
            JobCategory::Temporary => "Temporary",
            JobCategory::Internship => "Internship",
        }
    }
}

impl fmt::Display for JobCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical, query-ready derivative of one or more raw postings sharing a
/// `job_id`. Salary bounds are annualized USD. `location_state` is always a
/// valid 2-letter code: records that cannot resolve one never become cleaned
/// postings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanedPosting {
    pub job_id: String,
    pub source: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub location_city: Option<String>,
    pub location_state: String,
    pub salary_text: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub job_type: Option<JobCategory>,
    pub posted_date: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// Core trait that all job posting providers must implement.
#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    /// Unique identifier for this provider client
    fn api_name(&self) -> &'static str;

    /// Fetch postings for one (query, location) pair, paginating internally.
    /// Implementations stamp `search_query`, `search_location` and
    /// `scraped_at` on every posting they return.
    async fn fetch_postings(&self, query: &str, location: &str) -> Result<Vec<RawPosting>>;
}
