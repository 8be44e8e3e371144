pub mod finalize;
pub mod impute;
pub mod job_type;
pub mod location;
pub mod salary;

use crate::config::CleaningConfig;
use crate::types::{CleanedPosting, JobCategory, RawPosting};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Working shape between the raw store and the finalizer: raw fields after
/// empty-value scrubbing plus the resolved location/job-type columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedPosting {
    pub job_id: String,
    pub source: String,
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub location_city: Option<String>,
    pub location_state: Option<String>,
    pub salary_text: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub job_type: Option<JobCategory>,
    pub posted_date: Option<String>,
    pub search_query: Option<String>,
    pub search_location: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

/// Empty-value canonicalization: a field whose trimmed value is empty or
/// reads "null"/"none"/"nan" (any case) is absent for all downstream logic.
pub fn scrub(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.eq_ignore_ascii_case("null")
        || trimmed.eq_ignore_ascii_case("none")
        || trimmed.eq_ignore_ascii_case("nan")
    {
        return None;
    }
    Some(value)
}

/// Field normalization for one raw posting: scrub empty values, resolve the
/// location into city/state, canonicalize the job type.
pub fn normalize(raw: RawPosting) -> NormalizedPosting {
    let location = scrub(raw.location);
    let search_location = scrub(raw.search_location);
    let (location_city, location_state) =
        location::resolve(location.as_deref(), search_location.as_deref());
    let job_type = scrub(raw.job_type).and_then(|t| job_type::canonicalize(&t));

    NormalizedPosting {
        job_id: raw.job_id,
        source: raw.source,
        title: scrub(raw.title),
        company: scrub(raw.company),
        location,
        location_city,
        location_state,
        salary_text: scrub(raw.salary_text),
        salary_min: raw.salary_min,
        salary_max: raw.salary_max,
        job_type,
        posted_date: scrub(raw.posted_date),
        search_query: scrub(raw.search_query),
        search_location,
        scraped_at: raw.scraped_at,
    }
}

/// Per-stage counters for one cleaning run.
#[derive(Debug, Default, Serialize)]
pub struct CleaningStats {
    pub raw_records: usize,
    pub per_unit_dropped: usize,
    pub imputed: usize,
    pub missing_state_dropped: usize,
    pub excluded_source_dropped: usize,
    pub duplicates_removed: usize,
    pub published: usize,
}

/// The full normalization chain: scrub, resolve, correct units, impute,
/// filter, dedup. Pure in-memory transform over the raw snapshot.
pub fn run_full_cleaning(
    raw: Vec<RawPosting>,
    config: &CleaningConfig,
) -> (Vec<CleanedPosting>, CleaningStats) {
    let mut stats = CleaningStats {
        raw_records: raw.len(),
        ..Default::default()
    };

    let mut postings: Vec<NormalizedPosting> = raw.into_iter().map(normalize).collect();

    let before = postings.len();
    postings.retain_mut(salary::apply_unit_rules);
    stats.per_unit_dropped = before - postings.len();

    stats.imputed = impute::impute_missing_max(&mut postings, config.default_spread);

    let (cleaned, finalize_stats) = finalize::finalize(postings, &config.excluded_sources);
    stats.missing_state_dropped = finalize_stats.missing_state;
    stats.excluded_source_dropped = finalize_stats.excluded_source;
    stats.duplicates_removed = finalize_stats.duplicates;
    stats.published = cleaned.len();

    debug!(?stats, "cleaning chain finished");
    (cleaned, stats)
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn raw(job_id: &str) -> RawPosting {
        RawPosting {
            job_id: job_id.to_string(),
            source: "Adzuna".to_string(),
            title: Some("Data Scientist".to_string()),
            company: Some("Acme".to_string()),
            location: Some("Houston, TX".to_string()),
            salary_text: None,
            salary_min: None,
            salary_max: None,
            job_type: Some("Full-time".to_string()),
            posted_date: Some("2025-01-01".to_string()),
            search_query: Some("data scientist".to_string()),
            search_location: Some("TX".to_string()),
            scraped_at: Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn scrub_treats_sentinels_as_absent() {
        assert_eq!(scrub(Some("  ".to_string())), None);
        assert_eq!(scrub(Some("null".to_string())), None);
        assert_eq!(scrub(Some("NONE".to_string())), None);
        assert_eq!(scrub(Some(" NaN ".to_string())), None);
        assert_eq!(scrub(None), None);
        assert_eq!(scrub(Some("Houston".to_string())), Some("Houston".to_string()));
    }

    #[test]
    fn normalize_resolves_location_and_job_type() {
        let normalized = normalize(raw("a1"));
        assert_eq!(normalized.location_city.as_deref(), Some("Houston"));
        assert_eq!(normalized.location_state.as_deref(), Some("TX"));
        assert_eq!(normalized.job_type, Some(JobCategory::FullTime));
    }

    #[test]
    fn full_chain_drops_excluded_source_end_to_end() {
        let mut muse = raw("m1");
        muse.source = "Muse".to_string();
        let config = CleaningConfig::default();

        let (cleaned, stats) = run_full_cleaning(vec![raw("a1"), muse], &config);

        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].job_id, "a1");
        assert_eq!(stats.excluded_source_dropped, 1);
        assert_eq!(stats.published, 1);
    }
}
