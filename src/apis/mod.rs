pub mod adzuna;
pub mod jooble;
pub mod usajobs;

use crate::config::CollectionConfig;
use crate::error::{Result, ScraperError};
use crate::types::JobApi;

// User-facing API names (used in CLI)
pub const ADZUNA_API: &str = "adzuna";
pub const USAJOBS_API: &str = "usajobs";
pub const JOOBLE_API: &str = "jooble";

/// Get all supported provider names
pub fn supported_apis() -> Vec<&'static str> {
    vec![ADZUNA_API, USAJOBS_API, JOOBLE_API]
}

/// Build a provider client by name; credentials come from the environment.
pub fn create_api(api_name: &str, collection: &CollectionConfig) -> Result<Box<dyn JobApi>> {
    match api_name {
        ADZUNA_API => Ok(Box::new(adzuna::AdzunaClient::from_env(
            collection.max_pages,
            collection.page_delay_ms,
        )?)),
        USAJOBS_API => Ok(Box::new(usajobs::UsaJobsClient::from_env(
            collection.max_pages,
            collection.page_delay_ms,
        )?)),
        JOOBLE_API => Ok(Box::new(jooble::JoobleClient::from_env(
            collection.max_pages,
            collection.page_delay_ms,
        )?)),
        other => Err(ScraperError::Config(format!(
            "Unknown API '{other}', expected one of {:?}",
            supported_apis()
        ))),
    }
}

/// "$100000" reads badly in salary_text; providers that only return numeric
/// bounds get "$100,000 - $130,000 a year" style text instead.
pub(crate) fn format_usd(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if whole < 0 {
        format!("-${grouped}")
    } else {
        format!("${grouped}")
    }
}

/// Salary text for a posting with some combination of numeric bounds.
pub(crate) fn salary_text_from_bounds(min: Option<f64>, max: Option<f64>) -> Option<String> {
    match (min, max) {
        (Some(min), Some(max)) => Some(format!(
            "{} - {} a year",
            format_usd(min),
            format_usd(max)
        )),
        (Some(min), None) => Some(format!("From {} a year", format_usd(min))),
        (None, Some(max)) => Some(format!("Up to {} a year", format_usd(max))),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_formatting_groups_thousands() {
        assert_eq!(format_usd(100_000.0), "$100,000");
        assert_eq!(format_usd(950.0), "$950");
        assert_eq!(format_usd(1_234_567.4), "$1,234,567");
    }

    #[test]
    fn salary_text_covers_all_bound_combinations() {
        assert_eq!(
            salary_text_from_bounds(Some(100_000.0), Some(130_000.0)).as_deref(),
            Some("$100,000 - $130,000 a year")
        );
        assert_eq!(
            salary_text_from_bounds(Some(90_000.0), None).as_deref(),
            Some("From $90,000 a year")
        );
        assert_eq!(
            salary_text_from_bounds(None, Some(120_000.0)).as_deref(),
            Some("Up to $120,000 a year")
        );
        assert_eq!(salary_text_from_bounds(None, None), None);
    }
}
