use super::NormalizedPosting;
use crate::types::CleanedPosting;
use std::collections::HashSet;
use tracing::debug;

#[derive(Debug, Default)]
pub struct FinalizeStats {
    pub missing_state: usize,
    pub excluded_source: usize,
    pub duplicates: usize,
}

/// Validity filtering, source exclusion and latest-wins dedup: the last stage
/// before publish. Records without a resolvable state are irrecoverable and
/// dropped; excluded sources are removed wholesale; re-scrapes of the same
/// `job_id` collapse to the most recent `scraped_at`.
pub fn finalize(
    postings: Vec<NormalizedPosting>,
    excluded_sources: &[String],
) -> (Vec<CleanedPosting>, FinalizeStats) {
    let mut stats = FinalizeStats::default();

    let mut candidates: Vec<NormalizedPosting> = Vec::with_capacity(postings.len());
    for posting in postings {
        if posting.location_state.is_none() {
            stats.missing_state += 1;
            continue;
        }
        if excluded_sources.iter().any(|s| s == &posting.source) {
            stats.excluded_source += 1;
            continue;
        }
        candidates.push(posting);
    }

    // Most recent scrape first; the stable sort plus first-wins scan below
    // implements latest-wins per job_id.
    candidates.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at));

    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());
    let mut cleaned = Vec::with_capacity(candidates.len());
    for posting in candidates {
        if !seen.insert(posting.job_id.clone()) {
            stats.duplicates += 1;
            continue;
        }
        let location_state = posting
            .location_state
            .expect("finalize filtered records without a state");
        cleaned.push(CleanedPosting {
            job_id: posting.job_id,
            source: posting.source,
            title: posting.title,
            company: posting.company,
            location: posting.location,
            location_city: posting.location_city,
            location_state,
            salary_text: posting.salary_text,
            salary_min: posting.salary_min,
            salary_max: posting.salary_max,
            job_type: posting.job_type,
            posted_date: posting.posted_date,
            scraped_at: posting.scraped_at,
        });
    }

    debug!(
        missing_state = stats.missing_state,
        excluded_source = stats.excluded_source,
        duplicates = stats.duplicates,
        "finalize finished"
    );
    (cleaned, stats)
}
