use crate::cleaning::{run_full_cleaning, CleaningStats};
use crate::config::{CleaningConfig, CollectionConfig};
use crate::error::Result;
use crate::storage::Storage;
use crate::types::{JobApi, RawPosting};
use chrono::Utc;
use metrics::{counter, histogram};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

/// Result of one collection run for a single provider.
#[derive(Debug, Serialize)]
pub struct CollectReport {
    pub api_name: String,
    pub searches: usize,
    pub fetched: usize,
    pub unique: usize,
    pub errors: Vec<String>,
    pub output_file: Option<String>,
}

/// Run the configured (query, location) grid against one provider and persist
/// the deduplicated result as a single timestamped batch file. Per-search
/// failures are collected, not fatal: the grid keeps going.
#[instrument(skip(api, collection), fields(api_name = %api.api_name()))]
pub async fn collect_for_api(
    api: Box<dyn JobApi>,
    collection: &CollectionConfig,
) -> Result<CollectReport> {
    let api_name = api.api_name().to_string();
    info!("🚀 Starting collection for {}", api_name);
    counter!("jobs_collect_runs_total", "api" => api_name.clone()).increment(1);
    let started = std::time::Instant::now();

    let mut postings: Vec<RawPosting> = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut errors = Vec::new();
    let mut fetched = 0;
    let mut searches = 0;

    for location in &collection.search_locations {
        for term in &collection.search_terms {
            searches += 1;
            match api.fetch_postings(term, location).await {
                Ok(batch) => {
                    fetched += batch.len();
                    for posting in batch {
                        if seen_ids.insert(posting.job_id.clone()) {
                            postings.push(posting);
                        }
                    }
                }
                Err(e) => {
                    let msg = format!("'{term}' in '{location}': {e}");
                    error!("Search failed for {}", msg);
                    counter!("jobs_collect_errors_total", "api" => api_name.clone()).increment(1);
                    errors.push(msg);
                }
            }

            tokio::time::sleep(std::time::Duration::from_millis(collection.search_delay_ms)).await;
        }
    }

    let output_file = if postings.is_empty() {
        None
    } else {
        Some(persist_batch(&postings, &api_name, &collection.batch_dir)?)
    };

    let duration = started.elapsed().as_secs_f64();
    histogram!("jobs_collect_duration_seconds", "api" => api_name.clone()).record(duration);
    counter!("jobs_postings_fetched_total", "api" => api_name.clone()).increment(fetched as u64);

    info!(
        "✅ Collection finished for {}: {} fetched, {} unique, {} errors",
        api_name,
        fetched,
        postings.len(),
        errors.len()
    );

    Ok(CollectReport {
        api_name,
        searches,
        fetched,
        unique: postings.len(),
        errors,
        output_file,
    })
}

/// Persist collected postings to a timestamped JSON batch file.
fn persist_batch(postings: &[RawPosting], api_name: &str, batch_dir: &str) -> Result<String> {
    fs::create_dir_all(batch_dir)?;

    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let filename = format!("{api_name}_{timestamp}.json");
    let filepath = Path::new(batch_dir).join(&filename);

    let json_content = serde_json::to_string_pretty(postings)?;
    fs::write(&filepath, json_content)?;

    debug!("Wrote {} postings to {}", postings.len(), filepath.display());
    Ok(filepath.to_string_lossy().to_string())
}

/// Result of one cleaning run.
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub stats: CleaningStats,
}

/// Bulk read from the raw store, the in-memory cleaning chain, and the
/// wholesale publish to the cleaned store. The two store operations are the
/// only fatal failure points; everything in between degrades row by row.
pub struct CleaningPipeline {
    storage: Arc<dyn Storage>,
    config: CleaningConfig,
}

impl CleaningPipeline {
    pub fn new(storage: Arc<dyn Storage>, config: CleaningConfig) -> Self {
        Self { storage, config }
    }

    /// Run the full cleaning pipeline once. Returns the report whose
    /// `stats.published` is the number of records now in the cleaned store.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<PipelineReport> {
        let run_id = Uuid::new_v4();
        info!("🧹 Starting cleaning run {}", run_id);
        counter!("jobs_cleaning_runs_total").increment(1);
        let started = std::time::Instant::now();

        let raw = self.storage.fetch_all_raw().await?;
        info!("Fetched {} raw postings", raw.len());

        let (cleaned, stats) = run_full_cleaning(raw, &self.config);

        self.storage.replace_cleaned(&cleaned).await?;

        let duration = started.elapsed().as_secs_f64();
        histogram!("jobs_cleaning_duration_seconds").record(duration);
        counter!("jobs_postings_published_total").increment(stats.published as u64);

        info!(
            "✅ Cleaning run {} finished: {} raw -> {} published ({} missing state, {} excluded source, {} duplicates, {} per-unit, {} imputed)",
            run_id,
            stats.raw_records,
            stats.published,
            stats.missing_state_dropped,
            stats.excluded_source_dropped,
            stats.duplicates_removed,
            stats.per_unit_dropped,
            stats.imputed
        );

        Ok(PipelineReport { run_id, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use chrono::TimeZone;

    fn raw(job_id: &str, source: &str, location: Option<&str>) -> RawPosting {
        RawPosting {
            job_id: job_id.to_string(),
            source: source.to_string(),
            title: Some("Data Scientist".to_string()),
            company: Some("Acme".to_string()),
            location: location.map(str::to_string),
            salary_text: None,
            salary_min: None,
            salary_max: None,
            job_type: None,
            posted_date: None,
            search_query: None,
            search_location: None,
            scraped_at: Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn run_publishes_only_resolvable_records() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .append_raw(&[
                raw("a", "Adzuna", Some("Houston, TX")),
                raw("b", "Adzuna", Some("Remote")),
            ])
            .await
            .unwrap();

        let pipeline = CleaningPipeline::new(storage.clone(), CleaningConfig::default());
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.stats.published, 1);
        assert_eq!(report.stats.missing_state_dropped, 1);
        let cleaned = storage.fetch_all_cleaned().await.unwrap();
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].location_state, "TX");
    }

    #[tokio::test]
    async fn rerun_replaces_the_cleaned_store_wholesale() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .append_raw(&[raw("a", "Adzuna", Some("Houston, TX"))])
            .await
            .unwrap();

        let pipeline = CleaningPipeline::new(storage.clone(), CleaningConfig::default());
        pipeline.run().await.unwrap();
        pipeline.run().await.unwrap();

        // Two runs over the same raw snapshot converge, not accumulate
        assert_eq!(storage.fetch_all_cleaned().await.unwrap().len(), 1);
    }
}
