use crate::error::Result;
use crate::storage::Storage;
use crate::types::RawPosting;
use metrics::counter;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The set of already-ingested `job_id` values. Rebuilt fresh each run from a
/// distinct-value query and passed explicitly so the loader is testable
/// without a live store. Grows monotonically within a run.
pub type Ledger = HashSet<String>;

/// One newly-scraped batch, keyed by its file name. Records stay as raw JSON
/// until the loader validates their shape.
#[derive(Debug, Clone)]
pub struct RawBatch {
    pub name: String,
    pub records: Vec<serde_json::Value>,
}

/// Result of one incremental-load run.
#[derive(Debug, Default, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped_duplicates: usize,
    /// Batches rejected in full for lacking the identifying field
    pub rejected_batches: usize,
    /// Batches that failed to write; their records are retried next run
    pub failed_batches: usize,
}

/// Reads newly-scraped batches, filters out identifiers already present in
/// the raw store, and appends the rest batch by batch.
pub struct IncrementalLoader {
    storage: Arc<dyn Storage>,
}

impl IncrementalLoader {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Load every batch file under `batch_dir` against a ledger seeded from
    /// the raw store.
    #[instrument(skip(self))]
    pub async fn run(&self, batch_dir: &Path) -> Result<LoadReport> {
        let mut ledger = self.storage.distinct_job_ids().await?;
        info!("Ledger seeded with {} known job ids", ledger.len());

        let batches = read_batches_from_dir(batch_dir)?;
        self.load_batches(batches, &mut ledger).await
    }

    /// Load batches in order against the given ledger. Accepted identifiers
    /// enter the ledger before the batch write is attempted, so identical ids
    /// later in the same run are deduplicated even if a write fails.
    pub async fn load_batches(
        &self,
        batches: Vec<RawBatch>,
        ledger: &mut Ledger,
    ) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        for batch in batches {
            if batch.records.is_empty() {
                debug!("Batch {} is empty, skipping", batch.name);
                continue;
            }

            // A batch in which any record lacks the identifying field (or
            // otherwise fails the raw shape) is rejected in full.
            let parsed: std::result::Result<Vec<RawPosting>, _> = batch
                .records
                .iter()
                .cloned()
                .map(serde_json::from_value)
                .collect();
            let postings = match parsed {
                Ok(postings) => postings,
                Err(e) => {
                    debug!("Batch {} rejected: {}", batch.name, e);
                    report.rejected_batches += 1;
                    continue;
                }
            };

            let mut accepted = Vec::with_capacity(postings.len());
            for posting in postings {
                // Covers both ledger hits and repeats within this batch;
                // first occurrence wins.
                if ledger.insert(posting.job_id.clone()) {
                    accepted.push(posting);
                } else {
                    report.skipped_duplicates += 1;
                }
            }

            if accepted.is_empty() {
                debug!("Batch {}: all records were duplicates", batch.name);
                continue;
            }

            match self.storage.append_raw(&accepted).await {
                Ok(()) => {
                    counter!("jobs_raw_loaded_total").increment(accepted.len() as u64);
                    debug!("Batch {}: loaded {} records", batch.name, accepted.len());
                    report.loaded += accepted.len();
                }
                Err(e) => {
                    // Partial-failure tolerant: log, move on to the next
                    // batch. The skipped ids resurface on the next run via
                    // the distinct-id query.
                    warn!("Failed to write batch {}: {}", batch.name, e);
                    counter!("jobs_batch_write_errors_total").increment(1);
                    report.failed_batches += 1;
                }
            }
        }

        counter!("jobs_raw_skipped_total").increment(report.skipped_duplicates as u64);
        info!(
            "Incremental load finished: {} loaded, {} duplicates skipped, {} batches rejected, {} write failures",
            report.loaded, report.skipped_duplicates, report.rejected_batches, report.failed_batches
        );
        Ok(report)
    }
}

/// Read every `*.json` batch file under `dir`, sorted by file name. A file
/// that is not a JSON array is skipped with a warning rather than failing the
/// run.
pub fn read_batches_from_dir(dir: &Path) -> Result<Vec<RawBatch>> {
    let mut batches = Vec::new();
    if !dir.exists() {
        return Ok(batches);
    }

    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().map(|ext| ext == "json").unwrap_or(false))
        .collect();
    paths.sort();

    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let content = fs::read_to_string(&path)?;
        match serde_json::from_str::<Vec<serde_json::Value>>(&content) {
            Ok(records) => batches.push(RawBatch { name, records }),
            Err(e) => warn!("Skipping malformed batch file {}: {}", name, e),
        }
    }

    Ok(batches)
}

/// Delete consumed batch files after a successful load.
pub fn remove_batch_files(dir: &Path) -> Result<usize> {
    let mut deleted = 0;
    if !dir.exists() {
        return Ok(deleted);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().map(|ext| ext == "json").unwrap_or(false) {
            match fs::remove_file(&path) {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
            }
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScraperError;
    use crate::storage::InMemoryStorage;
    use crate::types::CleanedPosting;
    use async_trait::async_trait;
    use serde_json::json;

    fn record(job_id: &str) -> serde_json::Value {
        json!({
            "job_id": job_id,
            "source": "Adzuna",
            "title": "Data Scientist",
            "scraped_at": "2025-01-02T00:00:00Z"
        })
    }

    fn batch(name: &str, records: Vec<serde_json::Value>) -> RawBatch {
        RawBatch {
            name: name.to_string(),
            records,
        }
    }

    #[tokio::test]
    async fn loads_new_records_and_skips_known_ids() {
        let storage = Arc::new(InMemoryStorage::new());
        let loader = IncrementalLoader::new(storage.clone());
        let mut ledger = Ledger::from(["a".to_string()]);

        let report = loader
            .load_batches(
                vec![batch("b1.json", vec![record("a"), record("b"), record("c")])],
                &mut ledger,
            )
            .await
            .unwrap();

        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped_duplicates, 1);
        assert_eq!(storage.fetch_all_raw().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn second_load_of_same_batch_is_idempotent() {
        let storage = Arc::new(InMemoryStorage::new());
        let loader = IncrementalLoader::new(storage.clone());

        let mut ledger = storage.distinct_job_ids().await.unwrap();
        let first = loader
            .load_batches(vec![batch("b1.json", vec![record("a"), record("b")])], &mut ledger)
            .await
            .unwrap();
        assert_eq!(first.loaded, 2);

        // Fresh ledger, as the next scheduled run would build it
        let mut ledger = storage.distinct_job_ids().await.unwrap();
        let second = loader
            .load_batches(vec![batch("b1.json", vec![record("a"), record("b")])], &mut ledger)
            .await
            .unwrap();

        assert_eq!(second.loaded, 0);
        assert_eq!(second.skipped_duplicates, 2);
        assert_eq!(storage.fetch_all_raw().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicates_across_batches_in_one_run_are_filtered() {
        let storage = Arc::new(InMemoryStorage::new());
        let loader = IncrementalLoader::new(storage.clone());
        let mut ledger = Ledger::new();

        let report = loader
            .load_batches(
                vec![
                    batch("b1.json", vec![record("a"), record("a")]),
                    batch("b2.json", vec![record("a"), record("b")]),
                ],
                &mut ledger,
            )
            .await
            .unwrap();

        assert_eq!(report.loaded, 2);
        assert_eq!(report.skipped_duplicates, 2);
        let ids = storage.distinct_job_ids().await.unwrap();
        assert_eq!(ids, Ledger::from(["a".to_string(), "b".to_string()]));
    }

    #[tokio::test]
    async fn split_batches_and_merged_batch_converge_to_same_ledger() {
        let split_storage = Arc::new(InMemoryStorage::new());
        let mut split_ledger = Ledger::new();
        IncrementalLoader::new(split_storage.clone())
            .load_batches(
                vec![
                    batch("b1.json", vec![record("a"), record("b")]),
                    batch("b2.json", vec![record("b"), record("c")]),
                ],
                &mut split_ledger,
            )
            .await
            .unwrap();

        let merged_storage = Arc::new(InMemoryStorage::new());
        let mut merged_ledger = Ledger::new();
        IncrementalLoader::new(merged_storage.clone())
            .load_batches(
                vec![batch(
                    "all.json",
                    vec![record("a"), record("b"), record("b"), record("c")],
                )],
                &mut merged_ledger,
            )
            .await
            .unwrap();

        assert_eq!(split_ledger, merged_ledger);
        assert_eq!(
            split_storage.distinct_job_ids().await.unwrap(),
            merged_storage.distinct_job_ids().await.unwrap()
        );
    }

    #[tokio::test]
    async fn batch_missing_the_identifying_field_is_rejected_in_full() {
        let storage = Arc::new(InMemoryStorage::new());
        let loader = IncrementalLoader::new(storage.clone());
        let mut ledger = Ledger::new();

        let no_id = json!({
            "source": "Adzuna",
            "title": "Mystery role",
            "scraped_at": "2025-01-02T00:00:00Z"
        });
        let report = loader
            .load_batches(vec![batch("bad.json", vec![record("a"), no_id])], &mut ledger)
            .await
            .unwrap();

        assert_eq!(report.loaded, 0);
        assert_eq!(report.rejected_batches, 1);
        assert!(storage.fetch_all_raw().await.unwrap().is_empty());
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn empty_batch_is_skipped_silently() {
        let storage = Arc::new(InMemoryStorage::new());
        let loader = IncrementalLoader::new(storage);
        let mut ledger = Ledger::new();

        let report = loader
            .load_batches(vec![batch("empty.json", vec![])], &mut ledger)
            .await
            .unwrap();

        assert_eq!(report.loaded, 0);
        assert_eq!(report.rejected_batches, 0);
    }

    /// Storage whose first append fails, to exercise per-batch tolerance.
    struct FlakyStorage {
        inner: InMemoryStorage,
        fail_first: std::sync::Mutex<bool>,
    }

    #[async_trait]
    impl crate::storage::Storage for FlakyStorage {
        async fn distinct_job_ids(&self) -> crate::error::Result<Ledger> {
            self.inner.distinct_job_ids().await
        }

        async fn append_raw(&self, postings: &[RawPosting]) -> crate::error::Result<()> {
            // Take the flag without holding the lock across the await
            let should_fail = {
                let mut fail = self.fail_first.lock().unwrap();
                std::mem::replace(&mut *fail, false)
            };
            if should_fail {
                return Err(ScraperError::Api {
                    message: "connection reset".to_string(),
                });
            }
            self.inner.append_raw(postings).await
        }

        async fn fetch_all_raw(&self) -> crate::error::Result<Vec<RawPosting>> {
            self.inner.fetch_all_raw().await
        }

        async fn replace_cleaned(&self, postings: &[CleanedPosting]) -> crate::error::Result<()> {
            self.inner.replace_cleaned(postings).await
        }

        async fn fetch_all_cleaned(&self) -> crate::error::Result<Vec<CleanedPosting>> {
            self.inner.fetch_all_cleaned().await
        }
    }

    #[tokio::test]
    async fn one_failed_batch_does_not_abort_the_run() {
        let storage = Arc::new(FlakyStorage {
            inner: InMemoryStorage::new(),
            fail_first: std::sync::Mutex::new(true),
        });
        let loader = IncrementalLoader::new(storage.clone());
        let mut ledger = Ledger::new();

        let report = loader
            .load_batches(
                vec![
                    batch("b1.json", vec![record("a")]),
                    batch("b2.json", vec![record("b")]),
                ],
                &mut ledger,
            )
            .await
            .unwrap();

        assert_eq!(report.failed_batches, 1);
        assert_eq!(report.loaded, 1);
        // The failed batch's id stays in the run's ledger; it returns on the
        // next run when the ledger is rebuilt from the store.
        assert!(ledger.contains("a"));
        assert_eq!(storage.fetch_all_raw().await.unwrap().len(), 1);
    }

    #[test]
    fn batch_files_are_read_sorted_and_non_arrays_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b_adzuna.json"),
            serde_json::to_string(&vec![record("a")]).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a_jooble.json"),
            serde_json::to_string(&vec![record("b")]).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{\"not\": \"an array\"}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let batches = read_batches_from_dir(dir.path()).unwrap();

        let names: Vec<_> = batches.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["a_jooble.json", "b_adzuna.json"]);
    }

    #[test]
    fn cleanup_removes_only_json_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), "[]").unwrap();
        std::fs::write(dir.path().join("keep.txt"), "x").unwrap();

        let deleted = remove_batch_files(dir.path()).unwrap();

        assert_eq!(deleted, 1);
        assert!(dir.path().join("keep.txt").exists());
    }
}
