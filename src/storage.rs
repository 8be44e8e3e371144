use crate::error::Result;
use crate::types::{CleanedPosting, RawPosting};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Storage trait for the raw and cleaned record stores.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Distinct `job_id` projection over the raw store, used to seed the
    /// incremental-load ledger at the start of a run.
    async fn distinct_job_ids(&self) -> Result<HashSet<String>>;

    /// Append-only bulk insert of one accepted batch into the raw store.
    async fn append_raw(&self, postings: &[RawPosting]) -> Result<()>;

    /// Full-table scan of the raw store.
    async fn fetch_all_raw(&self) -> Result<Vec<RawPosting>>;

    /// Replace the entire cleaned store contents in one logical operation.
    async fn replace_cleaned(&self, postings: &[CleanedPosting]) -> Result<()>;

    /// Current cleaned snapshot.
    async fn fetch_all_cleaned(&self) -> Result<Vec<CleanedPosting>>;
}

/// In-memory storage implementation for development/testing
pub struct InMemoryStorage {
    raw_jobs: Arc<Mutex<Vec<RawPosting>>>,
    cleaned_jobs: Arc<Mutex<Vec<CleanedPosting>>>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            raw_jobs: Arc::new(Mutex::new(Vec::new())),
            cleaned_jobs: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn distinct_job_ids(&self) -> Result<HashSet<String>> {
        let raw_jobs = self.raw_jobs.lock().unwrap();
        Ok(raw_jobs.iter().map(|p| p.job_id.clone()).collect())
    }

    async fn append_raw(&self, postings: &[RawPosting]) -> Result<()> {
        let mut raw_jobs = self.raw_jobs.lock().unwrap();
        raw_jobs.extend_from_slice(postings);

        debug!("Appended {} raw postings", postings.len());
        Ok(())
    }

    async fn fetch_all_raw(&self) -> Result<Vec<RawPosting>> {
        let raw_jobs = self.raw_jobs.lock().unwrap();
        Ok(raw_jobs.clone())
    }

    async fn replace_cleaned(&self, postings: &[CleanedPosting]) -> Result<()> {
        let mut cleaned_jobs = self.cleaned_jobs.lock().unwrap();
        *cleaned_jobs = postings.to_vec();

        debug!("Replaced cleaned store with {} postings", postings.len());
        Ok(())
    }

    async fn fetch_all_cleaned(&self) -> Result<Vec<CleanedPosting>> {
        let cleaned_jobs = self.cleaned_jobs.lock().unwrap();
        Ok(cleaned_jobs.clone())
    }
}
