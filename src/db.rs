use crate::error::{Result, ScraperError};
use crate::storage::Storage;
use crate::types::{CleanedPosting, RawPosting};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Builder, Connection, Database};
use std::collections::HashSet;
use std::env;
use tracing::info;

pub struct DatabaseManager {
    db: Database,
}

impl DatabaseManager {
    /// Create a new database manager with connection to Turso
    pub async fn new() -> Result<Self> {
        let url = env::var("LIBSQL_URL").map_err(|_| ScraperError::Database {
            message: "LIBSQL_URL environment variable not set".to_string(),
        })?;

        let auth_token = env::var("LIBSQL_AUTH_TOKEN").map_err(|_| ScraperError::Database {
            message: "LIBSQL_AUTH_TOKEN environment variable not set".to_string(),
        })?;

        info!("Connecting to Turso database at {}", url);

        let db = Builder::new_remote(url, auth_token)
            .build()
            .await
            .map_err(|e| ScraperError::Database {
                message: format!("Failed to connect to database: {e}"),
            })?;

        Ok(Self { db })
    }

    /// Get a connection to the database
    pub async fn get_connection(&self) -> Result<Connection> {
        self.db.connect().map_err(|e| ScraperError::Database {
            message: format!("Failed to get database connection: {e}"),
        })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        let conn = self.get_connection().await?;

        let migration_sql = include_str!("../migrations/001_create_job_tables.sql");

        conn.execute_batch(migration_sql)
            .await
            .map_err(|e| ScraperError::Database {
                message: format!("Failed to run migrations: {e}"),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }
}

/// libSQL-backed implementation of the raw/cleaned record stores.
pub struct DatabaseStorage {
    manager: DatabaseManager,
}

impl DatabaseStorage {
    pub fn new(manager: DatabaseManager) -> Self {
        Self { manager }
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ScraperError::Database {
                message: format!("Invalid scraped_at timestamp '{raw}': {e}"),
            })
    }
}

#[async_trait]
impl Storage for DatabaseStorage {
    async fn distinct_job_ids(&self) -> Result<HashSet<String>> {
        let conn = self.manager.get_connection().await?;

        let mut rows = conn
            .query("SELECT DISTINCT job_id FROM raw_jobs", ())
            .await
            .map_err(|e| ScraperError::Database {
                message: format!("Failed to query distinct job ids: {e}"),
            })?;

        let mut ids = HashSet::new();
        while let Some(row) = rows.next().await.map_err(|e| ScraperError::Database {
            message: format!("Failed to read row: {e}"),
        })? {
            let job_id: String = row.get(0).map_err(|e| ScraperError::Database {
                message: format!("Failed to get job_id: {e}"),
            })?;
            ids.insert(job_id);
        }

        Ok(ids)
    }

    async fn append_raw(&self, postings: &[RawPosting]) -> Result<()> {
        let conn = self.manager.get_connection().await?;

        for posting in postings {
            conn.execute(
                "INSERT INTO raw_jobs (job_id, source, title, company, location, salary_text, salary_min, salary_max, job_type, posted_date, search_query, search_location, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                libsql::params![
                    posting.job_id.as_str(),
                    posting.source.as_str(),
                    posting.title.as_deref(),
                    posting.company.as_deref(),
                    posting.location.as_deref(),
                    posting.salary_text.as_deref(),
                    posting.salary_min,
                    posting.salary_max,
                    posting.job_type.as_deref(),
                    posting.posted_date.as_deref(),
                    posting.search_query.as_deref(),
                    posting.search_location.as_deref(),
                    posting.scraped_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| ScraperError::Database {
                message: format!("Failed to insert raw posting: {e}"),
            })?;
        }

        Ok(())
    }

    async fn fetch_all_raw(&self) -> Result<Vec<RawPosting>> {
        let conn = self.manager.get_connection().await?;

        let mut rows = conn
            .query(
                "SELECT job_id, source, title, company, location, salary_text, salary_min, salary_max, job_type, posted_date, search_query, search_location, scraped_at FROM raw_jobs",
                (),
            )
            .await
            .map_err(|e| ScraperError::Database {
                message: format!("Failed to query raw_jobs: {e}"),
            })?;

        let mut postings = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| ScraperError::Database {
            message: format!("Failed to read row: {e}"),
        })? {
            let job_id: String = row.get(0).map_err(|e| ScraperError::Database {
                message: format!("Failed to get job_id: {e}"),
            })?;
            let source: String = row.get(1).map_err(|e| ScraperError::Database {
                message: format!("Failed to get source: {e}"),
            })?;
            let scraped_at_raw: String = row.get(12).map_err(|e| ScraperError::Database {
                message: format!("Failed to get scraped_at: {e}"),
            })?;

            postings.push(RawPosting {
                job_id,
                source,
                title: row.get(2).ok(),
                company: row.get(3).ok(),
                location: row.get(4).ok(),
                salary_text: row.get(5).ok(),
                salary_min: row.get::<f64>(6).ok(),
                salary_max: row.get::<f64>(7).ok(),
                job_type: row.get(8).ok(),
                posted_date: row.get(9).ok(),
                search_query: row.get(10).ok(),
                search_location: row.get(11).ok(),
                scraped_at: Self::parse_timestamp(&scraped_at_raw)?,
            });
        }

        Ok(postings)
    }

    async fn replace_cleaned(&self, postings: &[CleanedPosting]) -> Result<()> {
        let conn = self.manager.get_connection().await?;

        // Build the replacement in a shadow table so readers never observe an
        // empty cleaned_jobs between drop and reload.
        conn.execute_batch(
            r#"
            DROP TABLE IF EXISTS cleaned_jobs_next;
            CREATE TABLE cleaned_jobs_next (
                job_id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                title TEXT,
                company TEXT,
                location TEXT,
                location_city TEXT,
                location_state TEXT NOT NULL,
                salary_text TEXT,
                salary_min REAL,
                salary_max REAL,
                job_type TEXT,
                posted_date TEXT,
                scraped_at TEXT NOT NULL
            );
            "#,
        )
        .await
        .map_err(|e| ScraperError::Database {
            message: format!("Failed to create shadow cleaned table: {e}"),
        })?;

        for posting in postings {
            conn.execute(
                "INSERT INTO cleaned_jobs_next (job_id, source, title, company, location, location_city, location_state, salary_text, salary_min, salary_max, job_type, posted_date, scraped_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                libsql::params![
                    posting.job_id.as_str(),
                    posting.source.as_str(),
                    posting.title.as_deref(),
                    posting.company.as_deref(),
                    posting.location.as_deref(),
                    posting.location_city.as_deref(),
                    posting.location_state.as_str(),
                    posting.salary_text.as_deref(),
                    posting.salary_min,
                    posting.salary_max,
                    posting.job_type.map(|c| c.as_str()),
                    posting.posted_date.as_deref(),
                    posting.scraped_at.to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| ScraperError::Database {
                message: format!("Failed to insert cleaned posting: {e}"),
            })?;
        }

        // Swap the shadow table into place in a single batch.
        conn.execute_batch(
            r#"
            ALTER TABLE cleaned_jobs RENAME TO cleaned_jobs_old;
            ALTER TABLE cleaned_jobs_next RENAME TO cleaned_jobs;
            DROP TABLE cleaned_jobs_old;
            "#,
        )
        .await
        .map_err(|e| ScraperError::Database {
            message: format!("Failed to swap cleaned table: {e}"),
        })?;

        info!("Published {} cleaned postings", postings.len());
        Ok(())
    }

    async fn fetch_all_cleaned(&self) -> Result<Vec<CleanedPosting>> {
        let conn = self.manager.get_connection().await?;

        let mut rows = conn
            .query(
                "SELECT job_id, source, title, company, location, location_city, location_state, salary_text, salary_min, salary_max, job_type, posted_date, scraped_at FROM cleaned_jobs",
                (),
            )
            .await
            .map_err(|e| ScraperError::Database {
                message: format!("Failed to query cleaned_jobs: {e}"),
            })?;

        let mut postings = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| ScraperError::Database {
            message: format!("Failed to read row: {e}"),
        })? {
            let job_id: String = row.get(0).map_err(|e| ScraperError::Database {
                message: format!("Failed to get job_id: {e}"),
            })?;
            let source: String = row.get(1).map_err(|e| ScraperError::Database {
                message: format!("Failed to get source: {e}"),
            })?;
            let location_state: String = row.get(6).map_err(|e| ScraperError::Database {
                message: format!("Failed to get location_state: {e}"),
            })?;
            let job_type_raw: Option<String> = row.get(10).ok();
            let scraped_at_raw: String = row.get(12).map_err(|e| ScraperError::Database {
                message: format!("Failed to get scraped_at: {e}"),
            })?;

            postings.push(CleanedPosting {
                job_id,
                source,
                title: row.get(2).ok(),
                company: row.get(3).ok(),
                location: row.get(4).ok(),
                location_city: row.get(5).ok(),
                location_state,
                salary_text: row.get(7).ok(),
                salary_min: row.get::<f64>(8).ok(),
                salary_max: row.get::<f64>(9).ok(),
                job_type: job_type_raw.and_then(|s| crate::cleaning::job_type::canonicalize(&s)),
                posted_date: row.get(11).ok(),
                scraped_at: Self::parse_timestamp(&scraped_at_raw)?,
            });
        }

        Ok(postings)
    }
}
