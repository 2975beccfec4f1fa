//! libSQL-backed job store for DealScope research jobs.
//!
//! The [`JobStore`] struct wraps a libSQL database holding the `jobs` table.
//! It is the persistence side of the job lifecycle: `Pending → Processing →
//! {Completed, Failed}`. Status updates are single-field, last-writer-wins
//! writes; no update is atomic with pipeline business logic.

mod migrations;

use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use libsql::{Connection, Database, params};

use dealscope_shared::{DealScopeError, JobId, JobRecord, JobStatus, Result};

/// Message stored on a freshly created job.
const CREATED_MESSAGE: &str = "Job created, waiting to start processing";

/// Message stored when a job completes.
const COMPLETED_MESSAGE: &str = "Research complete";

/// Primary job store handle wrapping a libSQL database.
pub struct JobStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl JobStore {
    /// Open or create a jobs database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DealScopeError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        DealScopeError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Job lifecycle operations
    // -----------------------------------------------------------------------

    /// Create a new job in `Pending` state. Returns the created record.
    pub async fn create_job(
        &self,
        job_id: &JobId,
        user_id: &str,
        query: &str,
    ) -> Result<JobRecord> {
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO jobs (job_id, user_id, query, status, message, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    job_id.as_str(),
                    user_id,
                    query,
                    JobStatus::Pending.as_str(),
                    CREATED_MESSAGE,
                    now.to_rfc3339(),
                    now.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;

        tracing::info!(job_id = %job_id, user_id, "created job");

        Ok(JobRecord {
            job_id: job_id.clone(),
            user_id: user_id.to_string(),
            query: query.to_string(),
            status: JobStatus::Pending,
            message: Some(CREATED_MESSAGE.to_string()),
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
        })
    }

    /// Move a job to `Processing`, attaching a progress message.
    /// Idempotent under repeated identical calls.
    pub async fn advance(&self, job_id: &JobId, message: &str) -> Result<()> {
        self.update_status(job_id, JobStatus::Processing, Some(message), None, None)
            .await
    }

    /// Transition a job to `Completed`, storing the final result.
    /// An empty result is logged but still stored.
    pub async fn complete(&self, job_id: &JobId, result: &str) -> Result<()> {
        if result.trim().is_empty() {
            tracing::warn!(job_id = %job_id, "completing job with empty result");
        }
        self.update_status(
            job_id,
            JobStatus::Completed,
            Some(COMPLETED_MESSAGE),
            Some(result),
            None,
        )
        .await
    }

    /// Transition a job to `Failed`, storing the error text.
    pub async fn fail(&self, job_id: &JobId, error: &str) -> Result<()> {
        tracing::error!(job_id = %job_id, error, "job failed");
        self.update_status(job_id, JobStatus::Failed, None, None, Some(error))
            .await
    }

    /// Fetch the current job record, or `None` if the id is unknown.
    pub async fn get_job(&self, job_id: &JobId) -> Result<Option<JobRecord>> {
        let mut rows = self
            .conn
            .query(
                "SELECT job_id, user_id, query, status, message, created_at, updated_at, result, error
                 FROM jobs WHERE job_id = ?1",
                params![job_id.as_str()],
            )
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_job_record(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DealScopeError::Storage(e.to_string())),
        }
    }

    /// Single-field status update shared by the lifecycle operations.
    async fn update_status(
        &self,
        job_id: &JobId,
        status: JobStatus,
        message: Option<&str>,
        result: Option<&str>,
        error: Option<&str>,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();

        // Fields passed as None keep their stored value (COALESCE), matching
        // the single-field update discipline of the lifecycle contract.
        self.conn
            .execute(
                "UPDATE jobs SET status = ?2, updated_at = ?3,
                        message = COALESCE(?4, message),
                        result = COALESCE(?5, result),
                        error = COALESCE(?6, error)
                 WHERE job_id = ?1",
                params![
                    job_id.as_str(),
                    status.as_str(),
                    now.as_str(),
                    message,
                    result,
                    error
                ],
            )
            .await
            .map_err(|e| DealScopeError::Storage(e.to_string()))?;

        tracing::info!(job_id = %job_id, status = %status, "updated job status");
        Ok(())
    }
}

/// Map a `jobs` row to a [`JobRecord`].
fn row_to_job_record(row: &libsql::Row) -> Result<JobRecord> {
    let get_str = |idx: i32| -> Result<String> {
        row.get::<String>(idx)
            .map_err(|e| DealScopeError::Storage(e.to_string()))
    };

    let status_str = get_str(3)?;
    let status = JobStatus::from_str(&status_str).map_err(DealScopeError::Storage)?;

    let parse_time = |s: String| -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| DealScopeError::Storage(format!("bad timestamp {s}: {e}")))
    };

    Ok(JobRecord {
        job_id: JobId(get_str(0)?),
        user_id: get_str(1)?,
        query: get_str(2)?,
        status,
        message: row.get::<String>(4).ok(),
        created_at: parse_time(get_str(5)?)?,
        updated_at: parse_time(get_str(6)?)?,
        result: row.get::<String>(7).ok(),
        error: row.get::<String>(8).ok(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    async fn test_store() -> JobStore {
        let tmp = std::env::temp_dir().join(format!("ds_test_{}.db", Uuid::new_v4()));
        JobStore::open(&tmp).await.expect("open store")
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("ds_test_{}.db", Uuid::new_v4()));
        let s1 = JobStore::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = JobStore::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn job_completion_lifecycle() {
        let store = test_store().await;
        let job_id = JobId::new();

        let created = store
            .create_job(&job_id, "user-1", "What does Acme do?")
            .await
            .expect("create job");
        assert_eq!(created.status, JobStatus::Pending);
        assert!(created.result.is_none());
        assert!(created.error.is_none());

        store
            .advance(&job_id, "Identifying company to research")
            .await
            .expect("advance");
        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.message.as_deref(), Some("Identifying company to research"));

        store
            .complete(&job_id, "# Acme\n\nAcme builds robots.")
            .await
            .expect("complete");
        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.result.as_deref().unwrap().contains("robots"));
        assert!(job.error.is_none());
        assert_eq!(job.query, "What does Acme do?");
    }

    #[tokio::test]
    async fn job_failure_lifecycle() {
        let store = test_store().await;
        let job_id = JobId::new();

        store
            .create_job(&job_id, "user-1", "query")
            .await
            .expect("create job");
        store
            .fail(&job_id, "Failed to gather company information")
            .await
            .expect("fail");

        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.error.as_deref(),
            Some("Failed to gather company information")
        );
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn advance_is_idempotent() {
        let store = test_store().await;
        let job_id = JobId::new();
        store.create_job(&job_id, "user-1", "query").await.unwrap();

        store.advance(&job_id, "Gathering evidence").await.unwrap();
        store.advance(&job_id, "Gathering evidence").await.unwrap();

        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.message.as_deref(), Some("Gathering evidence"));
    }

    #[tokio::test]
    async fn unknown_job_is_none() {
        let store = test_store().await;
        let missing = store.get_job(&JobId::from("job_missing")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn empty_result_still_completes() {
        let store = test_store().await;
        let job_id = JobId::new();
        store.create_job(&job_id, "user-1", "query").await.unwrap();

        store.complete(&job_id, "").await.expect("complete");
        let job = store.get_job(&job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.result.as_deref(), Some(""));
    }
}
