//! ABOUTME: Job repository storing the scheduler's persistent job declarations
//! ABOUTME: Jobs are serialized as an opaque JSON blob alongside a sortable name column

use cronctl_core::{time::now_iso8601, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, instrument};

/// A job's cron trigger, one field per classical 5-field position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobTrigger {
    pub minute: String,
    pub hour: String,
    pub day: String,
    pub month: String,
    pub day_of_week: String,
}

/// The full persisted shape of a job: what the blob in `job_state` decodes to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub name: String,
    pub job_class_string: String,
    pub pub_args: Vec<serde_json::Value>,
    pub trigger: JobTrigger,
    pub paused: bool,
    pub next_run_time: Option<String>,
}

/// Row shape as read back from the jobs table.
#[derive(Debug, Clone, FromRow)]
struct JobRow {
    job_id: String,
    #[allow(dead_code)]
    name: String,
    job_state: String,
}

impl JobRow {
    fn into_record(self) -> Result<JobRecord> {
        serde_json::from_str(&self.job_state)
            .map_err(|e| Error::Database(format!("Corrupt job_state for {}: {}", self.job_id, e)))
    }
}

/// Job repository. Owns the jobs table and the job-category mapping table,
/// since `ListJobs` needs to join across both to apply category scoping.
pub struct JobRepository<'a> {
    pool: &'a SqlitePool,
    jobs_table: String,
    job_categories_table: String,
}

impl<'a> JobRepository<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        jobs_table: impl Into<String>,
        job_categories_table: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            jobs_table: jobs_table.into(),
            job_categories_table: job_categories_table.into(),
        }
    }

    /// Insert or replace a job under its own id.
    #[instrument(skip(self, record))]
    pub async fn upsert(&self, record: &JobRecord) -> Result<()> {
        debug!(job_id = %record.job_id, "Upserting job");

        let now = now_iso8601();
        let job_state = serde_json::to_string(record)
            .map_err(|e| Error::Database(format!("Failed to encode job_state: {}", e)))?;

        sqlx::query(&format!(
            r#"
            INSERT INTO {jobs} (job_id, name, job_state, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT(job_id) DO UPDATE SET
                name = excluded.name,
                job_state = excluded.job_state,
                updated_at = excluded.updated_at
            "#,
            jobs = self.jobs_table
        ))
        .bind(&record.job_id)
        .bind(&record.name)
        .bind(job_state)
        .bind(now)
        .execute(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to upsert job {}: {}", record.job_id, e)))?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn find_by_id(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT job_id, name, job_state FROM {} WHERE job_id = ?1",
            self.jobs_table
        ))
        .bind(job_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to find job {}: {}", job_id, e)))?;

        row.map(JobRow::into_record).transpose()
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, job_id: &str) -> Result<()> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE job_id = ?1", self.jobs_table))
            .bind(job_id)
            .execute(self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete job {}: {}", job_id, e)))?;

        sqlx::query(&format!(
            "DELETE FROM {} WHERE job_id = ?1",
            self.job_categories_table
        ))
        .bind(job_id)
        .execute(self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to delete job category link: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Job {} not found", job_id)));
        }
        Ok(())
    }

    /// List jobs, ordered case-insensitively by name, optionally filtered to
    /// the jobs linked to `category_id` (`None`/`Some(0)` means unscoped:
    /// return everything).
    #[instrument(skip(self))]
    pub async fn list(&self, category_id: Option<i64>) -> Result<Vec<JobRecord>> {
        let rows = match category_id.filter(|id| *id != 0) {
            Some(category_id) => {
                sqlx::query_as::<_, JobRow>(&format!(
                    r#"
                    SELECT j.job_id, j.name, j.job_state
                    FROM {jobs} j
                    INNER JOIN {job_categories} jc ON jc.job_id = j.job_id
                    WHERE jc.category_id = ?1
                    ORDER BY j.name COLLATE NOCASE
                    "#,
                    jobs = self.jobs_table,
                    job_categories = self.job_categories_table
                ))
                .bind(category_id)
                .fetch_all(self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, JobRow>(&format!(
                    "SELECT job_id, name, job_state FROM {} ORDER BY name COLLATE NOCASE",
                    self.jobs_table
                ))
                .fetch_all(self.pool)
                .await
            }
        }
        .map_err(|e| Error::Database(format!("Failed to list jobs: {}", e)))?;

        rows.into_iter().map(JobRow::into_record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{init_schema, TableNames};
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> (SqlitePool, TableNames) {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("pool");
        let tables = TableNames::default();
        init_schema(&pool, &tables).await.expect("schema");
        (pool, tables)
    }

    fn sample(job_id: &str, name: &str) -> JobRecord {
        JobRecord {
            job_id: job_id.to_string(),
            name: name.to_string(),
            job_class_string: "echo".to_string(),
            pub_args: vec![serde_json::json!("hi")],
            trigger: JobTrigger {
                minute: "*".to_string(),
                hour: "*".to_string(),
                day: "*".to_string(),
                month: "*".to_string(),
                day_of_week: "*".to_string(),
            },
            paused: false,
            next_run_time: Some("2026-01-01T00:01:00Z".to_string()),
        }
    }

    #[tokio::test]
    async fn upsert_then_find_round_trips() {
        let (pool, tables) = setup().await;
        let repo = JobRepository::new(&pool, &tables.jobs, &tables.job_categories);

        let job = sample("job-1", "nightly backup");
        repo.upsert(&job).await.expect("upsert");

        let found = repo
            .find_by_id("job-1")
            .await
            .expect("find")
            .expect("present");
        assert_eq!(found.job_class_string, "echo");
        assert_eq!(found.pub_args, vec![serde_json::json!("hi")]);
    }

    #[tokio::test]
    async fn list_orders_case_insensitively() {
        let (pool, tables) = setup().await;
        let repo = JobRepository::new(&pool, &tables.jobs, &tables.job_categories);

        repo.upsert(&sample("a", "zebra")).await.unwrap();
        repo.upsert(&sample("b", "Apple")).await.unwrap();
        repo.upsert(&sample("c", "banana")).await.unwrap();

        let jobs = repo.list(None).await.expect("list");
        let names: Vec<_> = jobs.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["Apple", "banana", "zebra"]);
    }

    #[tokio::test]
    async fn list_scoped_to_category_filters_unlinked_jobs() {
        let (pool, tables) = setup().await;
        let repo = JobRepository::new(&pool, &tables.jobs, &tables.job_categories);

        repo.upsert(&sample("a", "scoped")).await.unwrap();
        repo.upsert(&sample("b", "unscoped")).await.unwrap();

        sqlx::query(&format!(
            "INSERT INTO {} (job_id, category_id, created_at) VALUES ('a', 7, '2026-01-01T00:00:00Z')",
            tables.job_categories
        ))
        .execute(&pool)
        .await
        .unwrap();

        let jobs = repo.list(Some(7)).await.expect("list");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, "a");
    }

    #[tokio::test]
    async fn delete_removes_job_and_category_link() {
        let (pool, tables) = setup().await;
        let repo = JobRepository::new(&pool, &tables.jobs, &tables.job_categories);

        repo.upsert(&sample("a", "to-delete")).await.unwrap();
        repo.delete("a").await.expect("delete");

        assert!(repo.find_by_id("a").await.unwrap().is_none());
        assert!(matches!(repo.delete("a").await, Err(Error::NotFound(_))));
    }
}
