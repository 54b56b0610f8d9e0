//! ABOUTME: Append-only audit log repository
//! ABOUTME: No mutation is exposed except the category back-fill on the latest ADDED row

use cronctl_core::{time::now_iso8601, Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEvent {
    Added,
    Modified,
    Deleted,
    Paused,
    Resumed,
    CustomRun,
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditEvent::Added => "ADDED",
            AuditEvent::Modified => "MODIFIED",
            AuditEvent::Deleted => "DELETED",
            AuditEvent::Paused => "PAUSED",
            AuditEvent::Resumed => "RESUMED",
            AuditEvent::CustomRun => "CUSTOM_RUN",
        };
        f.write_str(s)
    }
}

impl FromStr for AuditEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ADDED" => Ok(AuditEvent::Added),
            "MODIFIED" => Ok(AuditEvent::Modified),
            "DELETED" => Ok(AuditEvent::Deleted),
            "PAUSED" => Ok(AuditEvent::Paused),
            "RESUMED" => Ok(AuditEvent::Resumed),
            "CUSTOM_RUN" => Ok(AuditEvent::CustomRun),
            other => Err(Error::Database(format!("Unknown audit event: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: i64,
    pub job_id: String,
    pub job_name: String,
    pub event: AuditEvent,
    pub user: Option<String>,
    pub category_id: Option<i64>,
    pub created_time: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
struct AuditLogRow {
    id: i64,
    job_id: String,
    job_name: String,
    event: String,
    user: Option<String>,
    category_id: Option<i64>,
    created_time: String,
    description: Option<String>,
}

impl AuditLogRow {
    fn into_log(self) -> Result<AuditLog> {
        Ok(AuditLog {
            id: self.id,
            job_id: self.job_id,
            job_name: self.job_name,
            event: self.event.parse()?,
            user: self.user,
            category_id: self.category_id.filter(|id| *id != 0),
            created_time: self.created_time,
            description: self.description,
        })
    }
}

pub struct AuditLogRepository<'a> {
    pool: &'a SqlitePool,
    table: String,
}

impl<'a> AuditLogRepository<'a> {
    pub fn new(pool: &'a SqlitePool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    /// Record an audit event. Auditing is best-effort: failures are logged
    /// here and the caller decides whether to propagate (per the Store's
    /// "audit writes never block a CRUD operation" policy, callers in the
    /// scheduler/web layers should swallow this error, not bubble it up).
    #[instrument(skip(self, description))]
    pub async fn add(
        &self,
        job_id: &str,
        job_name: &str,
        event: AuditEvent,
        user: Option<&str>,
        category_id: Option<i64>,
        description: Option<&str>,
    ) -> Result<i64> {
        debug!(job_id, %event, "Recording audit log");
        let now = now_iso8601();

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO {table} (job_id, job_name, event, user, category_id, created_time, description)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            table = self.table
        ))
        .bind(job_id)
        .bind(job_name)
        .bind(event.to_string())
        .bind(user)
        .bind(category_id.filter(|id| *id != 0))
        .bind(now)
        .bind(description)
        .execute(self.pool)
        .await
        .map_err(|e| {
            warn!(job_id, error = %e, "Failed to write audit log");
            Error::Database(format!("Failed to add audit log for {}: {}", job_id, e))
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Back-fill `category_id` on the most recent ADDED row for `job_id`.
    /// Called immediately after `SetJobCategory` so the ADDED row's
    /// `category_id` reflects the category it was linked to.
    #[instrument(skip(self))]
    pub async fn backfill_latest_added_category(
        &self,
        job_id: &str,
        category_id: i64,
    ) -> Result<()> {
        sqlx::query(&format!(
            r#"
            UPDATE {table}
            SET category_id = ?1
            WHERE id = (
                SELECT id FROM {table}
                WHERE job_id = ?2 AND event = 'ADDED'
                ORDER BY created_time DESC, id DESC
                LIMIT 1
            )
            "#,
            table = self.table
        ))
        .bind(category_id)
        .bind(job_id)
        .execute(self.pool)
        .await
        .map_err(|e| {
            Error::Database(format!(
                "Failed to back-fill audit category for {}: {}",
                job_id, e
            ))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_in_range(
        &self,
        start: &str,
        end: &str,
        category_id: Option<i64>,
    ) -> Result<Vec<AuditLog>> {
        let rows = match category_id.filter(|id| *id != 0) {
            Some(category_id) => {
                sqlx::query_as::<_, AuditLogRow>(&format!(
                    r#"
                    SELECT * FROM {table}
                    WHERE created_time >= ?1 AND created_time <= ?2 AND category_id = ?3
                    ORDER BY created_time DESC
                    "#,
                    table = self.table
                ))
                .bind(start)
                .bind(end)
                .bind(category_id)
                .fetch_all(self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, AuditLogRow>(&format!(
                    r#"
                    SELECT * FROM {table}
                    WHERE created_time >= ?1 AND created_time <= ?2
                    ORDER BY created_time DESC
                    "#,
                    table = self.table
                ))
                .bind(start)
                .bind(end)
                .fetch_all(self.pool)
                .await
            }
        }
        .map_err(|e| Error::Database(format!("Failed to list audit logs: {}", e)))?;

        rows.into_iter().map(AuditLogRow::into_log).collect()
    }
}
