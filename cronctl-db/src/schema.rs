//! ABOUTME: Idempotent schema creation for the six logical scheduler tables
//! ABOUTME: Table names are configurable; defaults match the original scheduler's naming

use cronctl_core::{Error, Result};
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Configurable table names for the six logical tables this store owns.
///
/// Defaults mirror the upstream scheduler's naming convention so an operator
/// migrating an existing deployment can keep their table names unchanged.
#[derive(Debug, Clone)]
pub struct TableNames {
    pub jobs: String,
    pub executions: String,
    pub audit_logs: String,
    pub users: String,
    pub categories: String,
    pub job_categories: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            jobs: "scheduler_jobs".to_string(),
            executions: "scheduler_execution".to_string(),
            audit_logs: "scheduler_jobauditlog".to_string(),
            users: "scheduler_users".to_string(),
            categories: "scheduler_categories".to_string(),
            job_categories: "scheduler_job_categories".to_string(),
        }
    }
}

/// The reserved category id meaning "unscoped" / "all".
pub const UNSCOPED_CATEGORY_ID: i64 = 0;

/// Create all tables idempotently and seed the reserved category 0 ("all").
///
/// Jobs are persisted as an opaque JSON blob (`job_state`) alongside a `name`
/// column used for case-insensitive listing order; the scheduler engine owns
/// interpreting the blob's trigger fields.
pub async fn init_schema(pool: &SqlitePool, tables: &TableNames) -> Result<()> {
    info!("Ensuring scheduler tables exist");

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {jobs} (
            job_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            job_state TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        jobs = tables.jobs
    ))
    .execute(pool)
    .await
    .map_err(|e| Error::Database(format!("Failed to create {} table: {}", tables.jobs, e)))?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{jobs}_name ON {jobs} (name COLLATE NOCASE)",
        jobs = tables.jobs
    ))
    .execute(pool)
    .await
    .map_err(|e| Error::Database(format!("Failed to index {} table: {}", tables.jobs, e)))?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {categories} (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        categories = tables.categories
    ))
    .execute(pool)
    .await
    .map_err(|e| {
        Error::Database(format!(
            "Failed to create {} table: {}",
            tables.categories, e
        ))
    })?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {job_categories} (
            job_id TEXT PRIMARY KEY,
            category_id INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
        job_categories = tables.job_categories
    ))
    .execute(pool)
    .await
    .map_err(|e| {
        Error::Database(format!(
            "Failed to create {} table: {}",
            tables.job_categories, e
        ))
    })?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{jc}_category ON {jc} (category_id)",
        jc = tables.job_categories
    ))
    .execute(pool)
    .await
    .map_err(|e| {
        Error::Database(format!(
            "Failed to index {} table: {}",
            tables.job_categories, e
        ))
    })?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {executions} (
            execution_id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL,
            state TEXT NOT NULL,
            hostname TEXT,
            pid INTEGER,
            category_id INTEGER,
            scheduled_time TEXT NOT NULL,
            updated_time TEXT NOT NULL,
            description TEXT,
            result TEXT
        )
        "#,
        executions = tables.executions
    ))
    .execute(pool)
    .await
    .map_err(|e| {
        Error::Database(format!(
            "Failed to create {} table: {}",
            tables.executions, e
        ))
    })?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{ex}_job ON {ex} (job_id)",
        ex = tables.executions
    ))
    .execute(pool)
    .await
    .map_err(|e| {
        Error::Database(format!(
            "Failed to index {} table: {}",
            tables.executions, e
        ))
    })?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{ex}_updated ON {ex} (updated_time)",
        ex = tables.executions
    ))
    .execute(pool)
    .await
    .map_err(|e| {
        Error::Database(format!(
            "Failed to index {} table: {}",
            tables.executions, e
        ))
    })?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {audit} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            job_name TEXT NOT NULL,
            event TEXT NOT NULL,
            user TEXT,
            category_id INTEGER,
            created_time TEXT NOT NULL,
            description TEXT
        )
        "#,
        audit = tables.audit_logs
    ))
    .execute(pool)
    .await
    .map_err(|e| {
        Error::Database(format!(
            "Failed to create {} table: {}",
            tables.audit_logs, e
        ))
    })?;

    sqlx::query(&format!(
        "CREATE INDEX IF NOT EXISTS idx_{audit}_created ON {audit} (created_time)",
        audit = tables.audit_logs
    ))
    .execute(pool)
    .await
    .map_err(|e| {
        Error::Database(format!(
            "Failed to index {} table: {}",
            tables.audit_logs, e
        ))
    })?;

    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {users} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            category_id INTEGER NOT NULL DEFAULT 0,
            is_permission INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
        users = tables.users
    ))
    .execute(pool)
    .await
    .map_err(|e| Error::Database(format!("Failed to create {} table: {}", tables.users, e)))?;

    seed_default_category(pool, tables).await?;

    info!("Scheduler tables ready");
    Ok(())
}

/// Seed the reserved category 0 ("all") if it is not already present.
async fn seed_default_category(pool: &SqlitePool, tables: &TableNames) -> Result<()> {
    debug!("Seeding reserved category 0");

    let now = cronctl_core::to_rfc3339(cronctl_core::utc_now());
    sqlx::query(&format!(
        "INSERT OR IGNORE INTO {categories} (id, name, description, created_at, updated_at) VALUES (0, 'all', 'Unscoped: visible to every user', ?1, ?1)",
        categories = tables.categories
    ))
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| Error::Database(format!("Failed to seed default category: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool")
    }

    #[tokio::test]
    async fn creates_all_tables_and_seeds_category_zero() {
        let pool = memory_pool().await;
        let tables = TableNames::default();

        init_schema(&pool, &tables).await.expect("schema init");

        let row: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {} WHERE id = 0",
            tables.categories
        ))
        .fetch_one(&pool)
        .await
        .expect("category row");
        assert_eq!(row.0, 1);
    }

    #[tokio::test]
    async fn schema_init_is_idempotent() {
        let pool = memory_pool().await;
        let tables = TableNames::default();

        init_schema(&pool, &tables).await.expect("first init");
        init_schema(&pool, &tables).await.expect("second init");

        let row: (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(*) FROM {}",
            tables.categories
        ))
        .fetch_one(&pool)
        .await
        .expect("category count");
        assert_eq!(row.0, 1);
    }
}
