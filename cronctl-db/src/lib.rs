//! ABOUTME: Database layer with SQLite, schema management, and repositories
//! ABOUTME: `Db` is the store handle every other crate is injected with

use cronctl_core::{time::now_iso8601, Error, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Sqlite,
};
use sqlx::{migrate::MigrateDatabase, SqlitePool};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub mod repositories;
pub mod schema;

pub use repositories::{
    audit_logs::{AuditEvent, AuditLog, AuditLogRepository},
    categories::{Category, CategoryRepository},
    executions::{Execution, ExecutionRepository, ExecutionState, ExecutionUpdate},
    jobs::{JobRecord, JobRepository, JobTrigger},
    users::{CreateUserRequest, UpdateUserRequest, User, UserRepository},
};
pub use schema::{TableNames, UNSCOPED_CATEGORY_ID};

/// Database connection retry configuration.
#[derive(Debug, Clone)]
pub struct DatabaseRetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for DatabaseRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
        }
    }
}

impl DatabaseRetryConfig {
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let capped_delay = delay_ms.min(self.max_delay_ms as f64);

        let jitter = {
            use std::time::SystemTime;
            let nanos = SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos();
            0.9 + ((nanos % 201) as f64 / 1000.0)
        };

        Duration::from_millis((capped_delay * jitter) as u64)
    }
}

/// The scheduler's store: a SQLite connection pool plus the configured table
/// names for the six logical tables. Every repository is constructed cheaply
/// on demand from `pool()` and `tables()`; the pool itself is the only thing
/// worth cloning or sharing behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Db {
    pool: SqlitePool,
    tables: TableNames,
}

impl Db {
    /// Open (creating if missing) the SQLite database at `db_path`, apply
    /// schema initialization, and seed category 0 plus any `extra_categories`.
    #[instrument(skip(db_path))]
    pub async fn new(db_path: &str, tables: TableNames) -> Result<Self> {
        Self::new_with_retry(db_path, tables, DatabaseRetryConfig::default()).await
    }

    #[instrument(skip(db_path, retry_config))]
    pub async fn new_with_retry(
        db_path: &str,
        tables: TableNames,
        retry_config: DatabaseRetryConfig,
    ) -> Result<Self> {
        info!(
            "Initializing database at: {} (max_attempts: {})",
            db_path, retry_config.max_attempts
        );

        let database_url = format!("sqlite://{}", db_path);
        let mut last_error = None;

        for attempt in 0..retry_config.max_attempts {
            if attempt > 0 {
                let delay = retry_config.calculate_delay(attempt - 1);
                warn!(
                    attempt = attempt + 1,
                    max_attempts = retry_config.max_attempts,
                    delay_ms = delay.as_millis(),
                    "Database connection failed, retrying after delay"
                );
                tokio::time::sleep(delay).await;
            }

            match Self::try_initialize(db_path, &database_url, tables.clone()).await {
                Ok(db) => match schema::init_schema(&db.pool, &db.tables).await {
                    Ok(()) => {
                        info!(attempts = attempt + 1, "Database ready");
                        return Ok(db);
                    }
                    Err(e) => {
                        warn!(attempt = attempt + 1, error = %e, "Schema init failed, will retry");
                        last_error = Some(e);
                        continue;
                    }
                },
                Err(e) => {
                    warn!(attempt = attempt + 1, error = %e, "Database initialization failed");
                    last_error = Some(e);
                    continue;
                }
            }
        }

        let error_msg = match last_error {
            Some(e) => format!(
                "Failed to initialize database after {} attempts: {}",
                retry_config.max_attempts, e
            ),
            None => format!(
                "Failed to initialize database after {} attempts",
                retry_config.max_attempts
            ),
        };
        Err(Error::Database(error_msg))
    }

    async fn try_initialize(db_path: &str, database_url: &str, tables: TableNames) -> Result<Self> {
        if !Sqlite::database_exists(database_url)
            .await
            .unwrap_or(false)
        {
            debug!("Creating database: {}", database_url);
            Sqlite::create_database(database_url)
                .await
                .map_err(|e| Error::Database(format!("Failed to create database: {}", e)))?;
        }

        let connect_options = SqliteConnectOptions::new()
            .filename(db_path)
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true)
            .pragma("foreign_keys", "ON")
            .pragma("synchronous", "NORMAL")
            .pragma("cache_size", "10000")
            .pragma("temp_store", "memory")
            .pragma("busy_timeout", "30000")
            .pragma("mmap_size", "268435456");

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .connect_with(connect_options)
            .await
            .map_err(|e| Error::Database(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self { pool, tables })
    }

    /// Wrap an already-open pool (tests, or a pool shared with another store).
    pub fn from_pool(pool: SqlitePool, tables: TableNames) -> Self {
        Self { pool, tables }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tables(&self) -> &TableNames {
        &self.tables
    }

    pub fn jobs(&self) -> JobRepository<'_> {
        JobRepository::new(&self.pool, &self.tables.jobs, &self.tables.job_categories)
    }

    pub fn executions(&self) -> ExecutionRepository<'_> {
        ExecutionRepository::new(&self.pool, &self.tables.executions)
    }

    pub fn audit_logs(&self) -> AuditLogRepository<'_> {
        AuditLogRepository::new(&self.pool, &self.tables.audit_logs)
    }

    pub fn categories(&self) -> CategoryRepository<'_> {
        CategoryRepository::new(&self.pool, &self.tables.categories)
    }

    pub fn users(&self) -> UserRepository<'_> {
        UserRepository::new(&self.pool, &self.tables.users)
    }

    /// Seed any additional categories beyond the reserved 0 ("all"), used at
    /// startup to materialize an operator's configured default categories.
    #[instrument(skip(self))]
    pub async fn seed_categories(&self, names: &[String]) -> Result<()> {
        let categories = self.categories();
        for name in names {
            if categories.list().await?.iter().any(|c| &c.name == name) {
                continue;
            }
            categories.create(name, None).await?;
        }
        Ok(())
    }

    /// Link `job_id` to `category_id` and back-fill the category onto the
    /// job's most recent ADDED audit row, in one transaction so a crash
    /// between the two writes can't leave them disagreeing.
    #[instrument(skip(self))]
    pub async fn set_job_category(&self, job_id: &str, category_id: i64) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;
        let now = now_iso8601();

        sqlx::query(&format!(
            r#"
            INSERT INTO {job_categories} (job_id, category_id, created_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(job_id) DO UPDATE SET category_id = excluded.category_id
            "#,
            job_categories = self.tables.job_categories
        ))
        .bind(job_id)
        .bind(category_id)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to link job category: {}", e)))?;

        sqlx::query(&format!(
            r#"
            UPDATE {audit}
            SET category_id = ?1
            WHERE id = (
                SELECT id FROM {audit}
                WHERE job_id = ?2 AND event = 'ADDED'
                ORDER BY created_time DESC, id DESC
                LIMIT 1
            )
            "#,
            audit = self.tables.audit_logs
        ))
        .bind(category_id)
        .bind(job_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to back-fill audit category: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit transaction: {}", e)))?;

        Ok(())
    }

    /// The category a job is linked to, or the unscoped sentinel if none.
    #[instrument(skip(self))]
    pub async fn get_job_category_id(&self, job_id: &str) -> Result<i64> {
        let row: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT category_id FROM {} WHERE job_id = ?1",
            self.tables.job_categories
        ))
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to read job category: {}", e)))?;

        Ok(row.map(|(id,)| id).unwrap_or(UNSCOPED_CATEGORY_ID))
    }

    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<()> {
        debug!("Performing database health check");
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }
}
