//! ABOUTME: Configuration management with validation and environment loading
//! ABOUTME: Handles all application settings from environment variables and files

use config::{Config as ConfigBuilder, Environment, File};
use cronctl_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use validator::Validate;

/// Main configuration struct, covering server, scheduler, database, and security settings.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, Default)]
#[serde(default)]
pub struct Config {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub scheduler: SchedulerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub security: SecurityConfig,
}

/// Server configuration: REST listen endpoint, the separate observability
/// port, and request-shaping knobs (rate limiting, body size caps).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct ServerConfig {
    /// `HTTP_ADDRESS`
    #[validate(length(min = 1))]
    pub host: String,
    /// `HTTP_PORT`
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    #[validate(range(min = 1, max = 65535))]
    pub obs_port: u16,
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,
    #[validate(nested)]
    pub body_limits: BodyLimitsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            obs_port: 9000,
            rate_limit: RateLimitConfig::default(),
            body_limits: BodyLimitsConfig::default(),
        }
    }
}

/// Rate limiting configuration, applied to the REST surface.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct RateLimitConfig {
    #[validate(range(min = 1, max = 10000))]
    pub requests_per_minute: u32,
    #[validate(range(min = 1, max = 3600))]
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 300,
            window_seconds: 60,
        }
    }
}

/// Body size limits configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct BodyLimitsConfig {
    #[validate(range(min = 1024, max = 104857600))]
    pub global_json_limit: usize,
}

impl Default for BodyLimitsConfig {
    fn default() -> Self {
        Self {
            global_json_limit: 1048576,
        }
    }
}

/// Scheduler engine defaults: worker pool width, per-job concurrency
/// cap, coalesce/misfire policy, default timezone, and job registry scoping.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SchedulerConfig {
    /// `THREAD_POOL_SIZE`
    #[validate(range(min = 1, max = 256))]
    pub thread_pool_size: u32,
    /// `JOB_MAX_INSTANCES`
    #[validate(range(min = 1, max = 1000))]
    pub job_max_instances: u32,
    /// `JOB_COALESCE`
    pub job_coalesce: bool,
    /// `JOB_MISFIRE_GRACE_SEC`
    #[validate(range(min = 1))]
    pub job_misfire_grace_sec: u64,
    /// `TIMEZONE` — an IANA timezone name, e.g. `UTC` or `America/New_York`.
    #[validate(length(min = 1))]
    pub timezone: String,
    /// `JOB_CLASS_PACKAGES` — package/namespace prefixes the job registry scans.
    pub job_class_packages: Vec<String>,
    /// `JOB_CLASS_EXCLUDE_PACKAGES`
    pub job_class_exclude_packages: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: 4,
            job_max_instances: 3,
            job_coalesce: true,
            job_misfire_grace_sec: 3600,
            timezone: "UTC".to_string(),
            job_class_packages: vec!["cronctl_scheduler::jobs".to_string()],
            job_class_exclude_packages: Vec::new(),
        }
    }
}

/// Database configuration: `DATABASE_CLASS`/`DATABASE_CONFIG`/`DATABASE_TABLENAMES`.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct DatabaseConfig {
    /// `DATABASE_CLASS` — currently only `sqlite` is implemented; kept as a
    /// string so a future Postgres driver can be selected without a schema
    /// change to this struct.
    #[validate(length(min = 1))]
    pub class: String,
    /// `DATABASE_CONFIG` — for the sqlite class, the file path.
    #[validate(length(min = 1))]
    pub path: String,
    #[validate(range(min = 1, max = 100))]
    pub pool_size: u32,
    pub sqlite_wal: bool,
    #[validate(nested)]
    pub table_names: TableNamesConfig,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            class: "sqlite".to_string(),
            path: "cronctl.db".to_string(),
            pool_size: 10,
            sqlite_wal: true,
            table_names: TableNamesConfig::default(),
        }
    }
}

/// `DATABASE_TABLENAMES` — override points for the six logical tables.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct TableNamesConfig {
    #[validate(length(min = 1))]
    pub jobs: String,
    #[validate(length(min = 1))]
    pub executions: String,
    #[validate(length(min = 1))]
    pub audit_logs: String,
    #[validate(length(min = 1))]
    pub users: String,
    #[validate(length(min = 1))]
    pub categories: String,
    #[validate(length(min = 1))]
    pub job_categories: String,
}

impl Default for TableNamesConfig {
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

/// Security configuration with secret redaction.
#[derive(Clone, Deserialize, Serialize, Validate)]
pub struct SecurityConfig {
    /// `JWT_SECRET`
    #[validate(length(min = 32))]
    pub jwt_secret: String,
    /// `JWT_EXPIRATION_DAYS`
    #[validate(range(min = 1, max = 365))]
    pub jwt_expiration_days: u32,
    pub argon2_params: Argon2Config,
    /// Whether to require HTTPS-only cookies for the `token` session cookie.
    pub secure_cookies: bool,
    /// `AUTH_CREDENTIALS` — bootstrap `{username: password_hash}` entries,
    /// inserted as admin users in category 0 on first initialization.
    /// Hashes are argon2 PHC strings.
    pub auth_credentials: HashMap<String, String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();

        Self {
            jwt_secret: format!("INSECURE-RANDOM-{}-CHANGE-IN-PRODUCTION", timestamp),
            jwt_expiration_days: 1,
            argon2_params: Argon2Config::default(),
            secure_cookies: false,
            auth_credentials: HashMap::new(),
        }
    }
}

impl fmt::Debug for SecurityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityConfig")
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_expiration_days", &self.jwt_expiration_days)
            .field("argon2_params", &self.argon2_params)
            .field("secure_cookies", &self.secure_cookies)
            .field(
                "auth_credentials",
                &format!("[REDACTED; {} entries]", self.auth_credentials.len()),
            )
            .finish()
    }
}

/// Argon2 password hashing parameters.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Argon2Config {
    #[validate(range(min = 1024, max = 1048576))]
    pub memory_cost: u32,
    #[validate(range(min = 1, max = 100))]
    pub time_cost: u32,
    #[validate(range(min = 1, max = 16))]
    pub parallelism: u32,
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl Config {
    /// Load configuration from defaults, then an optional `.env` file, then
    /// `CRONCTL_`-prefixed environment variables (highest priority).
    pub fn load() -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        builder = builder
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.obs_port", 9000)?
            .set_default("server.rate_limit.requests_per_minute", 300)?
            .set_default("server.rate_limit.window_seconds", 60)?
            .set_default("server.body_limits.global_json_limit", 1048576)?
            .set_default("scheduler.thread_pool_size", 4)?
            .set_default("scheduler.job_max_instances", 3)?
            .set_default("scheduler.job_coalesce", true)?
            .set_default("scheduler.job_misfire_grace_sec", 3600)?
            .set_default("scheduler.timezone", "UTC")?
            .set_default(
                "scheduler.job_class_packages",
                vec!["cronctl_scheduler::jobs".to_string()],
            )?
            .set_default(
                "scheduler.job_class_exclude_packages",
                Vec::<String>::new(),
            )?
            .set_default("database.class", "sqlite")?
            .set_default("database.path", "cronctl.db")?
            .set_default("database.pool_size", 10)?
            .set_default("database.sqlite_wal", true)?
            .set_default("database.table_names.jobs", "scheduler_jobs")?
            .set_default("database.table_names.executions", "scheduler_execution")?
            .set_default("database.table_names.audit_logs", "scheduler_jobauditlog")?
            .set_default("database.table_names.users", "scheduler_users")?
            .set_default("database.table_names.categories", "scheduler_categories")?
            .set_default(
                "database.table_names.job_categories",
                "scheduler_job_categories",
            )?
            .set_default("security.jwt_expiration_days", 1)?
            .set_default("security.argon2_params.memory_cost", 19456)?
            .set_default("security.argon2_params.time_cost", 2)?
            .set_default("security.argon2_params.parallelism", 1)?
            .set_default("security.secure_cookies", false)?;

        // JWT secret has no safe hardcoded default; generate one per process
        // unless the operator supplies one explicitly.
        if let Ok(jwt_secret) = std::env::var("CRONCTL_SECURITY_JWT_SECRET") {
            builder = builder.set_override("security.jwt_secret", jwt_secret)?;
        } else {
            let default_jwt_secret = format!(
                "INSECURE-RANDOM-{}-CHANGE-IN-PRODUCTION",
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_nanos()
            );
            builder = builder.set_default("security.jwt_secret", default_jwt_secret)?;
        }

        if std::path::Path::new(".env").exists() {
            builder = builder.add_source(File::with_name(".env").required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("CRONCTL")
                .try_parsing(true)
                .separator("_"),
        );

        let config = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build config: {}", e)))?;

        let parsed: Config = config
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize config: {}", e)))?;

        parsed
            .validate()
            .map_err(|e| Error::Config(format!("Config validation failed: {}", e)))?;

        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_config_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();

        let vars_to_clear = [
            "CRONCTL_SERVER_HOST",
            "CRONCTL_SERVER_PORT",
            "CRONCTL_DATABASE_PATH",
            "CRONCTL_DATABASE_POOL_SIZE",
            "CRONCTL_SECURITY_JWT_SECRET",
            "CRONCTL_SCHEDULER_JOB_MAX_INSTANCES",
        ];
        for key in &vars_to_clear {
            env::remove_var(key);
        }

        let config = Config::load().expect("should load with defaults");

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, "cronctl.db");
        assert_eq!(config.scheduler.job_max_instances, 3);
        assert!(config.scheduler.job_coalesce);
        assert_eq!(config.scheduler.job_misfire_grace_sec, 3600);
        assert_eq!(config.database.table_names.jobs, "scheduler_jobs");
    }

    #[test]
    fn test_config_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();

        env::set_var("CRONCTL_SERVER_HOST", "0.0.0.0");
        env::set_var("CRONCTL_SERVER_PORT", "9090");
        env::set_var(
            "CRONCTL_SECURITY_JWT_SECRET",
            "valid32characterjwtsecretfortest",
        );
        env::set_var("CRONCTL_SCHEDULER_JOB_MAX_INSTANCES", "5");

        let config = Config::load().expect("should load from env");

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.scheduler.job_max_instances, 5);

        env::remove_var("CRONCTL_SERVER_HOST");
        env::remove_var("CRONCTL_SERVER_PORT");
        env::remove_var("CRONCTL_SECURITY_JWT_SECRET");
        env::remove_var("CRONCTL_SCHEDULER_JOB_MAX_INSTANCES");
    }

    #[test]
    fn test_config_validation_failure() {
        let _lock = ENV_MUTEX.lock().unwrap();

        env::remove_var("CRONCTL_SERVER_PORT");
        env::set_var(
            "CRONCTL_SECURITY_JWT_SECRET",
            "toolongbutstillvalid32charactershere",
        );
        env::set_var("CRONCTL_DATABASE_POOL_SIZE", "200"); // invalid, too big

        let result = Config::load();
        assert!(result.is_err());

        env::remove_var("CRONCTL_SECURITY_JWT_SECRET");
        env::remove_var("CRONCTL_DATABASE_POOL_SIZE");
    }

    #[test]
    fn test_secret_redaction() {
        let _lock = ENV_MUTEX.lock().unwrap();

        env::remove_var("CRONCTL_SERVER_PORT");
        env::remove_var("CRONCTL_DATABASE_POOL_SIZE");
        env::remove_var("CRONCTL_SECURITY_JWT_SECRET");

        let config = Config::load().expect("should load with defaults");
        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("INSECURE-RANDOM"));
    }

    #[test]
    fn test_jwt_secret_too_short() {
        let _lock = ENV_MUTEX.lock().unwrap();

        env::set_var("CRONCTL_SECURITY_JWT_SECRET", "short");

        let result = Config::load();
        assert!(result.is_err());

        env::remove_var("CRONCTL_SECURITY_JWT_SECRET");
    }
}
