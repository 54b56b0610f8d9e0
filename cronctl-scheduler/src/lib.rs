//! ABOUTME: In-memory scheduler engine: a wake loop dispatching due triggers to job bodies
//! ABOUTME: Owns no HTTP surface; cronctl-web drives job CRUD through `Engine`, persistence through `Db`

pub mod jobs;
pub mod types;

pub use jobs::{JobBody, Registry};
pub use types::{resolve_misfire, MisfirePolicy, Trigger};

use chrono::{DateTime, Utc};
use cronctl_core::{Error, Id, Result};
use cronctl_cron::CronSchedule;
use cronctl_db::{Db, ExecutionState, ExecutionUpdate, JobRecord, JobTrigger};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// How long the wake loop sleeps between checks when there is nothing due
/// and no trigger at all, or when `OkayToRun` is currently refusing to run.
pub const DEFAULT_WAIT_SECONDS: u64 = 60;

/// A hook the engine consults before every dispatch round. Exists so a
/// future active/passive deployment can gate firing on leader election;
/// the default always returns `true`.
pub type OkayToRun = Arc<dyn Fn() -> bool + Send + Sync>;

/// Tunables the engine needs that aren't job-specific.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_instances: u32,
    pub coalesce: bool,
    pub misfire_grace: chrono::Duration,
    pub timezone: chrono_tz::Tz,
}

impl EngineConfig {
    pub fn from_scheduler_config(config: &cronctl_config::SchedulerConfig) -> Result<Self> {
        let timezone: chrono_tz::Tz = config
            .timezone
            .parse()
            .map_err(|_| Error::Config(format!("Unknown timezone '{}'", config.timezone)))?;

        Ok(Self {
            max_instances: config.job_max_instances,
            coalesce: config.job_coalesce,
            misfire_grace: chrono::Duration::seconds(config.job_misfire_grace_sec as i64),
            timezone,
        })
    }
}

/// Point-in-time counters for the observability endpoint.
#[derive(Debug, Clone, Default)]
pub struct EngineSnapshot {
    pub job_count: usize,
    pub paused_count: usize,
    pub running_total: u32,
}

/// The scheduler engine: a keyed map of in-memory `Trigger`s plus a single
/// background wake loop that dispatches due ones.
pub struct Engine {
    db: Db,
    registry: Registry,
    config: EngineConfig,
    triggers: Mutex<HashMap<String, Trigger>>,
    wake: Notify,
    shutdown: CancellationToken,
    okay_to_run: Mutex<OkayToRun>,
}

impl Engine {
    pub fn new(db: Db, registry: Registry, config: EngineConfig) -> Arc<Self> {
        Arc::new(Self {
            db,
            registry,
            config,
            triggers: Mutex::new(HashMap::new()),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            okay_to_run: Mutex::new(Arc::new(|| true)),
        })
    }

    pub fn set_okay_to_run(&self, hook: OkayToRun) {
        *self.okay_to_run.lock().unwrap() = hook;
    }

    fn okay_to_run(&self) -> bool {
        (self.okay_to_run.lock().unwrap())()
    }

    /// Load every persisted job into memory, applying misfire/coalesce policy
    /// to any whose stored `next_run_time` has already passed (the restart
    /// case: the process was down across one or more scheduled firings).
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<()> {
        let records = self.db.jobs().list(None).await?;
        info!(count = records.len(), "Loading jobs into scheduler");

        let now = Utc::now();
        let mut triggers = HashMap::new();

        for record in records {
            let trigger = self.build_trigger(&record, now).await?;
            triggers.insert(record.job_id.clone(), trigger);
        }

        *self.triggers.lock().unwrap() = triggers;
        Ok(())
    }

    async fn build_trigger(&self, record: &JobRecord, now: DateTime<Utc>) -> Result<Trigger> {
        let schedule = CronSchedule::from_fields(
            &record.trigger.minute,
            &record.trigger.hour,
            &record.trigger.day,
            &record.trigger.month,
            &record.trigger.day_of_week,
        )
        .map_err(|e| Error::Validation(format!("Invalid trigger for {}: {}", record.job_id, e)))?;

        let stored_next = record
            .next_run_time
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let next_run_time = match stored_next {
            None => schedule.next_after(self.config.timezone, now),
            Some(due_at) if due_at <= now => {
                match resolve_misfire(due_at, now, self.config.misfire_grace, self.config.coalesce) {
                    MisfirePolicy::FireOnce => Some(due_at),
                    MisfirePolicy::Skip => {
                        warn!(job_id = %record.job_id, %due_at, "Missed firing beyond misfire grace on load, recording as scheduled error");
                        let category_id = self.db.get_job_category_id(&record.job_id).await.ok();
                        let execution_id = Id::new().to_string();
                        if let Err(e) = self
                            .db
                            .executions()
                            .add(
                                &execution_id,
                                &record.job_id,
                                ExecutionState::ScheduledError,
                                &due_at.to_rfc3339(),
                                category_id,
                                Some("misfire grace period exceeded"),
                            )
                            .await
                        {
                            warn!(job_id = %record.job_id, error = %e, "Failed to record misfire scheduled error on load");
                        }
                        schedule.next_after(self.config.timezone, now)
                    }
                }
            }
            Some(due_at) => Some(due_at),
        };

        self.persist_next_run_time(&record.job_id, next_run_time)
            .await?;

        Ok(Trigger {
            job_id: record.job_id.clone(),
            job_class_string: record.job_class_string.clone(),
            pub_args: record.pub_args.clone(),
            schedule,
            timezone: self.config.timezone,
            paused: record.paused,
            next_run_time,
            running_count: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Re-derive a single job's in-memory trigger from the store. Called by
    /// the web layer after any create/update/pause/resume/delete so the
    /// wake loop picks up the change on its next cycle.
    #[instrument(skip(self))]
    pub async fn refresh_trigger(&self, job_id: &str) -> Result<()> {
        match self.db.jobs().find_by_id(job_id).await? {
            Some(record) => {
                let running = self
                    .triggers
                    .lock()
                    .unwrap()
                    .get(job_id)
                    .map(|t| t.running_count.clone());
                let now = Utc::now();
                let mut trigger = self.build_trigger(&record, now).await?;
                if let Some(running) = running {
                    trigger.running_count = running;
                }
                self.triggers
                    .lock()
                    .unwrap()
                    .insert(job_id.to_string(), trigger);
            }
            None => {
                self.triggers.lock().unwrap().remove(job_id);
            }
        }
        self.wake.notify_one();
        Ok(())
    }

    async fn persist_next_run_time(
        &self,
        job_id: &str,
        next_run_time: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if let Some(mut record) = self.db.jobs().find_by_id(job_id).await? {
            record.next_run_time = next_run_time.map(|t| t.to_rfc3339());
            self.db.jobs().upsert(&record).await?;
        }
        Ok(())
    }

    /// Trigger a manual, out-of-band firing of `job_id` right away, bypassing
    /// the wake loop but still subject to `max_instances`. `category_id`
    /// overrides the job's own category with the acting user's, per the
    /// manual-run audit contract. Returns the new execution's id.
    #[instrument(skip(self))]
    pub async fn run_now(
        &self,
        job_id: &str,
        category_id: Option<i64>,
        description: Option<String>,
    ) -> Result<String> {
        let (job_class_string, pub_args, running_count) = {
            let triggers = self.triggers.lock().unwrap();
            let trigger = triggers
                .get(job_id)
                .ok_or_else(|| Error::NotFound(format!("Job {} not found", job_id)))?;
            (
                trigger.job_class_string.clone(),
                trigger.pub_args.clone(),
                trigger.running_count.clone(),
            )
        };

        let execution_id = self
            .dispatch(
                job_id,
                &job_class_string,
                &pub_args,
                category_id,
                Utc::now(),
                running_count,
                description,
            )
            .await?;
        Ok(execution_id)
    }

    /// Spawn the background wake loop. The returned handle completes once
    /// `shutdown()` is called and any in-flight firings have returned.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run_loop().await })
    }

    /// Stop accepting new firings and signal the wake loop to exit after its
    /// current iteration.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.wake.notify_one();
    }

    async fn run_loop(self: Arc<Self>) {
        info!("Scheduler engine wake loop starting");
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            if !self.okay_to_run() {
                tokio::select! {
                    _ = tokio::time::sleep(StdDuration::from_secs(DEFAULT_WAIT_SECONDS)) => {},
                    _ = self.shutdown.cancelled() => break,
                }
                continue;
            }

            let sleep_for = self.next_wake_duration();
            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {},
                _ = self.wake.notified() => {},
                _ = self.shutdown.cancelled() => break,
            }

            if self.shutdown.is_cancelled() {
                break;
            }

            if let Err(e) = self.dispatch_due().await {
                warn!(error = %e, "Error dispatching due triggers");
            }
        }
        info!("Scheduler engine wake loop stopped");
    }

    fn next_wake_duration(&self) -> StdDuration {
        let now = Utc::now();
        let earliest = self
            .triggers
            .lock()
            .unwrap()
            .values()
            .filter(|t| !t.paused)
            .filter_map(|t| t.next_run_time)
            .min();

        match earliest {
            Some(t) if t <= now => StdDuration::ZERO,
            Some(t) => (t - now)
                .to_std()
                .unwrap_or(StdDuration::from_secs(DEFAULT_WAIT_SECONDS))
                .min(StdDuration::from_secs(DEFAULT_WAIT_SECONDS)),
            None => StdDuration::from_secs(DEFAULT_WAIT_SECONDS),
        }
    }

    #[instrument(skip(self))]
    async fn dispatch_due(&self) -> Result<()> {
        let now = Utc::now();

        let due: Vec<(String, String, Vec<serde_json::Value>, DateTime<Utc>, Arc<AtomicU32>)> = {
            let triggers = self.triggers.lock().unwrap();
            triggers
                .values()
                .filter(|t| t.is_due(now))
                .map(|t| {
                    (
                        t.job_id.clone(),
                        t.job_class_string.clone(),
                        t.pub_args.clone(),
                        t.next_run_time.unwrap(),
                        t.running_count.clone(),
                    )
                })
                .collect()
        };

        for (job_id, job_class_string, pub_args, due_at, running_count) in due {
            let policy = resolve_misfire(due_at, now, self.config.misfire_grace, self.config.coalesce);

            if policy == MisfirePolicy::FireOnce {
                let category_id = self.db.get_job_category_id(&job_id).await.ok();
                if let Err(e) = self
                    .dispatch(
                        &job_id,
                        &job_class_string,
                        &pub_args,
                        category_id,
                        due_at,
                        running_count,
                        None,
                    )
                    .await
                {
                    warn!(job_id = %job_id, error = %e, "Failed to dispatch firing");
                }
            } else {
                warn!(job_id = %job_id, %due_at, "Missed firing beyond misfire grace, recording as scheduled error");
                let category_id = self.db.get_job_category_id(&job_id).await.ok();
                let execution_id = Id::new().to_string();
                if let Err(e) = self
                    .db
                    .executions()
                    .add(
                        &execution_id,
                        &job_id,
                        ExecutionState::ScheduledError,
                        &due_at.to_rfc3339(),
                        category_id,
                        Some("misfire grace period exceeded"),
                    )
                    .await
                {
                    warn!(job_id = %job_id, error = %e, "Failed to record misfire scheduled error");
                }
            }

            let next = {
                let triggers = self.triggers.lock().unwrap();
                triggers
                    .get(&job_id)
                    .and_then(|t| t.schedule.next_after(t.timezone, now))
            };

            if let Some(mut triggers) = self.triggers.lock().ok() {
                if let Some(trigger) = triggers.get_mut(&job_id) {
                    trigger.next_run_time = next;
                }
            }
            self.persist_next_run_time(&job_id, next).await?;
        }

        Ok(())
    }

    /// Run one firing to completion: create the `SCHEDULED` row, resolve the
    /// job class, run it, and record the terminal state. `max_instances` is
    /// enforced here so both wake-loop and manual firings share the cap.
    #[allow(clippy::too_many_arguments)]
    async fn dispatch(
        &self,
        job_id: &str,
        job_class_string: &str,
        pub_args: &[serde_json::Value],
        category_id: Option<i64>,
        scheduled_time: DateTime<Utc>,
        running_count: Arc<AtomicU32>,
        description: Option<String>,
    ) -> Result<String> {
        let execution_id = Id::new().to_string();
        let body = self.registry.resolve(job_class_string).ok();
        let scheduled_description = description
            .or_else(|| body.as_ref().and_then(|b| b.scheduled_description()));

        self.db
            .executions()
            .add(
                &execution_id,
                job_id,
                ExecutionState::Scheduled,
                &scheduled_time.to_rfc3339(),
                category_id,
                scheduled_description.as_deref(),
            )
            .await?;

        let current_running = running_count.load(Ordering::SeqCst);
        if current_running >= self.config.max_instances {
            warn!(job_id, current_running, "max_instances reached, skipping firing");
            self.db
                .executions()
                .update(
                    &execution_id,
                    ExecutionUpdate {
                        state: Some(ExecutionState::ScheduledError),
                        description: Some(format!(
                            "max_instances ({}) reached",
                            self.config.max_instances
                        )),
                        ..Default::default()
                    },
                )
                .await?;
            return Ok(execution_id);
        }

        let body = match body {
            Some(body) => body,
            None => {
                let e = Error::Registry(format!("No job class registered for '{}'", job_class_string));
                warn!(job_id, job_class_string, error = %e, "Job class not registered");
                self.db
                    .executions()
                    .update(
                        &execution_id,
                        ExecutionUpdate {
                            state: Some(ExecutionState::ScheduledError),
                            description: Some(e.to_string()),
                            ..Default::default()
                        },
                    )
                    .await?;
                return Ok(execution_id);
            }
        };

        body.pre_run(job_id, &execution_id).await;
        running_count.fetch_add(1, Ordering::SeqCst);
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        let pid = std::process::id() as i64;

        self.db
            .executions()
            .update(
                &execution_id,
                ExecutionUpdate {
                    state: Some(ExecutionState::Running),
                    hostname: Some(hostname),
                    pid: Some(pid),
                    ..Default::default()
                },
            )
            .await?;

        let run_result = body.run(job_id, &execution_id, pub_args).await;
        running_count.fetch_sub(1, Ordering::SeqCst);

        let update = match run_result {
            Ok(value) => {
                debug!(job_id, %execution_id, "Job firing succeeded");
                ExecutionUpdate {
                    state: Some(ExecutionState::Succeeded),
                    description: body.succeeded_description(&value),
                    result: Some(canonical_json(&value)),
                    ..Default::default()
                }
            }
            Err(error) => {
                warn!(job_id, %execution_id, %error, "Job firing failed");
                ExecutionUpdate {
                    state: Some(ExecutionState::Failed),
                    description: body.failed_description(&error),
                    result: body.failed_result(&error),
                    ..Default::default()
                }
            }
        };
        self.db.executions().update(&execution_id, update).await?;
        body.post_run(job_id, &execution_id).await;

        Ok(execution_id)
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let triggers = self.triggers.lock().unwrap();
        EngineSnapshot {
            job_count: triggers.len(),
            paused_count: triggers.values().filter(|t| t.paused).count(),
            running_total: triggers.values().map(|t| t.running()).sum(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

/// Render a job body's result as canonical JSON: object keys sorted,
/// indented two spaces. Gives operators a stable diff between runs instead
/// of depending on a job body's own serialization order.
fn canonical_json(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(&sort_keys(value)).unwrap_or_else(|_| value.to_string())
}

fn sort_keys(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted = serde_json::Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for key in keys {
                sorted.insert(key.clone(), sort_keys(&map[key]));
            }
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sort_keys).collect())
        }
        other => other.clone(),
    }
}

/// Build a default `JobTrigger` that never fires; job creation always
/// supplies its own, this exists only so tests can cheaply construct records.
pub fn never_fires() -> JobTrigger {
    JobTrigger {
        minute: "0".to_string(),
        hour: "0".to_string(),
        day: "1".to_string(),
        month: "1".to_string(),
        day_of_week: "*".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronctl_db::TableNames;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_db() -> Db {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .expect("pool");
        let tables = TableNames::default();
        cronctl_db::schema::init_schema(&pool, &tables)
            .await
            .expect("schema");
        Db::from_pool(pool, tables)
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            max_instances: 3,
            coalesce: true,
            misfire_grace: chrono::Duration::seconds(3600),
            timezone: chrono_tz::UTC,
        }
    }

    fn every_minute_trigger() -> JobTrigger {
        JobTrigger {
            minute: "*".to_string(),
            hour: "*".to_string(),
            day: "*".to_string(),
            month: "*".to_string(),
            day_of_week: "*".to_string(),
        }
    }

    #[tokio::test]
    async fn load_computes_next_run_time_for_jobs_missing_one() {
        let db = memory_db().await;
        let job = JobRecord {
            job_id: "job-1".to_string(),
            name: "every minute".to_string(),
            job_class_string: "echo".to_string(),
            pub_args: vec![serde_json::json!("hi")],
            trigger: every_minute_trigger(),
            paused: false,
            next_run_time: None,
        };
        db.jobs().upsert(&job).await.unwrap();

        let engine = Engine::new(db.clone(), Registry::new(), test_config());
        engine.load().await.unwrap();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.job_count, 1);

        let persisted = db.jobs().find_by_id("job-1").await.unwrap().unwrap();
        assert!(persisted.next_run_time.is_some());
    }

    #[tokio::test]
    async fn run_now_records_a_succeeded_execution() {
        let db = memory_db().await;
        let job = JobRecord {
            job_id: "job-1".to_string(),
            name: "echo".to_string(),
            job_class_string: "echo".to_string(),
            pub_args: vec![serde_json::json!("hello")],
            trigger: every_minute_trigger(),
            paused: false,
            next_run_time: None,
        };
        db.jobs().upsert(&job).await.unwrap();

        let engine = Engine::new(db.clone(), Registry::new(), test_config());
        engine.load().await.unwrap();

        let execution_id = engine.run_now("job-1", None, None).await.unwrap();
        let execution = db.executions().get(&execution_id).await.unwrap().unwrap();
        assert_eq!(execution.state, ExecutionState::Succeeded);
    }

    #[tokio::test]
    async fn run_now_on_unknown_job_is_not_found() {
        let db = memory_db().await;
        let engine = Engine::new(db, Registry::new(), test_config());
        engine.load().await.unwrap();

        let err = engine.run_now("missing", None, None).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn paused_job_is_never_due() {
        let db = memory_db().await;
        let job = JobRecord {
            job_id: "job-1".to_string(),
            name: "paused".to_string(),
            job_class_string: "echo".to_string(),
            pub_args: vec![],
            trigger: every_minute_trigger(),
            paused: true,
            next_run_time: Some((Utc::now() - chrono::Duration::minutes(5)).to_rfc3339()),
        };
        db.jobs().upsert(&job).await.unwrap();

        let engine = Engine::new(db, Registry::new(), test_config());
        engine.load().await.unwrap();
        engine.dispatch_due().await.unwrap();

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.paused_count, 1);
    }

    #[tokio::test]
    async fn unknown_job_class_becomes_scheduled_error() {
        let db = memory_db().await;
        let job = JobRecord {
            job_id: "job-1".to_string(),
            name: "mystery".to_string(),
            job_class_string: "does.not.Exist".to_string(),
            pub_args: vec![],
            trigger: every_minute_trigger(),
            paused: false,
            next_run_time: None,
        };
        db.jobs().upsert(&job).await.unwrap();

        let engine = Engine::new(db.clone(), Registry::new(), test_config());
        engine.load().await.unwrap();

        let execution_id = engine.run_now("job-1", None, None).await.unwrap();
        let execution = db.executions().get(&execution_id).await.unwrap().unwrap();
        assert_eq!(execution.state, ExecutionState::ScheduledError);
    }

    #[tokio::test]
    async fn run_now_result_is_canonical_json() {
        let db = memory_db().await;
        let job = JobRecord {
            job_id: "job-1".to_string(),
            name: "t".to_string(),
            job_class_string: "echo".to_string(),
            pub_args: vec![serde_json::json!("hi")],
            trigger: every_minute_trigger(),
            paused: false,
            next_run_time: None,
        };
        db.jobs().upsert(&job).await.unwrap();

        let engine = Engine::new(db.clone(), Registry::new(), test_config());
        engine.load().await.unwrap();

        let execution_id = engine.run_now("job-1", None, None).await.unwrap();
        let execution = db.executions().get(&execution_id).await.unwrap().unwrap();
        assert_eq!(execution.result.as_deref(), Some("\"hi\""));
    }

    #[test]
    fn canonical_json_sorts_object_keys() {
        let value = serde_json::json!({"b": 1, "a": {"z": 1, "y": 2}});
        let rendered = canonical_json(&value);
        let a_pos = rendered.find("\"a\"").unwrap();
        let b_pos = rendered.find("\"b\"").unwrap();
        assert!(b_pos < a_pos);
        let y_pos = rendered.find("\"y\"").unwrap();
        let z_pos = rendered.find("\"z\"").unwrap();
        assert!(y_pos < z_pos);
    }

    #[tokio::test]
    async fn load_records_scheduled_error_for_misfire_beyond_grace() {
        let db = memory_db().await;
        let overdue = Utc::now() - chrono::Duration::hours(2);
        let job = JobRecord {
            job_id: "job-1".to_string(),
            name: "stale".to_string(),
            job_class_string: "echo".to_string(),
            pub_args: vec![],
            trigger: every_minute_trigger(),
            paused: false,
            next_run_time: Some(overdue.to_rfc3339()),
        };
        db.jobs().upsert(&job).await.unwrap();

        let engine = Engine::new(db.clone(), Registry::new(), test_config());
        engine.load().await.unwrap();

        let range_start = (overdue - chrono::Duration::minutes(1)).to_rfc3339();
        let range_end = Utc::now().to_rfc3339();
        let executions = db
            .executions()
            .list_in_range(&range_start, &range_end, None)
            .await
            .unwrap();
        assert_eq!(executions.len(), 1);
        assert_eq!(executions[0].state, ExecutionState::ScheduledError);
    }

    struct DescriptiveJob;

    #[async_trait::async_trait]
    impl JobBody for DescriptiveJob {
        fn class_name(&self) -> &str {
            "descriptive"
        }

        fn scheduled_description(&self) -> Option<String> {
            Some("about to echo".to_string())
        }

        fn succeeded_description(&self, result: &serde_json::Value) -> Option<String> {
            Some(format!("echoed {}", result))
        }

        fn failed_description(&self, error: &str) -> Option<String> {
            Some(format!("blew up: {}", error))
        }

        async fn run(
            &self,
            _job_id: &str,
            _execution_id: &str,
            args: &[serde_json::Value],
        ) -> std::result::Result<serde_json::Value, String> {
            match args {
                [serde_json::Value::String(s)] if s == "fail" => Err("boom".to_string()),
                [single] => Ok(single.clone()),
                rest => Ok(serde_json::Value::Array(rest.to_vec())),
            }
        }
    }

    #[tokio::test]
    async fn succeeded_execution_carries_job_bodys_description() {
        let db = memory_db().await;
        let job = JobRecord {
            job_id: "job-1".to_string(),
            name: "descriptive".to_string(),
            job_class_string: "descriptive".to_string(),
            pub_args: vec![serde_json::json!("hi")],
            trigger: every_minute_trigger(),
            paused: false,
            next_run_time: None,
        };
        db.jobs().upsert(&job).await.unwrap();

        let mut registry = Registry::new();
        registry.register(Arc::new(DescriptiveJob));
        let engine = Engine::new(db.clone(), registry, test_config());
        engine.load().await.unwrap();

        let execution_id = engine.run_now("job-1", None, None).await.unwrap();
        let execution = db.executions().get(&execution_id).await.unwrap().unwrap();
        assert_eq!(execution.state, ExecutionState::Succeeded);
        assert_eq!(execution.description.as_deref(), Some("echoed \"hi\""));
    }

    #[tokio::test]
    async fn failed_execution_carries_job_bodys_description() {
        let db = memory_db().await;
        let job = JobRecord {
            job_id: "job-1".to_string(),
            name: "descriptive".to_string(),
            job_class_string: "descriptive".to_string(),
            pub_args: vec![serde_json::json!("fail")],
            trigger: every_minute_trigger(),
            paused: false,
            next_run_time: None,
        };
        db.jobs().upsert(&job).await.unwrap();

        let mut registry = Registry::new();
        registry.register(Arc::new(DescriptiveJob));
        let engine = Engine::new(db.clone(), registry, test_config());
        engine.load().await.unwrap();

        let execution_id = engine.run_now("job-1", None, None).await.unwrap();
        let execution = db.executions().get(&execution_id).await.unwrap().unwrap();
        assert_eq!(execution.state, ExecutionState::Failed);
        assert_eq!(execution.description.as_deref(), Some("blew up: boom"));
        assert_eq!(execution.result.as_deref(), Some("boom"));
    }

}
