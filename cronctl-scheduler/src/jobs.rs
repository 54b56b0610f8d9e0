//! ABOUTME: Job registry: resolves a job's `job_class_string` to runnable code
//! ABOUTME: Registration is in-process; `JOB_CLASS_PACKAGES` only scopes what a future dynamic loader would consider

use async_trait::async_trait;
use cronctl_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// One registered job body. `run` receives the job and execution ids plus the
/// job's `pub_args` in declaration order and returns a JSON result or an
/// error; the engine turns a returned `Err` into a `FAILED` execution, never
/// a panic (job bodies are trusted not to panic, but the engine still isolates
/// each run on its own task so a panic can't take down the wake loop).
#[async_trait]
pub trait JobBody: Send + Sync {
    /// The `job_class_string` this body answers to.
    fn class_name(&self) -> &str;

    /// One-line human description, surfaced in listings.
    fn description(&self) -> &str {
        ""
    }

    /// Arbitrary metadata about this job class (parameter schema, version, ...).
    fn meta_info(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    /// `description` written onto the `SCHEDULED` row before the body runs.
    /// `None` leaves the engine's own description (e.g. "manual run") in place.
    fn scheduled_description(&self) -> Option<String> {
        None
    }

    /// `description` written onto the `SUCCEEDED` row alongside the canonical
    /// JSON `result`.
    fn succeeded_description(&self, _result: &serde_json::Value) -> Option<String> {
        None
    }

    /// `description` written onto the `FAILED` row.
    fn failed_description(&self, _error: &str) -> Option<String> {
        None
    }

    /// `result` written onto the `FAILED` row. Defaults to the raw error string.
    fn failed_result(&self, error: &str) -> Option<String> {
        Some(error.to_string())
    }

    /// Advisory hook called just before the engine transitions the row to
    /// `RUNNING`. Must not block; errors are logged and otherwise ignored.
    async fn pre_run(&self, _job_id: &str, _execution_id: &str) {}

    /// Advisory hook called just after the terminal state is written.
    async fn post_run(&self, _job_id: &str, _execution_id: &str) {}

    async fn run(
        &self,
        job_id: &str,
        execution_id: &str,
        args: &[serde_json::Value],
    ) -> std::result::Result<serde_json::Value, String>;
}

/// Maps a job's `job_class_string` to its `JobBody`. Resolution failure is a
/// `Registry` error: per the execution lifecycle, the firing is recorded as
/// `SCHEDULED_ERROR` rather than propagated to the caller that scheduled it.
#[derive(Clone)]
pub struct Registry {
    bodies: HashMap<String, Arc<dyn JobBody>>,
}

impl Registry {
    pub fn new() -> Self {
        let mut bodies: HashMap<String, Arc<dyn JobBody>> = HashMap::new();
        let echo: Arc<dyn JobBody> = Arc::new(EchoJob);
        bodies.insert(echo.class_name().to_string(), echo);
        Self { bodies }
    }

    pub fn register(&mut self, body: Arc<dyn JobBody>) {
        self.bodies.insert(body.class_name().to_string(), body);
    }

    pub fn resolve(&self, class_string: &str) -> Result<Arc<dyn JobBody>> {
        self.bodies
            .get(class_string)
            .cloned()
            .ok_or_else(|| Error::Registry(format!("No job class registered for '{}'", class_string)))
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.bodies.keys().map(String::as_str).collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

/// The reference job class: echoes its `pub_args` back as the execution
/// result. Used by the default smoke-test job and by integration tests that
/// need a trivially observable firing.
struct EchoJob;

#[async_trait]
impl JobBody for EchoJob {
    fn class_name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes its pub_args back as the execution result"
    }

    async fn run(
        &self,
        _job_id: &str,
        _execution_id: &str,
        args: &[serde_json::Value],
    ) -> std::result::Result<serde_json::Value, String> {
        match args {
            [single] => Ok(single.clone()),
            rest => Ok(serde_json::Value::Array(rest.to_vec())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_job_is_registered_by_default() {
        let registry = Registry::new();
        let body = registry.resolve("echo").expect("echo registered");
        let result = body.run("job-1", "exec-1", &[serde_json::json!("hi")]).await;
        assert_eq!(result.unwrap(), serde_json::json!("hi"));
    }

    #[test]
    fn unknown_class_is_a_registry_error() {
        let registry = Registry::new();
        assert!(matches!(
            registry.resolve("nonexistent"),
            Err(Error::Registry(_))
        ));
    }

    #[test]
    fn register_adds_a_new_class() {
        struct NoOp;
        #[async_trait]
        impl JobBody for NoOp {
            fn class_name(&self) -> &str {
                "noop"
            }
            async fn run(
                &self,
                _: &str,
                _: &str,
                _: &[serde_json::Value],
            ) -> std::result::Result<serde_json::Value, String> {
                Ok(serde_json::Value::Null)
            }
        }

        let mut registry = Registry::new();
        registry.register(Arc::new(NoOp));
        assert!(registry.resolve("noop").is_ok());
    }
}
