//! ABOUTME: Data models for web API with validation and OpenAPI schemas
//! ABOUTME: Defines request/response structures with serde and validation

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Request body for user login.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(length(min = 1))]
    pub username: String,

    #[validate(length(min = 1))]
    pub password: String,
}

/// Response for successful login: `{token, user:{...}}` per the control plane contract.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserInfo,
}

/// Response for `GET /auth/verify`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub user: UserInfo,
}

/// User information surfaced in responses. Never includes `password_hash`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    pub category_id: i64,
    pub is_permission: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<cronctl_db::User> for UserInfo {
    fn from(user: cronctl_db::User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            is_admin: user.is_admin,
            category_id: user.category_id,
            is_permission: user.is_permission,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Request body for `POST /users` and `PUT /users/{id}`.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UserRequest {
    #[validate(length(min = 1))]
    pub username: Option<String>,
    #[validate(length(min = 1))]
    pub password: Option<String>,
    pub category_id: Option<i64>,
    pub is_admin: Option<bool>,
    pub is_permission: Option<bool>,
}

/// Request body for `POST /categories` and `PUT /categories/{id}`.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CategoryRequest {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<cronctl_db::Category> for CategoryResponse {
    fn from(category: cronctl_db::Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }
}

/// Request body for `POST /jobs` and `PUT /jobs/{id}`.
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct JobRequest {
    #[validate(length(min = 1))]
    pub name: String,
    #[validate(length(min = 1))]
    pub job_class_string: String,
    #[serde(default)]
    pub pub_args: Vec<serde_json::Value>,
    #[serde(default = "default_cron_field")]
    pub minute: String,
    #[serde(default = "default_cron_field")]
    pub hour: String,
    #[serde(default = "default_cron_field")]
    pub day: String,
    #[serde(default = "default_cron_field")]
    pub month: String,
    #[serde(default = "default_cron_field")]
    pub day_of_week: String,
}

fn default_cron_field() -> String {
    "*".to_string()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobResponse {
    pub job_id: String,
    pub name: String,
    pub job_class_string: String,
    pub pub_args: Vec<serde_json::Value>,
    pub minute: String,
    pub hour: String,
    pub day: String,
    pub month: String,
    pub day_of_week: String,
    pub paused: bool,
    pub next_run_time: Option<String>,
    pub category_id: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ExecutionResponse {
    pub execution_id: String,
    pub job_id: String,
    pub state: String,
    pub hostname: Option<String>,
    pub pid: Option<i64>,
    pub category_id: Option<i64>,
    pub scheduled_time: String,
    pub updated_time: String,
    pub description: Option<String>,
    pub result: Option<String>,
}

impl From<cronctl_db::Execution> for ExecutionResponse {
    fn from(execution: cronctl_db::Execution) -> Self {
        Self {
            execution_id: execution.execution_id,
            job_id: execution.job_id,
            state: execution.state.to_string(),
            hostname: execution.hostname,
            pid: execution.pid,
            category_id: execution.category_id,
            scheduled_time: execution.scheduled_time,
            updated_time: execution.updated_time,
            description: execution.description,
            result: execution.result,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditLogResponse {
    pub id: i64,
    pub job_id: String,
    pub job_name: String,
    pub event: String,
    pub user: Option<String>,
    pub category_id: Option<i64>,
    pub created_time: String,
    pub description: Option<String>,
}

impl From<cronctl_db::AuditLog> for AuditLogResponse {
    fn from(log: cronctl_db::AuditLog) -> Self {
        Self {
            id: log.id,
            job_id: log.job_id,
            job_name: log.job_name,
            event: log.event.to_string(),
            user: log.user,
            category_id: log.category_id,
            created_time: log.created_time,
            description: log.description,
        }
    }
}

/// Query parameters accepted by `GET /executions` and `GET /logs`.
#[derive(Debug, Deserialize)]
pub struct TimeRangeQuery {
    pub time_range_start: Option<String>,
    pub time_range_end: Option<String>,
}

/// Standard error response, used by handlers that don't route through `ApiError`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(
        error: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            details: Some(details),
        }
    }
}

/// JWT claims carried by every issued token, per the auth subsystem's contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    pub category_id: i64,
    pub is_permission: bool,
    pub exp: usize,
}

/// RFC 7807 Problem Details response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProblemDetails {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(flatten)]
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

impl ProblemDetails {
    pub fn new(problem_type: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            problem_type: problem_type.into(),
            title: title.into(),
            status: None,
            detail: None,
            instance: None,
            extensions: serde_json::Map::new(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    pub fn validation_error(detail: impl Into<String>) -> Self {
        Self::new(
            "https://datatracker.ietf.org/rfc/rfc7231.html#section-6.5.1",
            "Bad Request",
        )
        .with_status(400)
        .with_detail(detail.into())
    }

    pub fn rate_limit_error(retry_after: Option<u64>) -> Self {
        let mut problem = Self::new(
            "https://datatracker.ietf.org/rfc/rfc7231.html#section-6.6.4",
            "Too Many Requests",
        )
        .with_status(429)
        .with_detail("Rate limit exceeded");

        if let Some(retry_after) = retry_after {
            problem = problem
                .with_extension("retry_after", serde_json::Value::Number(retry_after.into()));
        }

        problem
    }

    pub fn payload_too_large_error(max_size: u64) -> Self {
        Self::new(
            "https://datatracker.ietf.org/rfc/rfc7231.html#section-6.5.11",
            "Payload Too Large",
        )
        .with_status(413)
        .with_detail(format!(
            "Request payload exceeds maximum size of {} bytes",
            max_size
        ))
        .with_extension("max_size", serde_json::Value::Number(max_size.into()))
    }
}

/// Validation error details for RFC 7807 responses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationError {
    pub field: String,
    pub code: String,
    pub message: String,
    pub value: Option<serde_json::Value>,
}
