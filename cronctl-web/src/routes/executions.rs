//! ABOUTME: Execution handlers: manual run, range listing, single lookup
//! ABOUTME: Manual runs audit under the acting user's category, not the job's

use crate::{
    error::{ApiError, ApiResult},
    middleware::auth::get_http_auth_user,
    models::{ExecutionResponse, TimeRangeQuery},
    AppState,
};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use cronctl_db::AuditEvent;
use serde_json::json;
use tracing::instrument;

const DEFAULT_EXECUTIONS_WINDOW_MINUTES: i64 = 10;

/// `POST /api/v1/executions/{job_id}` — manual out-of-band run.
#[instrument(skip(state, req))]
pub async fn run_now(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user = get_http_auth_user(&req)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    let job_id = path.into_inner();

    let record = state
        .db
        .jobs()
        .find_by_id(&job_id)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("Job {} not found", job_id)))?;

    let category_id = if user.category_id == 0 {
        None
    } else {
        Some(user.category_id)
    };

    let execution_id = state
        .engine
        .run_now(&job_id, category_id, Some("manual run".to_string()))
        .await?;

    state
        .db
        .audit_logs()
        .add(
            &job_id,
            &record.name,
            AuditEvent::CustomRun,
            Some(&user.username),
            category_id,
            None,
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "execution_id": execution_id })))
}

/// `GET /api/v1/executions` — within `time_range_start`..`time_range_end`,
/// defaulting to the last 10 minutes, scoped by the caller's category.
#[instrument(skip(state, req, query))]
pub async fn list_executions(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<TimeRangeQuery>,
) -> ApiResult<HttpResponse> {
    let user = get_http_auth_user(&req)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let now = Utc::now();
    let start = query
        .time_range_start
        .clone()
        .unwrap_or_else(|| (now - Duration::minutes(DEFAULT_EXECUTIONS_WINDOW_MINUTES)).to_rfc3339());
    let end = query.time_range_end.clone().unwrap_or_else(|| now.to_rfc3339());

    let scope = if user.category_id == 0 {
        None
    } else {
        Some(user.category_id)
    };

    let executions = state.db.executions().list_in_range(&start, &end, scope).await?;
    let executions: Vec<ExecutionResponse> = executions.into_iter().map(ExecutionResponse::from).collect();

    Ok(HttpResponse::Ok().json(json!({ "executions": executions })))
}

/// `GET /api/v1/executions/{id}`
#[instrument(skip(state, req))]
pub async fn get_execution(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    get_http_auth_user(&req).ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    let execution_id = path.into_inner();

    let execution = state
        .db
        .executions()
        .get(&execution_id)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("Execution {} not found", execution_id)))?;

    Ok(HttpResponse::Ok().json(ExecutionResponse::from(execution)))
}
