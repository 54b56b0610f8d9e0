//! ABOUTME: Audit log listing, scoped by the caller's category
//! ABOUTME: Defaults to the last 24 hours when no range is supplied

use crate::{
    error::{ApiError, ApiResult},
    middleware::auth::get_http_auth_user,
    models::{AuditLogResponse, TimeRangeQuery},
    AppState,
};
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use serde_json::json;
use tracing::instrument;

const DEFAULT_LOGS_WINDOW_HOURS: i64 = 24;

/// `GET /api/v1/logs`
#[instrument(skip(state, req, query))]
pub async fn list_logs(
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
        .unwrap_or_else(|| (now - Duration::hours(DEFAULT_LOGS_WINDOW_HOURS)).to_rfc3339());
    let end = query.time_range_end.clone().unwrap_or_else(|| now.to_rfc3339());

    let scope = if user.category_id == 0 {
        None
    } else {
        Some(user.category_id)
    };

    let logs = state.db.audit_logs().list_in_range(&start, &end, scope).await?;
    let total = logs.len();
    let logs: Vec<AuditLogResponse> = logs.into_iter().map(AuditLogResponse::from).collect();

    Ok(HttpResponse::Ok().json(json!({ "logs": logs, "total": total })))
}
