//! ABOUTME: Job CRUD handlers: create/list/get/update/delete/pause/resume
//! ABOUTME: Category scoping is applied on every listing per the caller's identity

use crate::{
    error::{ApiError, ApiResult},
    middleware::auth::get_http_auth_user,
    models::JobRequest,
    AppState,
};
use actix_web::{web, HttpRequest, HttpResponse};
use cronctl_core::Id;
use cronctl_cron::CronSchedule;
use cronctl_db::{AuditEvent, JobRecord, JobTrigger};
use serde_json::json;
use tracing::instrument;

fn auth_user(req: &HttpRequest) -> ApiResult<crate::middleware::auth::AuthUser> {
    get_http_auth_user(req).ok_or_else(|| ApiError::unauthorized("Authentication required"))
}

fn to_job_response(record: JobRecord, category_id: i64) -> crate::models::JobResponse {
    crate::models::JobResponse {
        job_id: record.job_id,
        name: record.name,
        job_class_string: record.job_class_string,
        pub_args: record.pub_args,
        minute: record.trigger.minute,
        hour: record.trigger.hour,
        day: record.trigger.day,
        month: record.trigger.month,
        day_of_week: record.trigger.day_of_week,
        paused: record.paused,
        next_run_time: record.next_run_time,
        category_id,
    }
}

/// `GET /api/v1/jobs` — scoped by the caller's category per §4.4.
#[instrument(skip(state, req))]
pub async fn list_jobs(state: web::Data<AppState>, req: HttpRequest) -> ApiResult<HttpResponse> {
    let user = auth_user(&req)?;
    let scope = if user.category_id == 0 {
        None
    } else {
        Some(user.category_id)
    };

    let records = state.db.jobs().list(scope).await?;
    let mut jobs = Vec::with_capacity(records.len());
    for record in records {
        let category_id = state.db.get_job_category_id(&record.job_id).await?;
        jobs.push(to_job_response(record, category_id));
    }

    Ok(HttpResponse::Ok().json(json!({ "jobs": jobs })))
}

/// `GET /api/v1/jobs/{id}`
#[instrument(skip(state, req))]
pub async fn get_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    auth_user(&req)?;
    let job_id = path.into_inner();

    let record = state
        .db
        .jobs()
        .find_by_id(&job_id)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("Job {} not found", job_id)))?;
    let category_id = state.db.get_job_category_id(&job_id).await?;

    Ok(HttpResponse::Ok().json(to_job_response(record, category_id)))
}

/// `POST /api/v1/jobs` — creates a job, installs its trigger, links the
/// caller's category (if scoped), and writes an ADDED audit row.
#[instrument(skip(state, req, payload))]
pub async fn create_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<JobRequest>,
) -> ApiResult<HttpResponse> {
    let user = auth_user(&req)?;
    let body = payload.into_inner();

    CronSchedule::from_fields(&body.minute, &body.hour, &body.day, &body.month, &body.day_of_week)
        .map_err(|e| ApiError::bad_request(format!("Invalid cron fields: {}", e)))?;

    let job_id = Id::new().to_string();
    let record = JobRecord {
        job_id: job_id.clone(),
        name: body.name.clone(),
        job_class_string: body.job_class_string,
        pub_args: body.pub_args,
        trigger: JobTrigger {
            minute: body.minute,
            hour: body.hour,
            day: body.day,
            month: body.month,
            day_of_week: body.day_of_week,
        },
        paused: false,
        next_run_time: None,
    };

    state.db.jobs().upsert(&record).await?;

    let audit_category = if user.category_id == 0 {
        None
    } else {
        Some(user.category_id)
    };
    state
        .db
        .audit_logs()
        .add(
            &job_id,
            &body.name,
            AuditEvent::Added,
            Some(&user.username),
            audit_category,
            None,
        )
        .await?;

    if user.category_id != 0 {
        state.db.set_job_category(&job_id, user.category_id).await?;
    }

    state.engine.refresh_trigger(&job_id).await?;

    Ok(HttpResponse::Created().json(json!({ "job_id": job_id })))
}

/// `PUT /api/v1/jobs/{id}` — if `pub_args` or `job_class_string` changed, the
/// job is rewritten under the same id and the trigger reinstalled.
#[instrument(skip(state, req, payload))]
pub async fn update_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    payload: web::Json<JobRequest>,
) -> ApiResult<HttpResponse> {
    let user = auth_user(&req)?;
    let job_id = path.into_inner();
    let body = payload.into_inner();

    CronSchedule::from_fields(&body.minute, &body.hour, &body.day, &body.month, &body.day_of_week)
        .map_err(|e| ApiError::bad_request(format!("Invalid cron fields: {}", e)))?;

    let existing = state
        .db
        .jobs()
        .find_by_id(&job_id)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("Job {} not found", job_id)))?;

    let rewritten = existing.pub_args != body.pub_args
        || existing.job_class_string != body.job_class_string;

    let updated = JobRecord {
        job_id: job_id.clone(),
        name: body.name.clone(),
        job_class_string: body.job_class_string,
        pub_args: body.pub_args.clone(),
        trigger: JobTrigger {
            minute: body.minute,
            hour: body.hour,
            day: body.day,
            month: body.month,
            day_of_week: body.day_of_week,
        },
        paused: existing.paused,
        next_run_time: if rewritten { None } else { existing.next_run_time.clone() },
    };

    state.db.jobs().upsert(&updated).await?;

    let audit_category = if user.category_id == 0 {
        None
    } else {
        Some(user.category_id)
    };
    let description = if rewritten {
        Some(
            json!({ "pub_args": { "old": existing.pub_args, "new": body.pub_args } })
                .to_string(),
        )
    } else {
        None
    };
    state
        .db
        .audit_logs()
        .add(
            &job_id,
            &body.name,
            AuditEvent::Modified,
            Some(&user.username),
            audit_category,
            description.as_deref(),
        )
        .await?;

    state.engine.refresh_trigger(&job_id).await?;

    Ok(HttpResponse::Ok().json(json!({ "job_id": job_id })))
}

/// `DELETE /api/v1/jobs/{id}`
#[instrument(skip(state, req))]
pub async fn delete_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let user = auth_user(&req)?;
    let job_id = path.into_inner();

    let existing = state
        .db
        .jobs()
        .find_by_id(&job_id)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("Job {} not found", job_id)))?;

    state.db.jobs().delete(&job_id).await?;

    let audit_category = if user.category_id == 0 {
        None
    } else {
        Some(user.category_id)
    };
    state
        .db
        .audit_logs()
        .add(
            &job_id,
            &existing.name,
            AuditEvent::Deleted,
            Some(&user.username),
            audit_category,
            None,
        )
        .await?;

    state.engine.refresh_trigger(&job_id).await?;

    Ok(HttpResponse::Ok().json(json!({ "job_id": job_id })))
}

/// `PATCH /api/v1/jobs/{id}` — pause.
#[instrument(skip(state, req))]
pub async fn pause_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    set_paused(state, req, path, true, AuditEvent::Paused).await
}

/// `OPTIONS /api/v1/jobs/{id}` — resume.
#[instrument(skip(state, req))]
pub async fn resume_job(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
) -> ApiResult<HttpResponse> {
    set_paused(state, req, path, false, AuditEvent::Resumed).await
}

async fn set_paused(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<String>,
    paused: bool,
    event: AuditEvent,
) -> ApiResult<HttpResponse> {
    let user = auth_user(&req)?;
    let job_id = path.into_inner();

    let mut record = state
        .db
        .jobs()
        .find_by_id(&job_id)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("Job {} not found", job_id)))?;
    record.paused = paused;
    state.db.jobs().upsert(&record).await?;

    let audit_category = if user.category_id == 0 {
        None
    } else {
        Some(user.category_id)
    };
    state
        .db
        .audit_logs()
        .add(&job_id, &record.name, event, Some(&user.username), audit_category, None)
        .await?;

    state.engine.refresh_trigger(&job_id).await?;

    Ok(HttpResponse::Ok().json(json!({ "job_id": job_id })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronctl_db::JobRecord as Rec;

    #[test]
    fn job_response_carries_category() {
        let record = Rec {
            job_id: "j1".into(),
            name: "test".into(),
            job_class_string: "echo".into(),
            pub_args: vec![],
            trigger: JobTrigger {
                minute: "*".into(),
                hour: "*".into(),
                day: "*".into(),
                month: "*".into(),
                day_of_week: "*".into(),
            },
            paused: false,
            next_run_time: None,
        };
        let response = to_job_response(record, 7);
        assert_eq!(response.category_id, 7);
        assert_eq!(response.job_id, "j1");
    }
}
