//! ABOUTME: User CRUD handlers; admin-only except `GET /users/current`
//! ABOUTME: Passwords are hashed with argon2 before being persisted

use crate::{
    auth::PasswordAuth,
    error::{ApiError, ApiResult},
    middleware::auth::get_http_auth_user,
    models::{UserInfo, UserRequest},
    AppState,
};
use actix_web::{web, HttpRequest, HttpResponse};
use cronctl_core::Error;
use cronctl_db::{CreateUserRequest, UpdateUserRequest};
use serde_json::json;
use tracing::instrument;

/// `GET /api/v1/users/current`
#[instrument(skip(state, req))]
pub async fn current_user(state: web::Data<AppState>, req: HttpRequest) -> ApiResult<HttpResponse> {
    let auth_user = get_http_auth_user(&req)
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let user = state
        .db
        .users()
        .find_by_id(auth_user.user_id)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))?;

    Ok(HttpResponse::Ok().json(UserInfo::from(user)))
}

/// `GET /api/v1/users` (admin-only)
#[instrument(skip(state))]
pub async fn list_users(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let users: Vec<UserInfo> = state
        .db
        .users()
        .list()
        .await?
        .into_iter()
        .map(UserInfo::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "users": users })))
}

/// `GET /api/v1/users/{id}` (admin-only)
#[instrument(skip(state))]
pub async fn get_user(state: web::Data<AppState>, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let user = state
        .db
        .users()
        .find_by_id(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("User {} not found", id)))?;

    Ok(HttpResponse::Ok().json(UserInfo::from(user)))
}

/// `POST /api/v1/users` (admin-only)
#[instrument(skip(state, payload))]
pub async fn create_user(
    state: web::Data<AppState>,
    payload: web::Json<UserRequest>,
) -> ApiResult<HttpResponse> {
    let body = payload.into_inner();
    let username = body
        .username
        .ok_or_else(|| Error::Validation("username is required".to_string()))?;
    let password = body
        .password
        .ok_or_else(|| Error::Validation("password is required".to_string()))?;

    let password_hash = PasswordAuth::hash_password(&password, &state.security_config.argon2_params)?;

    let user = state
        .db
        .users()
        .create(CreateUserRequest {
            username,
            password_hash,
            is_admin: body.is_admin.unwrap_or(false),
            category_id: body.category_id.unwrap_or(0),
            is_permission: body.is_permission.unwrap_or(false),
        })
        .await?;

    Ok(HttpResponse::Created().json(json!({ "id": user.id })))
}

/// `PUT /api/v1/users/{id}` (admin-only)
#[instrument(skip(state, payload))]
pub async fn update_user(
    state: web::Data<AppState>,
    path: web::Path<i64>,
    payload: web::Json<UserRequest>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let body = payload.into_inner();

    let password_hash = body
        .password
        .as_deref()
        .map(|p| PasswordAuth::hash_password(p, &state.security_config.argon2_params))
        .transpose()?;

    let user = state
        .db
        .users()
        .update(
            id,
            UpdateUserRequest {
                username: body.username,
                password_hash,
                is_admin: body.is_admin,
                category_id: body.category_id,
                is_permission: body.is_permission,
            },
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "id": user.id })))
}

/// `DELETE /api/v1/users/{id}` (admin-only)
#[instrument(skip(state))]
pub async fn delete_user(state: web::Data<AppState>, path: web::Path<i64>) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    state.db.users().delete(id).await?;
    Ok(HttpResponse::Ok().json(json!({ "id": id })))
}
