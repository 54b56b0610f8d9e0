//! ABOUTME: Category CRUD handlers; writes are admin-only per the authorization rules
//! ABOUTME: Category 0 (unscoped) is protected by the repository layer

use crate::{
    error::{ApiError, ApiResult},
    middleware::auth::{get_http_auth_user, AuthUser},
    models::{CategoryRequest, CategoryResponse},
    AppState,
};
use actix_web::{web, HttpRequest, HttpResponse};
use cronctl_core::Error;
use serde_json::json;
use tracing::instrument;

fn require_admin(req: &HttpRequest) -> ApiResult<AuthUser> {
    let user =
        get_http_auth_user(req).ok_or_else(|| ApiError::unauthorized("Authentication required"))?;
    if !user.is_admin {
        return Err(ApiError::forbidden("Admin privileges required"));
    }
    Ok(user)
}

/// `GET /api/v1/categories`
#[instrument(skip(state))]
pub async fn list_categories(state: web::Data<AppState>) -> ApiResult<HttpResponse> {
    let categories: Vec<CategoryResponse> = state
        .db
        .categories()
        .list()
        .await?
        .into_iter()
        .map(CategoryResponse::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "categories": categories })))
}

/// `GET /api/v1/categories/{id}`
#[instrument(skip(state))]
pub async fn get_category(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let id = path.into_inner();
    let category = state
        .db
        .categories()
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Category {} not found", id)))?;

    Ok(HttpResponse::Ok().json(CategoryResponse::from(category)))
}

/// `POST /api/v1/categories` (admin-only)
#[instrument(skip(state, req, payload))]
pub async fn create_category(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<CategoryRequest>,
) -> ApiResult<HttpResponse> {
    require_admin(&req)?;
    let body = payload.into_inner();
    let name = body
        .name
        .ok_or_else(|| Error::Validation("name is required".to_string()))?;

    let category = state
        .db
        .categories()
        .create(&name, body.description.as_deref())
        .await?;

    Ok(HttpResponse::Created().json(json!({ "id": category.id })))
}

/// `PUT /api/v1/categories/{id}` (admin-only)
#[instrument(skip(state, req, payload))]
pub async fn update_category(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
    payload: web::Json<CategoryRequest>,
) -> ApiResult<HttpResponse> {
    require_admin(&req)?;
    let id = path.into_inner();
    let body = payload.into_inner();
    let existing = state
        .db
        .categories()
        .get(id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Category {} not found", id)))?;

    let name = body.name.unwrap_or(existing.name);
    let description = body.description.or(existing.description);

    let category = state
        .db
        .categories()
        .update(id, &name, description.as_deref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "id": category.id })))
}

/// `DELETE /api/v1/categories/{id}` (admin-only)
#[instrument(skip(state, req))]
pub async fn delete_category(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    require_admin(&req)?;
    let id = path.into_inner();
    state.db.categories().delete(id).await?;
    Ok(HttpResponse::Ok().json(json!({ "id": id })))
}
