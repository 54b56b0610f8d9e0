//! ABOUTME: Authentication routes: login and token verification
//! ABOUTME: Sets the `token` cookie per the auth contract, in addition to returning it in the body

use crate::auth::{JwtAuth, PasswordAuth};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::get_http_auth_user;
use crate::models::{LoginRequest, LoginResponse, ProblemDetails, UserInfo, VerifyResponse};
use crate::AppState;
use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::{web, HttpRequest, HttpResponse};
use validator::Validate;

/// `POST /api/v1/auth/login` — verify the password and issue a token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login succeeded", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ProblemDetails),
    )
)]
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    payload.validate()?;

    let user = state
        .db
        .users()
        .find_by_username(&payload.username)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid username or password"))?;

    let valid = PasswordAuth::verify_password(&payload.password, &user.password_hash)?;
    if !valid {
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    let token = JwtAuth::create_token(
        user.id,
        &user.username,
        user.is_admin,
        user.category_id,
        user.is_permission,
        &state.security_config.jwt_secret,
        state.security_config.jwt_expiration_days,
    )?;

    let body = LoginResponse {
        token: token.clone(),
        user: UserInfo::from(user),
    };

    let cookie = Cookie::build("token", token)
        .http_only(true)
        .secure(state.security_config.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(CookieDuration::days(
            state.security_config.jwt_expiration_days as i64,
        ))
        .path("/")
        .finish();

    Ok(HttpResponse::Ok().cookie(cookie).json(body))
}

/// `GET /api/v1/auth/verify` — confirms the caller's token is still valid
/// and returns the current user, refreshed from the store.
#[utoipa::path(
    get,
    path = "/api/v1/auth/verify",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Invalid or expired token", body = ProblemDetails),
    )
)]
pub async fn verify(state: web::Data<AppState>, req: HttpRequest) -> ApiResult<HttpResponse> {
    let auth_user =
        get_http_auth_user(&req).ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let user = state
        .db
        .users()
        .find_by_id(auth_user.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("User no longer exists"))?;

    Ok(HttpResponse::Ok().json(VerifyResponse {
        user: UserInfo::from(user),
    }))
}
