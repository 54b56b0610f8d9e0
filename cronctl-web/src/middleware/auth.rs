//! ABOUTME: Authentication middleware: JWT verification from bearer header or cookie
//! ABOUTME: Re-checks the username against the store on every verify, warning (not failing) if it's unreachable

use crate::{auth::JwtAuth, models::Claims, AppState};
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::ErrorUnauthorized,
    Error, HttpMessage,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use tracing::{debug, warn};

/// Requires a valid JWT, from either `Authorization: Bearer <t>` or the
/// `token` cookie set by `POST /auth/login`.
pub struct RequireAuth;

impl RequireAuth {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RequireAuth {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequireAuthMiddleware<S> {
    service: Rc<S>,
}

fn extract_token(req: &ServiceRequest) -> Option<String> {
    if let Some(auth_header) = req.headers().get("authorization") {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }

    req.cookie("token").map(|c| c.value().to_string())
}

impl<S, B> Service<ServiceRequest> for RequireAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);

        Box::pin(async move {
            let Some(token) = extract_token(&req) else {
                return Err(ErrorUnauthorized("Authentication required"));
            };

            let Some(app_state) = req.app_data::<actix_web::web::Data<AppState>>().cloned() else {
                return Err(ErrorUnauthorized("Authentication required"));
            };

            let claims = match JwtAuth::verify_token(&token, &app_state.security_config.jwt_secret)
            {
                Ok(claims) => claims,
                Err(e) => {
                    warn!(error = %e, "JWT verification failed");
                    return Err(ErrorUnauthorized("Invalid or expired token"));
                }
            };

            // The user may have been deleted since the token was issued; a
            // transient store failure shouldn't lock everyone out, so we
            // trust the token and warn rather than reject.
            match app_state.db.users().find_by_id(claims.user_id).await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    return Err(ErrorUnauthorized("User no longer exists"));
                }
                Err(e) => {
                    warn!(error = %e, "Store unavailable during auth verify, trusting token");
                }
            }

            debug!(user_id = claims.user_id, username = %claims.username, "JWT authentication successful");
            req.extensions_mut().insert(AuthUser::from_claims(claims));
            service.call(req).await
        })
    }
}

/// Authenticated user's identity and authorization attributes, extracted
/// from the verified token and carried in request extensions for handlers.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
    pub category_id: i64,
    pub is_permission: bool,
}

impl AuthUser {
    fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            is_admin: claims.is_admin,
            category_id: claims.category_id,
            is_permission: claims.is_permission,
        }
    }
}

/// Helper function to extract the authenticated user from an HTTP request.
pub fn get_http_auth_user(req: &actix_web::HttpRequest) -> Option<AuthUser> {
    req.extensions().get::<AuthUser>().cloned()
}
