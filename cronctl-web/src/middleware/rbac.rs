//! ABOUTME: Admin-gate middleware for authorization
//! ABOUTME: Enforces that user/category mutation is restricted to admin users

use crate::middleware::auth::AuthUser;
use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    error::{ErrorForbidden, ErrorUnauthorized},
    Error, HttpMessage,
};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use tracing::{debug, warn};

/// Requires the authenticated user to be an admin. Applied to user and
/// category mutation routes per the authorization rules; everything else
/// only needs `RequireAuth`.
pub struct RequireAdmin;

impl RequireAdmin {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RequireAdmin {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequireAdmin
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequireAdminMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequireAdminMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequireAdminMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequireAdminMiddleware<S>
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
            let auth_user = {
                let extensions = req.extensions();
                extensions.get::<AuthUser>().cloned()
            };

            match auth_user {
                Some(auth_user) if auth_user.is_admin => {
                    debug!(user_id = auth_user.user_id, "Admin gate passed");
                    service.call(req).await
                }
                Some(auth_user) => {
                    warn!(user_id = auth_user.user_id, "Admin gate rejected non-admin user");
                    Err(ErrorForbidden("Admin privileges required"))
                }
                None => {
                    warn!("Admin gate invoked without authenticated user");
                    Err(ErrorUnauthorized("Authentication required"))
                }
            }
        })
    }
}
