//! ABOUTME: Body size limit middleware, one global JSON limit
//! ABOUTME: Prevents oversized payloads and returns RFC 7807 error responses

use crate::models::ProblemDetails;
use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpResponse,
};
use cronctl_config::BodyLimitsConfig;
use futures_util::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use tracing::{debug, warn};

/// Body size limit middleware transform.
pub struct BodyLimits {
    limit: usize,
}

impl BodyLimits {
    pub fn new(config: BodyLimitsConfig) -> Self {
        Self {
            limit: config.global_json_limit,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for BodyLimits
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = BodyLimitsMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(BodyLimitsMiddleware {
            service: Rc::new(service),
            limit: self.limit,
        }))
    }
}

pub struct BodyLimitsMiddleware<S> {
    service: Rc<S>,
    limit: usize,
}

impl<S, B> Service<ServiceRequest> for BodyLimitsMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let limit = self.limit;

        Box::pin(async move {
            let path = req.path().to_string();
            let content_length = req
                .headers()
                .get("content-length")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.parse::<usize>().ok());

            let is_json_request = req
                .headers()
                .get("content-type")
                .and_then(|h| h.to_str().ok())
                .map(|ct| ct.starts_with("application/json"))
                .unwrap_or(false);

            if is_json_request {
                if let Some(content_len) = content_length {
                    debug!(path, content_len, limit, "Body size check");

                    if content_len > limit {
                        warn!(path, content_len, limit, "Body size limit exceeded");

                        let problem = ProblemDetails::payload_too_large_error(limit as u64)
                            .with_extension("path", serde_json::Value::String(path))
                            .with_extension(
                                "received_size",
                                serde_json::Value::Number(content_len.into()),
                            );

                        let response = HttpResponse::PayloadTooLarge()
                            .content_type("application/problem+json")
                            .json(problem);

                        let (req, _) = req.into_parts();
                        return Ok(ServiceResponse::new(req, response).map_into_right_body());
                    }
                }
            }

            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
