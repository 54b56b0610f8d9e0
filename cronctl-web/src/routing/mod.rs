//! ABOUTME: Actix-web route configuration and app factory creation
//! ABOUTME: Centralizes all route definitions and middleware setup

use crate::{
    middleware,
    models::{
        AuditLogResponse, CategoryRequest, CategoryResponse, ExecutionResponse, JobRequest,
        JobResponse, LoginRequest, LoginResponse, ProblemDetails, UserInfo, UserRequest,
        ValidationError, VerifyResponse,
    },
    routes::{auth as auth_routes, categories, executions, jobs, logs, users},
    AppState,
};
use actix_web::{web, App, HttpRequest, HttpResponse};
use serde_json::json;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// OpenAPI documentation for the control plane surface.
#[derive(OpenApi)]
#[openapi(
    paths(auth_routes::login, auth_routes::verify),
    components(
        schemas(
            LoginRequest,
            LoginResponse,
            VerifyResponse,
            UserInfo,
            JobRequest,
            JobResponse,
            ExecutionResponse,
            AuditLogResponse,
            CategoryRequest,
            CategoryResponse,
            UserRequest,
            ProblemDetails,
            ValidationError,
        ),
    ),
    tags(
        (name = "auth", description = "Authentication endpoints"),
        (name = "jobs", description = "Job CRUD and lifecycle"),
        (name = "executions", description = "Job execution history and manual runs"),
        (name = "logs", description = "Audit log listing"),
        (name = "categories", description = "Category CRUD"),
        (name = "users", description = "User CRUD"),
    )
)]
pub struct ApiDoc;

/// Create the main web application service factory.
pub fn create_app(
    state: AppState,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let rate_limit_config = state.rate_limit_config.clone();
    let body_limits_config = state.body_limits_config.clone();

    App::new()
        .app_data(web::Data::new(state))
        .wrap(actix_web::middleware::Logger::default())
        .wrap(actix_web::middleware::NormalizePath::new(
            actix_web::middleware::TrailingSlash::Trim,
        ))
        .wrap(middleware::security_headers())
        .wrap(middleware::bodylimits::BodyLimits::new(body_limits_config))
        .service(SwaggerUi::new("/docs/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .service(
            web::scope("/api/v1")
                .service(
                    web::scope("/auth")
                        .wrap(middleware::ratelimit::RateLimit::new(rate_limit_config.clone()))
                        .route("/login", web::post().to(auth_routes::login))
                        .route(
                            "/verify",
                            web::get()
                                .to(auth_routes::verify)
                                .wrap(middleware::auth::RequireAuth::new()),
                        ),
                )
                .service(
                    web::scope("/jobs")
                        .wrap(middleware::ratelimit::RateLimit::new(rate_limit_config.clone()))
                        .wrap(middleware::auth::RequireAuth::new())
                        .route("", web::get().to(jobs::list_jobs))
                        .route("", web::post().to(jobs::create_job))
                        .route("/{id}", web::get().to(jobs::get_job))
                        .route("/{id}", web::put().to(jobs::update_job))
                        .route("/{id}", web::delete().to(jobs::delete_job))
                        .route("/{id}", web::patch().to(jobs::pause_job))
                        .route("/{id}", web::method(actix_web::http::Method::OPTIONS).to(jobs::resume_job)),
                )
                .service(
                    web::scope("/executions")
                        .wrap(middleware::ratelimit::RateLimit::new(rate_limit_config.clone()))
                        .wrap(middleware::auth::RequireAuth::new())
                        .route("", web::get().to(executions::list_executions))
                        .route("/{job_id}", web::post().to(executions::run_now))
                        .route("/{job_id}", web::get().to(executions::get_execution)),
                )
                .service(
                    web::scope("/logs")
                        .wrap(middleware::ratelimit::RateLimit::new(rate_limit_config.clone()))
                        .wrap(middleware::auth::RequireAuth::new())
                        .route("", web::get().to(logs::list_logs)),
                )
                .service(
                    web::scope("/categories")
                        .wrap(middleware::ratelimit::RateLimit::new(rate_limit_config.clone()))
                        .wrap(middleware::auth::RequireAuth::new())
                        .route("", web::get().to(categories::list_categories))
                        .route(
                            "",
                            web::post()
                                .to(categories::create_category)
                                .wrap(middleware::rbac::RequireAdmin::new()),
                        )
                        .route("/{id}", web::get().to(categories::get_category))
                        .route(
                            "/{id}",
                            web::put()
                                .to(categories::update_category)
                                .wrap(middleware::rbac::RequireAdmin::new()),
                        )
                        .route(
                            "/{id}",
                            web::delete()
                                .to(categories::delete_category)
                                .wrap(middleware::rbac::RequireAdmin::new()),
                        ),
                )
                .service(
                    web::scope("/users")
                        .wrap(middleware::ratelimit::RateLimit::new(rate_limit_config.clone()))
                        .wrap(middleware::auth::RequireAuth::new())
                        .route("/current", web::get().to(users::current_user))
                        .route(
                            "",
                            web::get()
                                .to(users::list_users)
                                .wrap(middleware::rbac::RequireAdmin::new()),
                        )
                        .route(
                            "",
                            web::post()
                                .to(users::create_user)
                                .wrap(middleware::rbac::RequireAdmin::new()),
                        )
                        .route(
                            "/{id}",
                            web::get()
                                .to(users::get_user)
                                .wrap(middleware::rbac::RequireAdmin::new()),
                        )
                        .route(
                            "/{id}",
                            web::put()
                                .to(users::update_user)
                                .wrap(middleware::rbac::RequireAdmin::new()),
                        )
                        .route(
                            "/{id}",
                            web::delete()
                                .to(users::delete_user)
                                .wrap(middleware::rbac::RequireAdmin::new()),
                        ),
                )
                .default_service(web::to(|req: HttpRequest| async move {
                    let p = req.path().to_string();
                    info!(path = %p, "Unmatched API route");
                    HttpResponse::NotFound().json(json!({
                        "error": "Not Found",
                        "path": p
                    }))
                })),
        )
}
