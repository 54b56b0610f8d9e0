//! ABOUTME: Web API layer with authentication and routing
//! ABOUTME: Provides REST endpoints and OpenAPI documentation

use actix_web::HttpServer;
use cronctl_core::Result;
use cronctl_db::Db;
use cronctl_scheduler::Engine;

pub mod auth;
pub mod error;
pub mod middleware;
pub mod models;

/// Route handler implementations
///
/// The routes/ directory contains all HTTP handler functions that process
/// requests and generate responses. Each module typically exports handler
/// functions that are referenced by the routing configuration.
pub mod routes;

/// Route configuration and middleware wiring
///
/// The routing/ directory contains functions that configure Actix-web routes,
/// map URL paths to handlers, and apply middleware. This separation keeps
/// handler logic (routes/) distinct from routing configuration (routing/).
///
/// Architecture:
/// - routes/ = handler implementations (the "what")
/// - routing/ = route configuration (the "how" and "where")
pub mod routing;


use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub engine: Arc<Engine>,
    pub security_config: cronctl_config::SecurityConfig,
    pub rate_limit_config: cronctl_config::RateLimitConfig,
    pub body_limits_config: cronctl_config::BodyLimitsConfig,
}

pub use routing::create_app;

/// Start the REST control plane server.
pub async fn start_server(bind_addr: &str, state: AppState) -> Result<()> {
    tracing::info!("Starting web server on {}", bind_addr);

    HttpServer::new(move || create_app(state.clone()))
        .bind(bind_addr)
        .map_err(|e| cronctl_core::Error::Config(format!("Failed to bind web server: {}", e)))?
        .run()
        .await
        .map_err(|e| cronctl_core::Error::Config(format!("Web server error: {}", e)))?;

    Ok(())
}
