//! ABOUTME: Middleware modules for authentication, authorization, rate limiting, and body limits
//! ABOUTME: Provides JWT authentication, RBAC, rate limiting, and body size limit middleware for Actix Web

pub mod auth;
pub mod bodylimits;
pub mod ratelimit;
pub mod rbac;
