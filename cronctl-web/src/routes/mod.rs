//! ABOUTME: Route modules for different API endpoint groups
//! ABOUTME: Organizes endpoints by authentication and authorization requirements

pub mod auth;
pub mod categories;
pub mod executions;
pub mod jobs;
pub mod logs;
pub mod users;
