//! ABOUTME: Repository modules providing type-safe database operations
//! ABOUTME: Each repository handles CRUD operations for one of the six logical tables

pub mod audit_logs;
pub mod categories;
pub mod executions;
pub mod jobs;
pub mod users;
