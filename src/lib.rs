//! Agent Studio: voice and email agent configuration, build simulation,
//! and onboarding for persisted agents.

pub mod access;
pub mod agent;
pub mod catalog;
pub mod config;
pub mod error;
pub mod host;
pub mod notify;
pub mod records;
pub mod render;
pub mod routes;
pub mod store;
