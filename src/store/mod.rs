//! Persistence layer: the relational store interface and its backends.

pub mod libsql_backend;
pub mod migrations;
pub mod rest;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use rest::{RestConfig, RestStore};
pub use traits::{Filter, RelationalStore, Row};
