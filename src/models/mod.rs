//! Data models for the SQL manager.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{ConnectionConfig, ConnectionConfigError, DatabaseType};
pub use query::{Arg, ColumnMap, QueryParam, Row, RowMapping, Statement};
