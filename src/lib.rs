//! SQL Manager Library
//!
//! This library provides a thin database access layer over connection pools
//! for SQL databases (PostgreSQL, MySQL, SQLite): parameterized execution,
//! row renaming with boolean coercion, scalar helpers and all-or-nothing
//! statement batches.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::Config;
pub use db::{Manager, ManagerExt, PoolManager};
pub use error::{DbError, DbResult};
