//! Database access layer.
//!
//! This module provides database access functionality:
//! - Connection pools per backend
//! - Argument normalization and parameter binding
//! - Row decoding and result transformation
//! - Single statement execution and transactional batches
//! - The manager facade consumed by application services

#[macro_use]
pub mod macros;
pub mod batch;
pub mod executor;
pub mod manager;
pub mod params;
pub mod pool;
pub mod transform;
pub mod types;

pub use batch::execute_batch;
pub use manager::{
    BatchFn, CountFn, ExecFn, Manager, ManagerExt, PoolManager, QueryFn, QueryOneFn, ScalarFn,
};
pub use params::normalize_args;
pub use pool::DbPool;
pub use transform::{coerce_bool, coerce_bools, map_row, map_rows, transform_rows};
