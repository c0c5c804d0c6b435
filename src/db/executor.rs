//! Query execution.
//!
//! This module runs single parameterized statements against a [`DbPool`]:
//! - `exec` for writes, returning the affected row count
//! - `query` / `query_one` for reads, passing rows through the result transformer
//! - `exec_scalar` / `count` for the first column of the first row
//!
//! Arguments are normalized before binding, so a missing argument reaches the
//! driver as SQL `NULL`. Statements without arguments are sent unprepared.
//!
//! # Architecture
//!
//! The executor uses database-specific implementations organized in submodules:
//! - `mysql`: MySQL-specific fetch and write operations
//! - `postgres`: PostgreSQL-specific fetch and write operations
//! - `sqlite`: SQLite-specific fetch and write operations
//!
//! Each submodule provides identical functionality adapted to the database's type system.

use crate::db::params::normalize_args;
use crate::db::pool::DbPool;
use crate::db::transform::transform_rows;
use crate::db::types::ToRow;
use crate::error::{DbError, DbResult};
use crate::models::{Arg, QueryParam, Row, RowMapping};
use serde_json::Value as JsonValue;
use tracing::debug;

/// Execute a write statement (INSERT, UPDATE, DELETE) and return affected rows.
pub async fn exec(pool: &DbPool, sql: &str, args: &[Arg]) -> DbResult<u64> {
    let params = normalize_args(args);
    debug!(sql = %sql, params = params.len(), "Executing statement");

    impl_db_dispatch!(pool, {
        MySql(p) => mysql::execute(p, sql, &params).await,
        Postgres(p) => postgres::execute(p, sql, &params).await,
        SQLite(p) => sqlite::execute(p, sql, &params).await,
    })
    .map_err(|e| pool.annotate_timeout(e))
}

/// Run a query and return every row, mapped through `mapping`.
///
/// Zero matches yield an empty vector.
pub async fn query(
    pool: &DbPool,
    sql: &str,
    args: &[Arg],
    mapping: Option<&RowMapping>,
) -> DbResult<Vec<Row>> {
    let params = normalize_args(args);
    debug!(sql = %sql, params = params.len(), "Executing query");

    let rows = impl_db_dispatch!(pool, {
        MySql(p) => mysql::fetch_rows(p, sql, &params).await,
        Postgres(p) => postgres::fetch_rows(p, sql, &params).await,
        SQLite(p) => sqlite::fetch_rows(p, sql, &params).await,
    })
    .map_err(|e| pool.annotate_timeout(e))?;

    Ok(transform_rows(rows, mapping))
}

/// Run a query and return its first row, or `None` when nothing matched.
pub async fn query_one(
    pool: &DbPool,
    sql: &str,
    args: &[Arg],
    mapping: Option<&RowMapping>,
) -> DbResult<Option<Row>> {
    let params = normalize_args(args);
    debug!(sql = %sql, params = params.len(), "Executing single-row query");

    let row = impl_db_dispatch!(pool, {
        MySql(p) => mysql::fetch_first(p, sql, &params).await,
        Postgres(p) => postgres::fetch_first(p, sql, &params).await,
        SQLite(p) => sqlite::fetch_first(p, sql, &params).await,
    })
    .map_err(|e| pool.annotate_timeout(e))?;

    Ok(row.and_then(|row| transform_rows(vec![row], mapping).pop()))
}

/// Return the first column of the first row, or `None` when nothing matched.
///
/// A matched row whose first column is SQL `NULL` yields `Some(Value::Null)`.
pub async fn exec_scalar(pool: &DbPool, sql: &str, args: &[Arg]) -> DbResult<Option<JsonValue>> {
    let row = query_one(pool, sql, args, None).await?;
    Ok(row.and_then(first_column))
}

/// Run an aggregate query and return its numeric result.
pub async fn count(pool: &DbPool, sql: &str, args: &[Arg]) -> DbResult<i64> {
    scalar_to_count(exec_scalar(pool, sql, args).await?)
}

/// Take the value of the first declared column.
pub(crate) fn first_column(row: Row) -> Option<JsonValue> {
    row.into_iter().next().map(|(_, value)| value)
}

/// Interpret a scalar as a count.
///
/// No row and SQL `NULL` both count as zero. Exact decimals arrive as strings
/// and are accepted when their fractional part is zero. Fractions and values
/// outside the `i64` range are decode errors.
pub(crate) fn scalar_to_count(value: Option<JsonValue>) -> DbResult<i64> {
    match value {
        None | Some(JsonValue::Null) => Ok(0),
        Some(JsonValue::Number(n)) => {
            if let Some(v) = n.as_i64() {
                return Ok(v);
            }
            match n.as_f64() {
                Some(f) if f.fract() != 0.0 => {
                    Err(DbError::decode(format!("count is not an integer: {}", n)))
                }
                // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
                Some(f) if f >= i64::MIN as f64 && f < i64::MAX as f64 => Ok(f as i64),
                _ => Err(DbError::decode(format!("count out of range: {}", n))),
            }
        }
        Some(JsonValue::String(s)) => parse_count_text(&s),
        Some(other) => Err(DbError::decode(format!(
            "count is not numeric: {}",
            other
        ))),
    }
}

fn parse_count_text(s: &str) -> DbResult<i64> {
    let text = s.trim();
    let (int, fraction) = text.split_once('.').unwrap_or((text, ""));

    let digits = int.strip_prefix(['-', '+']).unwrap_or(int);
    if digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(DbError::decode(format!("count is not numeric: '{}'", s)));
    }
    if fraction.bytes().any(|b| b != b'0') {
        return Err(DbError::decode(format!("count is not an integer: '{}'", s)));
    }
    int.parse::<i64>()
        .map_err(|_| DbError::decode(format!("count out of range: '{}'", s)))
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its database type.

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use sqlx::{Executor, MySqlPool};

    pub async fn fetch_rows(
        pool: &MySqlPool,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<Row>> {
        // When params is empty, use raw SQL to avoid prepared statement issues
        let rows = if params.is_empty() {
            pool.fetch_all(sql).await?
        } else {
            params
                .iter()
                .fold(sqlx::query(sql), bind_mysql_param)
                .fetch_all(pool)
                .await?
        };
        rows.iter().map(ToRow::to_row).collect()
    }

    pub async fn fetch_first(
        pool: &MySqlPool,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<Option<Row>> {
        let row = if params.is_empty() {
            pool.fetch_optional(sql).await?
        } else {
            params
                .iter()
                .fold(sqlx::query(sql), bind_mysql_param)
                .fetch_optional(pool)
                .await?
        };
        row.as_ref().map(ToRow::to_row).transpose()
    }

    pub async fn execute(pool: &MySqlPool, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        // Some SQL like CREATE PROCEDURE doesn't support prepared statements
        let result = if params.is_empty() {
            pool.execute(sql).await?
        } else {
            params
                .iter()
                .fold(sqlx::query(sql), bind_mysql_param)
                .execute(pool)
                .await?
        };
        Ok(result.rows_affected())
    }
}

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use sqlx::{Executor, PgPool};

    pub async fn fetch_rows(pool: &PgPool, sql: &str, params: &[QueryParam]) -> DbResult<Vec<Row>> {
        let rows = if params.is_empty() {
            pool.fetch_all(sql).await?
        } else {
            params
                .iter()
                .fold(sqlx::query(sql), bind_postgres_param)
                .fetch_all(pool)
                .await?
        };
        rows.iter().map(ToRow::to_row).collect()
    }

    pub async fn fetch_first(
        pool: &PgPool,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<Option<Row>> {
        let row = if params.is_empty() {
            pool.fetch_optional(sql).await?
        } else {
            params
                .iter()
                .fold(sqlx::query(sql), bind_postgres_param)
                .fetch_optional(pool)
                .await?
        };
        row.as_ref().map(ToRow::to_row).transpose()
    }

    pub async fn execute(pool: &PgPool, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        let result = if params.is_empty() {
            pool.execute(sql).await?
        } else {
            params
                .iter()
                .fold(sqlx::query(sql), bind_postgres_param)
                .execute(pool)
                .await?
        };
        Ok(result.rows_affected())
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::{Executor, SqlitePool};

    pub async fn fetch_rows(
        pool: &SqlitePool,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<Vec<Row>> {
        let rows = if params.is_empty() {
            pool.fetch_all(sql).await?
        } else {
            params
                .iter()
                .fold(sqlx::query(sql), bind_sqlite_param)
                .fetch_all(pool)
                .await?
        };
        rows.iter().map(ToRow::to_row).collect()
    }

    pub async fn fetch_first(
        pool: &SqlitePool,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<Option<Row>> {
        let row = if params.is_empty() {
            pool.fetch_optional(sql).await?
        } else {
            params
                .iter()
                .fold(sqlx::query(sql), bind_sqlite_param)
                .fetch_optional(pool)
                .await?
        };
        row.as_ref().map(ToRow::to_row).transpose()
    }

    pub async fn execute(pool: &SqlitePool, sql: &str, params: &[QueryParam]) -> DbResult<u64> {
        let result = if params.is_empty() {
            pool.execute(sql).await?
        } else {
            params
                .iter()
                .fold(sqlx::query(sql), bind_sqlite_param)
                .execute(pool)
                .await?
        };
        Ok(result.rows_affected())
    }
}
