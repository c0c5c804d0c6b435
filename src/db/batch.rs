//! Transactional batch execution.
//!
//! [`execute_batch`] runs a list of statements on one pooled connection inside
//! a single transaction. Either every statement takes effect and the summed
//! affected row count is returned, or the transaction is rolled back and the
//! failing statement's error is returned wrapped in [`DbError::Transaction`].
//!
//! The connection is owned by a sqlx `Transaction` for the whole batch. It goes
//! back to the pool when the transaction is committed, rolled back or dropped,
//! so every exit path releases it.

use crate::db::params::normalize_args;
use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, Statement};
use sqlx::Transaction;
use tracing::{debug, warn};

/// Execute `statements` atomically and return the total affected row count.
///
/// Statements run in order; commit happens only after all of them succeeded.
/// An empty batch returns `0` without acquiring a connection.
pub async fn execute_batch(pool: &DbPool, statements: &[Statement]) -> DbResult<u64> {
    if statements.is_empty() {
        return Ok(0);
    }

    let params: Vec<Vec<QueryParam>> = statements
        .iter()
        .map(|statement| normalize_args(statement.params.as_slice()))
        .collect();

    debug!(statements = statements.len(), "Executing batch in transaction");

    let total = impl_db_dispatch!(pool, {
        MySql(p) => mysql::run(p, statements, &params).await,
        Postgres(p) => postgres::run(p, statements, &params).await,
        SQLite(p) => sqlite::run(p, statements, &params).await,
    })
    .map_err(|e| pool.annotate_timeout(e))?;

    debug!(
        statements = statements.len(),
        rows_affected = total,
        "Batch committed"
    );
    Ok(total)
}

/// Roll back after a failed statement and build the error to surface.
///
/// A rollback failure is logged; the statement error is still the one returned.
async fn abort<DB: sqlx::Database>(
    tx: Transaction<'static, DB>,
    statement_index: usize,
    error: DbError,
) -> DbError {
    warn!(
        statement_index,
        error = %error,
        "Batch statement failed, rolling back"
    );
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, "Rollback failed, connection will be closed");
    }
    DbError::transaction(statement_index, error)
}

// =============================================================================
// Database-Specific Implementations
// =============================================================================

mod mysql {
    use super::*;
    use crate::db::params::bind_mysql_param;
    use sqlx::{Executor, MySqlPool};

    pub async fn run(
        pool: &MySqlPool,
        statements: &[Statement],
        params: &[Vec<QueryParam>],
    ) -> DbResult<u64> {
        let mut tx = pool.begin().await?;
        let mut total = 0;

        for (index, (statement, params)) in statements.iter().zip(params).enumerate() {
            let result = if params.is_empty() {
                Executor::execute(&mut *tx, statement.query.as_str()).await
            } else {
                params
                    .iter()
                    .fold(sqlx::query(&statement.query), bind_mysql_param)
                    .execute(&mut *tx)
                    .await
            };
            match result {
                Ok(r) => total += r.rows_affected(),
                Err(e) => return Err(abort(tx, index, e.into()).await),
            }
        }

        tx.commit().await?;
        Ok(total)
    }
}

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use sqlx::{Executor, PgPool};

    pub async fn run(
        pool: &PgPool,
        statements: &[Statement],
        params: &[Vec<QueryParam>],
    ) -> DbResult<u64> {
        let mut tx = pool.begin().await?;
        let mut total = 0;

        for (index, (statement, params)) in statements.iter().zip(params).enumerate() {
            let result = if params.is_empty() {
                Executor::execute(&mut *tx, statement.query.as_str()).await
            } else {
                params
                    .iter()
                    .fold(sqlx::query(&statement.query), bind_postgres_param)
                    .execute(&mut *tx)
                    .await
            };
            match result {
                Ok(r) => total += r.rows_affected(),
                Err(e) => return Err(abort(tx, index, e.into()).await),
            }
        }

        tx.commit().await?;
        Ok(total)
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use sqlx::{Executor, SqlitePool};

    pub async fn run(
        pool: &SqlitePool,
        statements: &[Statement],
        params: &[Vec<QueryParam>],
    ) -> DbResult<u64> {
        let mut tx = pool.begin().await?;
        let mut total = 0;

        for (index, (statement, params)) in statements.iter().zip(params).enumerate() {
            let result = if params.is_empty() {
                Executor::execute(&mut *tx, statement.query.as_str()).await
            } else {
                params
                    .iter()
                    .fold(sqlx::query(&statement.query), bind_sqlite_param)
                    .execute(&mut *tx)
                    .await
            };
            match result {
                Ok(r) => total += r.rows_affected(),
                Err(e) => return Err(abort(tx, index, e.into()).await),
            }
        }

        tx.commit().await?;
        Ok(total)
    }
}
