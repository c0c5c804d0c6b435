//! Manager facade over a connection pool.
//!
//! Application services depend on the [`Manager`] capability trait rather than
//! on a concrete pool. [`PoolManager`] is the implementation bound to one
//! [`DbPool`]; it is cheap to clone, so its operations can also be handed out
//! as free-standing callbacks through [`PoolManager::query_fn`],
//! [`PoolManager::exec_fn`] and their siblings.

use crate::db::pool::DbPool;
use crate::db::{batch, executor};
use crate::error::{DbError, DbResult};
use crate::models::{Arg, ConnectionConfig, Row, RowMapping, Statement};
use async_trait::async_trait;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Query operation as a first-class callback.
pub type QueryFn = Arc<
    dyn Fn(String, Vec<Arg>, Option<RowMapping>) -> BoxFuture<'static, DbResult<Vec<Row>>>
        + Send
        + Sync,
>;

/// Single-row query operation as a first-class callback.
pub type QueryOneFn = Arc<
    dyn Fn(String, Vec<Arg>, Option<RowMapping>) -> BoxFuture<'static, DbResult<Option<Row>>>
        + Send
        + Sync,
>;

/// Exec operation as a first-class callback.
pub type ExecFn = Arc<dyn Fn(String, Vec<Arg>) -> BoxFuture<'static, DbResult<u64>> + Send + Sync>;

/// Batch operation as a first-class callback.
pub type BatchFn =
    Arc<dyn Fn(Vec<Statement>) -> BoxFuture<'static, DbResult<u64>> + Send + Sync>;

/// Scalar operation as a first-class callback.
pub type ScalarFn = Arc<
    dyn Fn(String, Vec<Arg>) -> BoxFuture<'static, DbResult<Option<JsonValue>>> + Send + Sync,
>;

/// Count operation as a first-class callback.
pub type CountFn = Arc<dyn Fn(String, Vec<Arg>) -> BoxFuture<'static, DbResult<i64>> + Send + Sync>;

/// Database operations available to application services.
#[async_trait]
pub trait Manager: Send + Sync {
    /// Run a write statement and return the affected row count.
    async fn exec(&self, sql: &str, args: &[Arg]) -> DbResult<u64>;

    /// Run statements in one transaction and return the summed affected rows.
    async fn exec_batch(&self, statements: &[Statement]) -> DbResult<u64>;

    /// Run a query and return all rows, empty when nothing matched.
    async fn query(
        &self,
        sql: &str,
        args: &[Arg],
        mapping: Option<&RowMapping>,
    ) -> DbResult<Vec<Row>>;

    /// Run a query and return the first row, if any.
    async fn query_one(
        &self,
        sql: &str,
        args: &[Arg],
        mapping: Option<&RowMapping>,
    ) -> DbResult<Option<Row>>;

    /// First column of the first row, if any.
    async fn exec_scalar(&self, sql: &str, args: &[Arg]) -> DbResult<Option<JsonValue>>;

    /// Numeric scalar, zero when nothing matched.
    async fn count(&self, sql: &str, args: &[Arg]) -> DbResult<i64>;
}

/// Typed record mapping on top of [`Manager`].
///
/// Rows are deserialized with serde after renaming and boolean coercion, so
/// the record type names logical fields.
#[async_trait]
pub trait ManagerExt: Manager {
    async fn query_as<T>(
        &self,
        sql: &str,
        args: &[Arg],
        mapping: Option<&RowMapping>,
    ) -> DbResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.query(sql, args, mapping)
            .await?
            .into_iter()
            .map(row_into)
            .collect()
    }

    async fn query_one_as<T>(
        &self,
        sql: &str,
        args: &[Arg],
        mapping: Option<&RowMapping>,
    ) -> DbResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.query_one(sql, args, mapping)
            .await?
            .map(row_into)
            .transpose()
    }

    async fn exec_scalar_as<T>(&self, sql: &str, args: &[Arg]) -> DbResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.exec_scalar(sql, args)
            .await?
            .map(|value| serde_json::from_value(value).map_err(DbError::from))
            .transpose()
    }
}

impl<M: Manager + ?Sized> ManagerExt for M {}

fn row_into<T: DeserializeOwned>(row: Row) -> DbResult<T> {
    serde_json::from_value(JsonValue::Object(row)).map_err(DbError::from)
}

/// [`Manager`] bound to a single connection pool.
#[derive(Debug, Clone)]
pub struct PoolManager {
    pool: DbPool,
}

impl PoolManager {
    pub fn new(pool: impl Into<DbPool>) -> Self {
        Self { pool: pool.into() }
    }

    /// Open a pool for `config` and bind a manager to it.
    pub async fn connect(config: &ConnectionConfig) -> DbResult<Self> {
        Ok(Self::new(DbPool::connect(config).await?))
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// The query operation as a callback that owns a handle to the pool.
    pub fn query_fn(&self) -> QueryFn {
        let manager = self.clone();
        Arc::new(
            move |sql: String, args: Vec<Arg>, mapping: Option<RowMapping>| {
                let manager = manager.clone();
                async move {
                    executor::query(&manager.pool, &sql, &args, mapping.as_ref()).await
                }
                .boxed()
            },
        )
    }

    /// The exec operation as a callback that owns a handle to the pool.
    pub fn exec_fn(&self) -> ExecFn {
        let manager = self.clone();
        Arc::new(move |sql: String, args: Vec<Arg>| {
            let manager = manager.clone();
            async move { executor::exec(&manager.pool, &sql, &args).await }.boxed()
        })
    }

    pub fn query_one_fn(&self) -> QueryOneFn {
        let manager = self.clone();
        Arc::new(
            move |sql: String, args: Vec<Arg>, mapping: Option<RowMapping>| {
                let manager = manager.clone();
                async move {
                    executor::query_one(&manager.pool, &sql, &args, mapping.as_ref()).await
                }
                .boxed()
            },
        )
    }

    pub fn exec_batch_fn(&self) -> BatchFn {
        let manager = self.clone();
        Arc::new(move |statements: Vec<Statement>| {
            let manager = manager.clone();
            async move { batch::execute_batch(&manager.pool, &statements).await }.boxed()
        })
    }

    pub fn exec_scalar_fn(&self) -> ScalarFn {
        let manager = self.clone();
        Arc::new(move |sql: String, args: Vec<Arg>| {
            let manager = manager.clone();
            async move { executor::exec_scalar(&manager.pool, &sql, &args).await }.boxed()
        })
    }

    pub fn count_fn(&self) -> CountFn {
        let manager = self.clone();
        Arc::new(move |sql: String, args: Vec<Arg>| {
            let manager = manager.clone();
            async move { executor::count(&manager.pool, &sql, &args).await }.boxed()
        })
    }
}

#[async_trait]
impl Manager for PoolManager {
    async fn exec(&self, sql: &str, args: &[Arg]) -> DbResult<u64> {
        executor::exec(&self.pool, sql, args).await
    }

    async fn exec_batch(&self, statements: &[Statement]) -> DbResult<u64> {
        batch::execute_batch(&self.pool, statements).await
    }

    async fn query(
        &self,
        sql: &str,
        args: &[Arg],
        mapping: Option<&RowMapping>,
    ) -> DbResult<Vec<Row>> {
        executor::query(&self.pool, sql, args, mapping).await
    }

    async fn query_one(
        &self,
        sql: &str,
        args: &[Arg],
        mapping: Option<&RowMapping>,
    ) -> DbResult<Option<Row>> {
        executor::query_one(&self.pool, sql, args, mapping).await
    }

    async fn exec_scalar(&self, sql: &str, args: &[Arg]) -> DbResult<Option<JsonValue>> {
        executor::exec_scalar(&self.pool, sql, args).await
    }

    async fn count(&self, sql: &str, args: &[Arg]) -> DbResult<i64> {
        executor::count(&self.pool, sql, args).await
    }
}
