//! Backend dispatch over [`DbPool`](crate::db::pool::DbPool).

/// Run a backend-specific expression for whichever pool variant `$pool` holds.
///
/// Every operation in this crate has one implementation per backend; the
/// macro writes the `match` so call sites list the three arms only.
///
/// ```ignore
/// let affected = impl_db_dispatch!(pool, {
///     MySql(p) => mysql::execute(p, sql, &params).await?,
///     Postgres(p) => postgres::execute(p, sql, &params).await?,
///     SQLite(p) => sqlite::execute(p, sql, &params).await?,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
