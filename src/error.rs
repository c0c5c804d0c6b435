//! Error types for the SQL manager.
//!
//! All fallible operations return [`DbResult`]. Driver errors are classified
//! into [`DbError`] variants through the `From<sqlx::Error>` conversion so that
//! callers can tell a rejected statement apart from a lost connection.

use thiserror::Error;

/// Operation name of a [`DbError::Timeout`] raised while waiting for a pooled connection.
pub const POOL_ACQUIRE: &str = "connection pool acquire";

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
        suggestion: String,
    },

    #[error("Transaction rolled back: statement {statement_index} failed: {source}")]
    Transaction {
        /// Zero-based position of the failing statement in the batch
        statement_index: usize,
        #[source]
        source: Box<DbError>,
    },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Decode error: {message}")]
    Decode { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(
        message: impl Into<String>,
        sql_state: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
            suggestion: suggestion.into(),
        }
    }

    /// Wrap the error of a failed batch statement.
    pub fn transaction(statement_index: usize, source: DbError) -> Self {
        Self::Transaction {
            statement_index,
            source: Box::new(source),
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    ///
    /// Transaction errors report the suggestion of the statement that failed.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Execution { suggestion, .. } => Some(suggestion),
            Self::Transaction { source, .. } => source.suggestion(),
            _ => None,
        }
    }

    /// SQLSTATE code reported by the driver, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Execution { sql_state, .. } => sql_state.as_deref(),
            Self::Transaction { source, .. } => source.sql_state(),
            _ => None,
        }
    }

    /// Check if this error is retryable.
    ///
    /// Nothing is retried internally; this only informs callers that wrap
    /// operations in their own retry loop.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection { .. } | Self::Timeout { .. } => true,
            Self::Transaction { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::execution(
                    db_err.message(),
                    code,
                    "Check the SQL syntax, constraints and referenced objects",
                )
            }
            sqlx::Error::RowNotFound => DbError::execution(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            // The pool replaces this with its configured acquire timeout
            sqlx::Error::PoolTimedOut => DbError::timeout(
                POOL_ACQUIRE,
                crate::config::DEFAULT_ACQUIRE_TIMEOUT_SECS as u32,
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reconnect to the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::decode(format!("Type not found: {}", type_name))
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::decode(format!("Column not found: {}", col))
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::decode(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::decode(source.to_string()),
            sqlx::Error::AnyDriverError(err) => DbError::connection(
                format!("Driver error: {}", err),
                "Check database driver configuration",
            ),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::decode(err.to_string())
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
