//! Connection-related data models.

use crate::config::PoolOptions;
use serde::{Deserialize, Serialize};

/// Supported database types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    PostgreSQL,
    /// Includes MariaDB
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Parse database type from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::PostgreSQL)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySQL)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else {
            None
        }
    }

    /// Get the display name for this database type.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Configuration for a database connection pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub db_type: DatabaseType,
    /// Contains sensitive data - never log
    #[serde(skip_serializing)]
    pub connection_string: String,
    #[serde(default)]
    pub pool_options: PoolOptions,
}

impl ConnectionConfig {
    /// Create a new connection configuration, detecting the backend from the URL scheme.
    pub fn new(
        connection_string: impl Into<String>,
        pool_options: PoolOptions,
    ) -> Result<Self, ConnectionConfigError> {
        let connection_string = connection_string.into();
        if connection_string.trim().is_empty() {
            return Err(ConnectionConfigError::EmptyConnectionString);
        }

        let db_type = DatabaseType::from_connection_string(&connection_string).ok_or_else(|| {
            ConnectionConfigError::UnknownDatabaseType(mask_password(&connection_string))
        })?;

        pool_options
            .validate()
            .map_err(ConnectionConfigError::InvalidPoolOptions)?;

        Ok(Self {
            db_type,
            connection_string,
            pool_options,
        })
    }

    /// Get a display-safe version of the connection string (credentials masked).
    pub fn masked_connection_string(&self) -> String {
        mask_password(&self.connection_string)
    }
}

fn mask_password(connection_string: &str) -> String {
    if let Some(at_pos) = connection_string.find('@') {
        if let Some(colon_pos) = connection_string[..at_pos].rfind(':') {
            // Skip the scheme separator ("postgres://user@host" has no password)
            if !connection_string[colon_pos..].starts_with("://") {
                let prefix = &connection_string[..colon_pos + 1];
                let suffix = &connection_string[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
    }
    connection_string.to_string()
}

/// Errors that can occur when creating a connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionConfigError {
    #[error("Connection string cannot be empty")]
    EmptyConnectionString,

    /// Could not determine database type from connection string
    #[error("Unknown database type in connection string: {0}")]
    UnknownDatabaseType(String),

    #[error("Invalid pool options: {0}")]
    InvalidPoolOptions(String),
}
