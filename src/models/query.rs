//! Query-related data models.
//!
//! This module defines bind parameters, batch statements and the row
//! mapping options accepted by the read operations.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A decoded row: field name to value, in column declaration order.
pub type Row = serde_json::Map<String, JsonValue>;

/// Mapping from physical column name to logical field name.
pub type ColumnMap = HashMap<String, String>;

/// A bind argument as supplied by a caller.
///
/// `None` is a missing argument and `Some(QueryParam::Null)` an explicit null;
/// both reach the driver as SQL `NULL`.
pub type Arg = Option<QueryParam>;

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    Float(f64),
    String(String),
    /// Arrays and objects, bound as JSON
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<chrono::NaiveDate> for QueryParam {
    fn from(v: chrono::NaiveDate) -> Self {
        Self::String(v.format("%Y-%m-%d").to_string())
    }
}

/// Converts a JSON value, keeping scalars in their own variant.
impl From<JsonValue> for QueryParam {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

/// A statement of a transactional batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub query: String,
    #[serde(default)]
    pub params: Vec<Arg>,
}

impl Statement {
    /// Create a statement without parameters.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, param: impl Into<QueryParam>) -> Self {
        self.params.push(Some(param.into()));
        self
    }

    /// Replace the parameter list.
    pub fn with_params(mut self, params: Vec<Arg>) -> Self {
        self.params = params;
        self
    }
}

/// Column renaming and boolean coercion applied to query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowMapping {
    pub columns: ColumnMap,
    /// Logical field names, looked up after renaming
    pub bool_fields: Vec<String>,
}

impl RowMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rename `column` to `field` in every returned row.
    pub fn rename(mut self, column: impl Into<String>, field: impl Into<String>) -> Self {
        self.columns.insert(column.into(), field.into());
        self
    }

    /// Coerce `field` to a boolean in every returned row.
    pub fn bool_field(mut self, field: impl Into<String>) -> Self {
        self.bool_fields.push(field.into());
        self
    }

    /// True when applying this mapping leaves rows untouched.
    pub fn is_identity(&self) -> bool {
        self.columns.is_empty() && self.bool_fields.is_empty()
    }
}

impl From<ColumnMap> for RowMapping {
    fn from(columns: ColumnMap) -> Self {
        Self {
            columns,
            bool_fields: Vec::new(),
        }
    }
}
