//! Decoding of driver rows into [`Row`] values.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! Rows keep their column declaration order, so the first entry of a decoded
//! row is always the first column of the result set. Dates and timestamps are
//! rendered as ISO-8601 strings, exact decimals as strings and binary data as
//! base64. A value that no decoder understands is read as text; when that is
//! not possible either, decoding fails with [`DbError::Decode`] instead of
//! dropping the value.

use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, Row};
use serde_json::Value as JsonValue;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::types::BigDecimal;
use sqlx::{Column, Row as SqlxRow, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Uuid,
    Network,
    Interval,
    Date,
    Time,
    Timestamp,
    Array,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // PostgreSQL reports arrays as "INT4[]"; "_int4" is the catalog spelling
    if lower.ends_with("[]") || (db == DatabaseType::PostgreSQL && lower.starts_with('_')) {
        return TypeCategory::Array;
    }

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    if lower == "uuid" {
        return TypeCategory::Uuid;
    }
    if lower == "inet" || lower == "cidr" {
        return TypeCategory::Network;
    }

    // Names below contain "int" without being integers
    if lower == "interval" {
        return TypeCategory::Interval;
    }
    if lower == "point" {
        return TypeCategory::Unknown;
    }

    // Temporal types
    if lower == "date" {
        return TypeCategory::Date;
    }
    if lower.starts_with("timestamp") || lower == "datetime" {
        return TypeCategory::Timestamp;
    }
    if lower == "time" || lower == "timetz" {
        return TypeCategory::Time;
    }

    // Integer types
    if lower.contains("int") || lower.contains("serial") || lower.contains("tiny") || lower == "oid"
    {
        return TypeCategory::Integer;
    }

    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("float")
        || lower.contains("double")
        || lower == "real"
        || lower == "float4"
        || lower == "float8"
    {
        return TypeCategory::Float;
    }

    if lower == "json" || lower == "jsonb" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") || lower == "bytea" {
        return TypeCategory::Binary;
    }

    if lower.contains("char") || lower.contains("text") || lower == "name" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Value Rendering
// =============================================================================

/// Encode binary data as a base64 JSON string.
pub fn encode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

fn decimal_value(v: BigDecimal) -> JsonValue {
    JsonValue::String(v.to_string())
}

fn naive_timestamp_value(v: chrono::NaiveDateTime) -> JsonValue {
    JsonValue::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
}

fn undecodable(db: &str, type_name: &str, idx: usize) -> DbError {
    let message = format!("cannot decode {} type {} in column {}", db, type_name, idx);
    tracing::error!("{}", message);
    DbError::decode(message)
}

// =============================================================================
// Row Decoding Trait
// =============================================================================

/// Trait for converting database rows into [`Row`] maps.
pub trait ToRow {
    fn to_row(&self) -> DbResult<Row>;
}

impl ToRow for MySqlRow {
    fn to_row(&self) -> DbResult<Row> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::MySQL);
                Ok((col.name().to_string(), mysql::decode_column(self, idx, category)?))
            })
            .collect()
    }
}

impl ToRow for PgRow {
    fn to_row(&self) -> DbResult<Row> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_type(col.type_info().name(), DatabaseType::PostgreSQL);
                Ok((col.name().to_string(), postgres::decode_column(self, idx, category)?))
            })
            .collect()
    }
}

impl ToRow for SqliteRow {
    fn to_row(&self) -> DbResult<Row> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let declared = categorize_type(col.type_info().name(), DatabaseType::SQLite);
                Ok((col.name().to_string(), sqlite::decode_column(self, idx, declared)?))
            })
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================
//
// Nulls are handled up front, so each typed decoder returns `None` only when
// the value does not fit its type. Those values go through the text fallback.

mod mysql {
    use super::*;
    use sqlx::{Decode, MySql, Type, ValueRef};

    fn get<'r, T>(row: &'r MySqlRow, idx: usize) -> Option<T>
    where
        T: Decode<'r, MySql> + Type<MySql>,
    {
        row.try_get::<T, _>(idx).ok()
    }

    pub fn decode_column(
        row: &MySqlRow,
        idx: usize,
        category: TypeCategory,
    ) -> DbResult<JsonValue> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(JsonValue::Null);
        }

        let decoded = match category {
            TypeCategory::Decimal => get::<BigDecimal>(row, idx).map(decimal_value),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => get::<bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Float => get::<f64>(row, idx)
                .map(float_value)
                .or_else(|| get::<f32>(row, idx).map(|v| float_value(v as f64))),
            TypeCategory::Binary => get::<Vec<u8>>(row, idx).map(|v| encode_binary_value(&v)),
            TypeCategory::Json => get::<JsonValue>(row, idx),
            TypeCategory::Date => {
                get::<chrono::NaiveDate>(row, idx).map(|d| JsonValue::String(d.to_string()))
            }
            TypeCategory::Time => {
                get::<chrono::NaiveTime>(row, idx).map(|t| JsonValue::String(t.to_string()))
            }
            // TIMESTAMP decodes as UTC, DATETIME as naive
            TypeCategory::Timestamp => get::<chrono::DateTime<chrono::Utc>>(row, idx)
                .map(|v| JsonValue::String(v.to_rfc3339()))
                .or_else(|| get::<chrono::NaiveDateTime>(row, idx).map(naive_timestamp_value)),
            _ => get::<String>(row, idx).map(JsonValue::String),
        };

        match decoded {
            Some(value) => Ok(value),
            None => decode_fallback(row, idx),
        }
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> Option<JsonValue> {
        get::<i8>(row, idx)
            .map(JsonValue::from)
            .or_else(|| get::<i16>(row, idx).map(JsonValue::from))
            .or_else(|| get::<i32>(row, idx).map(JsonValue::from))
            .or_else(|| get::<i64>(row, idx).map(JsonValue::from))
            .or_else(|| get::<u8>(row, idx).map(JsonValue::from))
            .or_else(|| get::<u16>(row, idx).map(JsonValue::from))
            .or_else(|| get::<u32>(row, idx).map(JsonValue::from))
            .or_else(|| get::<u64>(row, idx).map(JsonValue::from))
    }

    /// ENUM, SET, BIT, geometry and friends: text when it is valid UTF-8,
    /// base64 otherwise.
    fn decode_fallback(row: &MySqlRow, idx: usize) -> DbResult<JsonValue> {
        match row.try_get_unchecked::<Vec<u8>, _>(idx) {
            Ok(bytes) => Ok(match String::from_utf8(bytes) {
                Ok(s) => JsonValue::String(s),
                Err(e) => encode_binary_value(e.as_bytes()),
            }),
            Err(_) => {
                let type_name = row.column(idx).type_info().name().to_string();
                Err(undecodable("MySQL", &type_name, idx))
            }
        }
    }
}

mod postgres {
    use super::*;
    use sqlx::postgres::types::{Oid, PgInterval, PgTimeTz};
    use sqlx::postgres::{PgHasArrayType, PgTypeKind, PgValueFormat};
    use sqlx::types::Uuid;
    use sqlx::types::ipnetwork::IpNetwork;
    use sqlx::{Decode, Postgres, Type, ValueRef};

    /// Types whose binary wire form is their text form.
    const TEXT_WIRE_TYPES: &[&str] = &["CITEXT", "XML", "UNKNOWN"];

    fn get<'r, T>(row: &'r PgRow, idx: usize) -> Option<T>
    where
        T: Decode<'r, Postgres> + Type<Postgres>,
    {
        row.try_get::<T, _>(idx).ok()
    }

    pub fn decode_column(
        row: &PgRow,
        idx: usize,
        category: TypeCategory,
    ) -> DbResult<JsonValue> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(JsonValue::Null);
        }
        let type_name = raw.type_info().name().to_string();

        let decoded = match category {
            TypeCategory::Decimal => get::<BigDecimal>(row, idx).map(decimal_value),
            TypeCategory::Integer => get::<i16>(row, idx)
                .map(JsonValue::from)
                .or_else(|| get::<i32>(row, idx).map(JsonValue::from))
                .or_else(|| get::<i64>(row, idx).map(JsonValue::from))
                .or_else(|| get::<Oid>(row, idx).map(|v| JsonValue::from(v.0))),
            TypeCategory::Boolean => get::<bool>(row, idx).map(JsonValue::Bool),
            TypeCategory::Float => get::<f64>(row, idx)
                .map(float_value)
                .or_else(|| get::<f32>(row, idx).map(|v| float_value(v as f64))),
            TypeCategory::Binary => get::<Vec<u8>>(row, idx).map(|v| encode_binary_value(&v)),
            TypeCategory::Json => get::<JsonValue>(row, idx),
            TypeCategory::Uuid => get::<Uuid>(row, idx).map(|v| JsonValue::String(v.to_string())),
            TypeCategory::Network => {
                let cidr = type_name.eq_ignore_ascii_case("CIDR");
                get::<IpNetwork>(row, idx).map(|v| network_value(v, cidr))
            }
            TypeCategory::Interval => get::<PgInterval>(row, idx).map(interval_value),
            TypeCategory::Date => {
                get::<chrono::NaiveDate>(row, idx).map(|d| JsonValue::String(d.to_string()))
            }
            TypeCategory::Time => get::<chrono::NaiveTime>(row, idx)
                .map(|t| JsonValue::String(t.to_string()))
                .or_else(|| {
                    get::<PgTimeTz<chrono::NaiveTime, chrono::FixedOffset>>(row, idx)
                        .map(|t| JsonValue::String(format!("{}{}", t.time, t.offset)))
                }),
            // TIMESTAMPTZ decodes as UTC, TIMESTAMP as naive
            TypeCategory::Timestamp => get::<chrono::DateTime<chrono::Utc>>(row, idx)
                .map(|v| JsonValue::String(v.to_rfc3339()))
                .or_else(|| get::<chrono::NaiveDateTime>(row, idx).map(naive_timestamp_value)),
            TypeCategory::Array => decode_array(row, idx, &type_name),
            TypeCategory::Text | TypeCategory::Unknown => {
                get::<String>(row, idx).map(JsonValue::String)
            }
        };

        match decoded {
            Some(value) => Ok(value),
            None => decode_fallback(row, idx),
        }
    }

    /// One-dimensional arrays become JSON arrays; NULL elements stay null.
    fn decode_array(row: &PgRow, idx: usize, type_name: &str) -> Option<JsonValue> {
        let element = type_name.strip_suffix("[]")?;
        match element {
            "INT2" => array::<i16>(row, idx, JsonValue::from),
            "INT4" => array::<i32>(row, idx, JsonValue::from),
            "INT8" => array::<i64>(row, idx, JsonValue::from),
            "FLOAT4" => array::<f32>(row, idx, |v| float_value(v as f64)),
            "FLOAT8" => array::<f64>(row, idx, float_value),
            "BOOL" => array::<bool>(row, idx, JsonValue::Bool),
            "NUMERIC" => array::<BigDecimal>(row, idx, decimal_value),
            "UUID" => array::<Uuid>(row, idx, |v| JsonValue::String(v.to_string())),
            "INET" => array::<IpNetwork>(row, idx, |v| network_value(v, false)),
            "CIDR" => array::<IpNetwork>(row, idx, |v| network_value(v, true)),
            "DATE" => array::<chrono::NaiveDate>(row, idx, |v| JsonValue::String(v.to_string())),
            "TIMESTAMP" => array::<chrono::NaiveDateTime>(row, idx, naive_timestamp_value),
            "TIMESTAMPTZ" => array::<chrono::DateTime<chrono::Utc>>(row, idx, |v| {
                JsonValue::String(v.to_rfc3339())
            }),
            _ => array::<String>(row, idx, JsonValue::String),
        }
    }

    fn array<T>(row: &PgRow, idx: usize, to_json: impl Fn(T) -> JsonValue) -> Option<JsonValue>
    where
        T: for<'r> Decode<'r, Postgres> + Type<Postgres> + PgHasArrayType,
    {
        let values = row.try_get::<Vec<Option<T>>, _>(idx).ok()?;
        Some(JsonValue::Array(
            values
                .into_iter()
                .map(|v| v.map(&to_json).unwrap_or(JsonValue::Null))
                .collect(),
        ))
    }

    /// Text-protocol results carry every value as text. Binary results can
    /// only be read as text for enums and text-like extension types.
    fn decode_fallback(row: &PgRow, idx: usize) -> DbResult<JsonValue> {
        let raw = row.try_get_raw(idx)?;
        let type_info = raw.type_info().into_owned();
        let text_wire = matches!(raw.format(), PgValueFormat::Text)
            || matches!(type_info.kind(), PgTypeKind::Enum(_))
            || TEXT_WIRE_TYPES.contains(&type_info.name());

        if text_wire {
            if let Ok(text) = raw.as_str() {
                return Ok(JsonValue::String(text.to_string()));
            }
        }
        Err(undecodable("PostgreSQL", type_info.name(), idx))
    }

    /// Hosts print without a prefix for INET, as PostgreSQL does.
    fn network_value(v: IpNetwork, cidr: bool) -> JsonValue {
        let full = match v {
            IpNetwork::V4(_) => 32,
            IpNetwork::V6(_) => 128,
        };
        if !cidr && v.prefix() == full {
            JsonValue::String(v.ip().to_string())
        } else {
            JsonValue::String(v.to_string())
        }
    }

    /// Render an interval in PostgreSQL's default output style,
    /// e.g. `1 year 2 mons 3 days 04:05:06.5`.
    pub fn interval_value(v: PgInterval) -> JsonValue {
        fn unit(n: i32, singular: &str) -> String {
            if n == 1 {
                format!("{} {}", n, singular)
            } else {
                format!("{} {}s", n, singular)
            }
        }

        let mut parts = Vec::new();
        let (years, months) = (v.months / 12, v.months % 12);
        if years != 0 {
            parts.push(unit(years, "year"));
        }
        if months != 0 {
            parts.push(unit(months, "mon"));
        }
        if v.days != 0 {
            parts.push(unit(v.days, "day"));
        }

        if v.microseconds != 0 || parts.is_empty() {
            let sign = if v.microseconds < 0 { "-" } else { "" };
            let micros = v.microseconds.unsigned_abs();
            let hours = micros / 3_600_000_000;
            let minutes = micros / 60_000_000 % 60;
            let seconds = micros / 1_000_000 % 60;
            let fraction = micros % 1_000_000;

            let mut time = format!("{}{:02}:{:02}:{:02}", sign, hours, minutes, seconds);
            if fraction != 0 {
                let digits = format!("{:06}", fraction);
                time.push('.');
                time.push_str(digits.trim_end_matches('0'));
            }
            parts.push(time);
        }

        JsonValue::String(parts.join(" "))
    }
}

mod sqlite {
    use super::*;
    use sqlx::ValueRef;

    /// SQLite is dynamically typed, so the storage class of the value decides
    /// how it is read. The declared type only matters for booleans, which are
    /// stored as integers.
    pub fn decode_column(
        row: &SqliteRow,
        idx: usize,
        declared: TypeCategory,
    ) -> DbResult<JsonValue> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(JsonValue::Null);
        }
        let storage = raw.type_info().name().to_uppercase();

        let value = match storage.as_str() {
            "INTEGER" if declared == TypeCategory::Boolean => {
                row.try_get::<bool, _>(idx).map(JsonValue::Bool)?
            }
            "INTEGER" => row.try_get::<i64, _>(idx).map(JsonValue::from)?,
            "REAL" => row.try_get::<f64, _>(idx).map(float_value)?,
            "BLOB" => row
                .try_get::<Vec<u8>, _>(idx)
                .map(|v| encode_binary_value(&v))?,
            _ => decode_text(row, idx, declared)?,
        };
        Ok(value)
    }

    fn decode_text(row: &SqliteRow, idx: usize, declared: TypeCategory) -> DbResult<JsonValue> {
        let v = row.try_get_unchecked::<String, _>(idx)?;
        if declared == TypeCategory::Json {
            if let Ok(json) = serde_json::from_str::<JsonValue>(&v) {
                return Ok(json);
            }
        }
        Ok(JsonValue::String(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::types::PgInterval;

    #[test]
    fn test_categorize_type_integer() {
        assert_eq!(
            categorize_type("INT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("BIGINT", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("INT8", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
        assert_eq!(
            categorize_type("TINYINT", DatabaseType::MySQL),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_categorize_type_decimal() {
        assert_eq!(
            categorize_type("DECIMAL", DatabaseType::MySQL),
            TypeCategory::Decimal
        );
        assert_eq!(
            categorize_type("NUMERIC", DatabaseType::PostgreSQL),
            TypeCategory::Decimal
        );
        // SQLite NUMERIC is a float
        assert_eq!(
            categorize_type("numeric", DatabaseType::SQLite),
            TypeCategory::Float
        );
    }

    #[test]
    fn test_categorize_type_temporal() {
        assert_eq!(
            categorize_type("DATE", DatabaseType::PostgreSQL),
            TypeCategory::Date
        );
        assert_eq!(
            categorize_type("TIMESTAMPTZ", DatabaseType::PostgreSQL),
            TypeCategory::Timestamp
        );
        assert_eq!(
            categorize_type("DATETIME", DatabaseType::MySQL),
            TypeCategory::Timestamp
        );
        assert_eq!(
            categorize_type("TIME", DatabaseType::MySQL),
            TypeCategory::Time
        );
    }

    #[test]
    fn test_categorize_type_text_and_json() {
        assert_eq!(
            categorize_type("VARCHAR", DatabaseType::PostgreSQL),
            TypeCategory::Text
        );
        assert_eq!(
            categorize_type("jsonb", DatabaseType::PostgreSQL),
            TypeCategory::Json
        );
        assert_eq!(
            categorize_type("BOOLEAN", DatabaseType::SQLite),
            TypeCategory::Boolean
        );
        assert_eq!(
            categorize_type("NULL", DatabaseType::SQLite),
            TypeCategory::Unknown
        );
    }

    #[test]
    fn test_categorize_type_postgres_specific() {
        assert_eq!(
            categorize_type("UUID", DatabaseType::PostgreSQL),
            TypeCategory::Uuid
        );
        assert_eq!(
            categorize_type("INET", DatabaseType::PostgreSQL),
            TypeCategory::Network
        );
        assert_eq!(
            categorize_type("CIDR", DatabaseType::PostgreSQL),
            TypeCategory::Network
        );
        assert_eq!(
            categorize_type("INTERVAL", DatabaseType::PostgreSQL),
            TypeCategory::Interval
        );
        assert_eq!(
            categorize_type("POINT", DatabaseType::PostgreSQL),
            TypeCategory::Unknown
        );
        assert_eq!(
            categorize_type("INT4[]", DatabaseType::PostgreSQL),
            TypeCategory::Array
        );
        assert_eq!(
            categorize_type("_text", DatabaseType::PostgreSQL),
            TypeCategory::Array
        );
        assert_eq!(
            categorize_type("OID", DatabaseType::PostgreSQL),
            TypeCategory::Integer
        );
    }

    #[test]
    fn test_encode_binary_value() {
        assert_eq!(
            encode_binary_value(b"hello world"),
            JsonValue::String("aGVsbG8gd29ybGQ=".to_string())
        );
        assert_eq!(encode_binary_value(&[]), JsonValue::String(String::new()));
    }

    #[test]
    fn test_decimal_value_keeps_scale() {
        let v: BigDecimal = "12.50".parse().unwrap();
        assert_eq!(decimal_value(v), JsonValue::String("12.50".to_string()));
        let v: BigDecimal = "99999999999999999999".parse().unwrap();
        assert_eq!(
            decimal_value(v),
            JsonValue::String("99999999999999999999".to_string())
        );
    }

    fn interval(months: i32, days: i32, microseconds: i64) -> String {
        match postgres::interval_value(PgInterval {
            months,
            days,
            microseconds,
        }) {
            JsonValue::String(s) => s,
            other => panic!("expected string, got {other}"),
        }
    }

    #[test]
    fn test_interval_value() {
        assert_eq!(interval(0, 1, 0), "1 day");
        assert_eq!(interval(14, 3, 0), "1 year 2 mons 3 days");
        assert_eq!(interval(0, 0, 90_000_000_000), "25:00:00");
        assert_eq!(interval(0, 2, 3_600_000_000), "2 days 01:00:00");
        assert_eq!(interval(0, 0, -3_600_000_000), "-01:00:00");
        assert_eq!(interval(0, 0, 1_500_000), "00:00:01.5");
        assert_eq!(interval(0, 0, 0), "00:00:00");
        assert_eq!(interval(-12, -1, 0), "-1 years -1 days");
    }
}
