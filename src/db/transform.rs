//! Result transformation: column renaming and boolean coercion.
//!
//! Rows come back from the driver keyed by physical column name. A
//! [`RowMapping`] renames them to logical field names and then normalizes
//! flag-like fields (`'1'`, `'t'`, `'y'` and friends) to booleans. Renaming
//! never adds or drops keys and keeps column order.

use crate::models::{ColumnMap, Row, RowMapping};
use serde_json::Value as JsonValue;

/// Rename the keys of one row. Columns absent from `columns`, or mapped to
/// an empty name, keep their name.
///
/// If two columns are renamed to the same field the later column wins.
pub fn map_row(row: Row, columns: &ColumnMap) -> Row {
    if columns.is_empty() {
        return row;
    }
    row.into_iter()
        .map(|(key, value)| match columns.get(&key) {
            Some(field) if !field.is_empty() => (field.clone(), value),
            _ => (key, value),
        })
        .collect()
}

/// Rename the keys of every row.
pub fn map_rows(rows: Vec<Row>, columns: &ColumnMap) -> Vec<Row> {
    if columns.is_empty() {
        return rows;
    }
    rows.into_iter().map(|row| map_row(row, columns)).collect()
}

/// Boolean reading of a non-boolean, non-null value.
///
/// Text `"1"`, `"t"` and `"y"` and the number `1` are true; anything else is false.
pub fn coerce_bool(value: &JsonValue) -> bool {
    match value {
        JsonValue::String(s) => matches!(s.as_str(), "1" | "t" | "y"),
        JsonValue::Number(n) => n.as_f64() == Some(1.0),
        _ => false,
    }
}

/// Coerce the listed fields to booleans in place.
///
/// Null, absent and already boolean values are left alone.
pub fn coerce_bools(rows: &mut [Row], fields: &[String]) {
    if fields.is_empty() {
        return;
    }
    for row in rows.iter_mut() {
        for field in fields {
            if let Some(value) = row.get_mut(field) {
                if !value.is_boolean() && !value.is_null() {
                    *value = JsonValue::Bool(coerce_bool(value));
                }
            }
        }
    }
}

/// Apply a row mapping: rename first, then coerce booleans by logical name.
pub fn transform_rows(rows: Vec<Row>, mapping: Option<&RowMapping>) -> Vec<Row> {
    let Some(mapping) = mapping else {
        return rows;
    };
    let mut rows = map_rows(rows, &mapping.columns);
    coerce_bools(&mut rows, &mapping.bool_fields);
    rows
}
