//! Shaping incoming payloads against a defined schema.
//!
//! Both functions are pure: they either return fully-formed rows in schema
//! order or an error, so callers can validate before touching the store.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::CoreError;
use crate::record::Row;

/// Columnar task input: each column name maps to one value per new task.
pub type ColumnarBatch = IndexMap<String, Vec<Value>>;

/// A worker's result submission: column name to value.
pub type ResultPayload = IndexMap<String, Value>;

// ---------------------------------------------------------------------------
// Task batches
// ---------------------------------------------------------------------------

/// Pivot a columnar batch into rows ordered by `schema`.
///
/// Fails with `SchemaMismatch` if the batch names a column the schema does
/// not have, and with `LengthMismatch` if the column arrays differ in
/// length. Schema columns absent from the batch are filled with `null`.
/// A batch whose arrays are all empty yields no rows.
pub fn rows_from_columns(schema: &[String], batch: &ColumnarBatch) -> Result<Vec<Row>, CoreError> {
    if let Some(unknown) = batch.keys().find(|col| !schema.contains(col)) {
        return Err(CoreError::SchemaMismatch(format!(
            "Column '{unknown}' is not defined in the task schema"
        )));
    }

    let mut lengths = batch.iter().map(|(col, values)| (col, values.len()));
    let Some((first_col, row_count)) = lengths.next() else {
        return Ok(Vec::new());
    };
    if let Some((col, len)) = lengths.find(|(_, len)| *len != row_count) {
        return Err(CoreError::LengthMismatch(format!(
            "Column '{col}' has {len} values but '{first_col}' has {row_count}"
        )));
    }

    let rows = (0..row_count)
        .map(|i| {
            schema
                .iter()
                .map(|col| {
                    let value = batch
                        .get(col)
                        .map(|values| values[i].clone())
                        .unwrap_or(Value::Null);
                    (col.clone(), value)
                })
                .collect()
        })
        .collect();

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Result payloads
// ---------------------------------------------------------------------------

/// Map a result payload onto `schema`.
///
/// Unknown fields are rejected with `SchemaMismatch`; schema columns the
/// worker left out are stored as `null`.
pub fn result_row(schema: &[String], payload: &ResultPayload) -> Result<Row, CoreError> {
    if let Some(unknown) = payload.keys().find(|col| !schema.contains(col)) {
        return Err(CoreError::SchemaMismatch(format!(
            "Field '{unknown}' is not defined in the result schema"
        )));
    }

    Ok(schema
        .iter()
        .map(|col| {
            let value = payload.get(col).cloned().unwrap_or(Value::Null);
            (col.clone(), value)
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
