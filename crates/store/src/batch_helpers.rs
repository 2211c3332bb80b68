use arrow_array::{Array, BooleanArray, Float64Array, Int64Array, StringArray, UInt32Array, UInt64Array};
use arrow_array::RecordBatch;
use chrono::{DateTime, TimeZone, Utc};

use crate::connection::{DbError, Result};

/// Column-access helpers shared by every table module's RecordBatch
/// conversion, following the `get_<type>` idiom: each looks up a column by
/// name, downcasts to the expected Arrow array type, and reads one row.

pub fn get_string(batch: &RecordBatch, row: usize, name: &str) -> Result<String> {
  batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<StringArray>())
    .map(|a| a.value(row).to_string())
    .ok_or_else(|| DbError::NotFound(format!("column {name}")))
}

pub fn get_optional_string(batch: &RecordBatch, row: usize, name: &str) -> Option<String> {
  batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).and_then(|a| {
    if a.is_null(row) { None } else { Some(a.value(row).to_string()) }
  })
}

pub fn get_u32(batch: &RecordBatch, row: usize, name: &str) -> Result<u32> {
  batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
    .map(|a| a.value(row))
    .ok_or_else(|| DbError::NotFound(format!("column {name}")))
}

pub fn get_u64(batch: &RecordBatch, row: usize, name: &str) -> Result<u64> {
  batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<UInt64Array>())
    .map(|a| a.value(row))
    .ok_or_else(|| DbError::NotFound(format!("column {name}")))
}

pub fn get_i64(batch: &RecordBatch, row: usize, name: &str) -> Result<i64> {
  batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
    .map(|a| a.value(row))
    .ok_or_else(|| DbError::NotFound(format!("column {name}")))
}

pub fn get_optional_i64(batch: &RecordBatch, row: usize, name: &str) -> Option<i64> {
  batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Int64Array>()).and_then(|a| {
    if a.is_null(row) { None } else { Some(a.value(row)) }
  })
}

pub fn get_bool(batch: &RecordBatch, row: usize, name: &str) -> Result<bool> {
  batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<BooleanArray>())
    .map(|a| a.value(row))
    .ok_or_else(|| DbError::NotFound(format!("column {name}")))
}

pub fn get_optional_f64(batch: &RecordBatch, row: usize, name: &str) -> Option<f64> {
  batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<Float64Array>()).and_then(|a| {
    if a.is_null(row) { None } else { Some(a.value(row)) }
  })
}

pub fn get_f64(batch: &RecordBatch, row: usize, name: &str) -> Result<f64> {
  batch
    .column_by_name(name)
    .and_then(|c| c.as_any().downcast_ref::<Float64Array>())
    .map(|a| a.value(row))
    .ok_or_else(|| DbError::NotFound(format!("column {name}")))
}

pub fn timestamp_millis(dt: DateTime<Utc>) -> i64 {
  dt.timestamp_millis()
}

pub fn from_timestamp_millis(millis: i64) -> Result<DateTime<Utc>> {
  Utc.timestamp_millis_opt(millis).single().ok_or_else(|| DbError::NotFound("invalid timestamp".into()))
}
