use arrow_array::{Array, BooleanArray, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use repodex_core::{DeadLetterEntry, ErrorKindTag, RetryAttempt, Stage};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::batch_helpers::{from_timestamp_millis, get_bool, get_i64, get_string};
use crate::connection::{DbError, RepoDb, Result};
use crate::schema::dead_letter_entries_schema;

impl RepoDb {
  /// Appends a dead letter. Entries are immutable except for `resolved`, so
  /// this is the only writer besides [`RepoDb::resolve_dead_letter`].
  pub async fn append_dead_letter(&self, entry: &DeadLetterEntry) -> Result<()> {
    let table = self.dead_letter_entries_table().await?;
    let batch = dead_letter_to_batch(entry)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], dead_letter_entries_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  pub async fn resolve_dead_letter(&self, id: Uuid) -> Result<()> {
    let table = self.dead_letter_entries_table().await?;
    let results: Vec<RecordBatch> =
      table.query().only_if(format!("id = '{id}'")).execute().await?.try_collect().await?;

    let mut entry = None;
    for batch in &results {
      if batch.num_rows() > 0 {
        entry = Some(batch_to_dead_letter(batch, 0)?);
        break;
      }
    }
    let mut entry = entry.ok_or_else(|| DbError::NotFound(format!("dead letter {id}")))?;
    entry.mark_resolved();

    table.delete(&format!("id = '{id}'")).await?;
    let batch = dead_letter_to_batch(&entry)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], dead_letter_entries_schema());
    table.add(Box::new(batches)).execute().await?;
    Ok(())
  }

  /// Lists dead letters for a job, optionally filtered to unresolved-only.
  pub async fn list_dead_letters(&self, job_id: Uuid, unresolved_only: bool) -> Result<Vec<DeadLetterEntry>> {
    let table = self.dead_letter_entries_table().await?;
    let results: Vec<RecordBatch> =
      table.query().only_if(format!("job_id = '{job_id}'")).execute().await?.try_collect().await?;

    let mut entries = Vec::new();
    for batch in &results {
      for row in 0..batch.num_rows() {
        let entry = batch_to_dead_letter(batch, row)?;
        if !unresolved_only || !entry.resolved {
          entries.push(entry);
        }
      }
    }
    entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(entries)
  }
}

fn dead_letter_to_batch(entry: &DeadLetterEntry) -> Result<RecordBatch> {
  let batch = RecordBatch::try_new(
    dead_letter_entries_schema(),
    vec![
      Arc::new(StringArray::from(vec![entry.id.to_string()])),
      Arc::new(StringArray::from(vec![entry.job_id.to_string()])),
      Arc::new(StringArray::from(vec![entry.path.clone()])),
      Arc::new(StringArray::from(vec![entry.stage.as_str().to_string()])),
      Arc::new(StringArray::from(vec![entry.error_kind.as_str().to_string()])),
      Arc::new(StringArray::from(vec![entry.error_message.clone()])),
      Arc::new(StringArray::from(vec![serde_json::to_string(&entry.retry_history)?])),
      Arc::new(BooleanArray::from(vec![entry.resolved])),
      Arc::new(Int64Array::from(vec![entry.created_at.timestamp_millis()])),
    ],
  )?;
  Ok(batch)
}

fn batch_to_dead_letter(batch: &RecordBatch, row: usize) -> Result<DeadLetterEntry> {
  let stage = Stage::from_str(&get_string(batch, row, "stage")?).map_err(DbError::NotFound)?;
  let error_kind = ErrorKindTag::from_str(&get_string(batch, row, "error_kind")?).map_err(DbError::NotFound)?;
  let retry_history: Vec<RetryAttempt> = serde_json::from_str(&get_string(batch, row, "retry_history")?)?;

  Ok(DeadLetterEntry {
    id: get_string(batch, row, "id")?.parse::<Uuid>().map_err(|e| DbError::NotFound(e.to_string()))?,
    job_id: get_string(batch, row, "job_id")?.parse::<Uuid>().map_err(|e| DbError::NotFound(e.to_string()))?,
    path: get_string(batch, row, "path")?,
    stage,
    error_kind,
    error_message: get_string(batch, row, "error_message")?,
    retry_history,
    resolved: get_bool(batch, row, "resolved")?,
    created_at: from_timestamp_millis(get_i64(batch, row, "created_at")?)?,
  })
}
