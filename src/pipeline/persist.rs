//! Bulk persist stage: one unordered keyed upsert per chunk.

use log::{info, warn};
use rusqlite::types::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::engine::db_ops::{DocumentStore, UpsertOp};
use crate::error::{IndexError, Result};
use crate::types::{FileRecord, IndexingStatus, ReorgStatus};
use crate::utils::config::{BatchDefaults, FILE_INDEX_COLLECTION};

/// Map a record to its upsert. Every metadata field is (re)written; the downstream
/// reorganisation state is reset so re-indexed files are picked up again, and skipped
/// outright when indexing failed.
pub fn to_upsert_op(record: &FileRecord) -> UpsertOp {
    let reorg = ReorgStatus::for_indexing(record.status);
    UpsertOp {
        key_field: "unique_id",
        key: record.unique_id.clone(),
        set: vec![
            ("source_path", Value::Text(record.source_path.clone())),
            ("file_name", Value::Text(record.file_name.clone())),
            ("extension", Value::Text(record.extension.clone())),
            ("file_size", Value::Integer(record.size.min(i64::MAX as u64) as i64)),
            ("last_modified_ms", Value::Integer(record.last_modified_ms)),
            (
                "indexing_status",
                Value::Text(record.status.as_str().to_string()),
            ),
            ("indexed_at_ms", Value::Integer(record.indexed_at_ms)),
            (
                "indexing_error",
                record
                    .error
                    .clone()
                    .map(Value::Text)
                    .unwrap_or(Value::Null),
            ),
            ("reorg_status", Value::Text(reorg.as_str().to_string())),
            ("reorg_attempts", Value::Integer(0)),
        ],
        set_on_insert: Vec::new(),
    }
}

/// What one chunk write achieved.
#[derive(Debug, Default)]
pub struct PersistOutcome {
    pub inserted: usize,
    pub updated: usize,
    /// Written records with status `COMPLETED`.
    pub completed: usize,
    /// Written records with status `FAILED`.
    pub failed: usize,
    /// One `RecordRejected` per op the store refused.
    pub rejected: Vec<IndexError>,
}

/// Writes chunks of records to a [`DocumentStore`].
pub struct BulkPersister {
    store: Arc<dyn DocumentStore>,
    collection: &'static str,
}

impl BulkPersister {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            collection: FILE_INDEX_COLLECTION,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Upsert `records` as one unordered bulk operation. A rejected record does not abort
    /// the others; only a bulk write that cannot execute at all is an error.
    pub fn persist(&self, records: &[FileRecord]) -> Result<PersistOutcome> {
        if records.is_empty() {
            return Ok(PersistOutcome::default());
        }
        let ops: Vec<UpsertOp> = records.iter().map(to_upsert_op).collect();
        let written = self
            .store
            .bulk_upsert(self.collection, &ops)
            .map_err(IndexError::PersistFailed)?;

        let rejected_at: HashSet<usize> = written.write_errors.iter().map(|e| e.index).collect();
        let mut outcome = PersistOutcome {
            inserted: written.inserted,
            updated: written.updated,
            ..Default::default()
        };
        for (i, record) in records.iter().enumerate() {
            if rejected_at.contains(&i) {
                continue;
            }
            match record.status {
                IndexingStatus::Failed => outcome.failed += 1,
                _ => outcome.completed += 1,
            }
        }
        outcome.rejected = written
            .write_errors
            .into_iter()
            .map(|e| IndexError::RecordRejected {
                unique_id: e.key,
                message: e.message,
            })
            .collect();

        info!(
            "Bulk write: {} inserted, {} updated, {} ok, {} failed",
            outcome.inserted,
            outcome.updated,
            outcome.completed,
            outcome.failed + outcome.rejected.len()
        );
        let failed_records = records.iter().filter(|r| r.is_failed()).count();
        let failure_rate = failed_records as f64 / records.len() as f64 * 100.0;
        if failure_rate > BatchDefaults::HIGH_FAILURE_RATE {
            warn!(
                "High failure rate in chunk: {}/{} records failed ({:.1}%)",
                failed_records,
                records.len(),
                failure_rate
            );
        }
        Ok(outcome)
    }
}
