//! Transform stage: filter entries, extract metadata into [`FileRecord`]s.
//!
//! Pure: the same entry always yields the same outcome (apart from `indexed_at_ms`).
//! Extraction errors become `FAILED` records instead of errors, so one bad entry never
//! costs the rest of its chunk.

use log::trace;
use rayon::ThreadPool;
use rayon::prelude::*;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::engine::hashing::{fallback_id, unique_id};
use crate::engine::tools::{
    extension_of, is_hidden_name, is_temporary_name, now_ms, path_ends_with_name, truncate_chars,
};
use crate::error::{IndexError, TransformError};
use crate::types::{
    FileRecord, FilterOpts, FilterReason, IndexingStatus, RemoteEntry, TransformOutcome,
};
use crate::utils::config::FilterDefaults;

/// Filters and extracts. Read-only after construction; shared by all workers.
#[derive(Clone, Copy, Debug, Default)]
pub struct Transformer {
    filter: FilterOpts,
}

impl Transformer {
    pub fn new(filter: FilterOpts) -> Self {
        Self { filter }
    }

    /// First matching filter wins.
    pub fn filter_reason(&self, entry: &RemoteEntry) -> Option<FilterReason> {
        if entry.name.is_empty() || entry.full_path.is_empty() {
            return Some(FilterReason::Empty);
        }
        if entry.is_dir {
            return Some(FilterReason::Directory);
        }
        if is_hidden_name(&entry.name) {
            return Some(FilterReason::Hidden);
        }
        if is_temporary_name(&entry.name) {
            return Some(FilterReason::Temporary);
        }
        if entry.size < self.filter.min_size || entry.size > self.filter.max_size {
            return Some(FilterReason::SizeOutOfBounds);
        }
        None
    }

    /// Build a `COMPLETED` record, or the reason it could not be built.
    pub fn extract(&self, entry: &RemoteEntry) -> Result<FileRecord, TransformError> {
        if !path_ends_with_name(&entry.full_path, &entry.name) {
            return Err(TransformError::PathMismatch {
                path: entry.full_path.clone(),
                name: entry.name.clone(),
            });
        }
        if !entry.has_mtime() {
            return Err(TransformError::InvalidTimestamp);
        }
        Ok(FileRecord {
            unique_id: unique_id(&entry.full_path)?,
            source_path: entry.full_path.clone(),
            file_name: entry.name.clone(),
            extension: extension_of(&entry.name),
            size: entry.size,
            last_modified_ms: entry.modified_ms,
            status: IndexingStatus::Completed,
            indexed_at_ms: now_ms(),
            error: None,
        })
    }

    /// `FAILED` record for an entry whose extraction failed. The identifier falls back to a
    /// non-cryptographic hash when the regular one cannot be derived.
    pub fn failed_record(&self, entry: &RemoteEntry, err: &TransformError) -> FileRecord {
        let id = unique_id(&entry.full_path).unwrap_or_else(|_| fallback_id(&entry.full_path));
        FileRecord {
            unique_id: id,
            source_path: entry.full_path.clone(),
            file_name: entry.name.clone(),
            extension: extension_of(&entry.name),
            size: entry.size,
            last_modified_ms: if entry.has_mtime() {
                entry.modified_ms
            } else {
                0
            },
            status: IndexingStatus::Failed,
            indexed_at_ms: now_ms(),
            error: Some(describe_error(err)),
        }
    }

    pub fn transform(&self, entry: &RemoteEntry) -> TransformOutcome {
        if let Some(reason) = self.filter_reason(entry) {
            trace!("Filtered {} ({:?})", entry.full_path, reason);
            return TransformOutcome::Filtered(reason);
        }
        match self.extract(entry) {
            Ok(record) => TransformOutcome::Record(record),
            Err(e) => TransformOutcome::Record(self.failed_record(entry, &e)),
        }
    }

    /// Transform a chunk on `workers`, preserving input order. A panic while transforming an
    /// entry is caught and reported as `EntryAborted` for that entry only.
    pub fn transform_chunk(
        &self,
        workers: &ThreadPool,
        entries: &[RemoteEntry],
    ) -> Vec<Result<TransformOutcome, IndexError>> {
        workers.install(|| {
            entries
                .par_iter()
                .map(|entry| {
                    catch_unwind(AssertUnwindSafe(|| self.transform(entry))).map_err(|payload| {
                        IndexError::EntryAborted {
                            path: entry.full_path.clone(),
                            message: panic_message(payload.as_ref()),
                        }
                    })
                })
                .collect()
        })
    }
}

/// `Kind: message`, truncated to the stored maximum.
pub fn describe_error(err: &TransformError) -> String {
    truncate_chars(
        &format!("{}: {}", err.kind(), err),
        FilterDefaults::MAX_ERROR_LEN,
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
