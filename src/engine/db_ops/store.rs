//! SQLite-backed [`DocumentStore`].

use log::debug;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Transaction, params_from_iter};
use std::path::Path;
use std::sync::Mutex;

use super::connection::{open_connection, open_connection_in_memory};
use super::{BulkWriteResult, DocumentStore, UpsertOp, WriteError};
use crate::error::{StoreError, StoreResult};
use crate::utils::config::FILE_INDEX_COLLECTION;

/// Collection and field names are spliced into SQL, so only plain identifiers pass.
fn check_identifier(name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    let ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

fn check_op(op: &UpsertOp) -> StoreResult<()> {
    check_identifier(op.key_field)?;
    for (field, _) in op.set.iter().chain(op.set_on_insert.iter()) {
        check_identifier(field)?;
    }
    Ok(())
}

/// Insert if absent; otherwise update the `set` fields. Returns true when inserted.
fn upsert_one(tx: &Transaction<'_>, collection: &str, op: &UpsertOp) -> StoreResult<bool> {
    check_op(op)?;

    let exists = tx
        .query_row(
            &format!("SELECT 1 FROM {collection} WHERE {} = ?1", op.key_field),
            [op.key.as_str()],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    if !exists {
        let mut columns = vec![op.key_field];
        let mut values = vec![Value::Text(op.key.clone())];
        for (field, value) in op.set.iter().chain(op.set_on_insert.iter()) {
            columns.push(*field);
            values.push(value.clone());
        }
        let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
        let insert = format!(
            "INSERT INTO {collection} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        tx.execute(&insert, params_from_iter(values.iter()))?;
        return Ok(true);
    }

    if op.set.is_empty() {
        return Ok(false);
    }
    let assignments: Vec<String> = op
        .set
        .iter()
        .enumerate()
        .map(|(i, (field, _))| format!("{field} = ?{}", i + 1))
        .collect();
    let update = format!(
        "UPDATE {collection} SET {} WHERE {} = ?{}",
        assignments.join(", "),
        op.key_field,
        op.set.len() + 1
    );
    let mut update_values: Vec<Value> = op.set.iter().map(|(_, v)| v.clone()).collect();
    update_values.push(Value::Text(op.key.clone()));
    tx.execute(&update, params_from_iter(update_values.iter()))?;
    Ok(false)
}

/// One row of the file index, as stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredFileRow {
    pub unique_id: String,
    pub source_path: String,
    pub file_name: String,
    pub extension: String,
    pub file_size: i64,
    pub last_modified_ms: i64,
    pub indexing_status: String,
    pub indexed_at_ms: i64,
    pub indexing_error: Option<String>,
    pub reorg_status: String,
    pub reorg_attempts: i64,
}

/// Single-connection SQLite store. Writes are serialised through the connection mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> StoreResult<Self> {
        Ok(Self {
            conn: Mutex::new(open_connection(path)?),
        })
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self {
            conn: Mutex::new(open_connection_in_memory()?),
        })
    }

    fn with_conn<R>(&self, f: impl FnOnce(&mut Connection) -> StoreResult<R>) -> StoreResult<R> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut conn)
    }

    /// Look up one file index row by identifier.
    pub fn file_row(&self, unique_id: &str) -> StoreResult<Option<StoredFileRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT unique_id, source_path, file_name, extension, file_size, \
                         last_modified_ms, indexing_status, indexed_at_ms, indexing_error, \
                         reorg_status, reorg_attempts FROM {FILE_INDEX_COLLECTION} WHERE unique_id = ?1"
                    ),
                    [unique_id],
                    |r| {
                        Ok(StoredFileRow {
                            unique_id: r.get(0)?,
                            source_path: r.get(1)?,
                            file_name: r.get(2)?,
                            extension: r.get(3)?,
                            file_size: r.get(4)?,
                            last_modified_ms: r.get(5)?,
                            indexing_status: r.get(6)?,
                            indexed_at_ms: r.get(7)?,
                            indexing_error: r.get(8)?,
                            reorg_status: r.get(9)?,
                            reorg_attempts: r.get(10)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Count file index rows with the given indexing status.
    pub fn count_with_status(&self, status: &str) -> StoreResult<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                &format!(
                    "SELECT COUNT(*) FROM {FILE_INDEX_COLLECTION} WHERE indexing_status = ?1"
                ),
                [status],
                |r| r.get(0),
            )?;
            Ok(n.max(0) as u64)
        })
    }
}

impl DocumentStore for SqliteStore {
    fn bulk_upsert(&self, collection: &str, ops: &[UpsertOp]) -> StoreResult<BulkWriteResult> {
        check_identifier(collection)?;
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut result = BulkWriteResult::default();
            for (index, op) in ops.iter().enumerate() {
                match upsert_one(&tx, collection, op) {
                    Ok(true) => result.inserted += 1,
                    Ok(false) => result.updated += 1,
                    Err(e) => result.write_errors.push(WriteError {
                        index,
                        key: op.key.clone(),
                        message: e.to_string(),
                    }),
                }
            }
            tx.commit()?;
            debug!(
                "bulk_upsert into {}: {} inserted, {} updated, {} rejected",
                collection,
                result.inserted,
                result.updated,
                result.write_errors.len()
            );
            Ok(result)
        })
    }

    fn next_sequence(&self, name: &str) -> StoreResult<i64> {
        self.with_conn(|conn| {
            let value = conn.query_row(
                "INSERT INTO sequences (name, value) VALUES (?1, 1) \
                 ON CONFLICT(name) DO UPDATE SET value = value + 1 RETURNING value",
                [name],
                |r| r.get(0),
            )?;
            Ok(value)
        })
    }

    fn count(&self, collection: &str) -> StoreResult<u64> {
        check_identifier(collection)?;
        self.with_conn(|conn| {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {collection}"), [], |r| {
                    r.get(0)
                })?;
            Ok(n.max(0) as u64)
        })
    }
}
