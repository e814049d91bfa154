//! Document store operations: schema, open, unordered bulk upsert, sequences.

mod connection;
mod store;

pub use connection::{open_connection, open_connection_in_memory};
pub use store::{SqliteStore, StoredFileRow};

use rusqlite::types::Value;

use crate::error::StoreResult;

/// WAL tuning pragmas (synchronous, autocheckpoint, size limit). Use after PRAGMA journal_mode = WAL.
pub(crate) const WAL_PRAGMAS: &str = r#"
        PRAGMA synchronous = NORMAL;
        PRAGMA wal_autocheckpoint = 10000;
        PRAGMA journal_size_limit = 67108864;
        "#;

/// Schema for the file index collection and the sequence table.
pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS file_index (
    unique_id TEXT PRIMARY KEY,
    source_path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    extension TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    last_modified_ms INTEGER NOT NULL,
    indexing_status TEXT NOT NULL
        CHECK (indexing_status IN ('PENDING', 'COMPLETED', 'FAILED')),
    indexed_at_ms INTEGER NOT NULL,
    indexing_error TEXT,
    reorg_status TEXT NOT NULL,
    reorg_attempts INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_file_index_status ON file_index(indexing_status);
CREATE INDEX IF NOT EXISTS idx_file_index_reorg ON file_index(reorg_status);

CREATE TABLE IF NOT EXISTS sequences (
    name TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);
"#;

/// One keyed upsert. `set` is written on insert and on update; `set_on_insert` only when the
/// document does not exist yet.
#[derive(Clone, Debug)]
pub struct UpsertOp {
    pub key_field: &'static str,
    pub key: String,
    pub set: Vec<(&'static str, Value)>,
    pub set_on_insert: Vec<(&'static str, Value)>,
}

/// A single op the store rejected; the rest of the batch still ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteError {
    /// Position of the op in the submitted batch.
    pub index: usize,
    pub key: String,
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BulkWriteResult {
    pub inserted: usize,
    pub updated: usize,
    pub write_errors: Vec<WriteError>,
}

impl BulkWriteResult {
    pub fn succeeded(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Keyed document store used by the persist stage.
pub trait DocumentStore: Send + Sync {
    /// Execute every op (unordered: a rejected op does not stop the others). `Err` only
    /// when the batch as a whole could not run.
    fn bulk_upsert(&self, collection: &str, ops: &[UpsertOp]) -> StoreResult<BulkWriteResult>;

    /// Atomically increment and return the named 64-bit sequence (first call returns 1).
    fn next_sequence(&self, name: &str) -> StoreResult<i64>;

    /// Documents in `collection`.
    fn count(&self, collection: &str) -> StoreResult<u64>;
}
