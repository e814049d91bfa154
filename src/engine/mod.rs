//! Engine module: CLI plumbing, store operations and shared helpers

pub mod arg_parser;
pub mod cli;
pub mod db_ops;
pub mod hashing;
pub mod progress;
pub mod tools;

// Re-export commonly used functions
pub use arg_parser::{Cli, TransportKind};
pub use cli::handle_run;
pub use db_ops::{
    BulkWriteResult, DocumentStore, SqliteStore, StoredFileRow, UpsertOp, WriteError,
};
pub use hashing::{fallback_id, unique_id};
pub use tools::{extension_of, format_duration_ms, join_remote, truncate_chars};
