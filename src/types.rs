//! Public and internal types for the remdex API and pipeline.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::utils::config::{BatchDefaults, FilterDefaults, PoolDefaults};

/// One listing result from the remote side. Immutable; consumed once by the transform stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Full remote path (`/data/a/x.pdf`).
    pub full_path: String,
    /// Base name (`x.pdf`).
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Modification time in milliseconds since epoch; negative before 1970.
    /// [`RemoteEntry::UNKNOWN_MTIME`] when the server did not report one.
    pub modified_ms: i64,
    pub is_dir: bool,
}

impl RemoteEntry {
    pub const UNKNOWN_MTIME: i64 = i64::MIN;

    /// Build an entry for `name` inside `dir`, joining with a single `/`.
    pub fn child_of(dir: &str, name: &str, size: u64, modified_ms: i64, is_dir: bool) -> Self {
        Self {
            full_path: crate::engine::tools::join_remote(dir, name),
            name: name.to_string(),
            size,
            modified_ms,
            is_dir,
        }
    }

    pub fn has_mtime(&self) -> bool {
        self.modified_ms != Self::UNKNOWN_MTIME
    }

    /// `.` and `..` pseudo-entries some servers include in listings.
    pub fn is_special(&self) -> bool {
        self.name == "." || self.name == ".."
    }
}

/// Indexing outcome stored with each record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexingStatus {
    Pending,
    Completed,
    Failed,
}

impl IndexingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexingStatus::Pending => "PENDING",
            IndexingStatus::Completed => "COMPLETED",
            IndexingStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Downstream (reorganisation) status written alongside each record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReorgStatus {
    Pending,
    Skipped,
}

impl ReorgStatus {
    /// Failed indexing must not leave the downstream consumer waiting on the record.
    pub fn for_indexing(status: IndexingStatus) -> Self {
        match status {
            IndexingStatus::Failed => ReorgStatus::Skipped,
            _ => ReorgStatus::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReorgStatus::Pending => "PENDING",
            ReorgStatus::Skipped => "SKIPPED",
        }
    }
}

/// The unit persisted to the document store (one per non-filtered entry).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Hex hash of `source_path`; the upsert key.
    pub unique_id: String,
    pub source_path: String,
    pub file_name: String,
    /// Lower-cased, without the dot. Empty when the name has no dot.
    pub extension: String,
    pub size: u64,
    /// Modification time in milliseconds since epoch.
    pub last_modified_ms: i64,
    pub status: IndexingStatus,
    /// When the transform produced this record (ms since epoch).
    pub indexed_at_ms: i64,
    /// `Kind: message`, at most [`FilterDefaults::MAX_ERROR_LEN`] characters.
    pub error: Option<String>,
}

impl FileRecord {
    pub fn is_failed(&self) -> bool {
        self.status == IndexingStatus::Failed
    }
}

/// Why the transform stage dropped an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterReason {
    /// Entry has no name or no path (the null entry).
    Empty,
    Directory,
    Hidden,
    Temporary,
    SizeOutOfBounds,
}

/// Result of transforming one entry: dropped by a filter, or exactly one record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransformOutcome {
    Filtered(FilterReason),
    Record(FileRecord),
}

/// Pipeline run state. `Failed` and `Cancelled` are reachable from any non-idle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Idle,
    Discovering,
    Streaming,
    Draining,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        )
    }
}

/// Session pool options.
#[derive(Clone, Debug)]
pub struct PoolOpts {
    /// Maximum concurrently open sessions (active + idle).
    pub max_size: usize,
    /// Idle sessions never evicted below this count.
    pub min_idle: usize,
    /// Sessions created eagerly when the pool is built. 0 = fully lazy.
    pub initial_size: usize,
    /// Default wait used by callers that don't pass their own timeout.
    pub max_wait: Duration,
    /// Validate before handing a session to a caller.
    pub test_on_borrow: bool,
    /// Validate a few idle sessions on each eviction sweep.
    pub test_while_idle: bool,
    /// Interval between background eviction sweeps. `None` disables the evictor thread.
    pub eviction_interval: Option<Duration>,
    /// Idle time after which a session is evicted.
    pub min_evictable_idle: Duration,
    /// Idle sessions validated per sweep when `test_while_idle`.
    pub tests_per_eviction_run: usize,
}

impl Default for PoolOpts {
    fn default() -> Self {
        Self {
            max_size: PoolDefaults::MAX_SIZE,
            min_idle: PoolDefaults::MIN_IDLE,
            initial_size: 0,
            max_wait: PoolDefaults::MAX_WAIT,
            test_on_borrow: true,
            test_while_idle: true,
            eviction_interval: Some(PoolDefaults::EVICTION_INTERVAL),
            min_evictable_idle: PoolDefaults::MIN_EVICTABLE_IDLE,
            tests_per_eviction_run: PoolDefaults::TESTS_PER_EVICTION_RUN,
        }
    }
}

/// Transform-stage filter bounds (inclusive).
#[derive(Clone, Copy, Debug)]
pub struct FilterOpts {
    pub min_size: u64,
    pub max_size: u64,
}

impl Default for FilterOpts {
    fn default() -> Self {
        Self {
            min_size: FilterDefaults::MIN_SIZE,
            max_size: FilterDefaults::MAX_SIZE,
        }
    }
}

/// Options for one indexing run.
#[derive(Clone, Debug)]
pub struct RunOpts {
    /// Entries moved together through transform and persist.
    pub chunk_size: usize,
    /// Transform worker threads (independent of the session pool size).
    pub workers: usize,
    /// Entry-scoped errors tolerated before the run fails.
    pub skip_limit: usize,
    /// Total attempts for one directory listing before the run fails.
    pub retry_limit: u32,
    /// Pause between listing attempts.
    pub retry_backoff: Duration,
    /// How long a listing waits for a session.
    pub acquire_timeout: Duration,
    pub filter: FilterOpts,
}

impl Default for RunOpts {
    fn default() -> Self {
        Self {
            chunk_size: BatchDefaults::CHUNK_SIZE,
            workers: BatchDefaults::WORKERS,
            skip_limit: BatchDefaults::SKIP_LIMIT,
            retry_limit: BatchDefaults::RETRY_LIMIT,
            retry_backoff: BatchDefaults::RETRY_BACKOFF,
            acquire_timeout: PoolDefaults::MAX_WAIT,
            filter: FilterOpts::default(),
        }
    }
}

/// Full options (CLI and settings file). Library callers use [`PoolOpts`] and [`RunOpts`] directly.
#[derive(Clone, Debug, Default)]
pub struct Opts {
    /// Remote root to index.
    pub root: String,
    /// SQLite store path. When None, uses the package default filename in the working directory.
    pub db_path: Option<std::path::PathBuf>,
    pub sftp: SftpOpts,
    pub pool: PoolOpts,
    pub run: RunOpts,
    /// Show progress bar (verbose mode).
    pub verbose: bool,
    /// Print pool stats as JSON after the run.
    pub print_stats: bool,
}

/// Connection settings for the SFTP backend.
#[derive(Clone, Debug)]
pub struct SftpOpts {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub connect_timeout: Duration,
}

impl Default for SftpOpts {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 22,
            user: String::new(),
            connect_timeout: PoolDefaults::CONNECT_TIMEOUT,
        }
    }
}
