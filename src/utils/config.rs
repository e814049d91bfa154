//! Application configuration constants.
//! Tuning and thresholds in one place.

use std::sync::OnceLock;
use std::time::Duration;

// ---- Package / paths (from CARGO_PKG_NAME, cached) ----

/// Package-derived names: built once from `CARGO_PKG_NAME`, then cached.
pub struct PackagePaths {
    db_filename: String,
    settings_filename: String,
    password_env: String,
}

static PACKAGE_PATHS: OnceLock<PackagePaths> = OnceLock::new();

impl PackagePaths {
    /// Build and cache names from `CARGO_PKG_NAME`. Called once on first use.
    pub fn get() -> &'static PackagePaths {
        PACKAGE_PATHS.get_or_init(|| {
            let pkg = env!("CARGO_PKG_NAME");
            PackagePaths {
                db_filename: format!("{pkg}.db"),
                settings_filename: format!(".{pkg}.toml"),
                password_env: format!("{}_SFTP_PASSWORD", pkg.to_uppercase()),
            }
        })
    }

    /// Default SQLite store filename.
    pub fn output_filename(&self) -> &str {
        &self.db_filename
    }

    /// Optional settings file looked up in the working directory.
    pub fn settings_filename(&self) -> &str {
        &self.settings_filename
    }

    /// Env var holding the SFTP password.
    pub fn password_env(&self) -> &str {
        &self.password_env
    }
}

// ---- Session pool ----

/// Session pool defaults.
pub struct PoolDefaults;

impl PoolDefaults {
    pub const MAX_SIZE: usize = 10;
    pub const MIN_IDLE: usize = 0;
    /// How long `acquire` waits for a free slot.
    pub const MAX_WAIT: Duration = Duration::from_secs(30);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
    pub const EVICTION_INTERVAL: Duration = Duration::from_secs(60);
    /// 5 minutes.
    pub const MIN_EVICTABLE_IDLE: Duration = Duration::from_secs(300);
    pub const TESTS_PER_EVICTION_RUN: usize = 3;
}

/// Pool health thresholds (percent).
pub struct HealthThresholds;

impl HealthThresholds {
    pub const CRITICAL_UTILIZATION: f64 = 95.0;
    pub const WARNING_UTILIZATION: f64 = 80.0;
    pub const HEALTHY_UTILIZATION: f64 = 90.0;
    /// Failures per borrow above which the pool is degraded.
    pub const MAX_FAILURE_RATE: f64 = 0.1;
    /// Fraction of max_total active that triggers the near-capacity warning.
    pub const NEAR_CAPACITY: f64 = 0.9;
    /// destroyed / created above which the destruction-rate warning fires.
    pub const DESTRUCTION_RATE: f64 = 0.5;
    /// Minimum created sessions before the destruction-rate warning applies.
    pub const DESTRUCTION_MIN_CREATED: u64 = 10;
}

// ---- Batch / pipeline ----

/// Chunking and fault-tolerance defaults.
pub struct BatchDefaults;

impl BatchDefaults {
    /// Entries per chunk (one bulk upsert per chunk).
    pub const CHUNK_SIZE: usize = 500;
    /// Transform worker threads.
    pub const WORKERS: usize = 4;
    pub const SKIP_LIMIT: usize = 1000;
    /// Total listing attempts per directory.
    pub const RETRY_LIMIT: u32 = 3;
    pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);
    /// Failed share of a chunk above which the bulk writer warns (percent).
    pub const HIGH_FAILURE_RATE: f64 = 5.0;
    /// Progress log interval, in directories.
    pub const PROGRESS_EVERY_DIRS: usize = 100;
    /// Discovery progress log interval, in directories.
    pub const DISCOVERY_LOG_EVERY: usize = 1000;
    /// Lines of error source chain kept in a failed run's report.
    pub const ERROR_CONTEXT_LINES: usize = 10;
    /// Finished background runs a coordinator keeps for `status`; older ones are dropped.
    pub const RETAINED_RUNS: usize = 16;
}

// ---- Transform filters ----

/// Transform-stage filter defaults.
pub struct FilterDefaults;

impl FilterDefaults {
    pub const MIN_SIZE: u64 = 0;
    pub const MAX_SIZE: u64 = u64::MAX;
    /// Stored error descriptions are truncated to this many characters.
    pub const MAX_ERROR_LEN: usize = 500;
    pub const TEMP_SUFFIXES: [&'static str; 4] = [".tmp", ".temp", ".bak", "~"];
    /// MS Office lock files.
    pub const TEMP_PREFIX: &'static str = "~$";
}

// ---- Store ----

/// Collection holding one document per indexed file.
pub const FILE_INDEX_COLLECTION: &str = "file_index";

/// Sequence used to number indexing runs.
pub const RUN_SEQUENCE: &str = "index_run";
