//! Load `.remdex.toml` from a directory (CLI only). Library callers build `PoolOpts` /
//! `RunOpts` themselves.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Opts;
use crate::utils::config::PackagePaths;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RemdexToml {
    #[serde(default)]
    sftp: SftpSection,
    #[serde(default)]
    pool: PoolSection,
    #[serde(default)]
    batch: BatchSection,
    #[serde(default)]
    filter: FilterSection,
    #[serde(default)]
    store: StoreSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SftpSection {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PoolSection {
    max_size: Option<usize>,
    min_idle: Option<usize>,
    initial_size: Option<usize>,
    max_wait_secs: Option<u64>,
    test_on_borrow: Option<bool>,
    test_while_idle: Option<bool>,
    /// 0 disables the background evictor.
    eviction_interval_secs: Option<u64>,
    min_evictable_idle_secs: Option<u64>,
    tests_per_eviction_run: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BatchSection {
    chunk_size: Option<usize>,
    workers: Option<usize>,
    skip_limit: Option<usize>,
    retry_limit: Option<u32>,
    retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FilterSection {
    min_size: Option<u64>,
    max_size: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoreSection {
    db_path: Option<String>,
}

/// Parse settings text.
pub fn parse_settings_toml(s: &str) -> Result<RemdexToml, toml::de::Error> {
    toml::from_str(s)
}

/// Load `.remdex.toml` from `dir` if present. None if missing; parse errors are logged and
/// treated as missing.
pub fn load_settings_toml(dir: &Path) -> Option<RemdexToml> {
    let path = dir.join(PackagePaths::get().settings_filename());
    let s = std::fs::read_to_string(&path).ok()?;
    parse_settings_toml(&s)
        .map_err(|e| log::warn!("{}: {}", path.display(), e))
        .ok()
}

/// Overwrite opts field from file when present.
macro_rules! apply_file_opt {
    ($sec:expr, $opts:expr, $sec_field:ident => $($opts_field:ident).+, secs) => {
        if let Some(v) = $sec.$sec_field {
            $opts.$($opts_field).+ = Duration::from_secs(v);
        }
    };
    ($sec:expr, $opts:expr, $sec_field:ident => $($opts_field:ident).+) => {
        if let Some(v) = $sec.$sec_field.clone() {
            $opts.$($opts_field).+ = v;
        }
    };
}

/// Apply file config to opts (only fields present in the file). Call before applying CLI.
pub fn apply_file_to_opts(file: &RemdexToml, opts: &mut Opts) {
    let sftp = &file.sftp;
    apply_file_opt!(sftp, opts, host => sftp.host);
    apply_file_opt!(sftp, opts, port => sftp.port);
    apply_file_opt!(sftp, opts, user => sftp.user);
    apply_file_opt!(sftp, opts, connect_timeout_secs => sftp.connect_timeout, secs);

    let pool = &file.pool;
    apply_file_opt!(pool, opts, max_size => pool.max_size);
    apply_file_opt!(pool, opts, min_idle => pool.min_idle);
    apply_file_opt!(pool, opts, initial_size => pool.initial_size);
    apply_file_opt!(pool, opts, max_wait_secs => pool.max_wait, secs);
    apply_file_opt!(pool, opts, test_on_borrow => pool.test_on_borrow);
    apply_file_opt!(pool, opts, test_while_idle => pool.test_while_idle);
    apply_file_opt!(pool, opts, min_evictable_idle_secs => pool.min_evictable_idle, secs);
    apply_file_opt!(pool, opts, tests_per_eviction_run => pool.tests_per_eviction_run);
    if let Some(secs) = pool.eviction_interval_secs {
        opts.pool.eviction_interval = (secs > 0).then(|| Duration::from_secs(secs));
    }
    // listings wait as long as the pool is configured to
    opts.run.acquire_timeout = opts.pool.max_wait;

    let batch = &file.batch;
    apply_file_opt!(batch, opts, chunk_size => run.chunk_size);
    apply_file_opt!(batch, opts, workers => run.workers);
    apply_file_opt!(batch, opts, skip_limit => run.skip_limit);
    apply_file_opt!(batch, opts, retry_limit => run.retry_limit);
    if let Some(ms) = batch.retry_backoff_ms {
        opts.run.retry_backoff = Duration::from_millis(ms);
    }

    let filter = &file.filter;
    apply_file_opt!(filter, opts, min_size => run.filter.min_size);
    apply_file_opt!(filter, opts, max_size => run.filter.max_size);

    if let Some(ref p) = file.store.db_path {
        opts.db_path = Some(PathBuf::from(p));
    }
}
