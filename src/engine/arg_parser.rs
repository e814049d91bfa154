use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::utils::config::PackagePaths;

struct DefaultArgs;

impl DefaultArgs {
    pub const ROOT: &'static str = ".";
}

/// Where the tree to index lives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Locally reachable tree (local disk, NFS/SMB mount).
    #[default]
    Local,
    /// Remote SFTP server (requires the `sftp` feature).
    Sftp,
}

/// Index a remote file tree into a local document store.
#[derive(Clone, Parser)]
#[command(name = "remdex")]
#[command(about = "Index a remote file tree: discover directories, extract metadata, upsert records.")]
pub struct Cli {
    /// Root directory to index. Default: current directory (local) or `.` on the server (sftp).
    #[arg(value_name = "ROOT", default_value = DefaultArgs::ROOT)]
    pub root: String,

    /// Transport used to reach ROOT.
    #[arg(long, short = 't', value_enum, default_value_t = TransportKind::Local)]
    pub transport: TransportKind,

    /// SFTP host.
    #[arg(long)]
    pub host: Option<String>,

    /// SFTP port.
    #[arg(long, short = 'p', value_parser = clap::value_parser!(u16))]
    pub port: Option<u16>,

    /// SFTP user. The password is read from REMDEX_SFTP_PASSWORD, `.env`, or a prompt.
    #[arg(long, short = 'u')]
    pub user: Option<String>,

    /// Path to the store database. Default: `remdex.db` in the working directory.
    #[arg(long, short)]
    pub db: Option<PathBuf>,

    /// Entries per chunk (one bulk write per chunk).
    #[arg(long, short = 'c')]
    pub chunk_size: Option<usize>,

    /// Transform worker threads.
    #[arg(long, short = 'w')]
    pub workers: Option<usize>,

    /// Maximum concurrently open sessions.
    #[arg(long)]
    pub pool_size: Option<usize>,

    /// Total attempts per directory listing before the run fails.
    #[arg(long)]
    pub retry_limit: Option<u32>,

    /// Entry-scoped errors tolerated before the run fails.
    #[arg(long)]
    pub skip_limit: Option<usize>,

    /// Skip files smaller than this many bytes.
    #[arg(long)]
    pub min_size: Option<u64>,

    /// Skip files larger than this many bytes.
    #[arg(long)]
    pub max_size: Option<u64>,

    /// Print session pool statistics as JSON after the run.
    #[arg(long, short = 's', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub stats: Option<bool>,

    /// Verbose output (debug logs, progress counter).
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}

impl Cli {
    /// Store path, defaulting to the package db filename in `dir`.
    pub fn db_path(&self, dir: &std::path::Path) -> PathBuf {
        self.db
            .clone()
            .unwrap_or_else(|| dir.join(PackagePaths::get().output_filename()))
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose.unwrap_or(false)
    }
}
