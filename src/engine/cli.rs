//! CLI command handler: build options, open the store, run one indexing run.

use anyhow::{Context, Result, anyhow};
use colored::Colorize;
use log::debug;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::Opts;
use crate::engine::arg_parser::{Cli, TransportKind};
use crate::engine::db_ops::{DocumentStore, SqliteStore};
use crate::engine::progress::RunProgress;
use crate::pipeline::{ChunkCallback, Coordinator, RunReport};
use crate::pool::SessionPool;
use crate::transport::{LocalTransport, RemoteTransport};
use crate::types::RunState;
use crate::utils::{apply_file_to_opts, load_settings_toml, setup_logging};

/// Defaults → `.remdex.toml` in `dir` → CLI flags.
fn setup_opts(cli: &Cli, dir: &Path) -> Opts {
    let mut opts = Opts {
        root: cli.root.clone(),
        ..Default::default()
    };
    if let Some(file) = load_settings_toml(dir) {
        apply_file_to_opts(&file, &mut opts);
    }
    if let Some(ref db) = cli.db {
        opts.db_path = Some(db.clone());
    }
    if let Some(ref host) = cli.host {
        opts.sftp.host = host.clone();
    }
    if let Some(port) = cli.port {
        opts.sftp.port = port;
    }
    if let Some(ref user) = cli.user {
        opts.sftp.user = user.clone();
    }
    if let Some(n) = cli.pool_size {
        opts.pool.max_size = n;
    }
    if let Some(n) = cli.chunk_size {
        opts.run.chunk_size = n;
    }
    if let Some(n) = cli.workers {
        opts.run.workers = n;
    }
    if let Some(n) = cli.retry_limit {
        opts.run.retry_limit = n;
    }
    if let Some(n) = cli.skip_limit {
        opts.run.skip_limit = n;
    }
    if let Some(n) = cli.min_size {
        opts.run.filter.min_size = n;
    }
    if let Some(n) = cli.max_size {
        opts.run.filter.max_size = n;
    }
    opts.verbose = cli.is_verbose();
    opts.print_stats = cli.stats.unwrap_or(false);
    opts
}

fn print_summary(report: &RunReport) {
    let state = match report.state {
        RunState::Completed => "COMPLETED".green().bold(),
        RunState::Cancelled => "CANCELLED".yellow().bold(),
        _ => "FAILED".red().bold(),
    };
    println!("{} run {} on {}", state, report.run_id, report.root.cyan());
    println!(
        "  {} processed, {} indexed, {} failed, {} filtered, {} skipped",
        report.processed,
        report.indexed.to_string().green(),
        report.failed.to_string().red(),
        report.filtered,
        report.skipped
    );
    println!(
        "  {} inserted, {} updated, {} directories, {} chunks",
        report.inserted, report.updated, report.directories, report.chunks
    );
    println!(
        "  {} ({:.1} files/s)",
        report.duration, report.throughput
    );
    if let Some(ref context) = report.error_context {
        for line in context.lines() {
            println!("  {}", line.red());
        }
    }
}

/// Build the pool over `transport`, run once, report.
fn run_with<T: RemoteTransport + 'static>(
    transport: T,
    root: &str,
    opts: &Opts,
    store: Arc<dyn DocumentStore>,
    cancel: &AtomicBool,
) -> Result<()> {
    let pool = SessionPool::new(transport, opts.pool.clone());
    let coordinator = Coordinator::new(Arc::clone(&pool), store);

    let progress = opts.verbose.then(|| Arc::new(RunProgress::new("Indexing")));
    let on_chunk: Option<Box<ChunkCallback>> = progress.clone().map(|progress| {
        Box::new(move |report: &RunReport| progress.on_chunk(report)) as Box<ChunkCallback>
    });

    let report = coordinator.run(root, &opts.run, cancel, on_chunk.as_deref())?;
    if let Some(ref progress) = progress {
        progress.finish();
    }
    print_summary(&report);

    if opts.print_stats {
        println!(
            "{}",
            serde_json::to_string_pretty(&pool.extended_stats()).context("serialize pool stats")?
        );
    }
    pool.log_stats();
    pool.close();

    match report.state {
        RunState::Completed => Ok(()),
        RunState::Cancelled => Err(anyhow!(
            "Indexing cancelled by user; chunks written so far are kept"
        )),
        _ => Err(anyhow!(
            "Indexing failed: {}",
            report.error.as_deref().unwrap_or("unknown error")
        )),
    }
}

/// Index `cli.root` once.
pub fn handle_run(cli: &Cli) -> Result<()> {
    setup_logging(cli.is_verbose());
    let cwd = std::env::current_dir().context("read working directory")?;
    let opts = setup_opts(cli, &cwd);
    debug!("{} CONFIG:{:#?}", env!("CARGO_PKG_NAME").to_uppercase(), opts);

    let db_path = opts.db_path.clone().unwrap_or_else(|| cli.db_path(&cwd));
    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteStore::open(&db_path)
            .with_context(|| format!("open store {}", db_path.display()))?,
    );

    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_handler = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        cancel_handler.store(true, Ordering::Relaxed);
    })
    .context("set Ctrl+C handler")?;

    match cli.transport {
        TransportKind::Local => {
            let root = std::fs::canonicalize(&opts.root)
                .with_context(|| format!("resolve root {}", opts.root))?;
            let root = root.to_string_lossy().into_owned();
            run_with(LocalTransport::new("/"), &root, &opts, store, &cancel)
        }
        TransportKind::Sftp => run_sftp(&cwd, &opts, store, &cancel),
    }
}

#[cfg(feature = "sftp")]
fn run_sftp(
    cwd: &Path,
    opts: &Opts,
    store: Arc<dyn DocumentStore>,
    cancel: &AtomicBool,
) -> Result<()> {
    use crate::transport::SftpTransport;
    use crate::utils::get_sftp_password;

    if opts.sftp.host.is_empty() || opts.sftp.user.is_empty() {
        return Err(anyhow!(
            "SFTP transport needs --host and --user (or [sftp] in the settings file)"
        ));
    }
    let account = format!("{}@{}", opts.sftp.user, opts.sftp.host);
    let password = get_sftp_password(cwd, &account)?;
    let transport = SftpTransport::new(opts.sftp.clone(), password);
    run_with(transport, &opts.root, opts, store, cancel)
}

#[cfg(not(feature = "sftp"))]
fn run_sftp(
    _cwd: &Path,
    _opts: &Opts,
    _store: Arc<dyn DocumentStore>,
    _cancel: &AtomicBool,
) -> Result<()> {
    log::warn!("SFTP support was not compiled in");
    Err(anyhow!(
        "this build has no SFTP support; rebuild with `--features sftp`"
    ))
}
