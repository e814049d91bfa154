//! Remdex: remote directory indexer over a bounded session pool.
//!
//! A run discovers every directory under a root, streams file entries one directory at a
//! time, extracts metadata in parallel and bulk-upserts one record per file into a
//! document store, keyed by a stable hash of the path.

pub mod engine;
pub mod error;
pub mod pipeline;
pub mod pool;
pub mod transport;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use engine::db_ops::{DocumentStore, SqliteStore};
pub use error::{IndexError, Result};
pub use pipeline::{Coordinator, RunReport};
pub use pool::{PoolHealth, PoolStats, SessionPool};
#[cfg(any(test, feature = "test-support"))]
pub use transport::MemoryTransport;
pub use transport::{LocalTransport, RemoteSession, RemoteTransport};

use log::debug;
use std::sync::Arc;

/// Single entry point: index `root` reachable through `transport` into `store`.
///
/// Builds a pool from `opts.pool`, runs once with `opts.run` and closes the pool. The
/// returned report carries the terminal state; `Err` only when the run could not be
/// registered (run id sequence unavailable).
pub fn index_remote<T>(
    transport: T,
    root: &str,
    opts: &Opts,
    store: Arc<dyn DocumentStore>,
) -> Result<RunReport>
where
    T: RemoteTransport + 'static,
{
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        opts
    );
    let pool = SessionPool::new(transport, opts.pool.clone());
    let report = pipeline::run_indexing(Arc::clone(&pool), store, root, &opts.run);
    pool.close();
    report
}
