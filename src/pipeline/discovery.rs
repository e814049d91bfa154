//! Directory discovery: breadth-first enumeration of every directory under a root.

use log::{debug, info};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::{IndexError, Result};
use crate::pool::{PooledSession, SessionPool};
use crate::transport::RemoteTransport;
use crate::utils::config::BatchDefaults;

/// Strip trailing slashes, keeping `/` itself.
pub fn normalize_root(root: &str) -> String {
    let trimmed = root.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

/// All directories under `root` (root first, then BFS in listing order), using exactly one
/// borrowed session. Any failure aborts with `DiscoveryFailed`; nothing partial is returned.
pub fn discover<T: RemoteTransport>(
    pool: &SessionPool<T>,
    root: &str,
    acquire_timeout: Duration,
) -> Result<Vec<String>> {
    let root = normalize_root(root);
    let start = Instant::now();
    info!("Starting directory discovery under {}", root);

    let walk = || -> Result<Vec<String>> {
        let mut session = pool.acquire(acquire_timeout)?;
        breadth_first(&mut session, &root)
    };
    let dirs = walk().map_err(|e| IndexError::DiscoveryFailed {
        root: root.clone(),
        source: Box::new(e),
    })?;

    info!(
        "Directory discovery finished: {} directories in {:.2?}",
        dirs.len(),
        start.elapsed()
    );
    Ok(dirs)
}

fn breadth_first<T: RemoteTransport>(
    session: &mut PooledSession<'_, T>,
    root: &str,
) -> Result<Vec<String>> {
    let mut dirs = vec![root.to_string()];
    let mut queue = VecDeque::from([root.to_string()]);
    while let Some(dir) = queue.pop_front() {
        let children = session
            .list(&dir)
            .map_err(|source| IndexError::ListingFailed {
                path: dir.clone(),
                source,
            })?;
        for child in children {
            if !child.is_dir || child.is_special() {
                continue;
            }
            dirs.push(child.full_path.clone());
            queue.push_back(child.full_path);
            if dirs.len().is_multiple_of(BatchDefaults::DISCOVERY_LOG_EVERY) {
                debug!("Discovered {} directories so far", dirs.len());
            }
        }
    }
    Ok(dirs)
}
