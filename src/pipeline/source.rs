//! Pull-based stream of file entries, one directory listing at a time.

use log::{debug, info};
use std::collections::VecDeque;
use std::time::Duration;

use super::discovery::{discover, normalize_root};
use crate::RemoteEntry;
use crate::error::{IndexError, Result};
use crate::pool::SessionPool;
use crate::transport::RemoteTransport;
use crate::utils::config::BatchDefaults;

/// Yields every non-directory entry under the root, directory by directory in discovery
/// order. Discovery runs on the first pull. Only the current directory's entries are
/// buffered, so memory is bounded by the largest single directory.
///
/// A failed pull leaves the source where it was: the next pull repeats the failed discovery
/// or re-lists the same directory. Directories are never skipped.
pub struct DirectoryQueueSource<'a, T: RemoteTransport> {
    pool: &'a SessionPool<T>,
    root: String,
    acquire_timeout: Duration,
    /// None until discovery succeeds.
    queue: Option<VecDeque<String>>,
    buffer: VecDeque<RemoteEntry>,
    directories_total: usize,
    directories_processed: usize,
    peak_buffered: usize,
}

impl<'a, T: RemoteTransport> DirectoryQueueSource<'a, T> {
    pub fn new(pool: &'a SessionPool<T>, root: &str, acquire_timeout: Duration) -> Self {
        Self {
            pool,
            root: normalize_root(root),
            acquire_timeout,
            queue: None,
            buffer: VecDeque::new(),
            directories_total: 0,
            directories_processed: 0,
            peak_buffered: 0,
        }
    }

    pub fn is_discovered(&self) -> bool {
        self.queue.is_some()
    }

    pub fn directories_total(&self) -> usize {
        self.directories_total
    }

    pub fn directories_processed(&self) -> usize {
        self.directories_processed
    }

    /// Largest number of entries held at once.
    pub fn peak_buffered(&self) -> usize {
        self.peak_buffered
    }

    /// Next file entry, `Ok(None)` at end of sequence.
    pub fn next_entry(&mut self) -> Result<Option<RemoteEntry>> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Ok(Some(entry));
            }

            let next_dir = match &self.queue {
                None => {
                    let dirs = discover(self.pool, &self.root, self.acquire_timeout)?;
                    self.directories_total = dirs.len();
                    self.queue = Some(dirs.into());
                    continue;
                }
                Some(queue) => queue.front().cloned(),
            };
            let Some(dir) = next_dir else {
                return Ok(None);
            };

            let files = self.list_files(&dir)?;
            if let Some(queue) = self.queue.as_mut() {
                queue.pop_front();
            }
            self.directories_processed += 1;
            self.buffer.extend(files);
            self.peak_buffered = self.peak_buffered.max(self.buffer.len());

            if self
                .directories_processed
                .is_multiple_of(BatchDefaults::PROGRESS_EVERY_DIRS)
            {
                info!(
                    "Processed {}/{} directories",
                    self.directories_processed, self.directories_total
                );
            }
        }
    }

    /// One session, one listing call; the session goes back to the pool on return.
    fn list_files(&self, dir: &str) -> Result<Vec<RemoteEntry>> {
        let mut session = self.pool.acquire(self.acquire_timeout)?;
        let entries = session
            .list(dir)
            .map_err(|source| IndexError::ListingFailed {
                path: dir.to_string(),
                source,
            })?;
        let files: Vec<RemoteEntry> = entries
            .into_iter()
            .filter(|e| !e.is_dir && !e.is_special())
            .collect();
        debug!("Listed {}: {} file(s)", dir, files.len());
        Ok(files)
    }
}

impl<T: RemoteTransport> Iterator for DirectoryQueueSource<'_, T> {
    type Item = Result<RemoteEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
