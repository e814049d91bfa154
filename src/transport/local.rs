//! Sessions over a locally reachable tree (mounted NFS/SMB share, local disk).
//!
//! Remote paths are absolute (`/data/a`) and resolved under the transport's base
//! directory, so the same root string works for every backend.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

use super::{RemoteSession, RemoteTransport};
use crate::RemoteEntry;
use crate::error::{TransportError, TransportResult};

/// Transport rooted at a local directory.
#[derive(Clone, Debug)]
pub struct LocalTransport {
    base: PathBuf,
}

impl LocalTransport {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl RemoteTransport for LocalTransport {
    type Session = LocalSession;

    fn connect(&self) -> TransportResult<LocalSession> {
        if !self.base.is_dir() {
            return Err(TransportError::Connect {
                target: self.target(),
                reason: "base directory not readable".to_string(),
            });
        }
        Ok(LocalSession {
            base: self.base.clone(),
            open: true,
        })
    }

    fn target(&self) -> String {
        self.base.display().to_string()
    }
}

/// One "session" over the local tree. Holds no OS resources; tracks open/closed only.
#[derive(Debug)]
pub struct LocalSession {
    base: PathBuf,
    open: bool,
}

impl LocalSession {
    fn resolve(&self, remote: &str) -> PathBuf {
        self.base.join(remote.trim_start_matches('/'))
    }
}

/// Signed millis since epoch; pre-1970 times come out negative.
fn epoch_ms(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => i64::try_from(before.duration().as_millis())
            .map(|ms| -ms)
            .unwrap_or(RemoteEntry::UNKNOWN_MTIME + 1),
    }
}

fn map_walk_error(path: &str, err: walkdir::Error) -> TransportError {
    let reason = err.to_string();
    match err.io_error().map(|e| e.kind()) {
        Some(ErrorKind::NotFound) => TransportError::NotFound {
            path: path.to_string(),
        },
        Some(ErrorKind::PermissionDenied) => TransportError::PermissionDenied {
            path: path.to_string(),
        },
        Some(ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
            TransportError::List {
                path: path.to_string(),
                reason,
                transient: true,
            }
        }
        _ => TransportError::List {
            path: path.to_string(),
            reason,
            transient: false,
        },
    }
}

impl RemoteSession for LocalSession {
    fn list(&mut self, path: &str) -> TransportResult<Vec<RemoteEntry>> {
        if !self.open {
            return Err(TransportError::Closed("local session closed".to_string()));
        }
        let local = self.resolve(path);
        let mut entries = Vec::new();
        for item in WalkDir::new(&local)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name()
        {
            let item = item.map_err(|e| map_walk_error(path, e))?;
            let name = item.file_name().to_string_lossy().into_owned();
            let meta = item.metadata().map_err(|e| map_walk_error(path, e))?;
            let modified_ms = meta
                .modified()
                .map(epoch_ms)
                .unwrap_or(RemoteEntry::UNKNOWN_MTIME);
            entries.push(RemoteEntry::child_of(
                path,
                &name,
                meta.len(),
                modified_ms,
                item.file_type().is_dir(),
            ));
        }
        Ok(entries)
    }

    fn is_alive(&mut self) -> bool {
        self.open && self.base.is_dir()
    }

    fn close(&mut self) {
        self.open = false;
    }
}
