//! In-memory remote tree with fault injection.
//!
//! Used by tests. Every session shares one tree; faults are armed per path
//! (listing failures), per transport (connect failures) or globally (kill all live sessions).

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{RemoteSession, RemoteTransport};
use crate::RemoteEntry;
use crate::engine::tools::join_remote;
use crate::error::{TransportError, TransportResult};

/// Armed listing failure for one path.
#[derive(Clone, Copy, Debug)]
struct ListFault {
    /// Successful listings to let through before failing.
    pass_first: u32,
    /// Transient failures left. Ignored when `permanent`.
    remaining: u32,
    permanent: bool,
}

#[derive(Default)]
struct Tree {
    /// dir path -> children in insertion (listing) order
    dirs: BTreeMap<String, Vec<RemoteEntry>>,
    list_faults: HashMap<String, ListFault>,
    connect_faults: u32,
    /// sessions born in an older epoch are dead
    epoch: u64,
}

#[derive(Default)]
struct Shared {
    tree: Mutex<Tree>,
    opened: AtomicUsize,
    open_now: AtomicUsize,
    list_calls: AtomicUsize,
}

/// Cloneable handle; clones share the same tree and counters.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

fn parent_and_name(path: &str) -> (String, String) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/".to_string(), trimmed[1..].to_string()),
        Some(i) => (trimmed[..i].to_string(), trimmed[i + 1..].to_string()),
        None => ("/".to_string(), trimmed.to_string()),
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        self.shared
            .tree
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_dir(tree: &mut Tree, path: &str) {
        if tree.dirs.contains_key(path) {
            return;
        }
        tree.dirs.insert(path.to_string(), Vec::new());
        if path == "/" {
            return;
        }
        let (parent, name) = parent_and_name(path);
        Self::ensure_dir(tree, &parent);
        if let Some(children) = tree.dirs.get_mut(&parent) {
            children.push(RemoteEntry {
                full_path: join_remote(&parent, &name),
                name,
                size: 0,
                modified_ms: 0,
                is_dir: true,
            });
        }
    }

    /// Create a directory (and any missing parents).
    pub fn add_dir(&self, path: &str) -> &Self {
        let trimmed = path.trim_end_matches('/');
        let dir = if trimmed.is_empty() { "/" } else { trimmed };
        let mut tree = self.tree();
        Self::ensure_dir(&mut tree, dir);
        self
    }

    /// Create a file (and any missing parent directories).
    pub fn add_file(&self, path: &str, size: u64, modified_ms: i64) -> &Self {
        let (parent, name) = parent_and_name(path);
        let mut tree = self.tree();
        Self::ensure_dir(&mut tree, &parent);
        if let Some(children) = tree.dirs.get_mut(&parent) {
            children.push(RemoteEntry::child_of(&parent, &name, size, modified_ms, false));
        }
        self
    }

    /// Add a raw entry to a directory's listing as-is (for malformed-entry tests).
    pub fn add_raw_entry(&self, dir: &str, entry: RemoteEntry) -> &Self {
        let mut tree = self.tree();
        Self::ensure_dir(&mut tree, dir);
        if let Some(children) = tree.dirs.get_mut(dir) {
            children.push(entry);
        }
        self
    }

    /// Listing `path` fails `times` times with a transient error, then succeeds.
    pub fn fail_listing(&self, path: &str, times: u32) -> &Self {
        self.fail_listing_after(path, 0, times)
    }

    /// Let `pass_first` listings of `path` succeed, then fail the next `times` transiently.
    pub fn fail_listing_after(&self, path: &str, pass_first: u32, times: u32) -> &Self {
        self.tree().list_faults.insert(
            path.to_string(),
            ListFault {
                pass_first,
                remaining: times,
                permanent: false,
            },
        );
        self
    }

    /// Listing `path` always fails with a non-transient error.
    pub fn fail_listing_permanently(&self, path: &str) -> &Self {
        self.tree().list_faults.insert(
            path.to_string(),
            ListFault {
                pass_first: 0,
                remaining: 0,
                permanent: true,
            },
        );
        self
    }

    /// The next `times` connects fail.
    pub fn fail_connects(&self, times: u32) -> &Self {
        self.tree().connect_faults = times;
        self
    }

    /// Kill every session opened so far (they stay "open" but fail liveness and calls).
    pub fn kill_sessions(&self) {
        self.tree().epoch += 1;
    }

    /// Total sessions ever opened.
    pub fn sessions_opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    /// Sessions currently open (not yet closed or dropped).
    pub fn sessions_open(&self) -> usize {
        self.shared.open_now.load(Ordering::SeqCst)
    }

    /// Total `list` calls across all sessions.
    pub fn list_calls(&self) -> usize {
        self.shared.list_calls.load(Ordering::SeqCst)
    }
}

impl RemoteTransport for MemoryTransport {
    type Session = MemorySession;

    fn connect(&self) -> TransportResult<MemorySession> {
        let epoch = {
            let mut tree = self.tree();
            if tree.connect_faults > 0 {
                tree.connect_faults -= 1;
                return Err(TransportError::Connect {
                    target: self.target(),
                    reason: "connection refused".to_string(),
                });
            }
            tree.epoch
        };
        let id = self.shared.opened.fetch_add(1, Ordering::SeqCst) + 1;
        self.shared.open_now.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            transport: self.clone(),
            id,
            epoch,
            closed: false,
        })
    }

    fn target(&self) -> String {
        "memory".to_string()
    }
}

/// Session over a [`MemoryTransport`] tree.
pub struct MemorySession {
    transport: MemoryTransport,
    /// 1-based connect order.
    id: usize,
    epoch: u64,
    closed: bool,
}

impl MemorySession {
    pub fn id(&self) -> usize {
        self.id
    }

    fn is_dead(&self) -> bool {
        self.closed || self.transport.tree().epoch != self.epoch
    }
}

impl RemoteSession for MemorySession {
    fn list(&mut self, path: &str) -> TransportResult<Vec<RemoteEntry>> {
        self.transport
            .shared
            .list_calls
            .fetch_add(1, Ordering::SeqCst);
        if self.is_dead() {
            return Err(TransportError::Closed("connection reset".to_string()));
        }
        let mut tree = self.transport.tree();
        if let Some(fault) = tree.list_faults.get_mut(path) {
            if fault.permanent {
                return Err(TransportError::List {
                    path: path.to_string(),
                    reason: "injected permanent failure".to_string(),
                    transient: false,
                });
            }
            if fault.pass_first > 0 {
                fault.pass_first -= 1;
            } else if fault.remaining > 0 {
                fault.remaining -= 1;
                return Err(TransportError::List {
                    path: path.to_string(),
                    reason: "injected I/O error".to_string(),
                    transient: true,
                });
            }
        }
        tree.dirs
            .get(path)
            .cloned()
            .ok_or_else(|| TransportError::NotFound {
                path: path.to_string(),
            })
    }

    fn is_alive(&mut self) -> bool {
        !self.is_dead()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.transport
                .shared
                .open_now
                .fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_and_name() {
        assert_eq!(
            parent_and_name("/data/a/x.pdf"),
            ("/data/a".to_string(), "x.pdf".to_string())
        );
        assert_eq!(
            parent_and_name("/data"),
            ("/".to_string(), "data".to_string())
        );
    }

    #[test]
    fn test_add_file_creates_parents() {
        let t = MemoryTransport::new();
        t.add_file("/data/a/x.pdf", 1024, 0);
        let mut s = t.connect().unwrap();
        let root = s.list("/data").unwrap();
        assert_eq!(root.len(), 1);
        assert!(root[0].is_dir);
        assert_eq!(root[0].full_path, "/data/a");
        let a = s.list("/data/a").unwrap();
        assert_eq!(a[0].full_path, "/data/a/x.pdf");
        assert_eq!(a[0].size, 1024);
    }

    #[test]
    fn test_killed_session_is_dead() {
        let t = MemoryTransport::new();
        t.add_dir("/data");
        let mut s = t.connect().unwrap();
        assert!(s.is_alive());
        t.kill_sessions();
        assert!(!s.is_alive());
        assert!(s.list("/data").is_err());
        assert_eq!(t.sessions_open(), 1);
        drop(s);
        assert_eq!(t.sessions_open(), 0);
    }

    #[test]
    fn test_fail_listing_after() {
        let t = MemoryTransport::new();
        t.add_dir("/data/c");
        t.fail_listing_after("/data/c", 1, 1);
        let mut s = t.connect().unwrap();
        assert!(s.list("/data/c").is_ok());
        let err = s.list("/data/c").unwrap_err();
        assert!(err.is_transient());
        assert!(s.list("/data/c").is_ok());
    }
}
