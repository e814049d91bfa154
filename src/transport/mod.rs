//! Remote transport access
//!
//! The pool and pipeline only need four primitives from a backend: connect, list a
//! directory, probe liveness, close. Everything protocol-specific stays behind these
//! traits.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │               RemoteTransport                │
//! │  - connect() -> Session (expensive)          │
//! └──────────────────────┬───────────────────────┘
//!                        │ owned by SessionPool
//!                        ▼
//! ┌──────────────────────────────────────────────┐
//! │               RemoteSession                  │
//! │  - list(dir) -> Vec<RemoteEntry>             │
//! │  - is_alive() (cheap probe)                  │
//! │  - close()                                   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Backends: [`LocalTransport`] (a locally reachable tree, e.g. a mounted share),
//! `MemoryTransport` (in-memory tree with fault injection, feature `test-support`) and,
//! with the `sftp` feature, `SftpTransport`.

pub mod local;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
#[cfg(feature = "sftp")]
pub mod sftp;

pub use local::{LocalSession, LocalTransport};
#[cfg(any(test, feature = "test-support"))]
pub use memory::{MemorySession, MemoryTransport};
#[cfg(feature = "sftp")]
pub use sftp::{SftpSession, SftpTransport};

use crate::RemoteEntry;
use crate::error::TransportResult;

/// An open, authenticated connection. Not shared: one borrower at a time.
pub trait RemoteSession: Send {
    /// List the children of `path`. May include `.`/`..`; callers skip them.
    fn list(&mut self, path: &str) -> TransportResult<Vec<RemoteEntry>>;

    /// Cheap liveness probe (e.g. a trivial remote command).
    fn is_alive(&mut self) -> bool;

    /// Close the underlying connection. Idempotent.
    fn close(&mut self);
}

/// Factory for sessions against one remote endpoint.
pub trait RemoteTransport: Send + Sync {
    type Session: RemoteSession;

    /// Open a new session. Expensive; the pool calls this lazily.
    fn connect(&self) -> TransportResult<Self::Session>;

    /// Human-readable endpoint for logs (`host:port`, a directory, ...).
    fn target(&self) -> String;
}
