//! Session pool: bounded reuse of expensive remote sessions.
//!
//! - `session_pool`: acquire / release (RAII), lazy creation, validation, eviction sweep
//! - `evictor`: background thread driving the eviction sweep
//! - `monitor`: counters, utilisation and health classification

mod evictor;
pub mod monitor;
pub mod session_pool;

pub use monitor::{ExtendedPoolStats, PoolHealth, PoolStats};
pub use session_pool::{PooledSession, SessionPool};
