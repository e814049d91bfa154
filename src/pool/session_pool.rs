//! Bounded, lazily-filled session pool.
//!
//! Sessions are expensive to open, so the pool keeps returned ones idle and hands them
//! out again (most recently returned first). A slot is reserved before a new session is
//! connected, which keeps `active + idle <= max_size` at every instant, including while
//! a connect or a validation probe is in flight.

use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::evictor::Evictor;
use super::monitor::{self, ExtendedPoolStats, PoolStats};
use crate::RemoteEntry;
use crate::error::{IndexError, Result, TransportError, TransportResult};
use crate::transport::{RemoteSession, RemoteTransport};
use crate::types::PoolOpts;

struct IdleSession<S> {
    session: S,
    idle_since: Instant,
}

struct PoolState<S> {
    /// Back is the most recently returned session, front the coldest.
    idle: VecDeque<IdleSession<S>>,
    /// Sessions handed out, being connected, or under validation.
    active: usize,
    closed: bool,
}

#[derive(Default)]
struct Counters {
    created: AtomicU64,
    destroyed: AtomicU64,
    borrows: AtomicU64,
    returns: AtomicU64,
    failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn reset(&self) {
        for c in [
            &self.created,
            &self.destroyed,
            &self.borrows,
            &self.returns,
            &self.failures,
        ] {
            c.store(0, Ordering::Relaxed);
        }
    }
}

/// Pool of sessions against one transport. Shared as `Arc<SessionPool<T>>`.
pub struct SessionPool<T: RemoteTransport> {
    transport: T,
    opts: PoolOpts,
    state: Mutex<PoolState<T::Session>>,
    available: Condvar,
    counters: Counters,
    evictor: Mutex<Option<Evictor>>,
}

impl<T: RemoteTransport + 'static> SessionPool<T> {
    /// Build the pool, pre-create `initial_size` sessions and start the evictor (if configured).
    /// Pre-creation failures are logged; the pool fills lazily instead.
    pub fn new(transport: T, opts: PoolOpts) -> Arc<Self> {
        let max_size = opts.max_size.max(1);
        let opts = PoolOpts { max_size, ..opts };
        let pool = Arc::new(Self {
            transport,
            state: Mutex::new(PoolState {
                idle: VecDeque::with_capacity(max_size),
                active: 0,
                closed: false,
            }),
            available: Condvar::new(),
            counters: Counters::default(),
            evictor: Mutex::new(None),
            opts,
        });

        pool.prefill();

        if let Some(interval) = pool.opts.eviction_interval {
            match Evictor::spawn(Arc::downgrade(&pool), interval) {
                Ok(evictor) => {
                    *pool
                        .evictor
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(evictor);
                }
                Err(e) => warn!("Could not start idle-session evictor: {}", e),
            }
        }

        info!(
            "Session pool initialized for {} (max={}, min_idle={}, initial={}, max_wait={:?})",
            pool.transport.target(),
            pool.opts.max_size,
            pool.opts.min_idle,
            pool.opts.initial_size,
            pool.opts.max_wait
        );
        pool
    }
}

impl<T: RemoteTransport> SessionPool<T> {
    fn lock_state(&self) -> MutexGuard<'_, PoolState<T::Session>> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn prefill(&self) {
        let target = self.opts.initial_size.min(self.opts.max_size);
        for _ in 0..target {
            match self.transport.connect() {
                Ok(session) => {
                    Counters::bump(&self.counters.created);
                    self.lock_state().idle.push_back(IdleSession {
                        session,
                        idle_since: Instant::now(),
                    });
                }
                Err(e) => {
                    Counters::bump(&self.counters.failures);
                    warn!("Failed to pre-create session: {}", e);
                }
            }
        }
    }

    fn destroy(&self, mut session: T::Session) {
        session.close();
        Counters::bump(&self.counters.destroyed);
    }

    pub fn opts(&self) -> &PoolOpts {
        &self.opts
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Borrow a session with the pool's default `max_wait`.
    pub fn get(&self) -> Result<PooledSession<'_, T>> {
        self.acquire(self.opts.max_wait)
    }

    /// Borrow a session, waiting up to `timeout` for a free slot.
    ///
    /// Order of preference: most recently returned idle session (validated first when
    /// `test_on_borrow`), then a newly connected one if under capacity, then wait. A
    /// session that fails validation is destroyed and never handed out. A timeout too large
    /// to form a deadline (`Duration::MAX`) waits without one.
    pub fn acquire(&self, timeout: Duration) -> Result<PooledSession<'_, T>> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.lock_state();
        loop {
            if state.closed {
                return Err(IndexError::PoolClosed);
            }

            if let Some(idle) = state.idle.pop_back() {
                state.active += 1;
                drop(state);
                let mut session = idle.session;
                if !self.opts.test_on_borrow || session.is_alive() {
                    Counters::bump(&self.counters.borrows);
                    debug!("Borrowed idle session from {}", self.transport.target());
                    return Ok(PooledSession::new(self, session));
                }
                warn!(
                    "Idle session to {} failed validation, destroying it",
                    self.transport.target()
                );
                self.destroy(session);
                state = self.lock_state();
                state.active -= 1;
                self.available.notify_one();
                continue;
            }

            if state.active + state.idle.len() < self.opts.max_size {
                state.active += 1;
                drop(state);
                return match self.transport.connect() {
                    Ok(session) => {
                        Counters::bump(&self.counters.created);
                        Counters::bump(&self.counters.borrows);
                        debug!("Created new session to {}", self.transport.target());
                        Ok(PooledSession::new(self, session))
                    }
                    Err(e) => {
                        {
                            let mut state = self.lock_state();
                            state.active -= 1;
                        }
                        self.available.notify_one();
                        Counters::bump(&self.counters.failures);
                        error!("Failed to create session: {}", e);
                        Err(IndexError::SessionCreationFailed(e))
                    }
                };
            }

            let Some(deadline) = deadline else {
                state = self
                    .available
                    .wait(state)
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                continue;
            };
            let now = Instant::now();
            if now >= deadline {
                Counters::bump(&self.counters.failures);
                warn!(
                    "Session pool exhausted after {:?} ({} active, max {})",
                    timeout, state.active, self.opts.max_size
                );
                return Err(IndexError::PoolExhausted { waited: timeout });
            }
            state = self
                .available
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .0;
        }
    }

    fn release(&self, session: T::Session, broken: bool) {
        Counters::bump(&self.counters.returns);
        if broken {
            debug!("Discarding broken session to {}", self.transport.target());
            self.destroy(session);
            self.lock_state().active -= 1;
        } else {
            let mut state = self.lock_state();
            state.active -= 1;
            if state.closed {
                drop(state);
                self.destroy(session);
            } else {
                state.idle.push_back(IdleSession {
                    session,
                    idle_since: Instant::now(),
                });
                debug!("Returned session to {}", self.transport.target());
            }
        }
        self.available.notify_one();
    }

    /// One eviction sweep: destroy sessions idle longer than `min_evictable_idle` (never
    /// dropping below `min_idle`), then validate up to `tests_per_eviction_run` of the
    /// coldest remaining idle sessions when `test_while_idle`. Returns sessions destroyed.
    pub fn evict_idle(&self) -> usize {
        let now = Instant::now();
        let mut expired = Vec::new();
        let mut to_test = Vec::new();
        {
            let mut state = self.lock_state();
            if state.closed {
                return 0;
            }
            while state.idle.len() > self.opts.min_idle
                && state
                    .idle
                    .front()
                    .is_some_and(|s| now.duration_since(s.idle_since) >= self.opts.min_evictable_idle)
            {
                if let Some(s) = state.idle.pop_front() {
                    expired.push(s);
                }
            }
            if self.opts.test_while_idle {
                let n = self.opts.tests_per_eviction_run.min(state.idle.len());
                to_test.extend(state.idle.drain(..n));
            }
            // sessions under maintenance hold their slot until we are done
            state.active += expired.len() + to_test.len();
        }

        let in_maintenance = expired.len() + to_test.len();
        let mut destroyed = expired.len();
        for s in expired {
            self.destroy(s.session);
        }
        let mut survivors = Vec::with_capacity(to_test.len());
        for mut s in to_test {
            if s.session.is_alive() {
                survivors.push(s);
            } else {
                warn!("Idle session failed validation during eviction, destroying it");
                self.destroy(s.session);
                destroyed += 1;
            }
        }

        {
            let mut state = self.lock_state();
            state.active -= in_maintenance;
            if state.closed {
                drop(state);
                destroyed += survivors.len();
                for s in survivors {
                    self.destroy(s.session);
                }
            } else {
                for s in survivors.into_iter().rev() {
                    state.idle.push_front(s);
                }
            }
        }
        self.available.notify_all();

        debug!(
            "Eviction sweep: destroyed {} idle session(s) of {}",
            destroyed,
            self.transport.target()
        );
        monitor::check_health(&self.extended_stats());
        destroyed
    }

    /// Force an eviction sweep now.
    pub fn evict_now(&self) -> usize {
        self.evict_idle()
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.lock_state();
        PoolStats {
            active: state.active,
            idle: state.idle.len(),
            max_total: self.opts.max_size,
            created: self.counters.created.load(Ordering::Relaxed),
            destroyed: self.counters.destroyed.load(Ordering::Relaxed),
        }
    }

    pub fn extended_stats(&self) -> ExtendedPoolStats {
        ExtendedPoolStats::new(
            self.stats(),
            self.counters.borrows.load(Ordering::Relaxed),
            self.counters.returns.load(Ordering::Relaxed),
            self.counters.failures.load(Ordering::Relaxed),
        )
    }

    pub fn is_healthy(&self) -> bool {
        self.extended_stats().is_healthy()
    }

    pub fn log_stats(&self) {
        monitor::log_stats(&self.extended_stats());
    }

    /// Zero the lifetime counters (created, destroyed, borrows, returns, failures).
    pub fn reset_counters(&self) {
        self.counters.reset();
        info!("Session pool counters reset");
    }

    pub fn is_closed(&self) -> bool {
        self.lock_state().closed
    }

    /// Close the pool: stop the evictor, destroy idle sessions and fail pending and future
    /// acquires with `PoolClosed`. Borrowed sessions are destroyed when returned. Idempotent.
    pub fn close(&self) {
        let evictor = self
            .evictor
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(evictor) = evictor {
            evictor.stop();
        }

        let drained: Vec<_> = {
            let mut state = self.lock_state();
            if state.closed {
                return;
            }
            state.closed = true;
            state.idle.drain(..).collect()
        };
        self.available.notify_all();
        let count = drained.len();
        for s in drained {
            self.destroy(s.session);
        }
        info!(
            "Session pool for {} closed ({} idle session(s) destroyed)",
            self.transport.target(),
            count
        );
    }
}

impl<T: RemoteTransport> Drop for SessionPool<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// A borrowed session. Returned to the pool when dropped, on every exit path.
pub struct PooledSession<'a, T: RemoteTransport> {
    session: Option<T::Session>,
    pool: &'a SessionPool<T>,
    broken: bool,
}

impl<'a, T: RemoteTransport> PooledSession<'a, T> {
    fn new(pool: &'a SessionPool<T>, session: T::Session) -> Self {
        Self {
            session: Some(session),
            pool,
            broken: false,
        }
    }

    /// List `path`. A connection-level failure marks the session broken so it is
    /// destroyed instead of returned.
    pub fn list(&mut self, path: &str) -> TransportResult<Vec<RemoteEntry>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| TransportError::Closed("session already released".to_string()))?;
        let result = session.list(path);
        if let Err(e) = &result
            && e.is_connection_fault()
        {
            self.broken = true;
        }
        result
    }

    pub fn is_alive(&mut self) -> bool {
        self.session.as_mut().is_some_and(|s| s.is_alive())
    }

    /// The underlying session.
    pub fn session(&self) -> Option<&T::Session> {
        self.session.as_ref()
    }

    /// Destroy this session on release instead of returning it to the idle set.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }
}

impl<T: RemoteTransport> Drop for PooledSession<'_, T> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session, self.broken);
        }
    }
}
