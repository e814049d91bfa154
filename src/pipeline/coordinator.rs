//! Pipeline coordinator: drives discovery, streaming, transform and persist for a run.
//!
//! ```text
//! IDLE -> DISCOVERING -> STREAMING -> DRAINING -> COMPLETED
//!             \______________\___________\------> FAILED | CANCELLED
//! ```
//!
//! Entries are pulled into fixed-size chunks, transformed on a worker pool, then written as
//! one bulk upsert. Persist calls are sequential, so at most one is outstanding per run.
//! Every chunk written stays written if a later one fails.

use log::{debug, error, info, warn};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use super::persist::BulkPersister;
use super::policy::{RetryPolicy, SkipPolicy};
use super::report::RunReport;
use super::source::DirectoryQueueSource;
use super::transform::Transformer;
use crate::engine::db_ops::DocumentStore;
use crate::error::{IndexError, Result};
use crate::pool::SessionPool;
use crate::transport::RemoteTransport;
use crate::types::{RemoteEntry, RunOpts, RunState, TransformOutcome};
use crate::utils::config::{BatchDefaults, RUN_SEQUENCE};

/// Identifier of a run, drawn from the store's run sequence.
pub type RunId = i64;

/// Called after each chunk with the live report.
pub type ChunkCallback = dyn Fn(&RunReport) + Send + Sync;

fn lock_report(live: &Mutex<RunReport>) -> MutexGuard<'_, RunReport> {
    live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn set_state(live: &Mutex<RunReport>, state: RunState) {
    let mut report = lock_report(live);
    if report.state != state {
        info!(
            "Run {}: {:?} -> {:?}",
            report.run_id, report.state, state
        );
        report.state = state;
    }
}

fn build_workers(workers: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("remdex-transform-{i}"))
        .build()
        .map_err(|e| IndexError::WorkerPool(e.to_string()))
}

/// One run's working set.
struct RunDriver<'a, T: RemoteTransport> {
    source: DirectoryQueueSource<'a, T>,
    transformer: Transformer,
    workers: ThreadPool,
    persister: BulkPersister,
    retry: RetryPolicy,
    skips: SkipPolicy,
    chunk_size: usize,
    live: &'a Mutex<RunReport>,
    cancel: &'a AtomicBool,
    on_chunk: Option<&'a ChunkCallback>,
}

impl<T: RemoteTransport> RunDriver<'_, T> {
    /// Pull one entry, retrying transient listing faults per the retry policy.
    fn pull(&mut self) -> Result<Option<RemoteEntry>> {
        let mut attempt = 0;
        loop {
            match self.source.next_entry() {
                Ok(next) => {
                    if self.source.is_discovered()
                        && lock_report(self.live).state == RunState::Discovering
                    {
                        lock_report(self.live).directories_total =
                            self.source.directories_total();
                        set_state(self.live, RunState::Streaming);
                    }
                    return Ok(next);
                }
                Err(err) => {
                    attempt += 1;
                    if !self.retry.should_retry(&err, attempt) {
                        return Err(err);
                    }
                    let wait = self.retry.backoff_for(attempt);
                    warn!(
                        "Attempt {}/{} failed: {}; retrying in {:?}",
                        attempt, self.retry.limit, err, wait
                    );
                    thread::sleep(wait);
                }
            }
        }
    }

    fn drive(&mut self) -> Result<()> {
        set_state(self.live, RunState::Discovering);
        let mut chunk = Vec::with_capacity(self.chunk_size);
        let mut exhausted = false;
        while !exhausted {
            if self.cancel.load(Ordering::Relaxed) {
                return Err(IndexError::Cancelled);
            }
            while chunk.len() < self.chunk_size {
                match self.pull()? {
                    Some(entry) => chunk.push(entry),
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }
            if exhausted {
                set_state(self.live, RunState::Draining);
            }
            if !chunk.is_empty() {
                self.process_chunk(&chunk)?;
                chunk.clear();
            }
        }
        Ok(())
    }

    fn process_chunk(&mut self, entries: &[RemoteEntry]) -> Result<()> {
        let outcomes = self.transformer.transform_chunk(&self.workers, entries);
        let mut records = Vec::with_capacity(entries.len());
        let mut filtered = 0;
        for outcome in outcomes {
            match outcome {
                Ok(TransformOutcome::Record(record)) => records.push(record),
                Ok(TransformOutcome::Filtered(_)) => filtered += 1,
                Err(err) => self.skips.record(err)?,
            }
        }

        let written = self.persister.persist(&records)?;
        for rejected in written.rejected {
            self.skips.record(rejected)?;
        }

        let snapshot = {
            let mut report = lock_report(self.live);
            report.processed += entries.len();
            report.filtered += filtered;
            report.indexed += written.completed;
            report.failed += written.failed;
            report.inserted += written.inserted;
            report.updated += written.updated;
            report.skipped = self.skips.skipped();
            report.chunks += 1;
            report.directories = self.source.directories_processed();
            report.peak_buffered = self.source.peak_buffered();
            report.refresh_timing();
            report.clone()
        };
        if let Some(cb) = self.on_chunk {
            cb(&snapshot);
        }
        Ok(())
    }
}

/// Execute one run to a terminal state, recording progress in `live`.
fn execute<T: RemoteTransport>(
    pool: &SessionPool<T>,
    store: Arc<dyn DocumentStore>,
    root: &str,
    opts: &RunOpts,
    cancel: &AtomicBool,
    live: &Mutex<RunReport>,
    on_chunk: Option<&ChunkCallback>,
) {
    let outcome = build_workers(opts.workers).and_then(|workers| {
        let mut driver = RunDriver {
            source: DirectoryQueueSource::new(pool, root, opts.acquire_timeout),
            transformer: Transformer::new(opts.filter),
            workers,
            persister: BulkPersister::new(store),
            retry: RetryPolicy::from(opts),
            skips: SkipPolicy::new(opts.skip_limit),
            chunk_size: opts.chunk_size.max(1),
            live,
            cancel,
            on_chunk,
        };
        let result = driver.drive();
        let mut report = lock_report(live);
        report.directories = driver.source.directories_processed();
        report.peak_buffered = driver.source.peak_buffered();
        report.skipped = driver.skips.skipped();
        result
    });

    let mut report = lock_report(live);
    match outcome {
        Ok(()) => report.finish(RunState::Completed, None),
        Err(IndexError::Cancelled) => {
            warn!("Run {} cancelled", report.run_id);
            report.finish(RunState::Cancelled, Some(&IndexError::Cancelled));
        }
        Err(err) => {
            error!("Run {} failed: {}", report.run_id, err);
            report.finish(RunState::Failed, Some(&err));
        }
    }
    info!(
        "Run {} {:?}: {} processed, {} indexed, {} failed, {} filtered, {} skipped ({} inserted, {} updated) across {} directories in {} ({:.1} files/s)",
        report.run_id,
        report.state,
        report.processed,
        report.indexed,
        report.failed,
        report.filtered,
        report.skipped,
        report.inserted,
        report.updated,
        report.directories,
        report.duration,
        report.throughput
    );
}

struct RunHandle {
    report: Mutex<RunReport>,
    cancel: AtomicBool,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl RunHandle {
    fn take_thread(&self) -> Option<JoinHandle<()>> {
        self.thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// Join the worker if it has not been joined yet. Records a panic as a failed run.
    fn join(&self, run_id: RunId) {
        if let Some(thread) = self.take_thread()
            && thread.join().is_err()
        {
            error!("Run {} thread panicked", run_id);
            lock_report(&self.report).finish(RunState::Failed, None);
        }
    }

    fn is_finished(&self) -> bool {
        self.thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .is_none_or(|thread| thread.is_finished())
    }
}

/// Starts runs and tracks them by id. Callers that need one run at a time serialise
/// `start` themselves.
pub struct Coordinator<T: RemoteTransport> {
    pool: Arc<SessionPool<T>>,
    store: Arc<dyn DocumentStore>,
    runs: Mutex<HashMap<RunId, Arc<RunHandle>>>,
}

impl<T: RemoteTransport + 'static> Coordinator<T> {
    pub fn new(pool: Arc<SessionPool<T>>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            pool,
            store,
            runs: Mutex::new(HashMap::new()),
        }
    }

    pub fn pool(&self) -> &Arc<SessionPool<T>> {
        &self.pool
    }

    fn runs(&self) -> MutexGuard<'_, HashMap<RunId, Arc<RunHandle>>> {
        self.runs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn next_run_id(&self) -> Result<RunId> {
        self.store
            .next_sequence(RUN_SEQUENCE)
            .map_err(IndexError::PersistFailed)
    }

    /// Run synchronously on the calling thread.
    pub fn run(
        &self,
        root: &str,
        opts: &RunOpts,
        cancel: &AtomicBool,
        on_chunk: Option<&ChunkCallback>,
    ) -> Result<RunReport> {
        let run_id = self.next_run_id()?;
        info!("Starting run {} for {}", run_id, root);
        let live = Mutex::new(RunReport::new(run_id, root));
        execute(
            &self.pool,
            Arc::clone(&self.store),
            root,
            opts,
            cancel,
            &live,
            on_chunk,
        );
        Ok(live.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    /// Runs currently tracked, in flight or finished.
    pub fn tracked_runs(&self) -> usize {
        self.runs().len()
    }

    /// Drop the oldest finished runs beyond `BatchDefaults::RETAINED_RUNS`, joining their
    /// threads.
    fn prune_finished(&self) {
        let stale: Vec<(RunId, Arc<RunHandle>)> = {
            let mut runs = self.runs();
            let mut finished: Vec<RunId> = runs
                .iter()
                .filter(|(_, handle)| handle.is_finished())
                .map(|(id, _)| *id)
                .collect();
            if finished.len() <= BatchDefaults::RETAINED_RUNS {
                return;
            }
            finished.sort_unstable();
            finished.truncate(finished.len() - BatchDefaults::RETAINED_RUNS);
            finished
                .into_iter()
                .filter_map(|id| runs.remove(&id).map(|handle| (id, handle)))
                .collect()
        };
        for (run_id, handle) in stale {
            handle.join(run_id);
            debug!("Dropped finished run {}", run_id);
        }
    }

    /// Start a run on a background thread and return its id. Finished runs beyond the
    /// retention limit are dropped first.
    pub fn start(&self, root: &str, opts: RunOpts) -> Result<RunId> {
        self.prune_finished();
        let run_id = self.next_run_id()?;
        info!("Starting run {} for {}", run_id, root);
        let handle = Arc::new(RunHandle {
            report: Mutex::new(RunReport::new(run_id, root)),
            cancel: AtomicBool::new(false),
            thread: Mutex::new(None),
        });

        let pool = Arc::clone(&self.pool);
        let store = Arc::clone(&self.store);
        let root = root.to_string();
        let worker = Arc::clone(&handle);
        let thread = thread::Builder::new()
            .name(format!("remdex-run-{run_id}"))
            .spawn(move || {
                execute(
                    &pool,
                    store,
                    &root,
                    &opts,
                    &worker.cancel,
                    &worker.report,
                    None,
                );
            })
            .map_err(|e| IndexError::WorkerPool(e.to_string()))?;

        *handle
            .thread
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(thread);
        self.runs().insert(run_id, handle);
        Ok(run_id)
    }

    /// Snapshot of a run's report, `None` for an unknown id.
    pub fn status(&self, run_id: RunId) -> Option<RunReport> {
        let handle = self.runs().get(&run_id).cloned()?;
        let mut report = lock_report(&handle.report).clone();
        if !report.state.is_terminal() {
            report.refresh_timing();
        }
        Some(report)
    }

    /// Request cancellation; takes effect between chunks. False if the run is unknown or
    /// already finished.
    pub fn cancel(&self, run_id: RunId) -> bool {
        let Some(handle) = self.runs().get(&run_id).cloned() else {
            return false;
        };
        if lock_report(&handle.report).state.is_terminal() {
            return false;
        }
        handle.cancel.store(true, Ordering::Relaxed);
        info!("Cancellation requested for run {}", run_id);
        true
    }

    /// Block until the run finishes and return its final report.
    pub fn wait(&self, run_id: RunId) -> Option<RunReport> {
        let handle = self.runs().get(&run_id).cloned()?;
        handle.join(run_id);
        Some(lock_report(&handle.report).clone())
    }
}

/// Convenience: one synchronous run against `pool` and `store`.
pub fn run_indexing<T: RemoteTransport + 'static>(
    pool: Arc<SessionPool<T>>,
    store: Arc<dyn DocumentStore>,
    root: &str,
    opts: &RunOpts,
) -> Result<RunReport> {
    let cancel = AtomicBool::new(false);
    Coordinator::new(pool, store).run(root, opts, &cancel, None)
}
