//! Run report: counts, timings and failure context for one indexing run.

use serde::Serialize;
use std::error::Error;

use crate::engine::tools::{format_duration_ms, now_ms, truncate_chars};
use crate::types::RunState;
use crate::utils::config::{BatchDefaults, FilterDefaults};

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub run_id: i64,
    pub root: String,
    pub state: RunState,
    /// File entries pulled from the source.
    pub processed: usize,
    /// Records written with status `COMPLETED`.
    pub indexed: usize,
    /// Records written with status `FAILED`.
    pub failed: usize,
    /// Entries dropped by a filter.
    pub filtered: usize,
    /// Entry-scoped errors tolerated by the skip policy.
    pub skipped: usize,
    pub inserted: usize,
    pub updated: usize,
    pub directories: usize,
    pub directories_total: usize,
    pub chunks: usize,
    pub peak_buffered: usize,
    pub started_at_ms: i64,
    pub finished_at_ms: Option<i64>,
    pub duration_ms: u64,
    pub duration: String,
    /// Files per second.
    pub throughput: f64,
    pub error: Option<String>,
    pub error_context: Option<String>,
}

impl RunReport {
    pub fn new(run_id: i64, root: &str) -> Self {
        Self {
            run_id,
            root: root.to_string(),
            state: RunState::Idle,
            processed: 0,
            indexed: 0,
            failed: 0,
            filtered: 0,
            skipped: 0,
            inserted: 0,
            updated: 0,
            directories: 0,
            directories_total: 0,
            chunks: 0,
            peak_buffered: 0,
            started_at_ms: now_ms(),
            finished_at_ms: None,
            duration_ms: 0,
            duration: format_duration_ms(0),
            throughput: 0.0,
            error: None,
            error_context: None,
        }
    }

    /// Records the store now holds from this run.
    pub fn persisted(&self) -> usize {
        self.indexed + self.failed
    }

    pub(crate) fn refresh_timing(&mut self) {
        let end = self.finished_at_ms.unwrap_or_else(now_ms);
        self.duration_ms = end.saturating_sub(self.started_at_ms).max(0) as u64;
        self.duration = format_duration_ms(self.duration_ms);
        self.throughput = if self.duration_ms > 0 {
            self.processed as f64 / (self.duration_ms as f64 / 1000.0)
        } else {
            0.0
        };
    }

    pub(crate) fn finish(&mut self, state: RunState, err: Option<&(dyn Error + 'static)>) {
        self.state = state;
        self.finished_at_ms = Some(now_ms());
        if let Some(err) = err {
            self.error = Some(truncate_chars(
                &err.to_string(),
                FilterDefaults::MAX_ERROR_LEN,
            ));
            self.error_context = Some(error_context(err, BatchDefaults::ERROR_CONTEXT_LINES));
        }
        self.refresh_timing();
    }
}

/// The error and its source chain, one per line, capped at `max_lines`.
pub fn error_context(err: &(dyn Error + 'static), max_lines: usize) -> String {
    let mut lines = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        lines.push(format!("Caused by: {cause}"));
        source = cause.source();
    }
    if lines.len() > max_lines {
        let more = lines.len() - max_lines;
        lines.truncate(max_lines);
        lines.push(format!("... ({more} more lines)"));
    }
    lines.join("\n")
}
