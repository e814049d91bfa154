//! Verbose-mode counter: files processed, with directory progress as postfix.

use kdam::{Animation, Bar, BarExt};
use std::sync::Mutex;

use crate::pipeline::RunReport;

/// Counter bar fed from the coordinator's per-chunk callback. Total is unknown up front.
pub struct RunProgress {
    bar: Mutex<Bar>,
}

impl RunProgress {
    pub fn new(desc: &'static str) -> Self {
        let mut bar = kdam::tqdm!(
            total = 0,
            desc = desc,
            animation = Animation::Classic,
            position = 0,
            unit = " files"
        );
        // show "0 files" before the first chunk lands
        let _ = bar.refresh();
        Self {
            bar: Mutex::new(bar),
        }
    }

    /// Move to the report's running totals. Skips the update if another thread holds the bar.
    pub fn on_chunk(&self, report: &RunReport) {
        let Ok(mut bar) = self.bar.try_lock() else {
            return;
        };
        bar.set_postfix(format!(
            "dirs={}/{}",
            report.directories, report.directories_total
        ));
        let delta = report.processed.saturating_sub(bar.counter);
        if delta > 0 {
            let _ = bar.update(delta);
        } else {
            let _ = bar.refresh();
        }
    }

    /// Files counted so far.
    pub fn count(&self) -> usize {
        self.bar.lock().map(|bar| bar.counter).unwrap_or(0)
    }

    /// Final refresh, then a newline so the summary starts on a clean line.
    pub fn finish(&self) {
        if let Ok(mut bar) = self.bar.lock() {
            let _ = bar.refresh();
            eprintln!();
        }
    }
}
