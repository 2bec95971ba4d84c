use indicatif::{ProgressBar, ProgressStyle};
use linkarr_core::{FileOutcome, SyncReporter};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Spinner with a running file count while a pass is in flight.
pub struct CliReporter {
    bar: Mutex<Option<ProgressBar>>,
    done: AtomicUsize,
}

impl CliReporter {
    pub fn new() -> Self {
        Self {
            bar: Mutex::new(None),
            done: AtomicUsize::new(0),
        }
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn finish_bar(&self) {
        if let Some(pb) = self.bar().take() {
            pb.finish_and_clear();
        }
    }
}

impl SyncReporter for CliReporter {
    fn on_index_built(&self, links: usize, duration_secs: f64) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Destination index: {} links in {:.2}s",
            links, duration_secs
        );
    }

    fn on_sync_start(&self) {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
        }
        pb.set_message("Synchronizing...");
        pb.enable_steady_tick(Duration::from_millis(80));
        let mut guard = self.bar();
        if let Some(old) = guard.replace(pb) {
            old.finish_and_clear();
        }
    }

    fn on_file_done(&self, _source: &Path, outcome: &FileOutcome) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(pb) = self.bar().as_ref() {
            match outcome {
                FileOutcome::Linked { destination, .. } => pb.set_message(format!(
                    "Synchronizing... {} files ({})",
                    done,
                    destination.display()
                )),
                _ => pb.set_message(format!("Synchronizing... {} files", done)),
            }
        }
    }

    fn on_sync_complete(&self, files_seen: usize, duration_secs: f64) {
        self.finish_bar();
        eprintln!(
            "  \x1b[32m✓\x1b[0m Synchronization complete: {} files in {:.2}s",
            files_seen, duration_secs
        );
    }

    fn on_reconcile_complete(&self, removed: usize, pending: usize) {
        eprintln!(
            "  \x1b[32m✓\x1b[0m Reconciliation complete: {} stale records removed, {} links pending",
            removed, pending
        );
    }
}
