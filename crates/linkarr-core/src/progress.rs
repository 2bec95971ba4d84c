use crate::outcome::FileOutcome;
use std::path::Path;

/// Trait for reporting synchronization progress.
///
/// The CLI implements it with an indicatif spinner. All methods have default no-op implementations
/// and may be called from worker threads.
pub trait SyncReporter: Send + Sync {
    fn on_index_built(&self, _links: usize, _duration_secs: f64) {}
    fn on_sync_start(&self) {}
    fn on_file_done(&self, _source: &Path, _outcome: &FileOutcome) {}
    fn on_sync_complete(&self, _files_seen: usize, _duration_secs: f64) {}
    fn on_reconcile_complete(&self, _removed: usize, _pending: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl SyncReporter for SilentReporter {}
