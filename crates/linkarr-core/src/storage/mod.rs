pub mod models;
pub mod queries;
pub mod sqlite;
pub mod transfer;

pub use models::{ProcessedFileRecord, StateStats};
pub use sqlite::Database;

use crate::error::Error;
use crate::outcome::SkipReason;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Durable per-source outcomes, consulted for dedup and idempotence.
///
/// Implementations must serialize writes; the engine calls these from every worker.
pub trait StateRecorder: Send + Sync {
    /// Insert or replace the record keyed by its source path.
    fn upsert(&self, record: &ProcessedFileRecord) -> Result<(), Error>;

    fn record_for(&self, source: &Path) -> Result<Option<ProcessedFileRecord>, Error>;

    fn destination_for(&self, source: &Path) -> Result<Option<PathBuf>, Error>;

    fn skip_reason_for(&self, source: &Path) -> Result<Option<SkipReason>, Error>;

    /// Destination of a link previously created for `source`.
    fn find_by_symlink_target(&self, source: &Path) -> Result<Option<PathBuf>, Error>;

    fn load_all_processed(&self) -> Result<HashSet<PathBuf>, Error>;

    /// Remember that `destination` is a link to `target`.
    fn record_link(&self, destination: &Path, target: &Path) -> Result<(), Error>;

    fn forget_link(&self, destination: &Path) -> Result<(), Error>;

    /// Persisted (destination, target) pairs, used as the watch-mode destination index.
    fn destination_links(&self) -> Result<Vec<(PathBuf, PathBuf)>, Error>;

    fn records_with_destination(&self) -> Result<Vec<ProcessedFileRecord>, Error>;

    fn remove(&self, source: &Path) -> Result<(), Error>;

    fn stats(&self) -> Result<StateStats, Error>;
}

impl StateRecorder for Database {
    fn upsert(&self, record: &ProcessedFileRecord) -> Result<(), Error> {
        Ok(self.upsert_processed(record)?)
    }

    fn record_for(&self, source: &Path) -> Result<Option<ProcessedFileRecord>, Error> {
        Ok(self.get_processed(source)?)
    }

    fn destination_for(&self, source: &Path) -> Result<Option<PathBuf>, Error> {
        Ok(self
            .get_processed(source)?
            .and_then(|record| record.destination_path))
    }

    fn skip_reason_for(&self, source: &Path) -> Result<Option<SkipReason>, Error> {
        Ok(self
            .get_processed(source)?
            .and_then(|record| record.skip_reason))
    }

    fn find_by_symlink_target(&self, source: &Path) -> Result<Option<PathBuf>, Error> {
        Ok(self.find_link_by_target(source)?)
    }

    fn load_all_processed(&self) -> Result<HashSet<PathBuf>, Error> {
        Ok(self.get_processed_sources()?)
    }

    fn record_link(&self, destination: &Path, target: &Path) -> Result<(), Error> {
        Ok(self.upsert_destination_link(destination, target)?)
    }

    fn forget_link(&self, destination: &Path) -> Result<(), Error> {
        Ok(self.delete_destination_link(destination)?)
    }

    fn destination_links(&self) -> Result<Vec<(PathBuf, PathBuf)>, Error> {
        Ok(self.get_destination_links()?)
    }

    fn records_with_destination(&self) -> Result<Vec<ProcessedFileRecord>, Error> {
        Ok(self.get_records_with_destination()?)
    }

    fn remove(&self, source: &Path) -> Result<(), Error> {
        Ok(self.delete_processed(source)?)
    }

    fn stats(&self) -> Result<StateStats, Error> {
        Ok(self.get_stats()?)
    }
}
