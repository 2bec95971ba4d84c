use crate::outcome::SkipReason;
use std::path::{Path, PathBuf};

/// Outcome for one source path. At most one record exists per source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedFileRecord {
    pub source_path: PathBuf,
    pub destination_path: Option<PathBuf>,
    pub canonical_id: Option<String>,
    pub season: Option<u32>,
    pub skip_reason: Option<SkipReason>,
}

impl ProcessedFileRecord {
    pub fn linked(
        source: &Path,
        destination: &Path,
        canonical_id: Option<String>,
        season: Option<u32>,
    ) -> Self {
        ProcessedFileRecord {
            source_path: source.to_path_buf(),
            destination_path: Some(destination.to_path_buf()),
            canonical_id,
            season,
            skip_reason: None,
        }
    }

    pub fn skipped(
        source: &Path,
        reason: SkipReason,
        canonical_id: Option<String>,
        season: Option<u32>,
    ) -> Self {
        ProcessedFileRecord {
            source_path: source.to_path_buf(),
            destination_path: None,
            canonical_id,
            season,
            skip_reason: Some(reason),
        }
    }
}

/// Counts reported by `--status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateStats {
    pub total_records: i64,
    pub linked_records: i64,
    pub skipped_records: i64,
    pub tracked_links: i64,
}
