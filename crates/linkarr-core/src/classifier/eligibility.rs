use super::Classifier;
use crate::config::AppConfig;
use crate::outcome::SkipReason;
use crate::task::ProcessingTask;
use std::fs;
use std::io;
use std::path::Path;

/// Extensions whose size is meaningful; subtitles and `.strm` stubs are always small.
const SIZE_CHECKED_EXTENSIONS: &[&str] = &[
    "mkv", "mp4", "avi", "mov", "m4v", "wmv", "mpg", "mpeg", "ts", "m2ts", "webm", "divx",
];

/// Cheap checks that reject a file before classification or resolution.
pub struct EligibilityFilter<'a> {
    config: &'a AppConfig,
    classifier: &'a Classifier,
}

impl<'a> EligibilityFilter<'a> {
    pub fn new(config: &'a AppConfig, classifier: &'a Classifier) -> Self {
        Self { config, classifier }
    }

    /// Type and user-skip checks. These run before dedup so that a rejected file
    /// is recorded once and never looked at again.
    pub fn check_type(&self, task: &ProcessingTask) -> Option<SkipReason> {
        if !self.config.is_allowed_extension(&task.source.path) {
            return Some(SkipReason::UnsupportedFileType);
        }
        if task.options.skip {
            return Some(SkipReason::SkippedByUser);
        }
        None
    }

    /// Hash-name and size checks.
    pub fn check_content(&self, task: &ProcessingTask) -> io::Result<Option<SkipReason>> {
        if task.options.identifiers.is_empty() && self.classifier.is_hash_name(&task.source.file_name) {
            return Ok(Some(SkipReason::MissingIdentifiersOnHashFile));
        }
        if is_junk_file(&task.source.path, self.config.junk_max_size_bytes())? {
            return Ok(Some(SkipReason::BelowMinimumSize));
        }
        Ok(None)
    }
}

fn is_junk_file(path: &Path, max_junk_bytes: u64) -> io::Result<bool> {
    let size_checked = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SIZE_CHECKED_EXTENSIONS
                .iter()
                .any(|checked| checked.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false);
    if !size_checked || max_junk_bytes == 0 {
        return Ok(false);
    }
    Ok(fs::metadata(path)?.len() < max_junk_bytes)
}
