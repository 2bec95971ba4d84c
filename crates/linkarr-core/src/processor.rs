//! Per-file pipeline: eligibility, dedup, classification, resolution, link, record.
//!
//! Only recorder failures escape as errors (as [`Error::StateUnavailable`]).
//! Everything else ends in a [`FileOutcome`] that has already been recorded.

use crate::classifier::eligibility::EligibilityFilter;
use crate::classifier::{Classification, Classifier, ClassifyFlags};
use crate::config::AppConfig;
use crate::error::{Error, LinkError};
use crate::index::DestinationIndex;
use crate::outcome::{FileOutcome, SkipReason};
use crate::resolver::{MetadataResolver, ResolveContext};
use crate::storage::{ProcessedFileRecord, StateRecorder};
use crate::sync::{links_to, remove_link_and_prune, RefreshNotifier, Synchronizer};
use crate::task::ProcessingTask;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct FileProcessor<'a> {
    filter: EligibilityFilter<'a>,
    classifier: &'a Classifier,
    resolver: &'a dyn MetadataResolver,
    recorder: &'a dyn StateRecorder,
    index: &'a DestinationIndex,
    processed: &'a HashSet<PathBuf>,
    synchronizer: Synchronizer<'a>,
}

impl<'a> FileProcessor<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &'a AppConfig,
        classifier: &'a Classifier,
        resolver: &'a dyn MetadataResolver,
        recorder: &'a dyn StateRecorder,
        notifier: &'a dyn RefreshNotifier,
        index: &'a DestinationIndex,
        processed: &'a HashSet<PathBuf>,
    ) -> Self {
        FileProcessor {
            filter: EligibilityFilter::new(config, classifier),
            classifier,
            resolver,
            recorder,
            index,
            processed,
            synchronizer: Synchronizer::new(notifier),
        }
    }

    pub fn process(&self, task: &ProcessingTask) -> Result<FileOutcome, Error> {
        let source = &task.source.path;

        if let Some(reason) = self.filter.check_type(task) {
            return self.skip(task, reason);
        }

        if task.options.force {
            self.teardown(task)?;
        } else if let Some(outcome) = self.dedup(task)? {
            return Ok(outcome);
        }

        match self.filter.check_content(task) {
            Ok(Some(reason)) => return self.skip(task, reason),
            Ok(None) => {}
            Err(err) => {
                let reason = SkipReason::LinkFailed(format!("cannot read source: {}", err));
                return self.fail(task, reason);
            }
        }

        let options = &task.options;
        let classification = self.classifier.classify(
            &task.source.file_name,
            source,
            ClassifyFlags {
                force_show: options.force_show,
                force_movie: options.force_movie,
                has_identifiers: !options.identifiers.is_empty(),
            },
        );
        if let Classification::Rejected(reason) = &classification {
            return self.skip(task, reason.clone());
        }
        debug!("Classified {} as {:?}", source.display(), classification);

        let context = ResolveContext {
            classification: &classification,
            dest_root: &task.dest_root,
            actual_dir: &task.actual_dir,
            settings: task.settings,
            identifiers: &options.identifiers,
            season: options.season,
            episode: options.episode,
            auto_select: options.auto_select,
        };
        let resolution = match self.resolver.resolve(&task.source, &context) {
            Ok(Some(resolution)) => resolution,
            Ok(None) => return self.fail(task, SkipReason::NoUsableDestination),
            Err(err) => {
                warn!("Resolution failed for {}: {}", source.display(), err);
                return self.fail(task, SkipReason::NoUsableDestination);
            }
        };

        if resolution.is_extra && task.settings.skip_extras && !options.force_extra {
            let record = ProcessedFileRecord::skipped(
                source,
                SkipReason::ExtraContent,
                resolution.canonical_id,
                resolution.season,
            );
            info!("Skipping extra {}", source.display());
            self.recorder.upsert(&record).map_err(unavailable)?;
            return Ok(FileOutcome::Skipped(SkipReason::ExtraContent));
        }

        let destination = resolution.destination;
        match self.synchronizer.link(&destination, source) {
            Ok(link) => {
                let record = ProcessedFileRecord::linked(
                    source,
                    &destination,
                    resolution.canonical_id,
                    resolution.season,
                );
                self.recorder.upsert(&record).map_err(unavailable)?;
                self.recorder
                    .record_link(&destination, source)
                    .map_err(unavailable)?;
                Ok(FileOutcome::Linked { destination, link })
            }
            Err(LinkError::Occupied(path)) => {
                warn!(
                    "Destination occupied by a regular file, leaving it untouched: {}",
                    path.display()
                );
                self.fail(task, SkipReason::DestinationOccupied)
            }
            Err(err) => {
                warn!("Failed to link {}: {}", source.display(), err);
                self.fail(task, SkipReason::LinkFailed(err.to_string()))
            }
        }
    }

    /// Returns an outcome when the file needs no further work.
    fn dedup(&self, task: &ProcessingTask) -> Result<Option<FileOutcome>, Error> {
        let source = &task.source.path;

        let record = if self.processed.contains(source) {
            self.recorder.record_for(source).map_err(unavailable)?
        } else {
            None
        };

        if let Some(record) = record {
            match (&record.destination_path, &record.skip_reason) {
                (Some(destination), _) if entry_exists(destination) => {
                    debug!("Already processed: {}", source.display());
                    return Ok(Some(FileOutcome::AlreadyProcessed));
                }
                (Some(destination), _) => {
                    if let Some(renamed) = find_renamed(destination, source) {
                        info!(
                            "Destination renamed: {} -> {}",
                            destination.display(),
                            renamed.display()
                        );
                        let updated = ProcessedFileRecord {
                            destination_path: Some(renamed.clone()),
                            ..record.clone()
                        };
                        self.recorder.upsert(&updated).map_err(unavailable)?;
                        self.recorder.forget_link(destination).map_err(unavailable)?;
                        self.recorder
                            .record_link(&renamed, source)
                            .map_err(unavailable)?;
                        return Ok(Some(FileOutcome::Renamed {
                            destination: renamed,
                        }));
                    }
                    info!(
                        "Destination missing, reprocessing: {}",
                        destination.display()
                    );
                }
                (None, Some(reason)) if reason.is_terminal() => {
                    debug!("Previously skipped ({}): {}", reason, source.display());
                    return Ok(Some(FileOutcome::AlreadyProcessed));
                }
                (None, Some(reason)) => {
                    debug!("Retrying after earlier failure ({}): {}", reason, source.display());
                }
                (None, None) => {}
            }
        }

        if let Some(existing) = self.index.find_link_to(source) {
            if links_to(existing, source) {
                info!("Adopting existing link {}", existing.display());
                let record = ProcessedFileRecord::linked(
                    source,
                    existing,
                    task.options.identifiers.canonical(),
                    task.options.season,
                );
                self.recorder.upsert(&record).map_err(unavailable)?;
                self.recorder
                    .record_link(existing, source)
                    .map_err(unavailable)?;
                return Ok(Some(FileOutcome::Adopted {
                    destination: existing.to_path_buf(),
                }));
            }
        }

        Ok(None)
    }

    /// Remove every link previously created for the source before reprocessing.
    fn teardown(&self, task: &ProcessingTask) -> Result<(), Error> {
        let source = &task.source.path;
        let mut candidates: Vec<PathBuf> = Vec::new();
        if let Some(dest) = self
            .recorder
            .find_by_symlink_target(source)
            .map_err(unavailable)?
        {
            candidates.push(dest);
        }
        if let Some(dest) = self.recorder.destination_for(source).map_err(unavailable)? {
            candidates.push(dest);
        }
        if let Some(dest) = self.index.find_link_to(source) {
            candidates.push(dest.to_path_buf());
        }
        candidates.sort();
        candidates.dedup();

        for link in candidates {
            if !links_to(&link, source) {
                continue;
            }
            match remove_link_and_prune(&link, &task.dest_root) {
                Ok(pruned) => info!(
                    "Removed existing link {} ({} empty directories pruned)",
                    link.display(),
                    pruned
                ),
                Err(err) => warn!("Failed to remove link {}: {}", link.display(), err),
            }
            self.recorder.forget_link(&link).map_err(unavailable)?;
        }
        Ok(())
    }

    fn skip(&self, task: &ProcessingTask, reason: SkipReason) -> Result<FileOutcome, Error> {
        let source = &task.source.path;
        if !task.options.force && self.processed.contains(source) {
            let recorded = self.recorder.skip_reason_for(source).map_err(unavailable)?;
            if recorded.as_ref() == Some(&reason) {
                debug!("Previously skipped ({}): {}", reason, source.display());
                return Ok(FileOutcome::AlreadyProcessed);
            }
        }
        info!("Skipping {}: {}", source.display(), reason);
        let record = ProcessedFileRecord::skipped(source, reason.clone(), None, None);
        self.recorder.upsert(&record).map_err(unavailable)?;
        Ok(FileOutcome::Skipped(reason))
    }

    fn fail(&self, task: &ProcessingTask, reason: SkipReason) -> Result<FileOutcome, Error> {
        warn!("Failed {}: {}", task.source.path.display(), reason);
        let record = ProcessedFileRecord::skipped(&task.source.path, reason.clone(), None, None);
        self.recorder.upsert(&record).map_err(unavailable)?;
        Ok(FileOutcome::Failed(reason))
    }
}

fn unavailable(err: Error) -> Error {
    match err {
        Error::StateUnavailable(_) => err,
        other => Error::StateUnavailable(other.to_string()),
    }
}

fn entry_exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// A sibling of the vanished `destination` that links to `source`.
fn find_renamed(destination: &Path, source: &Path) -> Option<PathBuf> {
    let dir = destination.parent()?;
    fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|candidate| links_to(candidate, source))
}
