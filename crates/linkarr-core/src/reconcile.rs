//! Startup reconciliation between recorded state and the two trees.

use crate::context::CancellationToken;
use crate::error::Error;
use crate::storage::StateRecorder;
use crate::sync::{link_target, links_to, remove_link_and_prune};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub checked: usize,
    /// Records dropped because their source file is gone.
    pub removed_records: usize,
    /// Records whose destination vanished; the next pass recreates them.
    pub pending_relink: usize,
    pub broken_links_removed: usize,
    pub pruned_dirs: usize,
    /// Set when a source root was missing or empty and nothing was removed.
    pub sources_unavailable: bool,
}

/// Check every record that has a destination against the filesystem, then
/// sweep dangling links out of the destination tree.
///
/// Nothing is removed while any of `source_dirs` is missing or empty, since an
/// unmounted source would otherwise look like every file was deleted.
pub fn reconcile(
    recorder: &dyn StateRecorder,
    dest_root: &Path,
    source_dirs: &[PathBuf],
    cancel: &CancellationToken,
) -> Result<ReconcileReport, Error> {
    let mut report = ReconcileReport::default();

    if let Some(dir) = source_dirs.iter().find(|dir| !is_available(dir)) {
        warn!(
            "Source directory {} is missing or empty, skipping reconciliation",
            dir.display()
        );
        report.sources_unavailable = true;
        return Ok(report);
    }

    for record in recorder.records_with_destination()? {
        if cancel.is_cancelled() {
            debug!("Reconciliation cancelled");
            return Ok(report);
        }
        report.checked += 1;
        let Some(destination) = record.destination_path.as_deref() else {
            continue;
        };
        let source = &record.source_path;

        if !source.exists() {
            info!("Source removed, dropping record: {}", source.display());
            if links_to(destination, source) {
                match remove_link_and_prune(destination, dest_root) {
                    Ok(pruned) => report.pruned_dirs += pruned,
                    Err(err) => warn!("Failed to remove {}: {}", destination.display(), err),
                }
            }
            recorder.forget_link(destination)?;
            recorder.remove(source)?;
            report.removed_records += 1;
        } else if fs::symlink_metadata(destination).is_err() {
            debug!(
                "Destination missing, will be recreated: {}",
                destination.display()
            );
            report.pending_relink += 1;
        }
    }

    let (removed, pruned) = sweep_broken_links(recorder, dest_root, cancel)?;
    report.broken_links_removed = removed;
    report.pruned_dirs += pruned;

    info!(
        "Reconciliation checked {} records: {} removed, {} pending relink, {} broken links cleared",
        report.checked, report.removed_records, report.pending_relink, report.broken_links_removed
    );
    Ok(report)
}

/// Run [`reconcile`] on a background thread.
pub fn spawn_reconciliation(
    recorder: Arc<dyn StateRecorder>,
    dest_root: PathBuf,
    source_dirs: Vec<PathBuf>,
    cancel: CancellationToken,
) -> std::io::Result<JoinHandle<Result<ReconcileReport, Error>>> {
    thread::Builder::new()
        .name("linkarr-reconcile".into())
        .spawn(move || reconcile(recorder.as_ref(), &dest_root, &source_dirs, &cancel))
}

fn is_available(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// Remove destination symlinks whose target no longer exists.
/// Returns (links removed, directories pruned).
pub fn sweep_broken_links(
    recorder: &dyn StateRecorder,
    dest_root: &Path,
    cancel: &CancellationToken,
) -> Result<(usize, usize), Error> {
    let broken: Vec<PathBuf> = WalkDir::new(dest_root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path_is_symlink())
        .filter(|entry| {
            link_target(entry.path())
                .map(|target| !target.exists())
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    let mut removed = 0;
    let mut pruned = 0;
    for link in broken {
        if cancel.is_cancelled() {
            break;
        }
        match remove_link_and_prune(&link, dest_root) {
            Ok(count) => {
                info!("Removed broken link {}", link.display());
                removed += 1;
                pruned += count;
            }
            Err(err) => warn!("Failed to remove broken link {}: {}", link.display(), err),
        }
        recorder.forget_link(&link)?;
    }
    Ok((removed, pruned))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::storage::{Database, ProcessedFileRecord};
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn test_vanished_source_drops_record_and_link() {
        let tmp = tempdir().unwrap();
        let dest_root = tmp.path().join("dest");
        let source = tmp.path().join("src/ep.mkv");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, b"data").unwrap();
        let link = dest_root.join("Shows/Show/Season 01/ep.mkv");
        fs::create_dir_all(link.parent().unwrap()).unwrap();
        symlink(&source, &link).unwrap();

        let db = Database::open_in_memory().unwrap();
        db.upsert(&ProcessedFileRecord::linked(&source, &link, None, Some(1)))
            .unwrap();
        db.record_link(&link, &source).unwrap();
        fs::write(source.with_file_name("other.mkv"), b"data").unwrap();
        fs::remove_file(&source).unwrap();

        let sources = vec![source.parent().unwrap().to_path_buf()];
        let report = reconcile(&db, &dest_root, &sources, &CancellationToken::new()).unwrap();
        assert_eq!(report.removed_records, 1);
        assert_eq!(report.pruned_dirs, 2);
        assert!(fs::symlink_metadata(&link).is_err());
        assert_eq!(db.destination_for(&source).unwrap(), None);
        assert!(db.destination_links().unwrap().is_empty());
    }

    #[test]
    fn test_missing_destination_is_pending() {
        let tmp = tempdir().unwrap();
        let dest_root = tmp.path().join("dest");
        fs::create_dir_all(&dest_root).unwrap();
        let source = tmp.path().join("movie.mkv");
        fs::write(&source, b"data").unwrap();

        let db = Database::open_in_memory().unwrap();
        db.upsert(&ProcessedFileRecord::linked(
            &source,
            &dest_root.join("Movies/Movie/movie.mkv"),
            None,
            None,
        ))
        .unwrap();

        let report =
            reconcile(&db, &dest_root, &[tmp.path().to_path_buf()], &CancellationToken::new())
                .unwrap();
        assert_eq!(report.pending_relink, 1);
        assert_eq!(report.removed_records, 0);
    }

    #[test]
    fn test_sweep_removes_untracked_broken_links() {
        let tmp = tempdir().unwrap();
        let dest_root = tmp.path().join("dest");
        let dir = dest_root.join("Movies/Gone (1999)");
        fs::create_dir_all(&dir).unwrap();
        symlink(tmp.path().join("missing.mkv"), dir.join("Gone (1999).mkv")).unwrap();

        let db = Database::open_in_memory().unwrap();
        let (removed, pruned) =
            sweep_broken_links(&db, &dest_root, &CancellationToken::new()).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(pruned, 2);
        assert!(dest_root.is_dir());
    }

    #[test]
    fn test_unavailable_source_root_removes_nothing() {
        let tmp = tempdir().unwrap();
        let dest_root = tmp.path().join("dest");
        let mount = tmp.path().join("mount");
        fs::create_dir_all(&mount).unwrap();
        let source = mount.join("movie.mkv");
        let link = dest_root.join("Movies/Movie/movie.mkv");
        fs::create_dir_all(link.parent().unwrap()).unwrap();
        symlink(&source, &link).unwrap();

        let db = Database::open_in_memory().unwrap();
        db.upsert(&ProcessedFileRecord::linked(&source, &link, None, None))
            .unwrap();
        db.record_link(&link, &source).unwrap();

        for sources in [vec![mount.clone()], vec![tmp.path().join("absent")]] {
            let report =
                reconcile(&db, &dest_root, &sources, &CancellationToken::new()).unwrap();
            assert!(report.sources_unavailable);
            assert_eq!(report.removed_records, 0);
            assert!(fs::symlink_metadata(&link).is_ok());
            assert_eq!(db.destination_for(&source).unwrap(), Some(link.clone()));
        }
    }
}
