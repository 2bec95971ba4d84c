use crate::error::Error;
use crate::storage::StateRecorder;
use crate::sync::link_target;
use crate::task::IndexMode;
use ahash::AHashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Snapshot of destination-side symlinks, built once per batch and read-only afterwards.
#[derive(Debug, Default, Clone)]
pub struct DestinationIndex {
    links: AHashMap<PathBuf, PathBuf>,
    by_target: AHashMap<PathBuf, PathBuf>,
}

impl DestinationIndex {
    pub fn build(
        mode: IndexMode,
        dest_root: &Path,
        recorder: &dyn StateRecorder,
    ) -> Result<Self, Error> {
        let index = match mode {
            IndexMode::Batch => Self::scan(dest_root),
            IndexMode::Watch => Self::from_links(recorder.destination_links()?),
        };
        if index.is_empty() {
            debug!("Destination index ({:?}) is empty", mode);
        } else {
            debug!(
                "Destination index ({:?}) holds {} links",
                mode,
                index.len()
            );
        }
        Ok(index)
    }

    /// Walk `dest_root` and collect every symlink entry.
    pub fn scan(dest_root: &Path) -> Self {
        let mut pairs = Vec::new();
        for entry in WalkDir::new(dest_root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Error walking destination {}: {}", dest_root.display(), err);
                    continue;
                }
            };
            if !entry.path_is_symlink() {
                continue;
            }
            match link_target(entry.path()) {
                Ok(target) => pairs.push((entry.path().to_path_buf(), target)),
                Err(err) => warn!("Unreadable link {}: {}", entry.path().display(), err),
            }
        }
        Self::from_links(pairs)
    }

    pub fn from_links(pairs: Vec<(PathBuf, PathBuf)>) -> Self {
        let mut index = DestinationIndex::default();
        for (dest, target) in pairs {
            index.by_target.insert(target.clone(), dest.clone());
            index.links.insert(dest, target);
        }
        index
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// A destination link whose target was `source` when the snapshot was taken.
    pub fn find_link_to(&self, source: &Path) -> Option<&Path> {
        self.by_target.get(source).map(|p| p.as_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[cfg(unix)]
    #[test]
    fn test_scan_collects_symlinks_only() {
        let tmp = tempdir().unwrap();
        let source = tmp.path().join("src/movie.mkv");
        let dest = tmp.path().join("dest");
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::create_dir_all(dest.join("Movies/Movie")).unwrap();
        fs::write(&source, b"data").unwrap();
        fs::write(dest.join("Movies/Movie/poster.jpg"), b"img").unwrap();
        let link = dest.join("Movies/Movie/movie.mkv");
        std::os::unix::fs::symlink(&source, &link).unwrap();

        let index = DestinationIndex::scan(&dest);
        assert_eq!(index.len(), 1);
        assert_eq!(index.find_link_to(&source), Some(link.as_path()));
        assert!(DestinationIndex::scan(&dest.join("Movies/Other")).is_empty());
    }

    #[test]
    fn test_from_links_reverse_lookup() {
        let index = DestinationIndex::from_links(vec![(
            PathBuf::from("/dest/Shows/A/Season 01/A - S01E01.mkv"),
            PathBuf::from("/src/A.S01E01.mkv"),
        )]);
        assert_eq!(
            index.find_link_to(Path::new("/src/A.S01E01.mkv")),
            Some(Path::new("/dest/Shows/A/Season 01/A - S01E01.mkv"))
        );
        assert_eq!(index.find_link_to(Path::new("/src/other.mkv")), None);
    }
}
