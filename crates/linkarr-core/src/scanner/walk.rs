use crate::config::non_overlapping_directories;
use crate::context::CancellationToken;
use glob::Pattern;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

/// A regular file found under one of the source roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub path: PathBuf,
    /// Name of the source root the file was found under.
    pub actual_dir: String,
}

pub fn compile_ignore_patterns(globs: &[String]) -> Vec<Pattern> {
    globs
        .iter()
        .filter_map(|glob| match Pattern::new(glob) {
            Ok(p) => Some(p),
            Err(e) => {
                error!("Invalid glob pattern '{}': {}", glob, e);
                None
            }
        })
        .collect()
}

/// Enumerates source files either under the configured source directories
/// or below a single explicit path.
pub struct SourceWalker {
    roots: Vec<PathBuf>,
    source_dirs: Vec<PathBuf>,
    ignore_patterns: Vec<Pattern>,
}

impl SourceWalker {
    /// Relative roots are resolved against the working directory so that link
    /// targets are always absolute.
    pub fn new(source_dirs: &[PathBuf], single_path: Option<&Path>, ignore: &[String]) -> Self {
        let source_dirs =
            non_overlapping_directories(source_dirs.iter().map(|dir| absolute(dir)).collect());
        let roots = match single_path {
            Some(path) => vec![absolute(path)],
            None => source_dirs.clone(),
        };
        SourceWalker {
            roots,
            source_dirs,
            ignore_patterns: compile_ignore_patterns(ignore),
        }
    }

    fn is_ignored(&self, path: &Path) -> bool {
        self.ignore_patterns
            .iter()
            .any(|pattern| pattern.matches_path(path))
    }

    fn actual_dir_for(&self, path: &Path, root: &Path) -> String {
        let owner = self
            .source_dirs
            .iter()
            .find(|dir| path.starts_with(dir))
            .map(|dir| dir.as_path())
            .unwrap_or(root);
        let owner = if owner.is_file() {
            owner.parent().unwrap_or(owner)
        } else {
            owner
        };
        owner
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Call `visit` for each file until the walk ends or `cancel` is set.
    /// Returns the number of files visited.
    pub fn walk<F>(&self, cancel: &CancellationToken, mut visit: F) -> usize
    where
        F: FnMut(SourceEntry),
    {
        let mut visited = 0;
        for root in &self.roots {
            if cancel.is_cancelled() {
                break;
            }
            debug!("Walking {}", root.display());
            let walker = WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|entry| !self.is_ignored(entry.path()));
            for entry in walker {
                if cancel.is_cancelled() {
                    debug!("Walk cancelled at {}", root.display());
                    return visited;
                }
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        warn!("Error walking {}: {}", root.display(), err);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                if entry.path().to_str().is_none() {
                    warn!(
                        "Skipping path that is not valid UTF-8: {}",
                        entry.path().display()
                    );
                    continue;
                }
                let path = entry.into_path();
                let actual_dir = self.actual_dir_for(&path, root);
                visited += 1;
                visit(SourceEntry { path, actual_dir });
            }
        }
        visited
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
