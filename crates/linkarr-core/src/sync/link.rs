use crate::error::LinkError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

static TEMP_LINK_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Created,
    Replaced { previous: PathBuf },
    AlreadyCorrect,
}

impl LinkOutcome {
    /// Whether the filesystem was changed.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, LinkOutcome::AlreadyCorrect)
    }
}

#[cfg(unix)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn make_symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

/// Target of the symlink at `link`, made absolute against the link's directory.
pub fn link_target(link: &Path) -> io::Result<PathBuf> {
    let target = fs::read_link(link)?;
    if target.is_relative() {
        Ok(link.parent().unwrap_or_else(|| Path::new(".")).join(target))
    } else {
        Ok(target)
    }
}

/// True when `path` is a symlink whose target is exactly `source`.
pub fn links_to(path: &Path, source: &Path) -> bool {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            link_target(path).map(|t| t == source).unwrap_or(false)
        }
        _ => false,
    }
}

/// Make `destination` a symlink to `source`.
///
/// An existing link to `source` is left alone, a link elsewhere is swapped
/// atomically, and a regular file is never touched.
pub fn sync_link(destination: &Path, source: &Path) -> Result<LinkOutcome, LinkError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|e| LinkError::io(parent, e))?;
    }

    match fs::symlink_metadata(destination) {
        Ok(meta) if meta.file_type().is_symlink() => {
            let current = link_target(destination).map_err(|e| LinkError::io(destination, e))?;
            if current == source {
                debug!(
                    "Symlink already correct: {} -> {}",
                    destination.display(),
                    source.display()
                );
                return Ok(LinkOutcome::AlreadyCorrect);
            }
            replace_link(destination, source)?;
            info!(
                "Updated symlink: {} -> {} (was: {})",
                destination.display(),
                source.display(),
                current.display()
            );
            Ok(LinkOutcome::Replaced { previous: current })
        }
        Ok(_) => Err(LinkError::Occupied(destination.to_path_buf())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => create_link(destination, source),
        Err(err) => Err(LinkError::io(destination, err)),
    }
}

/// Create a new symlink at `destination`. Anything that appeared there since
/// the caller looked is reported as [`LinkError::RaceLost`] and left untouched.
fn create_link(destination: &Path, source: &Path) -> Result<LinkOutcome, LinkError> {
    match make_symlink(source, destination) {
        Ok(()) => {
            info!(
                "Created symlink: {} -> {}",
                destination.display(),
                source.display()
            );
            Ok(LinkOutcome::Created)
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            Err(LinkError::RaceLost(destination.to_path_buf()))
        }
        Err(err) => Err(LinkError::io(destination, err)),
    }
}

fn replace_link(destination: &Path, source: &Path) -> Result<(), LinkError> {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = destination.with_file_name(format!(
        ".{}.linkarr-{}-{}",
        name,
        std::process::id(),
        TEMP_LINK_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    make_symlink(source, &temp).map_err(|e| LinkError::io(&temp, e))?;
    if let Err(err) = fs::rename(&temp, destination) {
        let _ = fs::remove_file(&temp);
        return Err(LinkError::io(destination, err));
    }
    Ok(())
}

/// Remove the symlink at `link`, then prune its parent and grandparent when
/// they are left empty. Nothing at or above `dest_root` is removed, and a
/// non-symlink at `link` is left in place. Returns the number of pruned directories.
pub fn remove_link_and_prune(link: &Path, dest_root: &Path) -> io::Result<usize> {
    match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => fs::remove_file(link)?,
        Ok(_) => return Ok(0),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    let mut pruned = 0;
    let mut current = link.parent();
    for _ in 0..2 {
        let Some(dir) = current else { break };
        if !dir.starts_with(dest_root) || dir == dest_root {
            break;
        }
        if !is_empty_dir(dir)? {
            break;
        }
        info!("Deleting empty directory: {}", dir.display());
        fs::remove_dir(dir)?;
        pruned += 1;
        current = dir.parent();
    }
    Ok(pruned)
}

fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    match fs::read_dir(dir) {
        Ok(mut entries) => Ok(entries.next().is_none()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}
