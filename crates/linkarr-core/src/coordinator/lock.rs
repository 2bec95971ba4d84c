use super::process::is_process_running;
use crate::error::Error;
use chrono::Utc;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

const ACQUIRE_ATTEMPTS: usize = 3;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq)]
pub enum LockState {
    Unlocked,
    /// `pid` is 0 when the file is natively held but its content cannot be parsed.
    Locked { pid: u32, created: f64 },
    Stale,
}

/// Single-instance lock file holding `"<pid>\n<unix seconds>\n"`.
///
/// The owner also holds a native advisory lock on the file. When the native
/// lock can be taken by someone else the pid and age decide staleness.
#[derive(Debug, Clone)]
pub struct LockFile {
    path: PathBuf,
    timeout: Duration,
}

impl LockFile {
    pub fn new(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        LockFile {
            path: path.into(),
            timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn inspect(&self) -> LockState {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return LockState::Unlocked,
            Err(err) => {
                warn!("Unreadable lock file {}: {}", self.path.display(), err);
                return LockState::Stale;
            }
        };

        let natively_held = match file.try_lock() {
            Ok(()) => {
                let _ = file.unlock();
                false
            }
            Err(TryLockError::WouldBlock) => true,
            Err(TryLockError::Error(err)) => {
                debug!("Native file lock unavailable: {}", err);
                false
            }
        };

        let parsed = fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| parse_lock(&content));

        match parsed {
            Some((pid, created)) if natively_held => LockState::Locked { pid, created },
            None if natively_held => LockState::Locked { pid: 0, created: 0.0 },
            None => {
                warn!("Corrupt lock file {}", self.path.display());
                LockState::Stale
            }
            Some((pid, created)) if self.is_live(pid, created) => {
                LockState::Locked { pid, created }
            }
            Some((pid, created)) => {
                debug!(
                    "Lock held by pid {} is stale (age {:.0}s)",
                    pid,
                    now_secs() - created
                );
                LockState::Stale
            }
        }
    }

    /// Publish the lock file, clearing a stale one first.
    ///
    /// The file is written and natively locked under a temporary name, then
    /// hard-linked into place, so the lock path never shows a partial file.
    pub fn acquire(&self) -> Result<LockGuard, Error> {
        for _ in 0..ACQUIRE_ATTEMPTS {
            let (file, temp) = self.prepare()?;
            let published = fs::hard_link(&temp, &self.path);
            if let Err(err) = fs::remove_file(&temp) {
                warn!("Failed to remove {}: {}", temp.display(), err);
            }
            match published {
                Ok(()) => {
                    info!(
                        "Acquired lock {} (pid {})",
                        self.path.display(),
                        std::process::id()
                    );
                    return Ok(LockGuard {
                        path: self.path.clone(),
                        file: Some(file),
                    });
                }
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {}
                Err(err) => return Err(err.into()),
            }

            match self.inspect() {
                LockState::Locked { pid, .. } => return Err(Error::AlreadyRunning { pid }),
                LockState::Stale => self.remove_stale()?,
                LockState::Unlocked => {}
            }
        }
        Err(Error::Other(format!(
            "could not acquire lock file {}",
            self.path.display()
        )))
    }

    fn prepare(&self) -> Result<(File, PathBuf), Error> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = self.path.with_file_name(format!(
            ".{}.{}-{}",
            name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&temp)?;
        if let Err(TryLockError::Error(err)) = file.try_lock() {
            debug!("Native file lock unavailable, relying on pid check: {}", err);
        }
        let written = write!(file, "{}\n{}\n", std::process::id(), now_secs())
            .and_then(|_| file.sync_all());
        if let Err(err) = written {
            let _ = fs::remove_file(&temp);
            return Err(err.into());
        }
        Ok((file, temp))
    }

    /// Delete the lock file only if it is still the stale file and nobody else
    /// is removing or holding it.
    fn remove_stale(&self) -> Result<(), Error> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };
        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => {
                debug!("Lock file {} is busy", self.path.display());
                return Ok(());
            }
            Err(TryLockError::Error(err)) => {
                debug!("Native file lock unavailable: {}", err);
            }
        }
        if !is_same_file(&file, &self.path)? {
            return Ok(());
        }

        let mut content = String::new();
        file.read_to_string(&mut content)?;
        if let Some((pid, created)) = parse_lock(&content) {
            if self.is_live(pid, created) {
                return Ok(());
            }
        }

        info!("Removing stale lock file {}", self.path.display());
        remove_if_present(&self.path)?;
        Ok(())
    }

    fn is_live(&self, pid: u32, created: f64) -> bool {
        is_process_running(pid) && now_secs() - created <= self.timeout.as_secs_f64()
    }
}

#[cfg(unix)]
fn is_same_file(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let opened = file.metadata()?;
    match fs::metadata(path) {
        Ok(current) => Ok(opened.dev() == current.dev() && opened.ino() == current.ino()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(not(unix))]
fn is_same_file(_file: &File, path: &Path) -> io::Result<bool> {
    Ok(path.exists())
}

/// Removes the lock file when released or dropped.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    file: Option<File>,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if self.file.is_none() {
            return;
        }
        if let Err(err) = remove_if_present(&self.path) {
            warn!("Failed to remove lock file {}: {}", self.path.display(), err);
        } else {
            debug!("Released lock {}", self.path.display());
        }
        self.file = None;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.remove();
    }
}

fn parse_lock(content: &str) -> Option<(u32, f64)> {
    let mut lines = content.lines();
    let pid = lines.next()?.trim().parse().ok()?;
    let created = lines.next()?.trim().parse().ok()?;
    Some((pid, created))
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

pub(crate) fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::tempdir;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_acquire_writes_pid_and_timestamp() {
        let tmp = tempdir().unwrap();
        let lock = LockFile::new(tmp.path().join("monitor.lock"), HOUR);
        let guard = lock.acquire().unwrap();

        let content = fs::read_to_string(guard.path()).unwrap();
        let (pid, created) = parse_lock(&content).unwrap();
        assert_eq!(pid, std::process::id());
        assert!((now_secs() - created).abs() < 60.0);

        guard.release();
        assert!(!lock.path().exists());
        assert_eq!(lock.inspect(), LockState::Unlocked);
    }

    #[test]
    fn test_live_lock_refuses_second_instance() {
        let tmp = tempdir().unwrap();
        let lock = LockFile::new(tmp.path().join("monitor.lock"), HOUR);
        let _guard = lock.acquire().unwrap();

        match lock.acquire() {
            Err(Error::AlreadyRunning { pid }) => assert_eq!(pid, std::process::id()),
            other => panic!("expected AlreadyRunning, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_dead_owner_is_stale() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("monitor.lock");
        // Above the Linux pid_max ceiling, so never a live process.
        fs::write(&path, format!("4194305\n{}\n", now_secs())).unwrap();
        let lock = LockFile::new(&path, HOUR);

        assert_eq!(lock.inspect(), LockState::Stale);
        let guard = lock.acquire().unwrap();
        let content = fs::read_to_string(guard.path()).unwrap();
        assert!(content.starts_with(&format!("{}\n", std::process::id())));
    }

    #[test]
    fn test_expired_lock_is_stale_even_if_owner_runs() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("monitor.lock");
        let old = now_secs() - 2.0 * HOUR.as_secs_f64();
        fs::write(&path, format!("{}\n{}\n", std::process::id(), old)).unwrap();

        let lock = LockFile::new(&path, HOUR);
        assert_eq!(lock.inspect(), LockState::Stale);
        assert!(lock.acquire().is_ok());
    }

    #[test]
    fn test_corrupt_lock_is_stale() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("monitor.lock");
        fs::write(&path, "not a pid").unwrap();
        let lock = LockFile::new(&path, HOUR);
        assert_eq!(lock.inspect(), LockState::Stale);
        assert!(lock.acquire().is_ok());
    }

    #[test]
    fn test_fresh_lock_of_running_owner_is_held() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("monitor.lock");
        fs::write(&path, format!("{}\n{}\n", std::process::id(), now_secs())).unwrap();
        let lock = LockFile::new(&path, HOUR);
        assert!(matches!(lock.inspect(), LockState::Locked { .. }));
    }

    #[test]
    fn test_concurrent_acquire_has_one_owner() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("monitor.lock");

        for _ in 0..50 {
            fs::write(&path, format!("4194305\n{}\n", now_secs())).unwrap();
            let barrier = Arc::new(Barrier::new(4));
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let barrier = Arc::clone(&barrier);
                    let lock = LockFile::new(&path, HOUR);
                    thread::spawn(move || {
                        barrier.wait();
                        lock.acquire()
                    })
                })
                .collect();
            let guards: Vec<LockGuard> = handles
                .into_iter()
                .filter_map(|h| h.join().unwrap().ok())
                .collect();

            assert!(guards.len() <= 1, "{} simultaneous owners", guards.len());
            if let Some(guard) = guards.into_iter().next() {
                let content = fs::read_to_string(&path).unwrap();
                assert!(content.starts_with(&format!("{}\n", std::process::id())));
                guard.release();
            }
            let leftovers = fs::read_dir(tmp.path())
                .unwrap()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name() != "monitor.lock")
                .count();
            assert_eq!(leftovers, 0);
        }
    }
}
