//! Single-instance coordination for the monitoring process.
//!
//! The instance that takes the lock file becomes the monitor: it spawns and
//! supervises the companion watcher and owns shutdown. Invocations that find a
//! live lock still run their own synchronization pass and nothing else.

mod lock;
mod process;

pub use lock::{LockFile, LockGuard, LockState};
pub use process::{is_process_running, terminate_child, terminate_pid};

use crate::config::AppConfig;
use crate::context::{CancellationToken, SyncContext};
use crate::error::Error;
use std::fs;
use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

pub struct Coordinator {
    config: Arc<AppConfig>,
    cancel: CancellationToken,
    lock: Mutex<Option<LockGuard>>,
    watcher: Arc<Mutex<Option<Child>>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    shut_down: AtomicBool,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Coordinator {
    pub fn new(context: &SyncContext) -> Self {
        Coordinator {
            config: Arc::clone(&context.config),
            cancel: context.cancel.clone(),
            lock: Mutex::new(None),
            watcher: Arc::new(Mutex::new(None)),
            supervisor: Mutex::new(None),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Take the lock file. `Ok(false)` when another live instance holds it.
    pub fn try_become_monitor(&self) -> Result<bool, Error> {
        let lock = LockFile::new(&self.config.lock_file, self.config.lock_timeout());
        match lock.acquire() {
            Ok(guard) => {
                *locked(&self.lock) = Some(guard);
                Ok(true)
            }
            Err(Error::AlreadyRunning { pid }) => {
                info!("Monitor already running (pid {}), running a single pass", pid);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    pub fn is_monitor(&self) -> bool {
        locked(&self.lock).is_some()
    }

    /// Spawn the configured watcher and its supervision thread.
    /// Returns the watcher pid, or `None` when no watcher is configured.
    pub fn start_watcher(&self) -> Result<Option<u32>, Error> {
        let Some((program, args)) = self.config.watcher_command.split_first() else {
            debug!("No watcher command configured");
            return Ok(None);
        };
        if !self.is_monitor() {
            return Err(Error::Other(
                "watcher can only be started by the lock holder".into(),
            ));
        }
        self.stop_orphaned_watcher();

        let child = Command::new(program).args(args).spawn()?;
        let pid = child.id();
        fs::write(&self.config.monitor_pid_file, format!("{}\n", pid))?;
        info!("Started watcher {} (pid {})", program, pid);
        *locked(&self.watcher) = Some(child);

        let watcher = Arc::clone(&self.watcher);
        let cancel = self.cancel.clone();
        let interval = self.config.supervise_interval();
        let handle = thread::Builder::new()
            .name("linkarr-supervisor".into())
            .spawn(move || supervise(watcher, cancel, interval))?;
        *locked(&self.supervisor) = Some(handle);
        Ok(Some(pid))
    }

    /// A watcher left behind by a crashed monitor.
    fn stop_orphaned_watcher(&self) {
        let Ok(content) = fs::read_to_string(&self.config.monitor_pid_file) else {
            return;
        };
        if let Ok(pid) = content.trim().parse::<u32>() {
            if pid != std::process::id() && is_process_running(pid) {
                warn!("Stopping orphaned watcher (pid {})", pid);
                terminate_pid(pid, self.config.shutdown_grace());
            }
        }
        let _ = lock::remove_if_present(&self.config.monitor_pid_file);
    }

    /// Block until the supervisor stops, i.e. the watcher exited or shutdown began.
    pub fn wait(&self) {
        let handle = locked(&self.supervisor).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Supervisor thread panicked");
            }
        }
    }

    /// Stop everything this instance started and release the lock. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down");
        self.cancel.cancel();
        let grace = self.config.shutdown_grace();

        let watcher = locked(&self.watcher).take();
        let watcher_pid = watcher.as_ref().map(Child::id);
        if let Some(mut child) = watcher {
            match terminate_child(&mut child, grace) {
                Ok(status) => info!("Watcher stopped ({})", status),
                Err(err) => warn!("Failed to stop watcher: {}", err),
            }
        }

        if self.is_monitor() {
            if let Ok(content) = fs::read_to_string(&self.config.monitor_pid_file) {
                if let Ok(pid) = content.trim().parse::<u32>() {
                    if Some(pid) != watcher_pid && is_process_running(pid) {
                        terminate_pid(pid, grace);
                    }
                }
            }
            if let Err(err) = lock::remove_if_present(&self.config.monitor_pid_file) {
                warn!("Failed to remove watcher pid file: {}", err);
            }
        }

        self.wait();

        if let Some(guard) = locked(&self.lock).take() {
            guard.release();
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn supervise(
    watcher: Arc<Mutex<Option<Child>>>,
    cancel: CancellationToken,
    interval: std::time::Duration,
) {
    loop {
        if cancel.is_cancelled() {
            debug!("Supervisor stopping");
            return;
        }
        {
            let mut guard = locked(&watcher);
            let Some(child) = guard.as_mut() else {
                return;
            };
            match child.try_wait() {
                Ok(Some(status)) => {
                    match status.code() {
                        Some(code) => warn!("Watcher exited with code {}", code),
                        None => warn!("Watcher terminated by signal"),
                    }
                    guard.take();
                    return;
                }
                Ok(None) => {}
                Err(err) => {
                    error!("Failed to poll watcher: {}", err);
                    return;
                }
            }
        }
        thread::sleep(interval);
    }
}
