use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};
use sysinfo::{
    Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, RefreshKind, Signal, System,
};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn process_snapshot(pid: Pid) -> System {
    let mut system = System::new_with_specifics(RefreshKind::nothing());
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing(),
    );
    system
}

/// Zombies count as not running.
pub fn is_process_running(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    process_snapshot(pid)
        .process(pid)
        .map(|process| process.status() != ProcessStatus::Zombie)
        .unwrap_or(false)
}

/// Ask `pid` to terminate, wait up to `grace`, then kill it.
/// Returns true once the process is gone.
pub fn terminate_pid(pid: u32, grace: Duration) -> bool {
    let sys_pid = Pid::from_u32(pid);
    let system = process_snapshot(sys_pid);
    let Some(process) = system.process(sys_pid) else {
        return true;
    };

    match process.kill_with(Signal::Term) {
        Some(true) => debug!("Sent SIGTERM to {}", pid),
        Some(false) => warn!("Failed to signal process {}", pid),
        None => {
            debug!("Graceful termination unsupported, killing {}", pid);
            return process.kill();
        }
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !is_process_running(pid) {
            info!("Process {} terminated", pid);
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }

    warn!("Process {} ignored SIGTERM, killing", pid);
    let system = process_snapshot(sys_pid);
    match system.process(sys_pid) {
        Some(process) => process.kill(),
        None => true,
    }
}

/// Terminate a child we spawned and reap it.
pub fn terminate_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    let pid = child.id();
    let sys_pid = Pid::from_u32(pid);
    if let Some(process) = process_snapshot(sys_pid).process(sys_pid) {
        if process.kill_with(Signal::Term) == Some(true) {
            let deadline = Instant::now() + grace;
            while Instant::now() < deadline {
                if let Some(status) = child.try_wait()? {
                    info!("Watcher {} exited with {}", pid, status);
                    return Ok(status);
                }
                thread::sleep(POLL_INTERVAL);
            }
            warn!("Watcher {} ignored SIGTERM, killing", pid);
        }
    }

    child.kill()?;
    child.wait()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_current_process_is_running() {
        assert!(is_process_running(std::process::id()));
    }

    #[test]
    fn test_terminate_child_stops_sleep() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id();
        let status = terminate_child(&mut child, Duration::from_secs(2)).unwrap();
        assert!(!status.success());
        assert!(!is_process_running(pid));
    }
}
