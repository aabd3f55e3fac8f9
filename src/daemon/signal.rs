//! Signalling a recorded daemon: termination protocol and liveness check.

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use crate::error::{DaemonError, Result};

/// How `terminate` waits for the target to go away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    pub poll_interval: Duration,
    /// `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Escalate to SIGKILL once `timeout` elapses instead of failing.
    pub kill_on_timeout: bool,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            timeout: None,
            kill_on_timeout: false,
        }
    }
}

/// Whether a process with this pid exists (zombies count as gone).
///
/// `EPERM` means the process exists but belongs to someone else.
pub fn is_alive(pid: i32) -> Result<bool> {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => Ok(!is_zombie(pid)),
        Err(Errno::ESRCH) => Ok(false),
        Err(Errno::EPERM) => Ok(true),
        Err(source) => Err(DaemonError::Signal { pid, source }),
    }
}

/// Send SIGTERM to `pid` repeatedly until it no longer exists.
///
/// Returns once delivery fails with `ESRCH`. Any other delivery error is
/// returned as-is.
pub fn terminate(pid: i32, policy: &StopPolicy) -> Result<()> {
    let target = Pid::from_raw(pid);
    let started = Instant::now();
    let mut signal = Signal::SIGTERM;
    let mut attempts: u64 = 0;

    loop {
        match kill(target, signal) {
            Ok(()) => {}
            Err(Errno::ESRCH) => {
                debug!(pid, attempts, "process gone");
                return Ok(());
            }
            Err(source) => return Err(DaemonError::Signal { pid, source }),
        }
        attempts += 1;

        if is_zombie(pid) {
            debug!(pid, attempts, "process exited, awaiting reap");
            return Ok(());
        }

        trace!(pid, ?signal, attempts, "signal delivered, waiting");
        thread::sleep(policy.poll_interval);

        if signal == Signal::SIGKILL {
            continue;
        }
        if let Some(timeout) = policy.timeout {
            let waited = started.elapsed();
            if waited >= timeout {
                if !policy.kill_on_timeout {
                    return Err(DaemonError::StopTimeout { pid, waited });
                }
                warn!(pid, waited_ms = waited.as_millis() as u64, "graceful stop timed out, sending SIGKILL");
                signal = Signal::SIGKILL;
            }
        }
    }
}

/// An exited but unreaped process still accepts signals. Linux exposes the
/// state in `/proc`; elsewhere we cannot tell and assume it is running.
#[cfg(target_os = "linux")]
fn is_zombie(pid: i32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // "pid (comm) S ..." where comm may itself contain ')'
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.split_whitespace().next())
        .map(|state| state == "Z")
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: i32) -> bool {
    false
}
