//! Pidfile handling, the on-disk record of the running background instance.
//!
//! Format: the decimal pid followed by a newline. The file exists if and only
//! if a background instance is believed to be running.

use nix::fcntl::{Flock, FlockArg};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{DaemonError, Result};

/// Read the pid recorded at `path`. `Ok(None)` when there is no pidfile.
pub fn read(path: &Path) -> Result<Option<i32>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(DaemonError::io(path, e)),
    };

    match content.trim().parse::<i32>() {
        // 0 and negative pids address process groups; never accept them
        Ok(pid) if pid > 0 => Ok(Some(pid)),
        _ => Err(DaemonError::InvalidPidfile {
            path: path.to_path_buf(),
            content,
        }),
    }
}

/// Write `pid` to `path`, replacing any previous content.
pub fn write(path: &Path, pid: i32) -> Result<()> {
    fs::write(path, format!("{pid}\n")).map_err(|e| DaemonError::io(path, e))
}

/// Remove the pidfile. Returns whether a file was actually removed.
pub fn remove(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DaemonError::io(path, e)),
    }
}

/// Writes the current pid on creation and removes the pidfile when dropped.
///
/// The file is only removed if it still names this process, so a guard that
/// outlives a `stop` + `start` cycle cannot delete the new instance's record.
#[derive(Debug)]
pub struct PidfileGuard {
    path: PathBuf,
    pid: i32,
}

impl PidfileGuard {
    pub fn create(path: &Path) -> Result<Self> {
        let pid = std::process::id() as i32;
        write(path, pid)?;
        debug!(pidfile = %path.display(), pid, "pidfile written");
        Ok(Self {
            path: path.to_path_buf(),
            pid,
        })
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }
}

impl Drop for PidfileGuard {
    fn drop(&mut self) {
        match read(&self.path) {
            Ok(Some(pid)) if pid == self.pid => {
                if let Err(e) = remove(&self.path) {
                    warn!(error = %e, "failed to remove pidfile");
                }
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "pidfile changed under us; leaving it"),
        }
    }
}

/// Exclusive advisory lock serialising check-then-act on a pidfile.
///
/// The lock belongs to the open file description, so it survives `fork`:
/// children keep it until one of them drops the guard.
pub struct PidfileLock {
    path: PathBuf,
    _lock: Flock<File>,
}

impl PidfileLock {
    /// Block until the lock at `path` is ours. Creates the file if needed.
    pub fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| DaemonError::io(path, e))?;

        let lock = Flock::lock(file, FlockArg::LockExclusive).map_err(|(_, source)| {
            DaemonError::Lock {
                path: path.to_path_buf(),
                source,
            }
        })?;
        debug!(lock = %path.display(), "lock acquired");

        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
