//! Detaching from the invoking terminal (Unix double fork).
//!
//! ```text
//! invoker ──fork──► child ──setsid, chdir, umask──fork──► daemon
//!   exit(0)                exit(0)                        stdio → /dev/null
//! ```
//!
//! The daemon is not a session leader, so it can never reacquire a
//! controlling terminal, and it is reparented to init, so nobody has to
//! reap it.

use nix::sys::stat::{umask, Mode};
use nix::unistd::{dup2, fork, setsid, ForkResult};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::process;

use crate::error::{DaemonError, Result};

const DEV_NULL: &str = "/dev/null";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachOptions {
    pub work_dir: PathBuf,
    pub umask: u32,
    /// Receives stdout and stderr of the daemon; the null device otherwise.
    pub log_file: Option<PathBuf>,
}

impl Default for DetachOptions {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/"),
            umask: 0,
            log_file: None,
        }
    }
}

/// Detach the calling process. Returns only in the final daemon process;
/// both intermediate parents exit with status 0.
///
/// A failed first fork is returned to the invoker. Later failures are
/// returned inside the forked process, which is expected to report and exit.
pub fn detach(opts: &DetachOptions) -> Result<()> {
    fork_and_exit_parent(1)?;

    // First child: leave the caller's directory and terminal behind.
    std::env::set_current_dir(&opts.work_dir).map_err(|e| DaemonError::io(&opts.work_dir, e))?;
    setsid().map_err(|source| DaemonError::Detach {
        context: "setsid",
        source,
    })?;
    umask(Mode::from_bits_truncate(opts.umask as libc::mode_t));

    fork_and_exit_parent(2)?;

    // Daemon process.
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
    redirect_stdio(opts.log_file.as_deref())
}

fn fork_and_exit_parent(stage: u8) -> Result<()> {
    // SAFETY: the parent exits right away without touching shared state,
    // and the child continues on the only thread that existed.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => process::exit(0),
        Ok(ForkResult::Child) => Ok(()),
        Err(source) => Err(DaemonError::Fork { stage, source }),
    }
}

/// Point stdin at the null device and stdout/stderr at `log_file` (appending)
/// or the null device.
fn redirect_stdio(log_file: Option<&Path>) -> Result<()> {
    let null_in = File::open(DEV_NULL).map_err(|e| DaemonError::io(DEV_NULL, e))?;
    let out = match log_file {
        Some(path) => open_append(path)?,
        None => open_append(Path::new(DEV_NULL))?,
    };

    dup_onto(&null_in, libc::STDIN_FILENO, "redirecting stdin")?;
    dup_onto(&out, libc::STDOUT_FILENO, "redirecting stdout")?;
    dup_onto(&out, libc::STDERR_FILENO, "redirecting stderr")?;
    Ok(())
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| DaemonError::io(path, e))
}

fn dup_onto(file: &File, target: i32, context: &'static str) -> Result<()> {
    dup2(file.as_raw_fd(), target)
        .map(|_| ())
        .map_err(|source| DaemonError::Detach { context, source })
}
