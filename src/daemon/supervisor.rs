//! Supervisor: start/stop/restart/test lifecycle for one worker.

use std::fmt;
use std::path::Path;
use std::process;
use tracing::{debug, error, info, warn};

use crate::config::{StalePolicy, SupervisorConfig};
use crate::error::{DaemonError, Result};
use crate::worker::Worker;

use super::detach::{detach, DetachOptions};
use super::pidfile::{self, PidfileGuard, PidfileLock};
use super::signal::{self, StopPolicy};

/// Externally observed state of the supervised process, derived from the
/// pidfile and the OS on every call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    NotRunning,
    Running(i32),
    /// Pidfile present but its process is gone.
    Stale(i32),
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifecycle::NotRunning => write!(f, "not running"),
            Lifecycle::Running(pid) => write!(f, "running (pid {pid})"),
            Lifecycle::Stale(pid) => write!(f, "not running (stale pidfile names pid {pid})"),
        }
    }
}

/// Runs a [`Worker`] as a daemon guarded by a pidfile.
pub struct Supervisor<W> {
    config: SupervisorConfig,
    worker: W,
}

impl<W: Worker> Supervisor<W> {
    pub fn new(config: SupervisorConfig, worker: W) -> Self {
        Self { config, worker }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    pub fn pidfile(&self) -> &Path {
        &self.config.pidfile
    }

    /// Override the pidfile for this invocation.
    pub fn set_pidfile(&mut self, pidfile: impl Into<std::path::PathBuf>) {
        self.config.pidfile = pidfile.into();
    }

    /// Detach and run the worker in the background.
    ///
    /// In the invoking process this either fails before forking or does not
    /// return (the invoker exits 0 once the first fork succeeds). The final
    /// daemon process never returns either: it exits once the worker is done.
    pub fn start(&mut self, args: &W::Args) -> Result<()> {
        let lock = self.lock()?;
        self.start_locked(lock, args)
    }

    /// Signal the running daemon and wait for it to exit.
    ///
    /// Not running is not an error.
    pub fn stop(&mut self) -> Result<()> {
        let _lock = self.lock()?;
        self.stop_locked()
    }

    /// `stop` followed by `start`, under a single lock.
    pub fn restart(&mut self, args: &W::Args) -> Result<()> {
        let lock = self.lock()?;
        self.stop_locked()?;
        self.start_locked(lock, args)
    }

    /// Run the worker in the foreground, without detaching or a pidfile.
    pub fn test(&mut self, args: &W::Args) -> Result<()> {
        info!("running in foreground");
        self.worker.run(args)?;
        Ok(())
    }

    pub fn status(&self) -> Result<Lifecycle> {
        let _lock = self.lock()?;
        self.observe()
    }

    fn lock(&self) -> Result<PidfileLock> {
        PidfileLock::acquire(&self.config.lock_path())
    }

    fn observe(&self) -> Result<Lifecycle> {
        Ok(match pidfile::read(&self.config.pidfile)? {
            None => Lifecycle::NotRunning,
            Some(pid) if signal::is_alive(pid)? => Lifecycle::Running(pid),
            Some(pid) => Lifecycle::Stale(pid),
        })
    }

    fn start_locked(&mut self, lock: PidfileLock, args: &W::Args) -> Result<()> {
        let pidfile = self.config.pidfile.clone();

        if let Some(pid) = pidfile::read(&pidfile)? {
            let reclaim = self.config.stale_pidfile == StalePolicy::Reclaim
                && !signal::is_alive(pid)?;
            if !reclaim {
                return Err(DaemonError::AlreadyRunning { pidfile, pid });
            }
            warn!(pid, pidfile = %pidfile.display(), "removing stale pidfile");
            pidfile::remove(&pidfile)?;
        }

        info!(pidfile = %pidfile.display(), "starting daemon");
        detach(&self.detach_options())?;

        // From here on we are the daemon; stderr is no longer the terminal.
        let guard = PidfileGuard::create(&pidfile)?;
        drop(lock);
        info!(pid = guard.pid(), "daemon started");

        let code = match self.worker.run(args) {
            Ok(()) => {
                info!("worker finished");
                0
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "worker failed");
                1
            }
        };
        drop(guard);
        process::exit(code)
    }

    fn stop_locked(&mut self) -> Result<()> {
        let pidfile = &self.config.pidfile;

        let Some(pid) = pidfile::read(pidfile)? else {
            info!(
                pidfile = %pidfile.display(),
                "pidfile {} does not exist. Daemon not running?",
                pidfile.display()
            );
            return Ok(());
        };

        info!(pid, "stopping daemon");
        signal::terminate(pid, &self.stop_policy())?;

        if pidfile::remove(pidfile)? {
            debug!(pidfile = %pidfile.display(), "removed leftover pidfile");
        }
        info!(pid, "daemon stopped");
        Ok(())
    }

    fn detach_options(&self) -> DetachOptions {
        DetachOptions {
            work_dir: self.config.work_dir.clone(),
            umask: self.config.umask,
            log_file: self.config.log_file.clone(),
        }
    }

    fn stop_policy(&self) -> StopPolicy {
        StopPolicy {
            poll_interval: self.config.stop_poll_interval(),
            timeout: self.config.stop_timeout(),
            kill_on_timeout: self.config.kill_on_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::worker_fn;
    use std::fs;
    use std::process::Command;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config_in(dir: &Path) -> SupervisorConfig {
        SupervisorConfig {
            stop_poll_interval_ms: 10,
            stop_timeout_ms: Some(10_000),
            ..SupervisorConfig::new(dir.join("test.pid"))
        }
    }

    fn idle() -> impl Worker<Args = ()> {
        worker_fn(|_: &()| Ok(()))
    }

    fn dead_pid() -> i32 {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();
        pid
    }

    #[test]
    fn test_start_refuses_existing_pidfile_and_leaves_it() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(&config.pidfile, "4242\n").unwrap();

        let mut sup = Supervisor::new(config.clone(), idle());
        let err = sup.start(&()).unwrap_err();
        assert!(matches!(err, DaemonError::AlreadyRunning { pid: 4242, .. }));
        assert_eq!(fs::read_to_string(&config.pidfile).unwrap(), "4242\n");
    }

    #[test]
    fn test_start_refuses_stale_pidfile_by_default() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let pid = dead_pid();
        pidfile::write(&config.pidfile, pid).unwrap();

        let mut sup = Supervisor::new(config.clone(), idle());
        assert!(matches!(
            sup.start(&()),
            Err(DaemonError::AlreadyRunning { .. })
        ));
        assert_eq!(pidfile::read(&config.pidfile).unwrap(), Some(pid));
    }

    #[test]
    fn test_start_with_reclaim_still_refuses_live_process() {
        let dir = tempdir().unwrap();
        let config = SupervisorConfig {
            stale_pidfile: StalePolicy::Reclaim,
            ..config_in(dir.path())
        };
        let me = std::process::id() as i32;
        pidfile::write(&config.pidfile, me).unwrap();

        let mut sup = Supervisor::new(config.clone(), idle());
        assert!(matches!(
            sup.start(&()),
            Err(DaemonError::AlreadyRunning { pid, .. }) if pid == me
        ));
        assert_eq!(pidfile::read(&config.pidfile).unwrap(), Some(me));
    }

    #[test]
    fn test_start_rejects_garbage_pidfile() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        fs::write(&config.pidfile, "not a pid").unwrap();

        let mut sup = Supervisor::new(config, idle());
        assert!(matches!(
            sup.start(&()),
            Err(DaemonError::InvalidPidfile { .. })
        ));
    }

    #[test]
    fn test_stop_without_pidfile_is_noop() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());

        let mut sup = Supervisor::new(config.clone(), idle());
        sup.stop().unwrap();
        sup.stop().unwrap();
        assert!(!config.pidfile.exists());
    }

    #[test]
    fn test_stop_with_stale_pidfile_removes_it() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        pidfile::write(&config.pidfile, dead_pid()).unwrap();

        let mut sup = Supervisor::new(config.clone(), idle());
        sup.stop().unwrap();
        assert!(!config.pidfile.exists());
    }

    #[test]
    fn test_stop_terminates_recorded_process() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as i32;
        pidfile::write(&config.pidfile, pid).unwrap();

        let mut sup = Supervisor::new(config.clone(), idle());
        assert_eq!(sup.status().unwrap(), Lifecycle::Running(pid));

        sup.stop().unwrap();
        child.wait().unwrap();
        assert!(!config.pidfile.exists());
        assert_eq!(sup.status().unwrap(), Lifecycle::NotRunning);
    }

    #[test]
    fn test_status_reports_stale() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let pid = dead_pid();
        pidfile::write(&config.pidfile, pid).unwrap();

        let sup = Supervisor::new(config, idle());
        let status = sup.status().unwrap();
        assert_eq!(status, Lifecycle::Stale(pid));
        assert!(status.to_string().contains("stale"));
    }

    #[test]
    fn test_test_mode_runs_in_foreground_without_pidfile() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path());
        let mut calls = 0;
        {
            let worker = worker_fn(|n: &u32| {
                calls += *n;
                Ok(())
            });
            let mut sup = Supervisor::new(config.clone(), worker);
            sup.test(&3).unwrap();
        }
        assert_eq!(calls, 3);
        assert!(!config.pidfile.exists());
    }

    #[test]
    fn test_test_mode_propagates_worker_error() {
        let dir = tempdir().unwrap();
        let worker = worker_fn(|_: &()| anyhow::bail!("no mixer named Master"));
        let mut sup = Supervisor::new(config_in(dir.path()), worker);

        let err = sup.test(&()).unwrap_err();
        assert!(matches!(err, DaemonError::Worker(_)));
        assert!(err.to_string().contains("no mixer named Master"));
    }

    #[test]
    fn test_set_pidfile_overrides_config() {
        let dir = tempdir().unwrap();
        let mut sup = Supervisor::new(config_in(dir.path()), idle());
        let other = dir.path().join("other.pid");
        sup.set_pidfile(&other);
        assert_eq!(sup.pidfile(), other.as_path());
        assert_eq!(sup.config().lock_path(), dir.path().join("other.pid.lock"));
    }

    #[test]
    fn test_stop_policy_follows_config() {
        let dir = tempdir().unwrap();
        let config = SupervisorConfig {
            stop_poll_interval_ms: 250,
            stop_timeout_ms: Some(5_000),
            kill_on_timeout: true,
            ..config_in(dir.path())
        };
        let sup = Supervisor::new(config, idle());
        let policy = sup.stop_policy();
        assert_eq!(policy.poll_interval, Duration::from_millis(250));
        assert_eq!(policy.timeout, Some(Duration::from_secs(5)));
        assert!(policy.kill_on_timeout);
    }
}
