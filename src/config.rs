//! Supervisor configuration.
//!
//! Built once per invocation: defaults, then an optional TOML file, then
//! command-line overrides. The resulting value is handed to the
//! [`Supervisor`](crate::daemon::Supervisor); nothing here is global.
//!
//! ```toml
//! pidfile = "/run/user/1000/soundctld.pid"
//! work_dir = "/"
//! umask = 0o022
//! log_file = "/home/me/.local/share/soundctld/soundctld.log"
//! stop_poll_interval_ms = 100
//! stop_timeout_ms = 10000
//! kill_on_timeout = true
//! stale_pidfile = "reclaim"
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DaemonError, Result};

/// Poll interval between termination signals while stopping.
pub const DEFAULT_STOP_POLL_MS: u64 = 100;

/// What `start` does when it finds an existing pidfile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StalePolicy {
    /// Any pidfile blocks `start`, whether or not the process is alive.
    #[default]
    Refuse,
    /// A pidfile naming a dead process is removed and `start` proceeds.
    Reclaim,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SupervisorConfig {
    pub pidfile: PathBuf,
    pub work_dir: PathBuf,
    pub umask: u32,
    pub log_file: Option<PathBuf>,
    pub stop_poll_interval_ms: u64,
    /// `None` waits forever for the daemon to exit.
    pub stop_timeout_ms: Option<u64>,
    pub kill_on_timeout: bool,
    pub stale_pidfile: StalePolicy,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            pidfile: PathBuf::new(),
            work_dir: PathBuf::from("/"),
            umask: 0,
            log_file: None,
            stop_poll_interval_ms: DEFAULT_STOP_POLL_MS,
            stop_timeout_ms: None,
            kill_on_timeout: false,
            stale_pidfile: StalePolicy::Refuse,
        }
    }
}

impl SupervisorConfig {
    /// Config with defaults and the given pidfile.
    pub fn new(pidfile: impl Into<PathBuf>) -> Self {
        Self {
            pidfile: pidfile.into(),
            ..Self::default()
        }
    }

    /// Load a TOML config file. Keys missing from the file keep their defaults,
    /// except `pidfile`, which falls back to `default_pidfile` when absent.
    pub fn load(path: &Path, default_pidfile: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| DaemonError::io(path, e))?;
        let mut config: SupervisorConfig =
            toml::from_str(&text).map_err(|source| DaemonError::Config {
                path: path.to_path_buf(),
                source,
            })?;
        if config.pidfile.as_os_str().is_empty() {
            config.pidfile = default_pidfile.to_path_buf();
        }
        Ok(config)
    }

    pub fn with_pidfile(mut self, pidfile: impl Into<PathBuf>) -> Self {
        self.pidfile = pidfile.into();
        self
    }

    pub fn stop_poll_interval(&self) -> Duration {
        Duration::from_millis(self.stop_poll_interval_ms.max(1))
    }

    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_ms.map(Duration::from_millis)
    }

    /// Path of the advisory lock file guarding the pidfile.
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.pidfile.clone().into_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_behaviour() {
        let config = SupervisorConfig::new("/tmp/test.pid");
        assert_eq!(config.work_dir, PathBuf::from("/"));
        assert_eq!(config.umask, 0);
        assert_eq!(config.stop_poll_interval(), Duration::from_millis(100));
        assert_eq!(config.stop_timeout(), None);
        assert!(!config.kill_on_timeout);
        assert_eq!(config.stale_pidfile, StalePolicy::Refuse);
    }

    #[test]
    fn test_lock_path_appends_suffix() {
        let config = SupervisorConfig::new("/tmp/soundctld.pid");
        assert_eq!(config.lock_path(), PathBuf::from("/tmp/soundctld.pid.lock"));
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "stop_timeout_ms = 2500\nkill_on_timeout = true\nstale_pidfile = \"reclaim\""
        )
        .unwrap();

        let config = SupervisorConfig::load(file.path(), Path::new("/tmp/default.pid")).unwrap();
        assert_eq!(config.pidfile, PathBuf::from("/tmp/default.pid"));
        assert_eq!(config.stop_timeout(), Some(Duration::from_millis(2500)));
        assert!(config.kill_on_timeout);
        assert_eq!(config.stale_pidfile, StalePolicy::Reclaim);
        assert_eq!(config.work_dir, PathBuf::from("/"));
    }

    #[test]
    fn test_load_file_pidfile_wins_over_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pidfile = \"/var/run/x.pid\"\numask = 18").unwrap();

        let config = SupervisorConfig::load(file.path(), Path::new("/tmp/default.pid")).unwrap();
        assert_eq!(config.pidfile, PathBuf::from("/var/run/x.pid"));
        assert_eq!(config.umask, 0o022);
    }

    #[test]
    fn test_load_rejects_unknown_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "pid_file = \"/tmp/typo.pid\"").unwrap();

        let result = SupervisorConfig::load(file.path(), Path::new("/tmp/default.pid"));
        assert!(matches!(result, Err(DaemonError::Config { .. })));
    }

    #[test]
    fn test_zero_poll_interval_is_clamped() {
        let config = SupervisorConfig {
            stop_poll_interval_ms: 0,
            ..SupervisorConfig::new("/tmp/x.pid")
        };
        assert_eq!(config.stop_poll_interval(), Duration::from_millis(1));
    }
}
