//! Error types for daemonctl.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DaemonError>;

#[derive(Debug, Error)]
pub enum DaemonError {
    /// A pidfile is present, so a background instance is assumed to be running.
    #[error("pidfile {} already exist. Daemon already running? (pid {pid})", pidfile.display())]
    AlreadyRunning { pidfile: PathBuf, pid: i32 },

    #[error("pidfile {} does not contain a valid pid: {content:?}", path.display())]
    InvalidPidfile { path: PathBuf, content: String },

    #[error("fork #{stage} failed: {source}")]
    Fork {
        stage: u8,
        #[source]
        source: nix::Error,
    },

    #[error("{context} failed: {source}")]
    Detach {
        context: &'static str,
        #[source]
        source: nix::Error,
    },

    #[error("cannot signal process {pid}: {source}")]
    Signal {
        pid: i32,
        #[source]
        source: nix::Error,
    },

    #[error("process {pid} still running after {}ms", waited.as_millis())]
    StopTimeout { pid: i32, waited: Duration },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot lock {}: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: nix::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("worker failed: {0:#}")]
    Worker(#[from] anyhow::Error),
}

impl DaemonError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DaemonError::Io {
            path: path.into(),
            source,
        }
    }
}
