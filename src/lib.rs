//! # daemonctl
//!
//! Turn a long-running worker into a well-behaved Unix daemon.
//!
//! A [`Worker`] is handed to a [`Supervisor`], which gives it a uniform
//! control surface:
//!
//! - **start**: double-fork away from the terminal, write the pidfile, run
//!   the worker in the background
//! - **stop**: SIGTERM the recorded pid until it is gone, clean the pidfile
//! - **restart**: stop then start
//! - **test**: run the worker in the foreground for debugging
//! - **status**: report whether the recorded process is alive
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clap::Args;
//! use daemonctl::Worker;
//!
//! #[derive(Debug, Args)]
//! struct Opts {
//!     /// Seconds between ticks
//!     #[arg(long, default_value = "5")]
//!     every: u64,
//! }
//!
//! struct Ticker;
//!
//! impl Worker for Ticker {
//!     type Args = Opts;
//!
//!     fn run(&mut self, opts: &Opts) -> anyhow::Result<()> {
//!         loop {
//!             tracing::info!("tick");
//!             std::thread::sleep(std::time::Duration::from_secs(opts.every));
//!         }
//!     }
//! }
//!
//! fn main() -> std::process::ExitCode {
//!     // ticker start | stop | restart | test | status
//!     daemonctl::cli::run(Ticker, "/tmp/ticker.pid")
//! }
//! ```

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod worker;

// Re-exports for convenience
pub use config::{StalePolicy, SupervisorConfig};
pub use daemon::{Lifecycle, Supervisor};
pub use error::{DaemonError, Result};
pub use worker::{worker_fn, FnWorker, Worker};
