//! heartbeatd - example daemon that logs a heartbeat at a fixed interval.
//!
//! Usage:
//!   heartbeatd start                     # Detach and beat every second
//!   heartbeatd --interval-ms 200 start   # Faster beats
//!   heartbeatd stop                      # Stop the background instance
//!   heartbeatd --exit-after 3 test       # Three beats in the foreground

use anyhow::{bail, Context, Result};
use clap::Args;
use daemonctl::Worker;
use signal_hook::consts::signal::{SIGINT, SIGTERM};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::info;

const DEFAULT_PIDFILE: &str = "/tmp/heartbeatd.pid";

/// Longest uninterrupted sleep, so SIGTERM is noticed quickly.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

#[derive(Debug, Args)]
struct HeartbeatArgs {
    /// Milliseconds between heartbeats
    #[arg(long, default_value = "1000")]
    interval_ms: u64,

    /// Exit after this many heartbeats
    #[arg(long)]
    exit_after: Option<u64>,

    /// Fail immediately (exercises error reporting)
    #[arg(long)]
    fail: bool,
}

#[derive(Default)]
struct Heartbeat {
    shutdown: Arc<AtomicBool>,
}

impl Worker for Heartbeat {
    type Args = HeartbeatArgs;

    fn run(&mut self, args: &HeartbeatArgs) -> Result<()> {
        for signal in [SIGTERM, SIGINT] {
            signal_hook::flag::register(signal, Arc::clone(&self.shutdown))
                .context("installing signal handler")?;
        }

        if args.fail {
            bail!("asked to fail");
        }

        let interval = Duration::from_millis(args.interval_ms);
        let mut beats: u64 = 0;

        while !self.shutdown.load(Ordering::Relaxed) {
            beats += 1;
            info!(beat = beats, pid = std::process::id(), "heartbeat");
            if args.exit_after == Some(beats) {
                break;
            }
            self.sleep(interval);
        }

        info!(beats, "heartbeat stopping");
        Ok(())
    }
}

impl Heartbeat {
    fn sleep(&self, interval: Duration) {
        let deadline = Instant::now() + interval;
        while !self.shutdown.load(Ordering::Relaxed) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}

fn main() -> ExitCode {
    daemonctl::cli::run(Heartbeat::default(), DEFAULT_PIDFILE)
}
