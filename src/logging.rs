//! Logging setup.
//!
//! Logs go to stderr. Once a process has detached, stderr points at the
//! configured log file (or the null device), so the same subscriber keeps
//! working in the background. Colour is decided once at startup, so a
//! process that is about to detach must log without it.

use tracing_subscriber::EnvFilter;

/// Map `-v` occurrences to a default filter directive.
fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Whether to colour output. Never when the process will detach, since its
/// stderr then ends up in a log file.
pub fn use_ansi(detaching: bool, stderr_is_terminal: bool) -> bool {
    !detaching && stderr_is_terminal
}

/// Install the global subscriber. `RUST_LOG` overrides `verbosity`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(verbosity: u8, ansi: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(ansi)
        .with_target(false)
        .try_init();
}
