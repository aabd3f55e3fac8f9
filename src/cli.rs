//! Command-line front end shared by every daemon binary.
//!
//! Usage:
//!   <daemon> [OPTIONS] start      # Detach and run the worker
//!   <daemon> [OPTIONS] stop       # Stop the running daemon
//!   <daemon> [OPTIONS] restart    # stop, then start
//!   <daemon> [OPTIONS] test       # Run the worker in the foreground
//!   <daemon> [OPTIONS] status     # Report whether the daemon runs
//!
//! The worker's own flags (its `Worker::Args`) are merged into `OPTIONS`.

use clap::{ArgAction, Args, CommandFactory, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;

use crate::config::SupervisorConfig;
use crate::daemon::{Lifecycle, Supervisor};
use crate::error::{DaemonError, Result};
use crate::logging;
use crate::worker::Worker;

/// LSB status code: program is dead and the pidfile exists.
const EXIT_STALE: u8 = 1;
/// LSB status code: program is not running.
const EXIT_NOT_RUNNING: u8 = 3;

#[derive(Debug, Parser)]
pub struct DaemonCli<A: Args> {
    /// Pidfile location (overrides the config file)
    #[arg(short = 'p', long = "pid-file", global = true)]
    pub pid_file: Option<PathBuf>,

    /// TOML file with supervisor settings
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten, next_help_heading = "Daemon options")]
    pub worker: A,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Start the service, if not already running, with the given options
    Start,
    /// Stop the service, if it is running
    Stop,
    /// Restart the service, possibly changing the options
    Restart,
    /// Run the service without daemonizing
    Test,
    /// Report whether the service is running (exit 1 if stale, 3 if not running)
    Status,
}

impl Command {
    /// Whether this command ends with the process detached from the terminal.
    pub fn detaches(self) -> bool {
        matches!(self, Command::Start | Command::Restart)
    }
}

/// Parse the command line, run the requested command and map the outcome to
/// an exit code. `default_pidfile` is used unless `--pid-file` or the config
/// file say otherwise.
pub fn run<W>(worker: W, default_pidfile: impl AsRef<Path>) -> ExitCode
where
    W: Worker,
    W::Args: Args,
{
    let cli = DaemonCli::<W::Args>::parse();
    let detaching = cli.command.is_some_and(Command::detaches);
    logging::init(
        cli.verbose,
        logging::use_ansi(detaching, std::io::stderr().is_terminal()),
    );

    match execute(cli, worker, default_pidfile.as_ref()) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Dispatch an already-parsed command line. Returns the process exit status.
pub fn execute<W>(cli: DaemonCli<W::Args>, worker: W, default_pidfile: &Path) -> Result<u8>
where
    W: Worker,
    W::Args: Args,
{
    let Some(command) = cli.command else {
        println!("{}", DaemonCli::<W::Args>::command().render_help());
        return Ok(0);
    };

    let config = resolve_config(cli.config.as_deref(), cli.pid_file, default_pidfile)?;
    debug!(?command, ?config, "resolved configuration");
    let mut supervisor = Supervisor::new(config, worker);

    match command {
        Command::Start => supervisor.start(&cli.worker)?,
        Command::Stop => supervisor.stop()?,
        Command::Restart => supervisor.restart(&cli.worker)?,
        Command::Test => supervisor.test(&cli.worker)?,
        Command::Status => {
            let state = supervisor.status()?;
            println!("{}", state);
            return Ok(match state {
                Lifecycle::Running(_) => 0,
                Lifecycle::Stale(_) => EXIT_STALE,
                Lifecycle::NotRunning => EXIT_NOT_RUNNING,
            });
        }
    }
    Ok(0)
}

/// Defaults, then the config file, then `--pid-file`. Relative paths are
/// anchored at the current directory, since the daemon changes directory.
pub fn resolve_config(
    config_file: Option<&Path>,
    pid_file: Option<PathBuf>,
    default_pidfile: &Path,
) -> Result<SupervisorConfig> {
    let mut config = match config_file {
        Some(path) => SupervisorConfig::load(path, default_pidfile)?,
        None => SupervisorConfig::new(default_pidfile),
    };
    if let Some(pid_file) = pid_file {
        config.pidfile = pid_file;
    }

    let cwd = std::env::current_dir().map_err(|e| DaemonError::io(".", e))?;
    config.pidfile = absolute(&cwd, &config.pidfile);
    config.log_file = config.log_file.map(|p| absolute(&cwd, &p));
    Ok(config)
}

fn absolute(cwd: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
