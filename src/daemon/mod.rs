//! Daemon module — detaching a worker and controlling it through a pidfile.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           daemon process                 │
//! │  - double-forked, no controlling tty    │
//! │  - writes pidfile, runs the worker      │
//! │  - removes pidfile on normal exit       │
//! └─────────────────────────────────────────┘
//!           ▲
//!           │ <pidfile> + SIGTERM
//!           ▼
//! ┌─────────────────────────────────────────┐
//! │           control invocation             │
//! │  - start / stop / restart / status      │
//! │  - flock on <pidfile>.lock              │
//! └─────────────────────────────────────────┘
//! ```

pub mod detach;
pub mod pidfile;
pub mod signal;
pub mod supervisor;

pub use detach::{detach, DetachOptions};
pub use pidfile::{PidfileGuard, PidfileLock};
pub use signal::{is_alive, terminate, StopPolicy};
pub use supervisor::{Lifecycle, Supervisor};
