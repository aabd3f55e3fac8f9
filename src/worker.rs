//! The unit of domain logic the supervisor runs.

use std::marker::PhantomData;

/// A long-running job that the [`Supervisor`](crate::daemon::Supervisor)
/// runs detached (`start`, `restart`) or in the foreground (`test`).
///
/// `Args` carries the worker's own configuration. When the worker is driven
/// by [`cli::run`](crate::cli::run) it must also implement `clap::Args` so
/// the worker's flags are merged into the command line.
pub trait Worker {
    type Args;

    /// Run until done. Detached workers usually only return on SIGTERM.
    fn run(&mut self, args: &Self::Args) -> anyhow::Result<()>;
}

/// Worker built from a closure. See [`worker_fn`].
pub struct FnWorker<A, F> {
    f: F,
    _args: PhantomData<fn(&A)>,
}

/// Wrap a closure as a [`Worker`].
pub fn worker_fn<A, F>(f: F) -> FnWorker<A, F>
where
    F: FnMut(&A) -> anyhow::Result<()>,
{
    FnWorker {
        f,
        _args: PhantomData,
    }
}

impl<A, F> Worker for FnWorker<A, F>
where
    F: FnMut(&A) -> anyhow::Result<()>,
{
    type Args = A;

    fn run(&mut self, args: &A) -> anyhow::Result<()> {
        (self.f)(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_worker_receives_args() {
        let mut seen = Vec::new();
        {
            let mut worker = worker_fn(|n: &u32| {
                seen.push(*n);
                Ok(())
            });
            worker.run(&7).unwrap();
            worker.run(&8).unwrap();
        }
        assert_eq!(seen, vec![7, 8]);
    }

    #[test]
    fn test_fn_worker_propagates_error() {
        let mut worker = worker_fn(|_: &()| anyhow::bail!("no mixer"));
        let err = worker.run(&()).unwrap_err();
        assert_eq!(err.to_string(), "no mixer");
    }
}
