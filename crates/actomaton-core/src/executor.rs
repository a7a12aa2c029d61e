//! Executor abstraction (§4.6, §5, REDESIGN FLAGS): the scheduler is
//! scheduling-model agnostic. A main-thread-pinned variant is obtained by
//! choosing an executor backed by a current-thread Tokio runtime, rather
//! than by duplicating the scheduler.

use std::future::Future;
use std::pin::Pin;

use tokio::task::JoinHandle;

/// Spawns detached, `'static` futures onto some underlying runtime.
///
/// The scheduler core never hard-codes `tokio::spawn`: it spawns every
/// task, including the actor's own mailbox loop, through an `Executor` so
/// that a caller pinning everything to one OS thread need only hand in a
/// `TokioExecutor` built from a current-thread `tokio::runtime::Runtime`
/// rather than a multi-thread one. No separate "main-thread Actomaton"
/// type exists.
pub trait Executor: Send + Sync + 'static {
	/// Spawns `fut`, returning a handle that resolves when it completes.
	fn spawn(&self, fut: Pin<Box<dyn Future<Output = ()> + Send + 'static>>) -> JoinHandle<()>;
}

/// The default executor: spawns onto whichever Tokio runtime is current
/// when [`Executor::spawn`] is called.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioExecutor;

impl Executor for TokioExecutor {
	fn spawn(&self, fut: Pin<Box<dyn Future<Output = ()> + Send + 'static>>) -> JoinHandle<()> {
		tokio::spawn(fut)
	}
}
