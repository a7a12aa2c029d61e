//! The public facade (§4, §6, C6): the single type a caller constructs,
//! sends actions through, and tears down.

use std::marker::PhantomData;
use std::sync::Arc;

use futures::Stream;
use tokio::sync::{broadcast, mpsc, watch};

use super::SendPriority;
use super::actor::Actor;
use super::handle::SendHandle;
use super::mailbox::Mailbox;
use crate::error::{Logger, TracingLogger};
use crate::executor::{Executor, TokioExecutor};
use crate::reducer::Reducer;

/// Bounded mailbox capacity used unless [`ActomatonConfig::mailbox_capacity`]
/// overrides it. Matches the teacher's `SharedStateService::start`, which
/// sizes its own command channel at 256 rather than using an unbounded one
/// (§11).
const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Bounded capacity for the [`Actomaton::subscribe_changes`] broadcast
/// channel.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Construction knobs for [`Actomaton::with_config`] (§4.6, REDESIGN FLAGS).
pub struct ActomatonConfig {
	/// Capacity of the bounded command mailbox.
	pub mailbox_capacity: usize,
	/// Capacity of the `subscribe_changes()` broadcast channel. Slow
	/// subscribers observe `RecvError::Lagged` rather than blocking sends.
	pub broadcast_capacity: usize,
	/// Where the actor loop and every effect task are spawned. Swapping in
	/// an executor backed by a current-thread runtime is how a caller pins
	/// everything to one OS thread, rather than a separate scheduler type.
	pub executor: Arc<dyn Executor>,
	/// Sink for the two locally-recovered failure kinds (§7).
	pub logger: Arc<dyn Logger>,
}

impl Default for ActomatonConfig {
	fn default() -> Self {
		Self {
			mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
			broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
			executor: Arc::new(TokioExecutor),
			logger: Arc::new(TracingLogger),
		}
	}
}

/// A running effectful state machine (§1-§9).
///
/// Cloning an `Actomaton` yields another handle to the same actor; the
/// actor's state and bookkeeping tables are never duplicated, only the
/// mailbox sender and observation-channel receivers are.
pub struct Actomaton<A, S, E> {
	mailbox: Mailbox<A, S>,
	state_watch: watch::Receiver<S>,
	state_changes: broadcast::Sender<S>,
	_environment: PhantomData<fn() -> E>,
}

impl<A, S, E> Clone for Actomaton<A, S, E> {
	fn clone(&self) -> Self {
		Self {
			mailbox: self.mailbox.clone(),
			state_watch: self.state_watch.clone(),
			state_changes: self.state_changes.clone(),
			_environment: PhantomData,
		}
	}
}

impl<A, S, E> Actomaton<A, S, E>
where
	A: Send + 'static,
	S: Clone + Send + 'static,
	E: Send + Sync + 'static,
{
	/// Spawns a new actor with default configuration (a 256-slot mailbox,
	/// `TokioExecutor`, `TracingLogger`).
	pub fn new(state: S, reducer: Reducer<A, S, E>, env: E) -> Self {
		Self::with_config(state, reducer, env, ActomatonConfig::default())
	}

	/// Spawns a new actor with explicit configuration.
	pub fn with_config(state: S, reducer: Reducer<A, S, E>, env: E, config: ActomatonConfig) -> Self {
		let ActomatonConfig {
			mailbox_capacity,
			broadcast_capacity,
			executor,
			logger,
		} = config;

		let (tx, rx) = mpsc::channel(mailbox_capacity);
		let (state_watch_tx, state_watch_rx) = watch::channel(state.clone());
		let (state_changes_tx, _) = broadcast::channel(broadcast_capacity);

		let mailbox = Mailbox::new(tx);
		let actor = Actor::new(
			mailbox.clone(),
			rx,
			state,
			reducer,
			env,
			logger,
			Arc::clone(&executor),
			state_watch_tx,
			state_changes_tx.clone(),
		);
		executor.spawn(Box::pin(actor.run()));

		Self {
			mailbox,
			state_watch: state_watch_rx,
			state_changes: state_changes_tx,
			_environment: PhantomData,
		}
	}
}

impl<A, S> Actomaton<A, S, ()>
where
	A: Send + 'static,
	S: Clone + Send + 'static,
{
	/// Convenience constructor for the common case of no shared environment
	/// (§11, spec.md §6's "variant with `environment = unit`").
	pub fn new_stateless(state: S, reducer: Reducer<A, S, ()>) -> Self {
		Self::new(state, reducer, ())
	}
}

impl<A, S, E> Actomaton<A, S, E>
where
	A: Send + 'static,
	S: Clone + Send + 'static,
	E: Send + Sync + 'static,
{
	/// Dispatches `action` at normal priority, not tracking feedback
	/// completion (§4.2's defaults).
	pub async fn send(&self, action: A) -> SendHandle {
		self.send_with(action, SendPriority::default(), false).await
	}

	/// Dispatches `action` with explicit `priority` and `tracks_feedbacks`
	/// (§4.2, §4.4.1).
	pub async fn send_with(&self, action: A, priority: SendPriority, tracks_feedbacks: bool) -> SendHandle {
		self.mailbox.dispatch(action, priority, tracks_feedbacks).await
	}

	/// The current state, or `None` if the actor has already torn down.
	pub async fn snapshot(&self) -> Option<S> {
		self.mailbox.snapshot().await
	}

	/// A lossy, coalescing stream of state (§4.5, §11): the current value
	/// immediately, then the latest value whenever it changes. Intermediate
	/// states between two polls are not guaranteed to be observed.
	pub fn subscribe(&self) -> impl Stream<Item = S> + Send + 'static {
		futures::stream::unfold((self.state_watch.clone(), true), |(mut rx, first)| async move {
			if first {
				let value = rx.borrow().clone();
				return Some((value, (rx, false)));
			}
			if rx.changed().await.is_err() {
				return None;
			}
			let value = rx.borrow().clone();
			Some((value, (rx, false)))
		})
	}

	/// Every state change, none skipped, surfacing `RecvError::Lagged` to a
	/// subscriber that falls behind the broadcast channel's capacity
	/// (§4.5, §11).
	pub fn subscribe_changes(&self) -> impl Stream<Item = Result<S, broadcast::error::RecvError>> + Send + 'static {
		futures::stream::unfold(self.state_changes.subscribe(), |mut rx| async move {
			match rx.recv().await {
				Ok(state) => Some((Ok(state), rx)),
				Err(broadcast::error::RecvError::Lagged(skipped)) => Some((Err(broadcast::error::RecvError::Lagged(skipped)), rx)),
				Err(broadcast::error::RecvError::Closed) => None,
			}
		})
	}

	/// Requests teardown and returns immediately (§4.6, §11): cancels every
	/// running task and drops every pending one via the cancel-path, but
	/// does not wait for that to finish.
	pub async fn shutdown(&self) {
		self.mailbox.shutdown(false).await;
	}

	/// Requests teardown and waits until every task has actually stopped
	/// (§4.6, §11).
	pub async fn shutdown_and_wait(&self) {
		self.mailbox.shutdown(true).await;
	}
}
