//! Deterministic test helpers for `actomaton` (§10.4).
//!
//! Pairs with `#[tokio::test]` plus `tokio::time::{pause, advance}`: spawn a
//! [`TestActomaton`], send actions, `drain()` to await every outstanding
//! `send`, then assert on state and (optionally) on [`record_actions`]'s
//! recorded history. Grounded on the teacher's `WorkScheduler::drain_all`
//! test helper (`crates/editor/src/scheduler/ops.rs`) and its use of
//! `parking_lot::Mutex` for shared test state
//! (`crates/editor/src/scheduler/tests.rs`).

#![warn(missing_docs)]

use std::sync::Arc;

use actomaton_core::{Actomaton, ActomatonConfig, Reducer, SendHandle, SendPriority};
use parking_lot::Mutex;

/// Wraps a [`Reducer`] to record every action it runs against, without
/// changing its behavior. Returns the wrapped reducer plus a handle for
/// reading back the recorded history in assertions.
pub fn record_actions<A, S, E>(reducer: Reducer<A, S, E>) -> (Reducer<A, S, E>, RecordedActions<A>)
where
	A: Clone + Send + Sync + 'static,
	S: Send + 'static,
	E: Send + Sync + 'static,
{
	let recorded = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&recorded);
	let wrapped = Reducer::new(move |action: &A, state: &mut S, env: &E| {
		sink.lock().push(action.clone());
		reducer.run(action, state, env)
	});
	(wrapped, RecordedActions { recorded })
}

/// Read-only handle onto the history recorded by [`record_actions`].
#[derive(Clone)]
pub struct RecordedActions<A> {
	recorded: Arc<Mutex<Vec<A>>>,
}

impl<A: Clone> RecordedActions<A> {
	/// A snapshot of every action recorded so far, in dispatch order.
	pub fn snapshot(&self) -> Vec<A> {
		self.recorded.lock().clone()
	}

	/// Number of actions recorded so far.
	pub fn len(&self) -> usize {
		self.recorded.lock().len()
	}

	/// `true` if no action has been recorded yet.
	pub fn is_empty(&self) -> bool {
		self.recorded.lock().is_empty()
	}
}

/// Wraps a running [`Actomaton`], tracking every [`SendHandle`] returned by
/// `send`/`send_with` so tests can await them all at once via
/// [`TestActomaton::drain`] instead of threading handles through by hand.
pub struct TestActomaton<A, S, E> {
	actomaton: Actomaton<A, S, E>,
	outstanding: Mutex<Vec<SendHandle>>,
}

impl<A, S, E> TestActomaton<A, S, E>
where
	A: Send + 'static,
	S: Clone + Send + 'static,
	E: Send + Sync + 'static,
{
	/// Spawns a fresh actomaton with default configuration and wraps it.
	pub fn new(state: S, reducer: Reducer<A, S, E>, env: E) -> Self {
		Self::wrap(Actomaton::new(state, reducer, env))
	}

	/// Spawns a fresh actomaton with explicit configuration and wraps it.
	pub fn with_config(state: S, reducer: Reducer<A, S, E>, env: E, config: ActomatonConfig) -> Self {
		Self::wrap(Actomaton::with_config(state, reducer, env, config))
	}

	/// Wraps an already-running actomaton.
	pub fn wrap(actomaton: Actomaton<A, S, E>) -> Self {
		Self {
			actomaton,
			outstanding: Mutex::new(Vec::new()),
		}
	}

	/// The wrapped actomaton, for any call not covered by this wrapper.
	pub fn actomaton(&self) -> &Actomaton<A, S, E> {
		&self.actomaton
	}

	/// Dispatches `action` at normal priority and tracks the returned
	/// handle for [`TestActomaton::drain`].
	pub async fn send(&self, action: A) {
		self.send_with(action, SendPriority::default(), false).await;
	}

	/// Dispatches `action` with explicit `priority`/`tracks_feedbacks` and
	/// tracks the returned handle for [`TestActomaton::drain`].
	pub async fn send_with(&self, action: A, priority: SendPriority, tracks_feedbacks: bool) {
		let handle = self.actomaton.send_with(action, priority, tracks_feedbacks).await;
		self.outstanding.lock().push(handle);
	}

	/// A snapshot of the current state, or `None` if the actor has already
	/// torn down.
	pub async fn snapshot(&self) -> Option<S> {
		self.actomaton.snapshot().await
	}

	/// Awaits every handle accumulated since the last `drain()` call. Under
	/// `tokio::time::pause()`, pair with `tokio::time::advance()` first so
	/// delayed effects actually become due.
	pub async fn drain(&self) {
		let handles: Vec<SendHandle> = std::mem::take(&mut *self.outstanding.lock());
		for handle in handles {
			let _ = handle.join().await;
		}
	}

	/// Requests teardown and waits for it to finish.
	pub async fn shutdown(&self) {
		self.actomaton.shutdown_and_wait().await;
	}
}
