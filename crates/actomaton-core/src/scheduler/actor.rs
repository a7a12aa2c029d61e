//! The actor loop (§3, §4.4, C4): owns `State`, the reducer, and the four
//! bookkeeping tables (running-tasks, queue-tasks, pending buffer,
//! latest-effect-date), reached exclusively through the mailbox. Every
//! mutation of `state` or the tables happens on this single task, which is
//! what makes admission, delay accounting, and cancellation race-free
//! without any lock (§4.4.6, §5).

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::stream::StreamExt;
use rustc_hash::{FxHashMap, FxHashSet};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::SendPriority;
use super::command::{Command, TaskFinished};
use super::handle::SendHandle;
use super::mailbox::Mailbox;
use crate::cancel_path::CancelOnFirstPoll;
use crate::effect::{BoxFuture, BoxStream, EffectKind};
use crate::error::Logger;
use crate::executor::Executor;
use crate::id::{EffectId, Overflow, QueuePolicy, QueueRef};
use crate::panic_util::panic_message;
use crate::reducer::Reducer;

type TaskKey = u64;
type TaskBody<A> = Box<dyn FnOnce() -> BoxFuture<Option<A>> + Send + 'static>;
type TaskMaker<A> = Box<dyn FnOnce() -> BoxFuture<Option<BoxStream<A>>> + Send + 'static>;
type Component = (oneshot::Receiver<usize>, CancellationToken);
/// An effect kind parked in a queue's pending buffer, along with the
/// `send` parameters it will feed its eventual completion back through.
type Pending<A> = (EffectKind<A>, SendPriority, bool);

/// Bookkeeping kept per spawned task, independent of its effect kind.
struct TaskMeta {
	id: EffectId,
	queue: Option<QueueRef>,
	cancel: CancellationToken,
	join: JoinHandle<()>,
}

pub(super) struct Actor<A, S, E> {
	pub(super) mailbox: Mailbox<A, S>,
	pub(super) rx: mpsc::Receiver<Command<A, S>>,
	pub(super) task_done_tx: mpsc::UnboundedSender<TaskFinished>,
	pub(super) task_done_rx: mpsc::UnboundedReceiver<TaskFinished>,
	pub(super) state: S,
	pub(super) reducer: Reducer<A, S, E>,
	pub(super) env: E,
	pub(super) logger: Arc<dyn Logger>,
	pub(super) executor: Arc<dyn Executor>,
	pub(super) state_watch: watch::Sender<S>,
	pub(super) state_changes: broadcast::Sender<S>,
	tasks: FxHashMap<TaskKey, TaskMeta>,
	running_tasks: FxHashMap<EffectId, FxHashSet<TaskKey>>,
	queue_tasks: FxHashMap<QueueRef, VecDeque<TaskKey>>,
	pending_buffer: FxHashMap<QueueRef, VecDeque<Pending<A>>>,
	latest_effect_date: FxHashMap<QueueRef, Instant>,
	next_task_key: TaskKey,
}

impl<A, S, E> Actor<A, S, E>
where
	A: Send + 'static,
	S: Clone + Send + 'static,
	E: Send + Sync + 'static,
{
	pub(super) fn new(
		mailbox: Mailbox<A, S>,
		rx: mpsc::Receiver<Command<A, S>>,
		state: S,
		reducer: Reducer<A, S, E>,
		env: E,
		logger: Arc<dyn Logger>,
		executor: Arc<dyn Executor>,
		state_watch: watch::Sender<S>,
		state_changes: broadcast::Sender<S>,
	) -> Self {
		let (task_done_tx, task_done_rx) = mpsc::unbounded_channel();
		Self {
			mailbox,
			rx,
			task_done_tx,
			task_done_rx,
			state,
			reducer,
			env,
			logger,
			executor,
			state_watch,
			state_changes,
			tasks: FxHashMap::default(),
			running_tasks: FxHashMap::default(),
			queue_tasks: FxHashMap::default(),
			pending_buffer: FxHashMap::default(),
			latest_effect_date: FxHashMap::default(),
			next_task_key: 0,
		}
	}

	/// The actor's mailbox loop. Runs until the command channel is closed
	/// or a `Shutdown` command is received.
	pub(super) async fn run(mut self) {
		loop {
			tokio::select! {
				Some(finished) = self.task_done_rx.recv() => {
					self.on_task_finished(finished.task_key);
				}
				cmd = self.rx.recv() => {
					match cmd {
						Some(Command::Send { action, priority, tracks_feedbacks, reply }) => {
							let handle = self.handle_send(action, priority, tracks_feedbacks);
							let _ = reply.send(handle);
						}
						Some(Command::Snapshot { reply }) => {
							let _ = reply.send(self.state.clone());
						}
						Some(Command::Shutdown { reply }) => {
							self.teardown().await;
							let _ = reply.send(());
							break;
						}
						None => {
							self.teardown().await;
							break;
						}
					}
				}
			}
		}
	}

	fn alloc_task_key(&mut self) -> TaskKey {
		let key = self.next_task_key;
		self.next_task_key += 1;
		key
	}

	/// Runs the reducer for one `send` activation and admits every
	/// resulting effect kind (§4.4.1, §4.4.2).
	fn handle_send(&mut self, action: A, priority: SendPriority, tracks_feedbacks: bool) -> SendHandle {
		tracing::trace!(?priority, tracks_feedbacks, "actomaton.send");
		let effect = self.reducer.run(&action, &mut self.state, &self.env);
		let _ = self.state_watch.send(self.state.clone());
		let _ = self.state_changes.send(self.state.clone());

		let mut handle = SendHandle::empty();
		let mut spawned = 0usize;
		for kind in effect.kinds {
			if let Some(component) = self.apply_effect_kind(kind, priority, tracks_feedbacks) {
				handle.push(component);
				spawned += 1;
			}
		}
		tracing::trace!(spawned, "actomaton.admission");
		handle
	}

	/// Admission (§4.4.2): decides whether an effect kind runs now, is
	/// buffered, is discarded via the cancel-path, or (for `Cancel` kinds)
	/// bypasses admission entirely.
	fn apply_effect_kind(&mut self, kind: EffectKind<A>, priority: SendPriority, tracks_feedbacks: bool) -> Option<Component> {
		let EffectKind::Cancel { predicate } = kind else {
			return self.admit(kind, priority, tracks_feedbacks);
		};
		self.cancel_where(&*predicate);
		None
	}

	fn admit(&mut self, kind: EffectKind<A>, priority: SendPriority, tracks_feedbacks: bool) -> Option<Component> {
		let queue = match &kind {
			EffectKind::Single { queue, .. } | EffectKind::Sequence { queue, .. } => queue.clone(),
			EffectKind::Cancel { .. } => unreachable!("cancel kinds are filtered out before admission"),
		};

		let Some(q) = queue else {
			return Some(self.admit_now(kind, Duration::ZERO, priority, tracks_feedbacks));
		};

		let running = self.queue_tasks.get(&q).map_or(0, VecDeque::len);
		match q.policy {
			QueuePolicy::RunNewest { max } => {
				let delay = self.compute_delay(&q);
				let component = self.admit_now(kind, delay, priority, tracks_feedbacks);
				self.evict_oldest_over_capacity(&q, max);
				Some(component)
			}
			QueuePolicy::RunOldest { max, .. } if running < max => {
				let delay = self.compute_delay(&q);
				Some(self.admit_now(kind, delay, priority, tracks_feedbacks))
			}
			QueuePolicy::RunOldest { overflow, .. } => match overflow {
				Overflow::SuspendNew => {
					tracing::debug!(queue = ?q, "actomaton.run_oldest.suspend");
					self.pending_buffer.entry(q).or_default().push_back((kind, priority, tracks_feedbacks));
					None
				}
				Overflow::DiscardNew => {
					tracing::debug!(queue = ?q, "actomaton.run_oldest.discard");
					self.spawn_cancel_path(kind);
					None
				}
			},
		}
	}

	/// Delay accounting (§4.4.3): `target_delay = max(0, (latest - now) +
	/// delay_sample)`, and `latest_effect_date[q]` advances to `now +
	/// target_delay`. Sampling happens here, inside the admission critical
	/// section, per the spec's determinism resolution.
	fn compute_delay(&mut self, q: &QueueRef) -> Duration {
		let now = Instant::now();
		let sample = q.delay.sample();
		let delay = match self.latest_effect_date.get(q) {
			None => Duration::ZERO,
			Some(&latest) if latest > now => (latest - now) + sample,
			Some(&latest) => sample.saturating_sub(now - latest),
		};
		self.latest_effect_date.insert(q.clone(), now + delay);
		delay
	}

	/// `RunNewest`: cancels the oldest running tasks in `q` until at most
	/// `max` remain, including the task just admitted (§4.4.2).
	fn evict_oldest_over_capacity(&mut self, q: &QueueRef, max: usize) {
		let drop_count = self.queue_tasks.get(q).map_or(0, VecDeque::len).saturating_sub(max);
		if drop_count == 0 {
			return;
		}
		let mut evicted = Vec::with_capacity(drop_count);
		if let Some(list) = self.queue_tasks.get_mut(q) {
			for _ in 0..drop_count {
				if let Some(key) = list.pop_front() {
					evicted.push(key);
				}
			}
			if list.is_empty() {
				self.queue_tasks.remove(q);
			}
		}
		for key in &evicted {
			self.drop_task_from_tables(*key, false);
		}
		tracing::debug!(queue = ?q, dropped = evicted.len(), "actomaton.run_newest.evict");
	}

	/// Removes a task's bookkeeping from `tasks`/`running_tasks` (and, if
	/// `also_from_queue`, from `queue_tasks` too) and cancels it. Used by
	/// both eviction (where `queue_tasks` is mutated by the caller already)
	/// and id-based cancellation.
	fn drop_task_from_tables(&mut self, key: TaskKey, also_from_queue: bool) {
		let Some(meta) = self.tasks.remove(&key) else { return };
		meta.cancel.cancel();
		if let Some(set) = self.running_tasks.get_mut(&meta.id) {
			set.remove(&key);
			if set.is_empty() {
				self.running_tasks.remove(&meta.id);
			}
		}
		if also_from_queue && let Some(q) = &meta.queue {
			if let Some(list) = self.queue_tasks.get_mut(q) {
				if let Some(pos) = list.iter().position(|k| *k == key) {
					list.remove(pos);
				}
				if list.is_empty() {
					self.queue_tasks.remove(q);
				}
			}
		}
	}

	/// Cancel-by-id (§4.4.2, §4.4.4): synchronously cancels every running
	/// task whose id matches, and drops (via the cancel-path) every pending
	/// buffered effect whose id matches.
	fn cancel_where(&mut self, predicate: &(dyn Fn(&EffectId) -> bool + Send + Sync)) {
		let matching: Vec<EffectId> = self.running_tasks.keys().filter(|id| predicate(id)).cloned().collect();
		for id in matching {
			if let Some(keys) = self.running_tasks.remove(&id) {
				for key in keys {
					self.drop_task_from_tables(key, true);
				}
			}
		}

		for list in self.pending_buffer.values_mut() {
			let mut i = 0;
			while i < list.len() {
				let matches = match &list[i].0 {
					EffectKind::Single { id, .. } | EffectKind::Sequence { id, .. } => {
						let effective = id.clone().unwrap_or_else(EffectId::anonymous);
						predicate(&effective)
					}
					EffectKind::Cancel { .. } => false,
				};
				if matches {
					let (kind, _, _) = list.remove(i).expect("index in bounds");
					self.spawn_cancel_path(kind);
				} else {
					i += 1;
				}
			}
		}
		self.pending_buffer.retain(|_, list| !list.is_empty());
	}

	fn admit_now(&mut self, kind: EffectKind<A>, delay: Duration, priority: SendPriority, tracks_feedbacks: bool) -> Component {
		match kind {
			EffectKind::Single { id, queue, body } => self.spawn_single(id, queue, body, delay, priority, tracks_feedbacks),
			EffectKind::Sequence { id, queue, make } => self.spawn_sequence(id, queue, make, delay, priority, tracks_feedbacks),
			EffectKind::Cancel { .. } => unreachable!("cancel kinds are filtered out before admission"),
		}
	}

	/// Allocates a task key and cancellation token and registers them in
	/// `running_tasks`/`queue_tasks` before the task's future is spawned,
	/// so the future can be built with its own key and token already
	/// baked in (it needs both to report completion and observe
	/// cancellation).
	fn reserve_task(&mut self, id: Option<EffectId>, queue: Option<QueueRef>) -> (TaskKey, EffectId, CancellationToken) {
		let effective_id = id.unwrap_or_else(EffectId::anonymous);
		let task_key = self.alloc_task_key();
		let cancel = CancellationToken::new();
		self.running_tasks.entry(effective_id.clone()).or_default().insert(task_key);
		if let Some(q) = &queue {
			self.queue_tasks.entry(q.clone()).or_default().push_back(task_key);
		}
		(task_key, effective_id, cancel)
	}

	fn finish_registering(&mut self, task_key: TaskKey, id: EffectId, queue: Option<QueueRef>, cancel: CancellationToken, join: JoinHandle<()>) {
		self.tasks.insert(task_key, TaskMeta { id, queue, cancel, join });
	}

	/// Spawns a `Single` effect's task (§4.4.3): sleeps for `delay`
	/// (uncancellable), then races the body against cancellation. The
	/// body's output feeds back through `send`; a panic is caught and
	/// logged rather than propagated.
	fn spawn_single(
		&mut self,
		id: Option<EffectId>,
		queue: Option<QueueRef>,
		body: TaskBody<A>,
		delay: Duration,
		priority: SendPriority,
		tracks_feedbacks: bool,
	) -> Component {
		let (task_key, effective_id, cancel) = self.reserve_task(id.clone(), queue.clone());
		let (completion_tx, completion_rx) = oneshot::channel();
		let task_done_tx = self.task_done_tx.clone();
		let mailbox = self.mailbox.clone();
		let logger = Arc::clone(&self.logger);
		let log_id = id;
		let cancel_in_task = cancel.clone();

		let fut = async move {
			tokio::time::sleep(delay).await;
			let mut failed = 0usize;
			tokio::select! {
				_ = cancel_in_task.cancelled() => {}
				result = AssertUnwindSafe(body()).catch_unwind() => {
					match result {
						Ok(Some(action)) => {
							let feedback = mailbox.dispatch(action, priority, tracks_feedbacks).await;
							if tracks_feedbacks && feedback.join().await.is_err() {
								failed += 1;
							}
						}
						Ok(None) => {}
						Err(panic) => {
							logger.body_threw(log_id.as_ref(), &panic_message(panic));
							failed += 1;
						}
					}
				}
			}
			let _ = task_done_tx.send(TaskFinished { task_key });
			let _ = completion_tx.send(failed);
		};

		let join = self.executor.spawn(Box::pin(fut));
		self.finish_registering(task_key, effective_id, queue, cancel.clone(), join);
		(completion_rx, cancel)
	}

	/// Spawns a `Sequence` effect's task (§4.4.3): as [`Actor::spawn_single`]
	/// but iterating a lazily-created stream, feeding back each element.
	fn spawn_sequence(
		&mut self,
		id: Option<EffectId>,
		queue: Option<QueueRef>,
		make: TaskMaker<A>,
		delay: Duration,
		priority: SendPriority,
		tracks_feedbacks: bool,
	) -> Component {
		let (task_key, effective_id, cancel) = self.reserve_task(id.clone(), queue.clone());
		let (completion_tx, completion_rx) = oneshot::channel();
		let task_done_tx = self.task_done_tx.clone();
		let mailbox = self.mailbox.clone();
		let logger = Arc::clone(&self.logger);
		let log_id = id;
		let cancel_in_task = cancel.clone();

		let fut = async move {
			tokio::time::sleep(delay).await;
			let maybe_stream = tokio::select! {
				_ = cancel_in_task.cancelled() => None,
				result = AssertUnwindSafe(make()).catch_unwind() => match result {
					Ok(stream) => stream,
					Err(panic) => {
						logger.stream_threw(log_id.as_ref(), &panic_message(panic), 0);
						None
					}
				},
			};

			let mut failed = 0usize;
			if let Some(mut stream) = maybe_stream {
				let mut yielded = 0usize;
				let mut feedback_handles = Vec::new();
				loop {
					let next = tokio::select! {
						_ = cancel_in_task.cancelled() => break,
						item = AssertUnwindSafe(stream.next()).catch_unwind() => item,
					};
					match next {
						Ok(Some(action)) => {
							yielded += 1;
							let feedback = mailbox.dispatch(action, priority, tracks_feedbacks).await;
							if tracks_feedbacks {
								feedback_handles.push(feedback);
							}
						}
						Ok(None) => break,
						Err(panic) => {
							logger.stream_threw(log_id.as_ref(), &panic_message(panic), yielded);
							break;
						}
					}
				}
				if tracks_feedbacks {
					let results = futures::future::join_all(feedback_handles.into_iter().map(|h| h.join())).await;
					failed += results.into_iter().filter(Result::is_err).count();
				}
			}
			let _ = task_done_tx.send(TaskFinished { task_key });
			let _ = completion_tx.send(failed);
		};

		let join = self.executor.spawn(Box::pin(fut));
		self.finish_registering(task_key, effective_id, queue, cancel.clone(), join);
		(completion_rx, cancel)
	}

	/// Discards an effect via the cancel-path (§4.4.4, §4.4.5): the body
	/// (or stream maker) is invoked and polled exactly once, then dropped,
	/// so its cancellation/cleanup branch runs without ever performing the
	/// real work. Never registered in any table.
	fn spawn_cancel_path(&self, kind: EffectKind<A>) {
		match kind {
			EffectKind::Single { body, .. } => {
				self.executor.spawn(Box::pin(CancelOnFirstPoll::new(body())));
			}
			EffectKind::Sequence { make, .. } => {
				self.executor.spawn(Box::pin(CancelOnFirstPoll::new(make())));
			}
			EffectKind::Cancel { .. } => {}
		}
	}

	fn on_task_finished(&mut self, task_key: TaskKey) {
		let Some(meta) = self.tasks.remove(&task_key) else { return };
		if let Some(set) = self.running_tasks.get_mut(&meta.id) {
			set.remove(&task_key);
			if set.is_empty() {
				self.running_tasks.remove(&meta.id);
			}
		}
		tracing::trace!(id = ?meta.id, "actomaton.task.completed");
		let _ = meta.join;
		if let Some(q) = meta.queue {
			if let Some(list) = self.queue_tasks.get_mut(&q) {
				if let Some(pos) = list.iter().position(|k| *k == task_key) {
					list.remove(pos);
				}
				if list.is_empty() {
					self.queue_tasks.remove(&q);
				}
			}
			if matches!(
				q.policy,
				QueuePolicy::RunOldest {
					overflow: Overflow::SuspendNew,
					..
				}
			) {
				self.promote_pending(&q);
			}
		}
	}

	/// Promotes the head of `pending_buffer[q]` into a running task, now
	/// that a slot has freed (§4.4.3 step 7). The effect is known to fit
	/// since the caller just observed a free slot.
	fn promote_pending(&mut self, q: &QueueRef) {
		let Some(list) = self.pending_buffer.get_mut(q) else { return };
		let Some((kind, priority, tracks_feedbacks)) = list.pop_front() else { return };
		if list.is_empty() {
			self.pending_buffer.remove(q);
		}
		let delay = self.compute_delay(q);
		let _ = self.admit_now(kind, delay, priority, tracks_feedbacks);
	}

	/// Teardown (§4.6): cancels every running task and drains the pending
	/// buffer via the cancel-path, then awaits every currently-tracked
	/// task's join handle so `shutdown_and_wait` observes a fully drained
	/// actor.
	async fn teardown(&mut self) {
		tracing::debug!("actomaton.teardown");
		let metas: Vec<TaskMeta> = self.tasks.drain().map(|(_, meta)| meta).collect();
		self.running_tasks.clear();
		self.queue_tasks.clear();
		for meta in &metas {
			meta.cancel.cancel();
		}
		for (_, list) in self.pending_buffer.drain() {
			for (kind, _, _) in list {
				self.spawn_cancel_path(kind);
			}
		}
		for meta in metas {
			let _ = meta.join.await;
		}
	}
}
