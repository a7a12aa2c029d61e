//! The effect model (§4.1, C1): a declarative list of side-effect
//! descriptions returned by a [`crate::reducer::Reducer`].

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::stream::{Stream, StreamExt};

use crate::id::{EffectId, QueueRef};

/// A future, boxed and pinned for storage in a trait object.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// A stream, boxed and pinned for storage in a trait object.
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send + 'static>>;

type BodyThunk<A> = Box<dyn FnOnce() -> BoxFuture<Option<A>> + Send + 'static>;
type MakeThunk<A> = Box<dyn FnOnce() -> BoxFuture<Option<BoxStream<A>>> + Send + 'static>;
type CancelPredicate = Arc<dyn Fn(&EffectId) -> bool + Send + Sync + 'static>;

/// One atom of an [`Effect`] — a single async operation, a lazily-created
/// multi-shot stream, or a cancellation request (§3).
pub enum EffectKind<A> {
	/// One async operation producing at most one feedback action.
	Single {
		/// Identity used for co-location and cancellation.
		id: Option<EffectId>,
		/// Queue tag controlling admission and delay.
		queue: Option<QueueRef>,
		/// The body, invoked at most once, on admission.
		body: BodyThunk<A>,
	},
	/// A lazily-created, possibly-infinite, non-restartable stream of
	/// feedback actions.
	Sequence {
		/// Identity used for co-location and cancellation.
		id: Option<EffectId>,
		/// Queue tag controlling admission and delay.
		queue: Option<QueueRef>,
		/// Invoked at most once, on admission, to create the stream.
		make: MakeThunk<A>,
	},
	/// Cancels every running and pending effect whose id matches the
	/// predicate.
	Cancel {
		/// Returns `true` for ids that should be cancelled.
		predicate: CancelPredicate,
	},
}

impl<A> fmt::Debug for EffectKind<A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EffectKind::Single { id, queue, .. } => f
				.debug_struct("Single")
				.field("id", id)
				.field("queue", queue)
				.finish(),
			EffectKind::Sequence { id, queue, .. } => f
				.debug_struct("Sequence")
				.field("id", id)
				.field("queue", queue)
				.finish(),
			EffectKind::Cancel { .. } => f.debug_struct("Cancel").finish(),
		}
	}
}

/// An ordered list of [`EffectKind`]s returned by a reducer run.
///
/// `Effect` forms a monoid under [`Effect::empty`] / [`Effect::concat`]; the
/// `+` operator and [`Extend`] are provided as convenience.
pub struct Effect<A> {
	pub(crate) kinds: Vec<EffectKind<A>>,
}

impl<A> fmt::Debug for Effect<A> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("Effect").field(&self.kinds).finish()
	}
}

impl<A> Default for Effect<A> {
	fn default() -> Self {
		Self::empty()
	}
}

impl<A: Send + 'static> Effect<A> {
	/// The empty effect — the monoid identity.
	pub fn empty() -> Self {
		Self { kinds: Vec::new() }
	}

	/// Concatenates two effect lists; `l`'s kinds are admitted before `r`'s.
	pub fn concat(mut l: Self, r: Self) -> Self {
		l.kinds.extend(r.kinds);
		l
	}

	/// One async operation producing at most one feedback action.
	pub fn from_async<F, Fut>(id: Option<EffectId>, queue: Option<QueueRef>, body: F) -> Self
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Option<A>> + Send + 'static,
	{
		Self {
			kinds: vec![EffectKind::Single {
				id,
				queue,
				body: Box::new(move || Box::pin(body())),
			}],
		}
	}

	/// An async operation with no feedback action, run purely for its side
	/// effects. Equivalent to [`Effect::from_async`] always returning
	/// `None`.
	pub fn fire_and_forget<F, Fut>(id: Option<EffectId>, queue: Option<QueueRef>, body: F) -> Self
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		Self::from_async(id, queue, move || async move {
			body().await;
			None
		})
	}

	/// A lazily-created, multi-shot stream of feedback actions. `make`
	/// itself is async so that stream creation can be delayed and
	/// cancelled.
	pub fn from_stream<F, Fut, St>(id: Option<EffectId>, queue: Option<QueueRef>, make: F) -> Self
	where
		F: FnOnce() -> Fut + Send + 'static,
		Fut: Future<Output = Option<St>> + Send + 'static,
		St: Stream<Item = A> + Send + 'static,
	{
		Self {
			kinds: vec![EffectKind::Sequence {
				id,
				queue,
				make: Box::new(move || {
					Box::pin(async move {
						let stream = make().await?;
						Some(Box::pin(stream) as BoxStream<A>)
					})
				}),
			}],
		}
	}

	/// Synchronous sugar: a single trivially-completing task yielding `a`
	/// with no identity or queue.
	pub fn next_action(a: A) -> Self {
		Self::from_async(None, None, move || async move { Some(a) })
	}

	/// Requests cancellation of every running and pending effect with this
	/// exact id.
	pub fn cancel(id: EffectId) -> Self {
		Self::cancel_where(move |candidate| *candidate == id)
	}

	/// Requests cancellation of every running and pending effect whose id
	/// satisfies `predicate`.
	pub fn cancel_where<F>(predicate: F) -> Self
	where
		F: Fn(&EffectId) -> bool + Send + Sync + 'static,
	{
		Self {
			kinds: vec![EffectKind::Cancel {
				predicate: Arc::new(predicate),
			}],
		}
	}

	/// Rewrites the action type produced by every `Single`/`Sequence` kind.
	/// Cancellation kinds pass through unchanged.
	pub fn map_action<B, F>(self, f: F) -> Effect<B>
	where
		B: Send + 'static,
		F: Fn(A) -> B + Send + Sync + 'static,
	{
		let f = Arc::new(f);
		let kinds = self
			.kinds
			.into_iter()
			.map(|kind| match kind {
				EffectKind::Single { id, queue, body } => {
					let f = Arc::clone(&f);
					EffectKind::Single {
						id,
						queue,
						body: Box::new(move || {
							Box::pin(async move { body().await.map(|a| f(a)) })
						}),
					}
				}
				EffectKind::Sequence { id, queue, make } => {
					let f = Arc::clone(&f);
					EffectKind::Sequence {
						id,
						queue,
						make: Box::new(move || {
							Box::pin(async move {
								let stream = make().await?;
								Some(Box::pin(stream.map(move |a| f(a))) as BoxStream<B>)
							})
						}),
					}
				}
				EffectKind::Cancel { predicate } => EffectKind::Cancel { predicate },
			})
			.collect();
		Effect { kinds }
	}

	/// Rewrites the identity of every `Single`/`Sequence` kind that already
	/// carries one, leaving anonymous effects and `Cancel` kinds untouched.
	pub fn map_id<F>(self, f: F) -> Self
	where
		F: Fn(EffectId) -> EffectId,
	{
		let kinds = self
			.kinds
			.into_iter()
			.map(|kind| match kind {
				EffectKind::Single { id, queue, body } => EffectKind::Single {
					id: id.map(&f),
					queue,
					body,
				},
				EffectKind::Sequence { id, queue, make } => EffectKind::Sequence {
					id: id.map(&f),
					queue,
					make,
				},
				other @ EffectKind::Cancel { .. } => other,
			})
			.collect();
		Self { kinds }
	}

	/// Rewrites the queue of every `Single`/`Sequence` kind that already
	/// carries one.
	pub fn map_queue<F>(self, f: F) -> Self
	where
		F: Fn(QueueRef) -> QueueRef,
	{
		let kinds = self
			.kinds
			.into_iter()
			.map(|kind| match kind {
				EffectKind::Single { id, queue, body } => EffectKind::Single {
					id,
					queue: queue.map(&f),
					body,
				},
				EffectKind::Sequence { id, queue, make } => EffectKind::Sequence {
					id,
					queue: queue.map(&f),
					make,
				},
				other @ EffectKind::Cancel { .. } => other,
			})
			.collect();
		Self { kinds }
	}

	/// Returns `true` if this effect carries no kinds at all.
	pub fn is_empty(&self) -> bool {
		self.kinds.is_empty()
	}
}

impl<A: Send + 'static> std::ops::Add for Effect<A> {
	type Output = Self;

	fn add(self, rhs: Self) -> Self::Output {
		Self::concat(self, rhs)
	}
}

impl<A: Send + 'static> Extend<EffectKind<A>> for Effect<A> {
	fn extend<T: IntoIterator<Item = EffectKind<A>>>(&mut self, iter: T) {
		self.kinds.extend(iter);
	}
}

impl<A: Send + 'static> FromIterator<EffectKind<A>> for Effect<A> {
	fn from_iter<T: IntoIterator<Item = EffectKind<A>>>(iter: T) -> Self {
		Self {
			kinds: iter.into_iter().collect(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_concat_is_identity() {
		let e = Effect::<u32>::empty();
		assert!(e.is_empty());
	}

	#[test]
	fn concat_preserves_order() {
		let l = Effect::next_action(1_u32);
		let r = Effect::next_action(2_u32);
		let both = Effect::concat(l, r);
		assert_eq!(both.kinds.len(), 2);
	}

	#[tokio::test]
	async fn next_action_resolves_immediately() {
		let effect = Effect::next_action(42_u32);
		match effect.kinds.into_iter().next().unwrap() {
			EffectKind::Single { body, .. } => {
				assert_eq!(body().await, Some(42));
			}
			_ => panic!("expected Single"),
		}
	}

	#[tokio::test]
	async fn map_action_rewrites_single_output() {
		let effect = Effect::next_action(1_u32).map_action(|n| n + 1);
		match effect.kinds.into_iter().next().unwrap() {
			EffectKind::Single { body, .. } => {
				assert_eq!(body().await, Some(2));
			}
			_ => panic!("expected Single"),
		}
	}
}
