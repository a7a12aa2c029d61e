//! Type-erased hashable identities for effects and queues (§4.2).

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

/// Object-safe equality/hash over an arbitrary `Hash + Eq` user key.
trait ErasedKey: Any + Send + Sync {
	fn eq_erased(&self, other: &dyn ErasedKey) -> bool;
	fn hash_erased(&self, state: &mut dyn Hasher);
	fn as_any(&self) -> &dyn Any;
	fn fmt_erased(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T> ErasedKey for T
where
	T: Any + Eq + Hash + Send + Sync + fmt::Debug,
{
	fn eq_erased(&self, other: &dyn ErasedKey) -> bool {
		other.as_any().downcast_ref::<T>().is_some_and(|o| o == self)
	}

	fn hash_erased(&self, mut state: &mut dyn Hasher) {
		self.hash(&mut state);
	}

	fn as_any(&self) -> &dyn Any {
		self
	}

	fn fmt_erased(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		fmt::Debug::fmt(self, f)
	}
}

/// Sentinel marker shared by every anonymous effect of a single actomaton.
///
/// A zero-sized type is always equal to, and hashes identically to, every
/// other instance of itself, so `EffectId::anonymous()` naturally collapses
/// to one shared identity without any global table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct AnonymousEffect;

/// A hashable, type-erased effect identity.
///
/// Two `EffectId`s are equal iff they were built from equal user keys of the
/// same underlying type. Effects sharing an id are co-located in the
/// running-tasks multimap (§3).
#[derive(Clone)]
pub struct EffectId(Arc<dyn ErasedKey>);

impl EffectId {
	/// Builds an id from any hashable, thread-safe user value.
	pub fn new<T>(key: T) -> Self
	where
		T: Any + Eq + Hash + Send + Sync + fmt::Debug,
	{
		Self(Arc::new(key))
	}

	/// The shared default id for effects without an explicit identity.
	pub fn anonymous() -> Self {
		Self::new(AnonymousEffect)
	}
}

impl<T> From<T> for EffectId
where
	T: Any + Eq + Hash + Send + Sync + fmt::Debug,
{
	fn from(key: T) -> Self {
		Self::new(key)
	}
}

impl PartialEq for EffectId {
	fn eq(&self, other: &Self) -> bool {
		self.0.eq_erased(&*other.0)
	}
}

impl Eq for EffectId {}

impl Hash for EffectId {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.0.hash_erased(state);
	}
}

impl fmt::Debug for EffectId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "EffectId(")?;
		self.0.fmt_erased(f)?;
		write!(f, ")")
	}
}

/// Overflow behavior for [`QueuePolicy::RunOldest`] when the queue is at
/// capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
	/// Append the new effect to a per-queue FIFO pending buffer.
	SuspendNew,
	/// Discard the new effect immediately via the cancel-path (§4.4.5),
	/// never running its real work.
	DiscardNew,
}

/// Admission policy attached to a [`QueueRef`] (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePolicy {
	/// Admit new effects unconditionally; cancel the oldest running tasks
	/// in the queue until at most `max` remain.
	RunNewest {
		/// Maximum number of concurrently running tasks retained.
		max: usize,
	},
	/// Admit new effects only while under `max`; otherwise apply `overflow`.
	RunOldest {
		/// Maximum number of concurrently running tasks.
		max: usize,
		/// What to do with an effect submitted while at capacity.
		overflow: Overflow,
	},
}

impl QueuePolicy {
	/// `RunNewest { max: 1 }` — at most one running task, newest wins.
	pub const fn newest_1() -> Self {
		Self::RunNewest { max: 1 }
	}

	/// `RunOldest { max: 1, overflow: SuspendNew }` — at most one running
	/// task, new submissions wait their turn.
	pub const fn oldest_1_suspend() -> Self {
		Self::RunOldest {
			max: 1,
			overflow: Overflow::SuspendNew,
		}
	}

	/// `RunOldest { max: 1, overflow: DiscardNew }` — at most one running
	/// task, new submissions while busy are dropped.
	pub const fn oldest_1_discard() -> Self {
		Self::RunOldest {
			max: 1,
			overflow: Overflow::DiscardNew,
		}
	}
}

/// Inter-effect scheduling delay for a queue (§3, §4.4.3).
#[derive(Debug, Clone, Copy)]
pub enum QueueDelay {
	/// A fixed interval, sampled identically on every admission.
	Constant(Duration),
	/// A uniform-random interval in `[lo, hi]`, resampled per admission.
	Uniform {
		/// Inclusive lower bound.
		lo: Duration,
		/// Inclusive upper bound.
		hi: Duration,
	},
}

impl QueueDelay {
	/// No delay between admissions.
	pub const NONE: QueueDelay = QueueDelay::Constant(Duration::ZERO);

	/// Samples a concrete delay. Per the spec's open-question resolution,
	/// sampling happens inside the admission critical section for
	/// determinism, so callers must invoke this while holding the actor's
	/// exclusive table access.
	pub(crate) fn sample(&self) -> Duration {
		match *self {
			QueueDelay::Constant(d) => d,
			QueueDelay::Uniform { lo, hi } => {
				if hi <= lo {
					lo
				} else {
					use rand::Rng;
					let extra = hi - lo;
					let frac: f64 = rand::rng().random();
					lo + Duration::from_secs_f64(extra.as_secs_f64() * frac)
				}
			}
		}
	}
}

/// A hashable, type-erased queue tag carrying its admission policy and
/// delay (§3, §4.2).
///
/// Two `QueueRef`s are equal iff their carried *keys* are equal — the
/// attached policy/delay are metadata, not part of identity.
#[derive(Clone)]
pub struct QueueRef {
	key: Arc<dyn ErasedKey>,
	/// The admission policy in effect for this queue.
	pub policy: QueuePolicy,
	/// The inter-effect delay in effect for this queue.
	pub delay: QueueDelay,
}

impl QueueRef {
	/// Builds a queue reference from a hashable key plus its policy/delay.
	pub fn new<T>(key: T, policy: QueuePolicy, delay: QueueDelay) -> Self
	where
		T: Any + Eq + Hash + Send + Sync + fmt::Debug,
	{
		Self {
			key: Arc::new(key),
			policy,
			delay,
		}
	}
}

impl PartialEq for QueueRef {
	fn eq(&self, other: &Self) -> bool {
		self.key.eq_erased(&*other.key)
	}
}

impl Eq for QueueRef {}

impl Hash for QueueRef {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.key.hash_erased(state);
	}
}

impl fmt::Debug for QueueRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "QueueRef(")?;
		self.key.fmt_erased(f)?;
		write!(f, ", policy={:?}, delay={:?})", self.policy, self.delay)
	}
}
