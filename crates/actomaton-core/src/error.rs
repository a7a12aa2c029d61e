//! Error handling (§7): local recovery by default, with an injectable
//! logger for the two recoverable failure kinds and a `thiserror` enum for
//! the one kind that can surface from an awaited [`crate::scheduler::SendHandle`].

use crate::id::EffectId;

/// Injectable sink for the two locally-recovered failure kinds (§7:
/// `BodyThrew`, `StreamThrew`). `Cancelled` is routine termination and
/// never reaches a `Logger`; `InvariantViolation` is an internal bug and is
/// asserted on, not logged.
pub trait Logger: Send + Sync + 'static {
	/// A `Single` effect body panicked or returned an error. The task is
	/// treated as completed without a feedback action.
	fn body_threw(&self, id: Option<&EffectId>, message: &str);

	/// A `Sequence` effect's stream ended on an error after yielding
	/// `already_yielded` elements (each already fed back).
	fn stream_threw(&self, id: Option<&EffectId>, message: &str, already_yielded: usize);
}

/// Forwards both failure kinds to `tracing::warn!`. The default logger
/// used by [`crate::scheduler::Actomaton::new`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
	fn body_threw(&self, id: Option<&EffectId>, message: &str) {
		tracing::warn!(id = ?id, error = %message, "actomaton: effect body threw");
	}

	fn stream_threw(&self, id: Option<&EffectId>, message: &str, already_yielded: usize) {
		tracing::warn!(
			id = ?id,
			error = %message,
			already_yielded,
			"actomaton: effect stream threw"
		);
	}
}

/// Silently discards both failure kinds. Useful in tests that assert on
/// specific log output and don't want this crate's own logging as noise.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogger;

impl Logger for NoopLogger {
	fn body_threw(&self, _id: Option<&EffectId>, _message: &str) {}
	fn stream_threw(&self, _id: Option<&EffectId>, _message: &str, _already_yielded: usize) {}
}

/// Errors that can surface from an awaited [`crate::scheduler::SendHandle`]
/// (§7). Routine cancellation (§7 `Cancelled`) is represented by the handle
/// simply resolving without this error — it is not a variant here.
#[derive(Debug, thiserror::Error)]
pub enum ActomatonError {
	/// `tracks_feedbacks` was `true` and one or more tasks in the
	/// transitive feedback tree threw.
	#[error("{0} effect body(ies) failed while tracking feedback completion")]
	FeedbackFailed(usize),
}
