//! The composite handle returned by [`super::Actomaton::send`] (§4.2, §7):
//! joins every directly spawned task and can cancel them as a group.

use futures::future::join_all;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::ActomatonError;

/// One outstanding `send` call's worth of spawned work.
///
/// Dropping a `SendHandle` without calling [`SendHandle::join`] or
/// [`SendHandle::cancel`] leaves the spawned tasks running to completion on
/// their own — the handle is an observer, not an owner.
#[must_use = "a SendHandle does nothing unless joined or cancelled"]
pub struct SendHandle {
	pub(super) completions: Vec<oneshot::Receiver<usize>>,
	pub(super) cancel_tokens: Vec<CancellationToken>,
}

impl SendHandle {
	pub(super) fn empty() -> Self {
		Self {
			completions: Vec::new(),
			cancel_tokens: Vec::new(),
		}
	}

	/// Appends one directly spawned task's completion/cancellation pair.
	pub(super) fn push(&mut self, component: (oneshot::Receiver<usize>, CancellationToken)) {
		self.completions.push(component.0);
		self.cancel_tokens.push(component.1);
	}

	/// `true` if no tasks were spawned — the `send` call that produced this
	/// handle is treated by callers as "already complete" (§4.4.1).
	pub fn is_empty(&self) -> bool {
		self.completions.is_empty()
	}

	/// Waits for every directly spawned task to finish. If any of them (or,
	/// transitively, any feedback action whose own handle they awaited)
	/// threw, returns [`ActomatonError::FeedbackFailed`] with the total
	/// count. Cooperative cancellation is not a failure: a cancelled task
	/// contributes nothing to that count.
	pub async fn join(self) -> Result<(), ActomatonError> {
		let results = join_all(self.completions.into_iter().map(|rx| async move { rx.await.unwrap_or(0) })).await;
		let failed: usize = results.into_iter().sum();
		if failed > 0 {
			Err(ActomatonError::FeedbackFailed(failed))
		} else {
			Ok(())
		}
	}

	/// Requests cooperative cancellation of every directly spawned task.
	/// Does not wait for them to actually stop; combine with
	/// [`SendHandle::join`] to observe that.
	pub fn cancel(&self) {
		for token in &self.cancel_tokens {
			token.cancel();
		}
	}
}
