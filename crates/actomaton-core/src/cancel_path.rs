//! The cancel-path primitive (§4.4.4, §4.4.5): spawn a not-yet-started
//! effect body solely to cancel it, so that its cancellation branch runs
//! for cleanup without ever performing the real work.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;

pin_project! {
	/// Polls the wrapped future exactly once, then drops it unconditionally
	/// and completes.
	///
	/// Rust's async model makes this the natural rendition of "invoke the
	/// body, cancel it before its first suspension returns": polling once
	/// lets any synchronous prefix (state the body sets up before its first
	/// `.await`) run, and then dropping the future at whatever point it
	/// suspended runs that future's own drop glue at that exact point --
	/// the same mechanism `tokio::select!` uses to cancel the losing
	/// branch. If the body happened to have no `.await` at all and
	/// completed on the first poll, its result (a would-be feedback
	/// action) is discarded: the cancel-path never feeds an action back.
	pub struct CancelOnFirstPoll<F> {
		#[pin]
		inner: Option<F>,
	}
}

impl<F: Future> CancelOnFirstPoll<F> {
	/// Wraps `inner` so that it runs its synchronous prefix once and is
	/// then cancelled.
	pub fn new(inner: F) -> Self {
		Self { inner: Some(inner) }
	}
}

impl<F: Future> Future for CancelOnFirstPoll<F> {
	type Output = ();

	fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
		let mut this = self.project();
		if let Some(fut) = this.inner.as_mut().as_pin_mut() {
			let _ = fut.poll(cx);
		}
		this.inner.set(None);
		Poll::Ready(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::cell::Cell;
	use std::rc::Rc;

	#[tokio::test]
	async fn runs_sync_prefix_then_cancels_before_completion() {
		let ran_prefix = Rc::new(Cell::new(false));
		let ran_to_completion = Rc::new(Cell::new(false));

		let prefix = Rc::clone(&ran_prefix);
		let completion = Rc::clone(&ran_to_completion);
		let body = async move {
			prefix.set(true);
			std::future::pending::<()>().await;
			completion.set(true);
		};

		CancelOnFirstPoll::new(body).await;

		assert!(ran_prefix.get());
		assert!(!ran_to_completion.get());
	}

	#[tokio::test]
	async fn discards_output_of_an_immediately_ready_body() {
		let body = async { 42_u32 };
		CancelOnFirstPoll::new(body).await;
	}
}
