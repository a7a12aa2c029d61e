//! A cheap, cloneable sender half of the actor's mailbox. Both the public
//! [`super::Actomaton`] handle and every feedback dispatch from inside a
//! running effect body go through the same `Mailbox::dispatch` — feedback is
//! genuinely just another `send` call arriving on the mailbox.

use tokio::sync::{mpsc, oneshot};

use super::SendPriority;
use super::command::Command;
use super::handle::SendHandle;

pub(super) struct Mailbox<A, S> {
	tx: mpsc::Sender<Command<A, S>>,
}

impl<A, S> Clone for Mailbox<A, S> {
	fn clone(&self) -> Self {
		Self { tx: self.tx.clone() }
	}
}

impl<A, S> Mailbox<A, S> {
	pub(super) fn new(tx: mpsc::Sender<Command<A, S>>) -> Self {
		Self { tx }
	}

	/// Enqueues a `Send` command and awaits the actor's reply. If the actor
	/// has already shut down (the channel is closed), returns an empty,
	/// already-complete handle rather than erroring: a feedback dispatch
	/// racing a teardown is not itself a failure.
	pub(super) async fn dispatch(&self, action: A, priority: SendPriority, tracks_feedbacks: bool) -> SendHandle {
		let (reply, reply_rx) = oneshot::channel();
		let command = Command::Send {
			action,
			priority,
			tracks_feedbacks,
			reply,
		};
		if self.tx.send(command).await.is_err() {
			return SendHandle::empty();
		}
		reply_rx.await.unwrap_or_else(|_| SendHandle::empty())
	}

	pub(super) async fn snapshot(&self) -> Option<S> {
		let (reply, reply_rx) = oneshot::channel();
		if self.tx.send(Command::Snapshot { reply }).await.is_err() {
			return None;
		}
		reply_rx.await.ok()
	}

	/// Requests teardown. If `wait` is `false`, the cancel signals are sent
	/// and this returns immediately without waiting for the actor to finish
	/// draining (§4.6: "whether the caller awaits completion is caller's
	/// choice").
	pub(super) async fn shutdown(&self, wait: bool) {
		let (reply, reply_rx) = oneshot::channel();
		if self.tx.send(Command::Shutdown { reply }).await.is_err() {
			return;
		}
		if wait {
			let _ = reply_rx.await;
		}
	}
}
