//! The actor's mailbox message type and its internal task-completion
//! signal, kept distinct from the public [`super::Actomaton`] API surface.

use tokio::sync::oneshot;

use super::SendPriority;
use super::handle::SendHandle;

pub(super) enum Command<A, S> {
	Send {
		action: A,
		priority: SendPriority,
		tracks_feedbacks: bool,
		reply: oneshot::Sender<SendHandle>,
	},
	Snapshot {
		reply: oneshot::Sender<S>,
	},
	Shutdown {
		reply: oneshot::Sender<()>,
	},
}

impl<A, S> std::fmt::Debug for Command<A, S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Command::Send { priority, tracks_feedbacks, .. } => f
				.debug_struct("Send")
				.field("priority", priority)
				.field("tracks_feedbacks", tracks_feedbacks)
				.finish(),
			Command::Snapshot { .. } => f.debug_struct("Snapshot").finish(),
			Command::Shutdown { .. } => f.debug_struct("Shutdown").finish(),
		}
	}
}

/// Internal completion signal routed back onto the actor's own mailbox loop
/// (via a dedicated unbounded channel, not the bounded `Command` one) so a
/// spawned task's table cleanup always runs inside the actor's single
/// critical section, however the task ended.
pub(super) struct TaskFinished {
	pub(super) task_key: u64,
}
