//! The scheduler core (§3, §4.4, §4.6, C4): a single actor owning state,
//! reducer, and the four bookkeeping tables, reached through a mailbox.

mod actomaton;
mod actor;
mod command;
mod handle;
mod mailbox;

pub use actomaton::{Actomaton, ActomatonConfig};
pub use handle::SendHandle;

/// Relative priority attached to a dispatched action (§4.2's optional
/// `priority` parameter). The scheduler does not reorder admission or
/// delivery by priority — every action is admitted and run in the order it
/// is sent — but the value is carried onto the task's tracing span so a
/// subscriber can filter or weight by it. A hook for scheduling policies
/// richer than FIFO, not a scheduling policy itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendPriority {
	Low,
	#[default]
	Normal,
	High,
}
