//! Actomaton: a serial, race-free runtime for effectful state machines
//! (§1-§9 of the design this crate implements).
//!
//! A single actor owns `State`; every `Action` runs through a pure
//! [`Reducer`] to produce a new `State` plus an [`Effect`] describing what
//! asynchronous work to schedule next. Effects are admitted, delayed, and
//! cancelled according to per-queue [`QueuePolicy`]/[`QueueDelay`] settings,
//! and may themselves feed further actions back into the same actor.

pub mod effect;
pub mod error;
pub mod executor;
pub mod id;
pub mod reducer;
pub mod scheduler;

mod cancel_path;
mod panic_util;

pub use effect::{BoxFuture, BoxStream, Effect, EffectKind};
pub use error::{ActomatonError, Logger, NoopLogger, TracingLogger};
pub use executor::{Executor, TokioExecutor};
pub use id::{EffectId, Overflow, QueueDelay, QueuePolicy, QueueRef};
pub use reducer::Reducer;
pub use scheduler::{Actomaton, ActomatonConfig, SendHandle, SendPriority};
