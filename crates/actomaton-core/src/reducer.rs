//! The pure reducer (§4.3, C3): `(Action, &mut State, &Environment) ->
//! Effect`, plus monoidal composition and contravariant projections.
//!
//! The spec's reference implementation passes `Action` by value, which is
//! natural in a language where enum payloads are implicitly copied. Taking
//! `action` by shared reference here (`&A` rather than `A`) is the
//! idiomatic Rust rendition: it lets [`Reducer::combine`] and
//! [`Reducer::first`] run several reducers against the same action without
//! requiring `A: Clone`, while effect bodies — which must be `'static` —
//! still copy out whatever pieces of the action they need at the point the
//! reducer constructs the `Effect`, which is exactly the reducer's
//! synchronous, single critical-section execution.

use std::sync::Arc;

use crate::effect::Effect;

type RunFn<A, S, E> = dyn Fn(&A, &mut S, &E) -> Effect<A> + Send + Sync;

/// A pure function from `(Action, &mut State, &Environment)` to the
/// [`Effect`] it wants run.
pub struct Reducer<A, S, E> {
	run: Arc<RunFn<A, S, E>>,
}

impl<A, S, E> Clone for Reducer<A, S, E> {
	fn clone(&self) -> Self {
		Self {
			run: Arc::clone(&self.run),
		}
	}
}

impl<A, S, E> Reducer<A, S, E>
where
	A: Send + 'static,
	S: Send + 'static,
	E: Send + Sync + 'static,
{
	/// Wraps a plain function as a `Reducer`.
	pub fn new<F>(f: F) -> Self
	where
		F: Fn(&A, &mut S, &E) -> Effect<A> + Send + Sync + 'static,
	{
		Self { run: Arc::new(f) }
	}

	/// A reducer that never mutates state and always returns
	/// [`Effect::empty`].
	pub fn empty() -> Self {
		Self::new(|_action, _state, _env| Effect::empty())
	}

	/// Runs this reducer against `action`/`state`/`env`.
	pub fn run(&self, action: &A, state: &mut S, env: &E) -> Effect<A> {
		(self.run)(action, state, env)
	}

	/// Sequential composition: runs `self` then `other`, both against the
	/// same action and the (possibly already-mutated) state, concatenating
	/// their effects.
	pub fn combine(self, other: Self) -> Self {
		let l = self.run;
		let r = other.run;
		Self::new(move |action, state, env| {
			let first = (l)(action, state, env);
			let second = (r)(action, state, env);
			Effect::concat(first, second)
		})
	}

	/// Runs each reducer in order, stopping at (and returning) the first
	/// non-empty effect. Every reducer up to and including that one still
	/// mutates state — only evaluation of *later* reducers is skipped. A
	/// convenience combinator; it does not change the core semantics.
	pub fn first(reducers: impl IntoIterator<Item = Self>) -> Self {
		let runs: Vec<_> = reducers.into_iter().map(|r| r.run).collect();
		Self::new(move |action, state, env| {
			for run in &runs {
				let effect = (run)(action, state, env);
				if !effect.is_empty() {
					return effect;
				}
			}
			Effect::empty()
		})
	}

	/// Contravariant projection over a sub-case of a larger action type.
	///
	/// `try_extract` attempts to view the outer action as this reducer's
	/// inner action (e.g. matching one enum variant); when it returns
	/// `None`, the projected reducer yields [`Effect::empty`] without
	/// mutating state. `embed` lifts a feedback action produced by this
	/// reducer's effects back into the outer action type.
	pub fn contramap_action<O, TE, EM>(self, try_extract: TE, embed: EM) -> Reducer<O, S, E>
	where
		O: Send + 'static,
		TE: Fn(&O) -> Option<&A> + Send + Sync + 'static,
		EM: Fn(A) -> O + Send + Sync + 'static,
	{
		let inner = self.run;
		let embed = Arc::new(embed);
		Reducer::new(move |outer_action: &O, state: &mut S, env: &E| match try_extract(outer_action) {
			Some(inner_action) => {
				let effect = (inner)(inner_action, state, env);
				let embed = Arc::clone(&embed);
				effect.map_action(move |a| embed(a))
			}
			None => Effect::empty(),
		})
	}

	/// Contravariant projection over a mutable sub-field of a larger state
	/// type. `lens` borrows the sub-state out of the outer state for the
	/// duration of the inner reducer's run.
	pub fn contramap_state<OuterS, L>(self, lens: L) -> Reducer<A, OuterS, E>
	where
		OuterS: Send + 'static,
		L: Fn(&mut OuterS) -> &mut S + Send + Sync + 'static,
	{
		let inner = self.run;
		Reducer::new(move |action: &A, outer_state: &mut OuterS, env: &E| {
			let sub_state = lens(outer_state);
			(inner)(action, sub_state, env)
		})
	}

	/// Contravariant projection over a sub-record of a larger environment
	/// type.
	pub fn contramap_environment<OuterE, F>(self, f: F) -> Reducer<A, S, OuterE>
	where
		OuterE: Send + Sync + 'static,
		F: Fn(&OuterE) -> &E + Send + Sync + 'static,
	{
		let inner = self.run;
		Reducer::new(move |action: &A, state: &mut S, outer_env: &OuterE| {
			let env = f(outer_env);
			(inner)(action, state, env)
		})
	}
}

impl<A, S, E> std::ops::Add for Reducer<A, S, E>
where
	A: Send + 'static,
	S: Send + 'static,
	E: Send + Sync + 'static,
{
	type Output = Self;

	fn add(self, rhs: Self) -> Self::Output {
		self.combine(rhs)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, Clone, Copy)]
	enum Action {
		Inc,
		Dec,
	}

	#[test]
	fn empty_reducer_does_not_mutate() {
		let reducer = Reducer::<Action, i32, ()>::empty();
		let mut state = 0;
		let effect = reducer.run(&Action::Inc, &mut state, &());
		assert_eq!(state, 0);
		assert!(effect.is_empty());
	}

	#[test]
	fn combine_runs_both_in_order() {
		let double = Reducer::<Action, i32, ()>::new(|_a, s, _e| {
			*s *= 2;
			Effect::empty()
		});
		let add_one = Reducer::<Action, i32, ()>::new(|_a, s, _e| {
			*s += 1;
			Effect::empty()
		});
		let combined = double.combine(add_one);
		let mut state = 3;
		combined.run(&Action::Inc, &mut state, &());
		assert_eq!(state, 7);
	}

	#[test]
	fn first_stops_at_first_non_empty_effect() {
		let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
		let o1 = order.clone();
		let r1 = Reducer::<Action, i32, ()>::new(move |_a, _s, _e| {
			o1.lock().unwrap().push(1);
			Effect::empty()
		});
		let o2 = order.clone();
		let r2 = Reducer::<Action, i32, ()>::new(move |_a, _s, _e| {
			o2.lock().unwrap().push(2);
			Effect::next_action(Action::Dec)
		});
		let o3 = order.clone();
		let r3 = Reducer::<Action, i32, ()>::new(move |_a, _s, _e| {
			o3.lock().unwrap().push(3);
			Effect::empty()
		});
		let combined = Reducer::first([r1, r2, r3]);
		let mut state = 0;
		let effect = combined.run(&Action::Inc, &mut state, &());
		assert!(!effect.is_empty());
		assert_eq!(*order.lock().unwrap(), vec![1, 2]);
	}

	#[test]
	fn contramap_action_ignores_non_matching_variant() {
		let inner = Reducer::<i32, i32, ()>::new(|delta, s, _e| {
			*s += delta;
			Effect::empty()
		});
		let outer = inner.contramap_action(
			|outer: &Action| match outer {
				Action::Inc => None, // only Dec carries a payload in this toy example
				Action::Dec => None,
			},
			|delta: i32| if delta > 0 { Action::Inc } else { Action::Dec },
		);
		let mut state = 0;
		outer.run(&Action::Inc, &mut state, &());
		assert_eq!(state, 0);
	}
}
