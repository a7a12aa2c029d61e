//! Integration tests exercising only `actomaton`'s public, re-exported API —
//! the surface application code actually depends on, not `actomaton-core`'s
//! internals.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use actomaton::{Actomaton, ActomatonConfig, Effect, EffectId, Logger, QueueDelay, QueuePolicy, QueueRef, Reducer};
use actomaton_testkit::{TestActomaton, record_actions};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CounterAction {
	Inc,
	Dec,
	Reset,
}

fn counter_reducer() -> Reducer<CounterAction, i64, ()> {
	Reducer::new(|action, state, _env| {
		match action {
			CounterAction::Inc => *state += 1,
			CounterAction::Dec => *state -= 1,
			CounterAction::Reset => *state = 0,
		}
		Effect::empty()
	})
}

#[tokio::test(flavor = "current_thread")]
async fn send_and_snapshot_round_trip_through_the_facade() {
	let _ = tracing_subscriber::fmt::try_init();
	let actomaton = Actomaton::new_stateless(0_i64, counter_reducer());
	actomaton.send(CounterAction::Inc).await;
	actomaton.send(CounterAction::Inc).await;
	actomaton.send(CounterAction::Dec).await;
	assert_eq!(actomaton.snapshot().await, Some(1));
}

#[tokio::test(flavor = "current_thread")]
async fn testkit_drain_awaits_every_tracked_send() {
	let (reducer, recorded) = record_actions(counter_reducer());
	let harness = TestActomaton::new(0_i64, reducer, ());

	harness.send(CounterAction::Inc).await;
	harness.send(CounterAction::Inc).await;
	harness.send(CounterAction::Reset).await;
	harness.drain().await;

	assert_eq!(harness.snapshot().await, Some(0));
	assert_eq!(recorded.snapshot(), vec![CounterAction::Inc, CounterAction::Inc, CounterAction::Reset]);
	assert_eq!(recorded.len(), 3);
}

#[tokio::test(flavor = "current_thread")]
async fn testkit_shutdown_tears_down_the_wrapped_actomaton() {
	let harness = TestActomaton::new(0_i64, counter_reducer(), ());
	harness.send(CounterAction::Inc).await;
	harness.shutdown().await;
	assert_eq!(harness.snapshot().await, None);
}

#[derive(Debug, Clone, Copy)]
enum FetchAction {
	Fetch,
	DidFetch,
}

fn fetch_queue() -> QueueRef {
	QueueRef::new("facade-fetch", QueuePolicy::newest_1(), QueueDelay::NONE)
}

#[tokio::test(flavor = "current_thread", start_paused = true)]
async fn queued_effect_produces_feedback_through_the_facade() {
	let fetched = Arc::new(AtomicUsize::new(0));
	let f = Arc::clone(&fetched);
	let reducer = Reducer::<FetchAction, (), ()>::new(move |action, _state, _env| match action {
		FetchAction::Fetch => Effect::from_async(Some(EffectId::new("facade-fetch-task")), Some(fetch_queue()), || async {
			tokio::time::sleep(Duration::from_millis(10)).await;
			Some(FetchAction::DidFetch)
		}),
		FetchAction::DidFetch => {
			f.fetch_add(1, Ordering::SeqCst);
			Effect::empty()
		}
	});

	let actomaton = Actomaton::new_stateless((), reducer);
	let handle = actomaton.send(FetchAction::Fetch).await;
	tokio::time::advance(Duration::from_millis(50)).await;
	handle.join().await.unwrap();

	assert_eq!(fetched.load(Ordering::SeqCst), 1);
}

/// A logger that counts how many times each hook fires, used to check that
/// `ActomatonConfig::logger` is actually wired into the running actor.
#[derive(Default)]
struct CountingLogger {
	body_threw: AtomicUsize,
}

impl Logger for CountingLogger {
	fn body_threw(&self, _id: Option<&EffectId>, _message: &str) {
		self.body_threw.fetch_add(1, Ordering::SeqCst);
	}

	fn stream_threw(&self, _id: Option<&EffectId>, _message: &str, _already_yielded: usize) {}
}

#[tokio::test(flavor = "current_thread")]
async fn custom_logger_observes_a_panicking_effect_body() {
	let logger = Arc::new(CountingLogger::default());
	let config = ActomatonConfig {
		logger: logger.clone(),
		..ActomatonConfig::default()
	};

	let reducer = Reducer::<(), (), ()>::new(|_action, _state, _env| {
		Effect::from_async(None, None, || async {
			panic!("boom");
			#[allow(unreachable_code)]
			None
		})
	});

	let actomaton = Actomaton::with_config((), reducer, (), config);
	let handle = actomaton.send(()).await;
	let result = handle.join().await;

	assert!(result.is_err());
	assert_eq!(logger.body_threw.load(Ordering::SeqCst), 1);
}

fn run_counter_through_facade(increments: &[bool]) -> i64 {
	let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
	runtime.block_on(async move {
		let harness = TestActomaton::new(0_i64, counter_reducer(), ());
		for &inc in increments {
			harness.send(if inc { CounterAction::Inc } else { CounterAction::Dec }).await;
		}
		harness.drain().await;
		harness.snapshot().await.unwrap()
	})
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(50))]
	#[test]
	fn facade_counter_matches_fold_over_any_send_sequence(increments in prop::collection::vec(any::<bool>(), 0..30)) {
		let expected: i64 = increments.iter().map(|&inc| if inc { 1 } else { -1 }).sum();
		let actual = run_counter_through_facade(&increments);
		prop_assert_eq!(actual, expected);
	}
}
