// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The iteration harness: runs a test body under a fresh [`Scheduler`] once per
//! iteration, up to `config.max_iterations` times, stopping at the first iteration
//! that fails (§4.11).

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::config::{RuntimeConfig, SchedulingPolicy};
use crate::operation::OperationId;
use crate::scheduler::{ScheduleTrace, Scheduler};
use crate::strategy::{DepthBoundedStrategy, PriorityStrategy, RandomStrategy, RoundRobinStrategy, Strategy};

/// Hands a [`Scheduler`] a thin, cheaply-cloned proxy over one strategy object that
/// outlives any single iteration, so [`explore`] can reseed it in place through
/// [`Strategy::prepare_iteration`] between iterations rather than reallocating a
/// trait object each time (§9 "Global mutable state": the strategy is the one piece
/// of state this module deliberately keeps alive across the otherwise-fresh-per-
/// iteration scheduler).
struct SharedStrategy(Arc<Mutex<Box<dyn Strategy>>>);

impl Strategy for SharedStrategy {
    fn name(&self) -> &'static str {
        self.0.lock().expect("strategy mutex poisoned").name()
    }

    fn seed(&self) -> u64 {
        self.0.lock().expect("strategy mutex poisoned").seed()
    }

    fn next_operation(&mut self, enabled: &[OperationId], current: OperationId) -> OperationId {
        self.0.lock().expect("strategy mutex poisoned").next_operation(enabled, current)
    }

    fn next_integer(&mut self, bound: u32) -> u32 {
        self.0.lock().expect("strategy mutex poisoned").next_integer(bound)
    }

    fn next_boolean(&mut self) -> bool {
        self.0.lock().expect("strategy mutex poisoned").next_boolean()
    }

    fn notify_priority_change_point(&mut self) {
        self.0.lock().expect("strategy mutex poisoned").notify_priority_change_point();
    }

    fn prepare_iteration(&mut self, seed: u64, iteration: u64) {
        self.0.lock().expect("strategy mutex poisoned").prepare_iteration(seed, iteration);
    }
}

/// The outcome of [`explore`]: how many iterations ran, and — if one failed — the
/// trace that reproduces the failure (§6, §8 property 6).
#[derive(Debug)]
pub struct ExplorationReport {
    pub iterations_run: u32,
    pub failure: Option<ExplorationFailure>,
}

#[derive(Debug)]
pub struct ExplorationFailure {
    pub iteration: u32,
    pub trace: ScheduleTrace,
    pub panic_message: String,
}

impl ExplorationReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Seed for iteration 0, the only iteration that uses the strategy's own
/// constructor; every later iteration reseeds the same long-lived strategy object
/// through [`Strategy::prepare_iteration`] instead of being rebuilt from scratch.
fn iteration_seed(iteration: u32) -> u64 {
    u64::from(iteration).wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(1)
}

fn build_strategy(config: &RuntimeConfig) -> Box<dyn Strategy> {
    let seed = iteration_seed(0);
    match config.policy {
        SchedulingPolicy::RoundRobin => Box::new(RoundRobinStrategy::new()),
        SchedulingPolicy::Random => Box::new(RandomStrategy::new(seed)),
        SchedulingPolicy::PriorityBased { max_priority_switch_points } => {
            Box::new(PriorityStrategy::new(seed, max_priority_switch_points))
        }
        SchedulingPolicy::DepthBounded { max_depth } => Box::new(DepthBoundedStrategy::new(seed, max_depth)),
    }
}

/// Runs `test_body` under a fresh [`Scheduler`] once per iteration, up to
/// `config.max_iterations` times. `test_body` receives the `Scheduler` for its
/// iteration and should build and exercise the program under test entirely within
/// the closure — constructing [`crate::sync`] resources from the scheduler it is
/// given, never reusing one across iterations (§9 "Global mutable state").
///
/// Stops at the first iteration whose body panics (a structural
/// [`crate::error::RuntimeError`] by way of the default
/// [`crate::error::PanickingAssertionSink`], or any other panic) and returns a report
/// naming which iteration failed and the trace that reproduces it.
#[must_use]
pub fn explore(config: RuntimeConfig, test_body: impl Fn(Arc<Scheduler>) + Send + Sync + 'static) -> ExplorationReport {
    let test_body = Arc::new(test_body);
    let strategy = Arc::new(Mutex::new(build_strategy(&config)));
    for iteration in 0..config.max_iterations {
        // Each iteration gets a distinct seed derived from its index so that
        // iteration N of one `explore` call never silently repeats iteration N-1's
        // exploration; `prepare_iteration` resets the strategy to that seed in
        // place instead of allocating a fresh trait object every time.
        strategy.lock().expect("strategy mutex poisoned").prepare_iteration(iteration_seed(iteration), u64::from(iteration));
        let scheduler = Scheduler::new(config.clone(), Box::new(SharedStrategy(Arc::clone(&strategy))), u64::from(iteration));

        let body_for_iteration = Arc::clone(&test_body);
        let scheduler_for_iteration = Arc::clone(&scheduler);
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
            body_for_iteration(scheduler_for_iteration);
        }));

        if let Err(payload) = outcome {
            let panic_message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "iteration panicked with a non-string payload".to_string());
            return ExplorationReport {
                iterations_run: iteration + 1,
                failure: Some(ExplorationFailure { iteration, trace: scheduler.trace(), panic_message }),
            };
        }
    }
    ExplorationReport { iterations_run: config.max_iterations, failure: None }
}
