// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Runtime configuration: exploration bounds and the assertion channel (§6, §4.11).

use std::sync::Arc;

use crate::error::{AssertionSink, PanickingAssertionSink};

/// Which [`crate::strategy::Strategy`] the harness should build for each iteration,
/// and with what seed. The concrete strategy types live in [`crate::strategy`]; this
/// just names which one and how to seed it, so [`RuntimeConfig`] stays serializable
/// in spirit (the strategy trait object itself is not).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingPolicy {
    /// Deterministic round-robin over the enabled set, in `OperationId` order.
    RoundRobin,
    /// Picks uniformly at random among enabled operations, seeded per iteration.
    Random,
    /// Random, but favors the operation the caller ran last by priority, reshuffling
    /// priorities on every `Create`/`Release` point (Coyote's PCT family).
    PriorityBased { max_priority_switch_points: u32 },
    /// Depth-first exploration up to a fixed number of scheduling decisions, then
    /// forces completion — useful for bounding exploration of deeply recursive
    /// interleavings.
    DepthBounded { max_depth: u32 },
}

impl Default for SchedulingPolicy {
    fn default() -> Self {
        SchedulingPolicy::Random
    }
}

/// Exploration bounds and wiring for one [`crate::harness::explore`] run (§4.11).
#[derive(Clone)]
pub struct RuntimeConfig {
    pub policy: SchedulingPolicy,
    /// How many iterations `explore` runs before giving up without finding a bug.
    pub max_iterations: u32,
    /// Per-iteration ceiling on scheduling decisions; exceeding it raises
    /// [`crate::error::RuntimeError::AssertionFailure`] on the assumption the program
    /// under test is non-terminating (§4.3 step 7).
    pub max_scheduling_steps_per_iteration: u32,
    /// Whether monitor `enter`/`pulse` emit the extra `Acquire` scheduling point used
    /// to surface acquire/pulse races (§4.4 "race-checking").
    pub lock_access_race_checking_enabled: bool,
    /// Whether [`crate::hooks::atomic`] operations emit a scheduling point before
    /// touching the underlying value (§4.7, §6 `isAtomicOperationRaceCheckingEnabled`).
    pub atomic_operation_race_checking_enabled: bool,
    /// Whether [`crate::hooks::volatile`] reads/writes emit a scheduling point (§4.7,
    /// §6 `isVolatileOperationRaceCheckingEnabled`).
    pub volatile_operation_race_checking_enabled: bool,
    /// Upper bound (inclusive) of the nondeterministic tick count `Thread::sleep`
    /// chooses from `[0, timeout_delay]` (§4.8, §6 `timeoutDelay`).
    pub timeout_delay: u32,
    /// Caps how many controlled operations a single parallel-for-style expansion may
    /// spawn at once, for reproducibility across machines with different core counts
    /// (§6 `maxDegreeOfParallelism`).
    pub max_degree_of_parallelism: u32,
    pub(crate) assertion_sink: Arc<dyn AssertionSink>,
}

impl std::fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("policy", &self.policy)
            .field("max_iterations", &self.max_iterations)
            .field("max_scheduling_steps_per_iteration", &self.max_scheduling_steps_per_iteration)
            .field("lock_access_race_checking_enabled", &self.lock_access_race_checking_enabled)
            .field("atomic_operation_race_checking_enabled", &self.atomic_operation_race_checking_enabled)
            .field("volatile_operation_race_checking_enabled", &self.volatile_operation_race_checking_enabled)
            .field("timeout_delay", &self.timeout_delay)
            .field("max_degree_of_parallelism", &self.max_degree_of_parallelism)
            .finish_non_exhaustive()
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            policy: SchedulingPolicy::default(),
            max_iterations: 1_000,
            max_scheduling_steps_per_iteration: 100_000,
            lock_access_race_checking_enabled: true,
            atomic_operation_race_checking_enabled: true,
            volatile_operation_race_checking_enabled: true,
            timeout_delay: 10,
            max_degree_of_parallelism: 4,
            assertion_sink: Arc::new(PanickingAssertionSink),
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub fn with_max_scheduling_steps_per_iteration(mut self, max: u32) -> Self {
        self.max_scheduling_steps_per_iteration = max;
        self
    }

    #[must_use]
    pub fn with_lock_access_race_checking(mut self, enabled: bool) -> Self {
        self.lock_access_race_checking_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_atomic_operation_race_checking(mut self, enabled: bool) -> Self {
        self.atomic_operation_race_checking_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_volatile_operation_race_checking(mut self, enabled: bool) -> Self {
        self.volatile_operation_race_checking_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_timeout_delay(mut self, timeout_delay: u32) -> Self {
        self.timeout_delay = timeout_delay;
        self
    }

    #[must_use]
    pub fn with_max_degree_of_parallelism(mut self, max: u32) -> Self {
        self.max_degree_of_parallelism = max;
        self
    }

    /// Swaps the default panicking sink for a caller-supplied one — e.g. a sink that
    /// records the error and lets the iteration's thread return normally, for tests
    /// that want to assert on the error value rather than catch a panic.
    #[must_use]
    pub fn with_assertion_sink(mut self, sink: Arc<dyn AssertionSink>) -> Self {
        self.assertion_sink = sink;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_random() {
        assert_eq!(RuntimeConfig::default().policy, SchedulingPolicy::Random);
    }

    #[test]
    fn builders_compose() {
        let config = RuntimeConfig::default()
            .with_policy(SchedulingPolicy::RoundRobin)
            .with_max_iterations(50)
            .with_lock_access_race_checking(false);
        assert_eq!(config.policy, SchedulingPolicy::RoundRobin);
        assert_eq!(config.max_iterations, 50);
        assert!(!config.lock_access_race_checking_enabled);
    }
}
