// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Pluggable choice of "which enabled operation runs next" and "which nondeterministic
//! value a `chooseInteger`/`chooseBoolean` call returns" (§4.10). Every strategy must
//! be a pure function of its own internal state plus the inputs it's given, so the
//! same seed reproduces the same trace (§6, §8 property 6).

mod depth_bounded;
mod priority;
mod random;
mod round_robin;

pub use depth_bounded::DepthBoundedStrategy;
pub use priority::PriorityStrategy;
pub use random::RandomStrategy;
pub use round_robin::RoundRobinStrategy;

use crate::operation::OperationId;

/// A scheduling strategy: given the set of currently enabled operations, picks one;
/// given a bound, picks an integer in `0..bound`; given nothing, picks a boolean.
///
/// `enabled` is never empty when these methods are called (the scheduler only calls
/// in after confirming at least one operation is enabled); implementations may assume
/// this.
pub trait Strategy: Send + Sync {
    /// Stable name recorded in [`crate::scheduler::trace::ScheduleTrace::strategy_name`].
    fn name(&self) -> &'static str;

    /// The seed this instance was constructed with, recorded alongside the trace so a
    /// failing iteration can be replayed (§6).
    fn seed(&self) -> u64;

    /// Picks the next operation to run from `enabled`. `current` is the operation
    /// making the choice (included in `enabled` if it is still runnable), passed
    /// through so priority-based strategies can favor or penalize it.
    fn next_operation(&mut self, enabled: &[OperationId], current: OperationId) -> OperationId;

    /// Picks an integer in `0..bound`. `bound` is always greater than zero.
    fn next_integer(&mut self, bound: u32) -> u32;

    /// Picks a boolean.
    fn next_boolean(&mut self) -> bool;

    /// Called once per `Create`/`Release` scheduling point so priority-based
    /// strategies can reshuffle; a no-op for strategies that don't need it.
    fn notify_priority_change_point(&mut self) {}

    /// Resets this strategy's internal state to what a fresh
    /// `Strategy::new(seed)` would produce, so a single long-lived strategy object
    /// can be reused across the iterations of one [`crate::harness::explore`] run
    /// instead of being reconstructed each time. `iteration` is the 0-based index of
    /// the iteration about to start, available for strategies (like
    /// [`DepthBoundedStrategy`]) whose bias depends on how far exploration has
    /// already gone.
    fn prepare_iteration(&mut self, seed: u64, iteration: u64);
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// A strategy that always returns the first enabled operation and fixed
    /// integer/boolean choices, for deterministic scheduler unit tests that don't
    /// want randomness in the mix.
    pub(crate) struct FirstChoiceStrategy;

    impl Strategy for FirstChoiceStrategy {
        fn name(&self) -> &'static str {
            "first-choice"
        }

        fn seed(&self) -> u64 {
            0
        }

        fn next_operation(&mut self, enabled: &[OperationId], _current: OperationId) -> OperationId {
            enabled[0]
        }

        fn next_integer(&mut self, _bound: u32) -> u32 {
            0
        }

        fn next_boolean(&mut self) -> bool {
            false
        }

        fn prepare_iteration(&mut self, _seed: u64, _iteration: u64) {}
    }
}
