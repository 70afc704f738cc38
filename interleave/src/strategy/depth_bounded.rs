// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Strategy;
use crate::operation::OperationId;

/// Random choice among enabled operations, same as [`super::RandomStrategy`], but
/// once `max_depth` scheduling decisions have been made it always picks the lowest
/// enabled operation id, pushing the rest of the iteration towards quick completion
/// instead of continuing to explore. Useful for bounding the cost of recursive or
/// unbounded-looping programs under test.
#[derive(Debug)]
pub struct DepthBoundedStrategy {
    seed: u64,
    rng: StdRng,
    max_depth: u32,
    depth: u32,
}

impl DepthBoundedStrategy {
    #[must_use]
    pub fn new(seed: u64, max_depth: u32) -> Self {
        Self { seed, rng: StdRng::seed_from_u64(seed), max_depth, depth: 0 }
    }
}

impl Strategy for DepthBoundedStrategy {
    fn name(&self) -> &'static str {
        "depth-bounded"
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn next_operation(&mut self, enabled: &[OperationId], _current: OperationId) -> OperationId {
        self.depth += 1;
        if self.depth > self.max_depth {
            return *enabled.iter().min().expect("enabled is never empty");
        }
        let index = self.rng.random_range(0..enabled.len());
        enabled[index]
    }

    fn next_integer(&mut self, bound: u32) -> u32 {
        self.rng.random_range(0..bound)
    }

    fn next_boolean(&mut self) -> bool {
        self.rng.random_bool(0.5)
    }

    fn prepare_iteration(&mut self, seed: u64, _iteration: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self.depth = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_deterministic_pick_past_max_depth() {
        let mut strategy = DepthBoundedStrategy::new(9, 2);
        let a = OperationId::next();
        let b = OperationId::next();
        let enabled = [a.min(b), a.max(b)];

        strategy.next_operation(&enabled, a);
        strategy.next_operation(&enabled, a);
        let chosen = strategy.next_operation(&enabled, a);
        assert_eq!(chosen, enabled[0]);
    }
}
