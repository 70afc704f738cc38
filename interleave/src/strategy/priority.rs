// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Strategy;
use crate::operation::OperationId;

/// A probabilistic-concurrency-testing strategy: assigns each operation a random
/// priority, always running the highest-priority enabled one, and reshuffles
/// priorities at up to `max_priority_switch_points` `Create`/`Release` points per
/// iteration. Favors finding bugs that need a handful of specific context switches
/// rather than uniformly exploring every interleaving.
#[derive(Debug)]
pub struct PriorityStrategy {
    seed: u64,
    rng: StdRng,
    priorities: HashMap<OperationId, u32>,
    max_priority_switch_points: u32,
    switch_points_used: u32,
}

impl PriorityStrategy {
    #[must_use]
    pub fn new(seed: u64, max_priority_switch_points: u32) -> Self {
        Self {
            seed,
            rng: StdRng::seed_from_u64(seed),
            priorities: HashMap::new(),
            max_priority_switch_points,
            switch_points_used: 0,
        }
    }

    fn priority_of(&mut self, id: OperationId) -> u32 {
        let rng = &mut self.rng;
        *self.priorities.entry(id).or_insert_with(|| rng.random())
    }
}

impl Strategy for PriorityStrategy {
    fn name(&self) -> &'static str {
        "priority-based"
    }

    fn seed(&self) -> u64 {
        self.seed
    }

    fn next_operation(&mut self, enabled: &[OperationId], _current: OperationId) -> OperationId {
        let mut best = enabled[0];
        let mut best_priority = self.priority_of(best);
        for &candidate in &enabled[1..] {
            let priority = self.priority_of(candidate);
            if priority > best_priority {
                best = candidate;
                best_priority = priority;
            }
        }
        best
    }

    fn next_integer(&mut self, bound: u32) -> u32 {
        self.rng.random_range(0..bound)
    }

    fn next_boolean(&mut self) -> bool {
        self.rng.random_bool(0.5)
    }

    fn notify_priority_change_point(&mut self) {
        if self.switch_points_used >= self.max_priority_switch_points {
            return;
        }
        self.switch_points_used += 1;
        self.priorities.clear();
    }

    fn prepare_iteration(&mut self, seed: u64, _iteration: u64) {
        self.seed = seed;
        self.rng = StdRng::seed_from_u64(seed);
        self.priorities.clear();
        self.switch_points_used = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_reshuffling_past_the_switch_point_budget() {
        let mut strategy = PriorityStrategy::new(3, 1);
        let a = OperationId::next();
        strategy.priority_of(a);
        assert_eq!(strategy.priorities.len(), 1);

        strategy.notify_priority_change_point();
        assert!(strategy.priorities.is_empty());

        strategy.priority_of(a);
        strategy.notify_priority_change_point();
        assert_eq!(strategy.priorities.len(), 1, "budget exhausted, priorities retained");
    }
}
