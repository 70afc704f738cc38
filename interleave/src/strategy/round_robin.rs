// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

use super::Strategy;
use crate::operation::OperationId;

/// Deterministic fair rotation over the enabled set: picks the lowest-numbered
/// enabled id strictly greater than the last one it picked, wrapping around to the
/// overall minimum once it runs off the top. No seed dependence, so every iteration
/// under this policy explores the same interleaving — useful as a sanity baseline,
/// not for bug-finding — but unlike always-favor-the-lowest, it never starves a
/// perpetually-enabled higher-numbered operation.
#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    last: Option<OperationId>,
}

impl RoundRobinStrategy {
    #[must_use]
    pub fn new() -> Self {
        Self { last: None }
    }
}

impl Strategy for RoundRobinStrategy {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn seed(&self) -> u64 {
        0
    }

    fn next_operation(&mut self, enabled: &[OperationId], _current: OperationId) -> OperationId {
        let chosen = match self.last {
            Some(last) => enabled.iter().copied().filter(|id| *id > last).min(),
            None => None,
        }
        .unwrap_or_else(|| *enabled.iter().min().expect("enabled is never empty"));
        self.last = Some(chosen);
        chosen
    }

    fn next_integer(&mut self, _bound: u32) -> u32 {
        0
    }

    fn next_boolean(&mut self) -> bool {
        false
    }

    fn prepare_iteration(&mut self, _seed: u64, _iteration: u64) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_from_the_lowest_id() {
        let mut strategy = RoundRobinStrategy::new();
        let a = OperationId::next();
        let b = OperationId::next();
        let chosen = strategy.next_operation(&[b, a], a);
        assert_eq!(chosen, a);
    }

    #[test]
    fn rotates_past_a_perpetually_enabled_low_id_instead_of_starving_higher_ones() {
        let mut strategy = RoundRobinStrategy::new();
        let a = OperationId::next();
        let b = OperationId::next();
        let c = OperationId::next();

        assert_eq!(strategy.next_operation(&[a, b, c], a), a);
        assert_eq!(strategy.next_operation(&[a, b, c], a), b);
        assert_eq!(strategy.next_operation(&[a, b, c], a), c);
        // Wraps back to the minimum once it runs off the top.
        assert_eq!(strategy.next_operation(&[a, b, c], a), a);
    }

    #[test]
    fn prepare_iteration_resets_rotation_to_the_lowest_id() {
        let mut strategy = RoundRobinStrategy::new();
        let a = OperationId::next();
        let b = OperationId::next();
        strategy.next_operation(&[a, b], a);
        strategy.prepare_iteration(0, 1);
        assert_eq!(strategy.next_operation(&[a, b], a), a);
    }
}
