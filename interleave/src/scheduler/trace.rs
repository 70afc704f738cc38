// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The schedule trace: the sole observable boundary named in §6 of the design,
//! sufficient to replay an exploration deterministically. See [`ScheduleTrace`].

use serde::{Deserialize, Serialize};

/// The kind of scheduling point a [`Decision::OperationChosen`] was recorded at.
/// Carried through purely for diagnostics — replay only needs the chosen operation
/// id, not why the choice was offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingPointKind {
    Default,
    Acquire,
    Release,
    Pause,
    Yield,
    Create,
}

/// One entry in a [`ScheduleTrace`]: either which operation the strategy picked, or
/// which nondeterministic integer/boolean it returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    OperationChosen { point: SchedulingPointKind, operation_id: u64 },
    IntegerChosen { bound: u32, value: u32 },
    BooleanChosen { value: bool },
}

/// A finite, serializable sequence of scheduling decisions and nondeterministic
/// choices, sufficient to reproduce the same interleaving deterministically given the
/// same strategy and seed (§6, §8 property 6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleTrace {
    pub strategy_name: String,
    pub seed: u64,
    pub iteration: u64,
    pub decisions: Vec<Decision>,
}

impl ScheduleTrace {
    #[must_use]
    pub fn new(strategy_name: impl Into<String>, seed: u64, iteration: u64) -> Self {
        Self {
            strategy_name: strategy_name.into(),
            seed,
            iteration,
            decisions: Vec::new(),
        }
    }

    pub(crate) fn record_operation_choice(&mut self, point: SchedulingPointKind, operation_id: u64) {
        self.decisions.push(Decision::OperationChosen { point, operation_id });
    }

    pub(crate) fn record_integer_choice(&mut self, bound: u32, value: u32) {
        self.decisions.push(Decision::IntegerChosen { bound, value });
    }

    pub(crate) fn record_boolean_choice(&mut self, value: bool) {
        self.decisions.push(Decision::BooleanChosen { value });
    }

    /// Serializes to JSON, the format the replay-file persistence layer (out of scope
    /// per §1) would ultimately write to disk; in-process replay just needs the
    /// struct itself.
    ///
    /// # Errors
    /// Returns an error if the trace somehow contains non-serializable data (it never
    /// does in practice — every field is a plain value type — but `serde_json`'s
    /// signature is fallible).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// # Errors
    /// Returns an error if `json` is not a valid serialized [`ScheduleTrace`].
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let mut trace = ScheduleTrace::new("random", 42, 3);
        trace.record_operation_choice(SchedulingPointKind::Acquire, 7);
        trace.record_integer_choice(4, 2);
        trace.record_boolean_choice(true);

        let json = trace.to_json().expect("serializes");
        let restored = ScheduleTrace::from_json(&json).expect("deserializes");
        assert_eq!(trace.strategy_name, restored.strategy_name);
        assert_eq!(trace.decisions, restored.decisions);
    }
}
