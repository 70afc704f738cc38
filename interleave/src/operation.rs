// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The unit of scheduling. See [`Operation`] and [`OperationStatus`].

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::resource::ResourceId;

static NEXT_OPERATION_ID: AtomicU64 = AtomicU64::new(1);

/// Stable, process-unique id for a controlled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(u64);

impl OperationId {
    /// Mints the next id. Monotonically increasing, never reused within a process,
    /// so ids from a stale (previous-iteration) operation can never alias a live one.
    pub(crate) fn next() -> Self {
        Self(NEXT_OPERATION_ID.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// What set of resources (if any) an operation is blocked on, and how that set must
/// be satisfied before the operation becomes [`OperationStatus::Enabled`] again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockedOn {
    /// Not blocked on anything.
    Nothing,
    /// Blocked on a single resource (the common case: monitor enter, semaphore wait,
    /// `WaitOne`).
    Resource(ResourceId),
    /// Blocked until *any one* of these resources signals it (`WaitAny`).
    AnyOf(HashSet<ResourceId>),
    /// Blocked until *every* one of these resources has signalled it at least once
    /// (`WaitAll`). Resources are removed from the set as they signal; the operation
    /// becomes enabled when the set empties.
    AllOf(HashSet<ResourceId>),
    /// Blocked on a tick-counted delay (`Thread.Sleep`, `Task.Delay`).
    Delay(u32),
}

/// The lifecycle state of a controlled operation (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    /// Eligible to be chosen as the next-to-run operation.
    Enabled,
    /// Blocked on exactly one resource.
    PausedOnResource,
    /// Blocked until any one of several resources signals it.
    PausedOnAnyResource,
    /// Blocked until every one of several resources has signalled it.
    PausedOnAllResources,
    /// Blocked on a delay countdown.
    PausedOnDelay,
    /// Finished; eligible for cleanup once nothing else references it.
    Completed,
}

impl OperationStatus {
    #[must_use]
    pub fn is_enabled(self) -> bool {
        matches!(self, OperationStatus::Enabled)
    }

    #[must_use]
    pub fn is_paused(self) -> bool {
        matches!(
            self,
            OperationStatus::PausedOnResource
                | OperationStatus::PausedOnAnyResource
                | OperationStatus::PausedOnAllResources
                | OperationStatus::PausedOnDelay
        )
    }

    #[must_use]
    pub fn is_completed(self) -> bool {
        matches!(self, OperationStatus::Completed)
    }
}

/// A suspendable logical thread owned by the scheduler.
///
/// Only the scheduler (via [`crate::scheduler::Scheduler`]) or the resource an
/// operation is pausing on may transition its status away from `Paused*`; only the
/// operation itself, while it is the one running, may transition itself *into* a
/// `Paused*` state (§4.1 invariants).
#[derive(Debug, Clone)]
pub struct Operation {
    pub id: OperationId,
    pub label: String,
    pub status: OperationStatus,
    pub blocked_on: BlockedOn,
    pub cancellation_requested: bool,
    /// Set when a `WaitAny` resolves, recording which resource actually enabled this
    /// operation, so the caller can report the winning index (§4.6 `WaitAny`).
    pub last_signaled_by: Option<ResourceId>,
}

impl Operation {
    pub(crate) fn new(label: impl Into<String>) -> Self {
        Self {
            id: OperationId::next(),
            label: label.into(),
            status: OperationStatus::Enabled,
            blocked_on: BlockedOn::Nothing,
            cancellation_requested: false,
            last_signaled_by: None,
        }
    }

    /// Transition to `PausedOnResource` with blocking set `{rid}` (§4.1).
    pub(crate) fn pause_with_resource(&mut self, rid: ResourceId) {
        self.status = OperationStatus::PausedOnResource;
        self.blocked_on = BlockedOn::Resource(rid);
    }

    /// Transition to `PausedOnAllResources` if `all`, else `PausedOnAnyResource`
    /// (§4.1).
    pub(crate) fn pause_with_resources(&mut self, rids: HashSet<ResourceId>, all: bool) {
        self.status = if all {
            OperationStatus::PausedOnAllResources
        } else {
            OperationStatus::PausedOnAnyResource
        };
        self.blocked_on = if all { BlockedOn::AllOf(rids) } else { BlockedOn::AnyOf(rids) };
    }

    /// Transition to `PausedOnDelay` with tick counter `n` (§4.1).
    pub(crate) fn pause_with_delay(&mut self, ticks: u32) {
        self.status = OperationStatus::PausedOnDelay;
        self.blocked_on = BlockedOn::Delay(ticks);
    }

    /// Attempts to enable this operation in response to `rid` signaling, honoring the
    /// blocking-set semantics (§4.1 `signal`). Returns whether the signal enabled it.
    pub(crate) fn signal(&mut self, rid: ResourceId) -> bool {
        match &mut self.blocked_on {
            BlockedOn::Resource(blocked) if *blocked == rid => {
                self.enable(Some(rid));
                true
            }
            BlockedOn::AnyOf(set) if set.contains(&rid) => {
                self.enable(Some(rid));
                true
            }
            BlockedOn::AllOf(set) => {
                set.remove(&rid);
                if set.is_empty() {
                    self.enable(Some(rid));
                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }

    /// Like [`Operation::signal`] but does not require `rid` to be in the current
    /// block set — used by the semaphore's "release then race" protocol (§4.1
    /// `tryEnable`), where a released waiter must recheck the resource itself rather
    /// than trust that this particular release is "theirs".
    pub(crate) fn try_enable(&mut self, rid: ResourceId) {
        self.enable(Some(rid));
    }

    fn enable(&mut self, signaled_by: Option<ResourceId>) {
        self.status = OperationStatus::Enabled;
        self.blocked_on = BlockedOn::Nothing;
        self.last_signaled_by = signaled_by;
    }

    pub(crate) fn tick_delay(&mut self) -> bool {
        if let BlockedOn::Delay(ticks) = &mut self.blocked_on {
            if *ticks == 0 {
                self.enable(None);
                true
            } else {
                *ticks -= 1;
                false
            }
        } else {
            false
        }
    }

    pub(crate) fn complete(&mut self) {
        self.status = OperationStatus::Completed;
        self.blocked_on = BlockedOn::Nothing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(n: u64) -> ResourceId {
        ResourceId::for_test(n)
    }

    #[test]
    fn signal_exact_resource_enables() {
        let mut op = Operation::new("A");
        op.pause_with_resource(rid(1));
        assert!(op.signal(rid(1)));
        assert!(op.status.is_enabled());
    }

    #[test]
    fn signal_wrong_resource_does_not_enable() {
        let mut op = Operation::new("A");
        op.pause_with_resource(rid(1));
        assert!(!op.signal(rid(2)));
        assert!(op.status.is_paused());
    }

    #[test]
    fn all_of_requires_every_resource() {
        let mut op = Operation::new("A");
        let set: HashSet<_> = [rid(1), rid(2)].into_iter().collect();
        op.pause_with_resources(set, true);
        assert!(!op.signal(rid(1)));
        assert!(op.status.is_paused());
        assert!(op.signal(rid(2)));
        assert!(op.status.is_enabled());
    }

    #[test]
    fn any_of_resolves_on_first_signal_and_records_winner() {
        let mut op = Operation::new("A");
        let set: HashSet<_> = [rid(1), rid(2)].into_iter().collect();
        op.pause_with_resources(set, false);
        assert!(op.signal(rid(2)));
        assert_eq!(op.last_signaled_by, Some(rid(2)));
    }

    #[test]
    fn delay_counts_down_to_zero_then_enables() {
        let mut op = Operation::new("A");
        op.pause_with_delay(2);
        assert!(!op.tick_delay());
        assert!(!op.tick_delay());
        assert!(op.tick_delay());
        assert!(op.status.is_enabled());
    }
}
