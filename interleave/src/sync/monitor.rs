// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Monitor (reentrant lock + wait/pulse/pulse-all): the monitor state machine and the
//! public handle that front-ends it (§3, §4.4).

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::RuntimeError;
use crate::operation::OperationId;
use crate::resource::{ResourceId, RuntimeId};
use crate::scheduler::Scheduler;

/// The reentrant-lock-plus-condition-variable state machine named in §3. Mutated only
/// from inside the scheduler's single critical section (§5); never locked on its own.
#[derive(Debug)]
pub(crate) struct MonitorState {
    pub(crate) runtime_id: RuntimeId,
    pub(crate) owner: Option<OperationId>,
    pub(crate) lock_depth: u32,
    /// Operations blocked trying to *acquire* the monitor.
    pub(crate) ready_queue: VecDeque<OperationId>,
    /// Operations blocked inside `Wait()`, having released the lock.
    pub(crate) wait_queue: VecDeque<OperationId>,
    pub(crate) use_count: u32,
}

impl MonitorState {
    pub(crate) fn new(runtime_id: RuntimeId) -> Self {
        Self {
            runtime_id,
            owner: None,
            lock_depth: 0,
            ready_queue: VecDeque::new(),
            wait_queue: VecDeque::new(),
            use_count: 0,
        }
    }

    pub(crate) fn is_owned_by(&self, id: OperationId) -> bool {
        self.owner == Some(id)
    }

    pub(crate) fn is_unused(&self) -> bool {
        self.owner.is_none() && self.ready_queue.is_empty() && self.wait_queue.is_empty()
    }
}

/// A reentrant mutual-exclusion lock with Hoare-style `wait`/`pulse`/`pulse_all`,
/// the controlled analogue of a CLR monitor (§3, §4.4). Construct via
/// [`crate::scheduler::Scheduler::new_monitor`].
#[derive(Clone)]
pub struct Monitor {
    scheduler: Arc<Scheduler>,
    id: ResourceId,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Monitor {
    pub(crate) fn new(scheduler: Arc<Scheduler>, id: ResourceId) -> Self {
        Self { scheduler, id }
    }

    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Acquires the lock, blocking the calling operation if another operation holds
    /// it. Reentrant: an owner calling `enter()` again increments `lock_depth` instead
    /// of blocking on itself.
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] if acquiring would leave no
    /// enabled operation in the system.
    pub fn enter(&self) -> Result<(), RuntimeError> {
        self.scheduler.monitor_enter(self.id)
    }

    /// Releases one level of ownership, transferring ownership to the head of the
    /// ready queue if `lock_depth` reaches zero and anyone is waiting to acquire.
    ///
    /// # Errors
    /// Returns [`RuntimeError::SynchronizationLockError`] if the calling operation
    /// does not currently own the lock.
    pub fn exit(&self) -> Result<(), RuntimeError> {
        self.scheduler.monitor_exit(self.id)
    }

    /// Releases the lock entirely and blocks until pulsed, then reacquires the lock
    /// before returning — exactly like `Monitor.Wait` (§4.4).
    ///
    /// # Errors
    /// Returns [`RuntimeError::SynchronizationLockError`] if the calling operation
    /// does not own the lock, or [`RuntimeError::DeadlockDetected`] if waiting leaves
    /// no enabled operation.
    pub fn wait(&self) -> Result<(), RuntimeError> {
        self.scheduler.monitor_wait(self.id)
    }

    /// Wakes the longest-waiting `wait()`er, moving it to the ready queue to compete
    /// for reacquiring the lock once the caller releases it (§4.4).
    ///
    /// # Errors
    /// Returns [`RuntimeError::SynchronizationLockError`] if the calling operation
    /// does not own the lock.
    pub fn pulse(&self) -> Result<(), RuntimeError> {
        self.scheduler.monitor_pulse(self.id, false)
    }

    /// Wakes every `wait()`er (§4.4).
    ///
    /// # Errors
    /// Returns [`RuntimeError::SynchronizationLockError`] if the calling operation
    /// does not own the lock.
    pub fn pulse_all(&self) -> Result<(), RuntimeError> {
        self.scheduler.monitor_pulse(self.id, true)
    }

    /// Non-blocking acquire attempt: succeeds immediately if free or reentrantly
    /// owned, otherwise returns `false` without pausing the calling operation.
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] in the (rare) case that the
    /// non-blocking race-check scheduling point itself finds no enabled operation.
    pub fn try_enter(&self) -> Result<bool, RuntimeError> {
        self.scheduler.monitor_try_enter(self.id)
    }

    /// Whether the calling operation currently owns this monitor (§4.4 `isEntered`).
    ///
    /// # Errors
    /// Returns [`RuntimeError::AssertionFailure`] if the resource no longer exists.
    pub fn is_entered(&self) -> Result<bool, RuntimeError> {
        self.scheduler.monitor_is_entered(self.id)
    }
}
