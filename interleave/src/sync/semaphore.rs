// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Semaphore: the counted-permit state machine and its public handle (§3, §4.5).
//!
//! Grounded on the classic "wake without decrementing, let the woken waiter recheck
//! the count itself" protocol (see `constance`'s kernel semaphore in the retrieval
//! pack's standalone examples), which is what makes the TOCTOU race between release
//! and acquire schedulable rather than hidden inside an atomic decrement.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::RuntimeError;
use crate::operation::OperationId;
use crate::resource::{ResourceId, RuntimeId};
use crate::scheduler::Scheduler;

#[derive(Debug)]
pub(crate) struct SemaphoreState {
    pub(crate) runtime_id: RuntimeId,
    pub(crate) count: u32,
    pub(crate) max: u32,
    pub(crate) waiters: VecDeque<OperationId>,
    pub(crate) use_count: u32,
}

impl SemaphoreState {
    pub(crate) fn new(runtime_id: RuntimeId, initial: u32, max: u32) -> Self {
        Self { runtime_id, count: initial, max, waiters: VecDeque::new(), use_count: 0 }
    }

    pub(crate) fn is_unused(&self) -> bool {
        self.waiters.is_empty()
    }
}

/// A counted permit resource. Construct via
/// [`crate::scheduler::Scheduler::new_semaphore`].
#[derive(Clone)]
pub struct Semaphore {
    scheduler: Arc<Scheduler>,
    id: ResourceId,
}

impl std::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Semaphore").field("id", &self.id).finish_non_exhaustive()
    }
}

impl Semaphore {
    pub(crate) fn new(scheduler: Arc<Scheduler>, id: ResourceId) -> Self {
        Self { scheduler, id }
    }

    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Acquires one permit, blocking the calling operation while `count == 0`.
    ///
    /// A resumed waiter does not assume it owns a permit purely because it was woken:
    /// per the release protocol, it decrements `count` itself upon resuming, and must
    /// re-pause if another operation raced it to the last permit (§4.5 "wake without
    /// decrementing").
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] if waiting leaves no enabled
    /// operation.
    pub fn wait(&self) -> Result<(), RuntimeError> {
        self.scheduler.semaphore_wait(self.id)
    }

    /// Releases `count` permits, raising [`RuntimeError::SemaphoreFull`] if doing so
    /// would exceed the configured maximum.
    ///
    /// # Errors
    /// Returns [`RuntimeError::SemaphoreFull`] if `count + n > max`.
    pub fn release(&self, n: u32) -> Result<(), RuntimeError> {
        self.scheduler.semaphore_release(self.id, n)
    }

    /// Non-blocking acquire attempt.
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] from the race-check scheduling
    /// point in the vanishingly rare case it finds no enabled operation.
    pub fn try_wait(&self) -> Result<bool, RuntimeError> {
        self.scheduler.semaphore_try_wait(self.id)
    }

    /// Current permit count as of the last time the calling operation held the
    /// scheduler's critical section. Exposed for diagnostics and tests; the program
    /// under test should not branch on it (that's an uncontrolled read of shared
    /// state — see `Volatile`/`Atomic` in [`crate::hooks`] for the controlled way).
    ///
    /// # Errors
    /// Returns [`RuntimeError::AssertionFailure`] if the resource no longer exists.
    pub fn count(&self) -> Result<u32, RuntimeError> {
        self.scheduler.semaphore_count(self.id)
    }
}
