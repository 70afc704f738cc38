// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Controlled volatile reads/writes: a deliberately unsynchronized shared cell, for
//! modeling the data races a program under test is trying to avoid (§4.8). Unlike
//! [`crate::hooks::atomic`], a `Volatile<T>` read/write carries no memory-ordering
//! guarantee at all — two accesses with no scheduling point between them are exactly
//! the race a monitor/semaphore/wait-handle protocol is supposed to prevent.
//!
//! Soundness: a [`Volatile<T>`] is only ever touched by whichever operation the
//! scheduler has made `current`; every other operation is parked in
//! [`crate::scheduler::Scheduler`]'s condition variable and cannot be mid-access.
//! That single-runner invariant is exactly what makes the `UnsafeCell` below safe
//! despite having no `Mutex` guarding it.

use std::cell::UnsafeCell;
use std::sync::Arc;

use crate::error::RuntimeError;
use crate::scheduler::{Scheduler, SchedulingPointKind};

pub struct Volatile<T: Copy> {
    scheduler: Arc<Scheduler>,
    cell: UnsafeCell<T>,
}

// SAFETY: access to `cell` is only ever performed by the operation the scheduler has
// made `current`, and the scheduler guarantees exactly one such operation runs at a
// time (§5). No two threads ever read or write `cell` concurrently.
unsafe impl<T: Copy + Send> Send for Volatile<T> {}
unsafe impl<T: Copy + Send> Sync for Volatile<T> {}

impl<T: Copy> Volatile<T> {
    #[must_use]
    pub fn new(scheduler: Arc<Scheduler>, value: T) -> Self {
        Self { scheduler, cell: UnsafeCell::new(value) }
    }

    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] from the scheduling point.
    pub fn read(&self) -> Result<T, RuntimeError> {
        self.maybe_yield()?;
        // SAFETY: see type-level doc comment.
        Ok(unsafe { *self.cell.get() })
    }

    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] from the scheduling point.
    pub fn write(&self, value: T) -> Result<(), RuntimeError> {
        self.maybe_yield()?;
        // SAFETY: see type-level doc comment.
        unsafe {
            *self.cell.get() = value;
        }
        Ok(())
    }

    /// Offers a scheduling point only when
    /// [`crate::config::RuntimeConfig::volatile_operation_race_checking_enabled`] is
    /// set, per §4.7.
    fn maybe_yield(&self) -> Result<(), RuntimeError> {
        if self.scheduler.config().volatile_operation_race_checking_enabled {
            self.scheduler.yield_point(SchedulingPointKind::Default)?;
        }
        Ok(())
    }
}
