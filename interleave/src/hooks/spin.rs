// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Controlled spin-waits: instead of burning a core re-checking a condition, a spin
//! loop offers a scheduling point on every iteration, letting the scheduler explore
//! "the condition becomes true after N busy-iterations" without actually busy-waiting
//! (§4.8).

use crate::error::RuntimeError;
use crate::scheduler::{Scheduler, SchedulingPointKind};

/// Repeatedly evaluates `condition`, offering a `Default` scheduling point between
/// attempts, until it returns `true` — the controlled analogue of `SpinWait.SpinUntil`
/// (§4.8).
///
/// # Errors
/// Propagates [`RuntimeError::DeadlockDetected`] if every operation becomes disabled
/// while this one keeps spinning (e.g. `condition` can only ever be satisfied by an
/// operation that has deadlocked elsewhere).
pub fn spin_until(scheduler: &Scheduler, mut condition: impl FnMut() -> bool) -> Result<(), RuntimeError> {
    while !condition() {
        scheduler.yield_point(SchedulingPointKind::Yield)?;
    }
    Ok(())
}

/// Like [`spin_until`] but also stops once `max_spins` iterations have run without
/// `condition` becoming true, mirroring `SpinWait.SpinUntil(condition, timeout)`:
/// under this runtime a wall-clock timeout has no meaning, so it is modelled as a
/// spin-count bound instead (§4.8, §9 "Timeouts"). Returns whether `condition`
/// actually became true.
///
/// # Errors
/// Propagates [`RuntimeError::DeadlockDetected`] from the underlying scheduling
/// point.
pub fn spin_until_bounded(
    scheduler: &Scheduler,
    max_spins: u32,
    mut condition: impl FnMut() -> bool,
) -> Result<bool, RuntimeError> {
    let mut wait = SpinWait::new();
    loop {
        if condition() {
            return Ok(true);
        }
        if wait.count() >= max_spins {
            return Ok(false);
        }
        wait.spin_once(scheduler)?;
    }
}

/// A spin-wait counter: offers one `Yield` scheduling point per [`SpinWait::spin_once`]
/// call and tracks how many times it has spun, the controlled analogue of
/// `System.Threading.SpinWait` (§4.8).
///
/// Per §9's "reflection / private-field mutation" design note, the reference
/// implementation reaches into the host `SpinWait`'s private iteration counter via
/// reflection because the standard library hides it; this Rust port needs no such
/// workaround since `spin_count` is a first-class field here.
#[derive(Debug, Default)]
pub struct SpinWait {
    spin_count: u32,
}

impl SpinWait {
    #[must_use]
    pub fn new() -> Self {
        Self { spin_count: 0 }
    }

    /// How many times [`SpinWait::spin_once`] has been called since construction (or
    /// the last [`SpinWait::reset`]).
    #[must_use]
    pub fn count(&self) -> u32 {
        self.spin_count
    }

    /// Offers one `Yield` scheduling point and increments the spin counter. Does not
    /// busy-spin; the scheduler decides what, if anything, runs in between (§4.8
    /// "SpinOnce").
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] from the scheduling point.
    pub fn spin_once(&mut self, scheduler: &Scheduler) -> Result<(), RuntimeError> {
        scheduler.yield_point(SchedulingPointKind::Yield)?;
        self.spin_count += 1;
        Ok(())
    }

    /// Resets the spin counter to zero, mirroring `SpinWait.Reset()`.
    pub fn reset(&mut self) {
        self.spin_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_spin_wait_starts_at_zero() {
        assert_eq!(SpinWait::new().count(), 0);
    }

    #[test]
    fn reset_zeroes_the_counter() {
        let mut wait = SpinWait::new();
        wait.spin_count = 3;
        wait.reset();
        assert_eq!(wait.count(), 0);
    }
}
