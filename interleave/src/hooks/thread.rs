// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Controlled threads: the `Thread`-shaped front door onto
//! [`crate::scheduler::Scheduler::spawn_operation`] (§4.7).

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::error::RuntimeError;
use crate::scheduler::Scheduler;
use crate::sync::wait_handle::{WaitHandle, WaitHandleKind};

type ThreadOutcome<T> = Result<T, Box<dyn Any + Send + 'static>>;

/// A controlled thread: spawned via [`Thread::spawn`], joined via
/// [`ThreadHandle::join`]. Backed by a real OS thread parked on the scheduler's
/// condition variable until it is its turn to run (§9 "coroutine/async control
/// flow").
#[derive(Debug)]
pub struct Thread;

impl Thread {
    /// Spawns `body` as a new controlled operation and returns a handle to join it.
    ///
    /// A panic inside `body` (including the one raised by the default
    /// [`crate::error::PanickingAssertionSink`] when this operation discovers a
    /// structural error) is caught and re-raised on whichever operation calls
    /// [`ThreadHandle::join`], the same way `std::thread::JoinHandle` surfaces a
    /// panicked thread to its joiner rather than silently leaking it.
    ///
    /// # Errors
    /// Returns [`RuntimeError::UncontrolledSynchronization`] if called off a
    /// controlled operation, or propagates a structural error from the `Create`
    /// scheduling point offered to the spawning operation.
    pub fn spawn<T, F>(scheduler: &Arc<Scheduler>, label: impl Into<String>, body: F) -> Result<ThreadHandle<T>, RuntimeError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let completion = scheduler.new_wait_handle(WaitHandleKind::ManualReset, false);
        let result_slot: Arc<Mutex<Option<ThreadOutcome<T>>>> = Arc::new(Mutex::new(None));

        let completion_for_body = completion.clone();
        let result_slot_for_body = Arc::clone(&result_slot);
        scheduler.spawn_operation(label, move |_scheduler| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(body));
            *result_slot_for_body.lock().expect("result slot poisoned") = Some(outcome);
            completion_for_body.set().expect("completion handle outlives its own spawning operation");
        })?;

        Ok(ThreadHandle { completion, result_slot })
    }

    /// Picks a nondeterministic tick count in `[0, config.timeout_delay]` and, if
    /// nonzero, pauses the calling operation for that many ticks; returns immediately
    /// on a chosen delay of zero. The controlled analogue of `Thread.Sleep` (§4.8):
    /// `n` ticks are a scheduler abstraction, never real wall-clock time.
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] if waiting leaves no enabled
    /// operation (unreachable in practice — a pending delay always ticks itself
    /// forward before a deadlock would be raised).
    pub fn sleep(scheduler: &Scheduler) -> Result<(), RuntimeError> {
        let bound = scheduler.config().timeout_delay;
        let ticks = if bound == 0 { 0 } else { scheduler.choose_integer(bound + 1)? };
        if ticks == 0 {
            return Ok(());
        }
        scheduler.delay(ticks)
    }

    /// A single `Yield` scheduling point, offering control to another enabled
    /// operation without pausing this one on any resource (§4.8 "Thread.Yield").
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] from the scheduling point.
    pub fn yield_now(scheduler: &Scheduler) -> Result<(), RuntimeError> {
        scheduler.yield_point(crate::scheduler::SchedulingPointKind::Yield)
    }
}

/// A handle to a spawned [`Thread`], analogous to `std::thread::JoinHandle`.
pub struct ThreadHandle<T> {
    completion: WaitHandle,
    result_slot: Arc<Mutex<Option<ThreadOutcome<T>>>>,
}

impl<T> std::fmt::Debug for ThreadHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadHandle").field("completion", &self.completion).finish_non_exhaustive()
    }
}

impl<T> ThreadHandle<T> {
    /// Blocks the calling operation until the spawned thread has returned, then
    /// yields its result.
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] if waiting leaves no enabled
    /// operation.
    ///
    /// # Panics
    /// Resumes the spawned thread's panic on the calling operation if it panicked
    /// instead of returning normally.
    pub fn join(self) -> Result<T, RuntimeError> {
        self.completion.wait_one()?;
        let outcome = self
            .result_slot
            .lock()
            .expect("result slot poisoned")
            .take()
            .expect("completion handle only signals after the outcome is stored");
        match outcome {
            Ok(value) => Ok(value),
            Err(panic_payload) => panic::resume_unwind(panic_payload),
        }
    }
}
