// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The task layer: `Task::run`, `Task::delay`, `when_all`/`when_any`, `wait`/`unwrap`,
//! and [`TaskCompletionSource`] (§4.9).
//!
//! Per §9's resolution of the coroutine/async control-flow question, a `Task<T>` is
//! not a polled `Future` — it is backed by exactly the same OS-thread-parked-on-a-
//! shared-`Condvar` substrate as [`crate::hooks::thread::Thread`]. Only the API shape
//! (a future-like handle with combinators) differs; the execution mechanism funneling
//! through [`Scheduler`] does not.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::error::RuntimeError;
use crate::scheduler::Scheduler;
use crate::sync::wait_handle::{wait_all, wait_any, WaitHandle, WaitHandleKind};

enum TaskResult<T> {
    Pending,
    Ready(T),
    Faulted(String),
}

/// A controlled asynchronous computation. Construct via [`Task::run`] or
/// [`TaskCompletionSource::task`].
pub struct Task<T> {
    completion: WaitHandle,
    result_slot: Arc<Mutex<TaskResult<T>>>,
}

impl<T> std::fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("completion", &self.completion).finish_non_exhaustive()
    }
}

impl<T> Clone for Task<T> {
    fn clone(&self) -> Self {
        Self { completion: self.completion.clone(), result_slot: Arc::clone(&self.result_slot) }
    }
}

impl<T: Send + 'static> Task<T> {
    /// Runs `body` as a new controlled operation, returning a `Task` handle to it
    /// (§4.9 `Task.Run`).
    ///
    /// # Errors
    /// Returns [`RuntimeError::UncontrolledSynchronization`] if called off a
    /// controlled operation, or propagates a structural error from the `Create`
    /// scheduling point.
    pub fn run(scheduler: &Arc<Scheduler>, body: impl FnOnce() -> T + Send + 'static) -> Result<Self, RuntimeError> {
        let completion = scheduler.new_wait_handle(WaitHandleKind::ManualReset, false);
        let result_slot = Arc::new(Mutex::new(TaskResult::Pending));

        let completion_for_body = completion.clone();
        let result_slot_for_body = Arc::clone(&result_slot);
        scheduler.spawn_operation("task", move |_scheduler| {
            let outcome = panic::catch_unwind(AssertUnwindSafe(body));
            let result = match outcome {
                Ok(value) => TaskResult::Ready(value),
                Err(payload) => TaskResult::Faulted(describe_panic_payload(&payload)),
            };
            *result_slot_for_body.lock().expect("result slot poisoned") = result;
            completion_for_body.set().expect("completion handle outlives its own spawning operation");
        })?;

        Ok(Self { completion, result_slot })
    }

    /// Blocks the calling operation until this task completes, without consuming the
    /// result (§4.9 `Task.Wait`).
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] if waiting leaves no enabled
    /// operation.
    pub fn wait(&self) -> Result<(), RuntimeError> {
        self.completion.wait_one()
    }

    /// Blocks until complete and returns the result, panicking if the task faulted —
    /// the controlled analogue of `Task<T>.Result` (not to be confused with
    /// `Task<Task<T>>.Unwrap()`, which is [`Task::unwrap`]).
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] if waiting leaves no enabled
    /// operation.
    ///
    /// # Panics
    /// Panics if the task's body panicked (it "faulted" in Coyote's terminology)
    /// rather than returning a value.
    pub fn result(&self) -> Result<T, RuntimeError>
    where
        T: Clone,
    {
        self.wait()?;
        match &*self.result_slot.lock().expect("result slot poisoned") {
            TaskResult::Ready(value) => Ok(value.clone()),
            TaskResult::Faulted(message) => panic!("task faulted: {message}"),
            TaskResult::Pending => unreachable!("wait() only returns after the completion handle is set"),
        }
    }

    /// Flattens a `Task<Task<T>>` into a `Task<T>`, tracked as its own controlled
    /// operation that waits on the outer task, then the inner one, forwarding
    /// whichever faults first — the controlled analogue of
    /// `Task<Task<TResult>>.Unwrap()` (§4.9 `Task.Unwrap`).
    ///
    /// # Errors
    /// Returns [`RuntimeError::UncontrolledSynchronization`] if called off a
    /// controlled operation, or propagates a structural error from the `Create`
    /// scheduling point.
    pub fn unwrap(scheduler: &Arc<Scheduler>, task_of_task: Task<Task<T>>) -> Result<Task<T>, RuntimeError>
    where
        T: Clone,
    {
        Self::run(scheduler, move || {
            task_of_task.wait().expect("outer task's own operation keeps it enabled until it completes");
            let inner = match &*task_of_task.result_slot.lock().expect("result slot poisoned") {
                TaskResult::Ready(inner) => inner.clone(),
                TaskResult::Faulted(message) => panic!("outer task faulted: {message}"),
                TaskResult::Pending => unreachable!("wait() only returns after the completion handle is set"),
            };
            inner.result().unwrap_or_else(|err| panic!("inner task wait failed: {err}"))
        })
    }

    /// Non-blocking check; does not offer a scheduling point since it is meant for
    /// bookkeeping (e.g. building up arguments to [`when_all`]/[`when_any`]), not for
    /// the program under test to branch its logic on directly.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        !matches!(*self.result_slot.lock().expect("result slot poisoned"), TaskResult::Pending)
    }
}

/// Blocks the calling operation until every task in `tasks` has completed (§4.9
/// `Task.WhenAll`).
///
/// # Errors
/// Propagates [`RuntimeError::DeadlockDetected`] if waiting leaves no enabled
/// operation, or [`RuntimeError::ArgumentOutOfRange`] if `tasks` is empty.
pub fn when_all<T>(tasks: &[Task<T>]) -> Result<(), RuntimeError> {
    let handles: Vec<WaitHandle> = tasks.iter().map(|t| t.completion.clone()).collect();
    wait_all(&handles)
}

/// Blocks the calling operation until any one task in `tasks` completes, returning
/// its index (§4.9 `Task.WhenAny`).
///
/// # Errors
/// Propagates [`RuntimeError::DeadlockDetected`] if waiting leaves no enabled
/// operation, or [`RuntimeError::ArgumentOutOfRange`] if `tasks` is empty.
pub fn when_any<T>(tasks: &[Task<T>]) -> Result<usize, RuntimeError> {
    let handles: Vec<WaitHandle> = tasks.iter().map(|t| t.completion.clone()).collect();
    wait_any(&handles)
}

/// Blocks the calling operation for `ticks` scheduler steps (§4.9 `Task.Delay`).
///
/// # Errors
/// Propagates [`RuntimeError::DeadlockDetected`] if waiting leaves no enabled
/// operation (unreachable in practice: a pending delay always ticks itself forward
/// before a deadlock would be raised).
pub fn delay(scheduler: &Scheduler, ticks: u32) -> Result<(), RuntimeError> {
    scheduler.delay(ticks)
}

/// A producer-side handle that completes a [`Task`] from outside the task body
/// itself — the controlled analogue of `TaskCompletionSource<T>` (§4.9).
pub struct TaskCompletionSource<T> {
    completion: WaitHandle,
    result_slot: Arc<Mutex<TaskResult<T>>>,
}

impl<T> std::fmt::Debug for TaskCompletionSource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskCompletionSource").field("completion", &self.completion).finish_non_exhaustive()
    }
}

impl<T: Send + 'static> TaskCompletionSource<T> {
    #[must_use]
    pub fn new(scheduler: &Arc<Scheduler>) -> Self {
        Self {
            completion: scheduler.new_wait_handle(WaitHandleKind::ManualReset, false),
            result_slot: Arc::new(Mutex::new(TaskResult::Pending)),
        }
    }

    /// The [`Task`] this source completes. May be handed to other operations; they
    /// observe completion once [`TaskCompletionSource::set_result`] or
    /// [`TaskCompletionSource::set_fault`] is called.
    #[must_use]
    pub fn task(&self) -> Task<T> {
        Task { completion: self.completion.clone(), result_slot: Arc::clone(&self.result_slot) }
    }

    /// # Errors
    /// Returns [`RuntimeError::AssertionFailure`] if the underlying resource no
    /// longer exists.
    pub fn set_result(&self, value: T) -> Result<(), RuntimeError> {
        *self.result_slot.lock().expect("result slot poisoned") = TaskResult::Ready(value);
        self.completion.set()
    }

    /// # Errors
    /// Returns [`RuntimeError::AssertionFailure`] if the underlying resource no
    /// longer exists.
    pub fn set_fault(&self, message: impl Into<String>) -> Result<(), RuntimeError> {
        *self.result_slot.lock().expect("result slot poisoned") = TaskResult::Faulted(message.into());
        self.completion.set()
    }
}
