// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Wait handles: `AutoReset`/`ManualReset` events and the `WaitOne`/`WaitAll`/`WaitAny`
//! combinators (§3, §4.6).

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::RuntimeError;
use crate::operation::OperationId;
use crate::resource::{ResourceId, RuntimeId};
use crate::scheduler::Scheduler;

/// Whether a `set()` wakes exactly one waiter and then re-clears itself
/// (`AutoReset`), or wakes every current and future waiter until explicitly
/// `reset()` (`ManualReset`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitHandleKind {
    AutoReset,
    ManualReset,
}

#[derive(Debug)]
pub(crate) struct WaitHandleState {
    pub(crate) runtime_id: RuntimeId,
    pub(crate) kind: WaitHandleKind,
    pub(crate) signaled: bool,
    pub(crate) waiters: VecDeque<OperationId>,
    pub(crate) use_count: u32,
}

impl WaitHandleState {
    pub(crate) fn new(runtime_id: RuntimeId, kind: WaitHandleKind, initial_state: bool) -> Self {
        Self { runtime_id, kind, signaled: initial_state, waiters: VecDeque::new(), use_count: 0 }
    }

    pub(crate) fn is_unused(&self) -> bool {
        self.waiters.is_empty()
    }
}

/// A `WaitOne`-able synchronization event, either `AutoReset` or `ManualReset`.
/// Construct via [`crate::scheduler::Scheduler::new_wait_handle`].
#[derive(Clone)]
pub struct WaitHandle {
    scheduler: Arc<Scheduler>,
    id: ResourceId,
}

impl std::fmt::Debug for WaitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitHandle").field("id", &self.id).finish_non_exhaustive()
    }
}

impl WaitHandle {
    pub(crate) fn new(scheduler: Arc<Scheduler>, id: ResourceId) -> Self {
        Self { scheduler, id }
    }

    #[must_use]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Signals the handle, per [`WaitHandleKind`] semantics.
    ///
    /// # Errors
    /// Returns [`RuntimeError::AssertionFailure`] if the resource no longer exists.
    pub fn set(&self) -> Result<(), RuntimeError> {
        self.scheduler.wait_handle_set(self.id)
    }

    /// Clears the handle. A no-op (but still a scheduling point) on an already-clear
    /// handle.
    ///
    /// # Errors
    /// Returns [`RuntimeError::AssertionFailure`] if the resource no longer exists.
    pub fn reset(&self) -> Result<(), RuntimeError> {
        self.scheduler.wait_handle_reset(self.id)
    }

    /// Blocks the calling operation until this handle is signaled (§4.6 `WaitOne`).
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] if waiting leaves no enabled
    /// operation.
    pub fn wait_one(&self) -> Result<(), RuntimeError> {
        self.scheduler.wait_handle_wait_one(self.id)
    }

    /// Removes the handle from the registry (§4.6 Close/Dispose). Waits on a clone of
    /// this handle made after `close()` returns behave as on an uncontrolled resource
    /// and surface [`RuntimeError::UncontrolledSynchronization`].
    ///
    /// # Errors
    /// Returns [`RuntimeError::AssertionFailure`] if the resource was already removed
    /// (e.g. a second `close()` on the same handle).
    pub fn close(&self) -> Result<(), RuntimeError> {
        self.scheduler.wait_handle_close(self.id)
    }
}

/// Blocks the calling operation until every handle in `handles` has signaled at least
/// once (§4.6 `WaitAll`).
///
/// # Errors
/// Propagates [`RuntimeError::DeadlockDetected`] if waiting leaves no enabled
/// operation, or [`RuntimeError::ArgumentOutOfRange`] if `handles` is empty.
pub fn wait_all(handles: &[WaitHandle]) -> Result<(), RuntimeError> {
    if handles.is_empty() {
        return Err(RuntimeError::ArgumentOutOfRange { message: "wait_all requires at least one handle".into() });
    }
    let scheduler = handles[0].scheduler.clone();
    let ids: Vec<ResourceId> = handles.iter().map(WaitHandle::id).collect();
    scheduler.wait_handles_wait_all(&ids)
}

/// Blocks the calling operation until any one handle in `handles` signals, returning
/// the index of the handle that won (§4.6 `WaitAny`).
///
/// # Errors
/// Propagates [`RuntimeError::DeadlockDetected`] if waiting leaves no enabled
/// operation, or [`RuntimeError::ArgumentOutOfRange`] if `handles` is empty.
pub fn wait_any(handles: &[WaitHandle]) -> Result<usize, RuntimeError> {
    if handles.is_empty() {
        return Err(RuntimeError::ArgumentOutOfRange { message: "wait_any requires at least one handle".into() });
    }
    let scheduler = handles[0].scheduler.clone();
    let ids: Vec<ResourceId> = handles.iter().map(WaitHandle::id).collect();
    let winner = scheduler.wait_handles_wait_any(&ids)?;
    Ok(ids.iter().position(|id| *id == winner).expect("winner is one of the ids we passed in"))
}
