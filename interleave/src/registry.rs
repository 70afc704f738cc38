// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The resource registry: a process-scoped map from [`ResourceId`] to resource state
//! machine (§4.2). Lives as plain data inside the scheduler's single critical
//! section — see `thread_safe_global_state_manager`'s singleton-guarded-by-one-lock
//! pattern for the shape this is grounded on, generalized here to three resource
//! kinds instead of one.
//!
//! There is no separate "sync-object identity" to hash on the way Coyote's rewriter
//! sees one: a Rust program using this crate constructs a [`crate::sync::Monitor`] /
//! [`crate::sync::Semaphore`] / [`crate::sync::WaitHandle`] directly rather than
//! having an interceptor discover an arbitrary `std::sync` object, so the handle's own
//! [`ResourceId`] *is* the identity key.

use std::collections::HashMap;

use crate::resource::ResourceId;
use crate::sync::monitor::MonitorState;
use crate::sync::semaphore::SemaphoreState;
use crate::sync::wait_handle::WaitHandleState;

#[derive(Debug, Default)]
pub(crate) struct ResourceRegistry {
    monitors: HashMap<ResourceId, MonitorState>,
    semaphores: HashMap<ResourceId, SemaphoreState>,
    wait_handles: HashMap<ResourceId, WaitHandleState>,
}

impl ResourceRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert_monitor(&mut self, id: ResourceId, state: MonitorState) {
        self.monitors.insert(id, state);
    }

    pub(crate) fn insert_semaphore(&mut self, id: ResourceId, state: SemaphoreState) {
        self.semaphores.insert(id, state);
    }

    pub(crate) fn insert_wait_handle(&mut self, id: ResourceId, state: WaitHandleState) {
        self.wait_handles.insert(id, state);
    }

    pub(crate) fn monitor(&self, id: ResourceId) -> Option<&MonitorState> {
        self.monitors.get(&id)
    }

    pub(crate) fn monitor_mut(&mut self, id: ResourceId) -> Option<&mut MonitorState> {
        self.monitors.get_mut(&id)
    }

    pub(crate) fn semaphore(&self, id: ResourceId) -> Option<&SemaphoreState> {
        self.semaphores.get(&id)
    }

    pub(crate) fn semaphore_mut(&mut self, id: ResourceId) -> Option<&mut SemaphoreState> {
        self.semaphores.get_mut(&id)
    }

    pub(crate) fn wait_handle(&self, id: ResourceId) -> Option<&WaitHandleState> {
        self.wait_handles.get(&id)
    }

    pub(crate) fn wait_handle_mut(&mut self, id: ResourceId) -> Option<&mut WaitHandleState> {
        self.wait_handles.get_mut(&id)
    }

    /// Evicts `id` from whichever map it's registered under if its use count has
    /// dropped to zero and it currently has no owner/waiters — the CAS-style
    /// eviction named in §4.2, simplified because the single critical section already
    /// serializes every check-and-remove.
    pub(crate) fn evict_monitor_if_unused(&mut self, id: ResourceId) {
        if self.monitors.get(&id).is_some_and(|m| m.use_count == 0 && m.is_unused()) {
            self.monitors.remove(&id);
        }
    }

    pub(crate) fn evict_semaphore_if_unused(&mut self, id: ResourceId) {
        if self.semaphores.get(&id).is_some_and(|s| s.use_count == 0 && s.is_unused()) {
            self.semaphores.remove(&id);
        }
    }

    pub(crate) fn evict_wait_handle_if_unused(&mut self, id: ResourceId) {
        if self.wait_handles.get(&id).is_some_and(|w| w.use_count == 0 && w.is_unused()) {
            self.wait_handles.remove(&id);
        }
    }

    /// Unconditional removal backing `WaitHandle::close` (§4.6 Close/Dispose) — unlike
    /// `evict_wait_handle_if_unused` this drops the entry even if waiters remain
    /// queued on it.
    pub(crate) fn remove_wait_handle(&mut self, id: ResourceId) {
        self.wait_handles.remove(&id);
    }
}
