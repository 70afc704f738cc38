// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! The scheduler: the single process-wide critical section every controlled
//! operation and resource mutation funnels through (§4.3, §5).
//!
//! Every controlled operation — whether spawned via [`crate::hooks::thread::Thread`]
//! or [`crate::task::Task`] — is backed by a real OS thread parked on the one
//! [`Condvar`] owned by this module, looping "is it my turn" exactly like a monitor
//! wait. `advance_locked` is that loop; every public resource operation in
//! [`crate::sync`] is a short sequence of state mutation followed by a call into it.

pub mod trace;

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;

use crate::config::RuntimeConfig;
use crate::error::RuntimeError;
use crate::operation::{Operation, OperationId, OperationStatus};
use crate::registry::ResourceRegistry;
use crate::resource::{ResourceId, RuntimeId};
use crate::strategy::Strategy;
use crate::sync::monitor::{Monitor, MonitorState};
use crate::sync::semaphore::{Semaphore, SemaphoreState};
use crate::sync::wait_handle::{WaitHandle, WaitHandleKind, WaitHandleState};

pub use trace::{Decision, ScheduleTrace, SchedulingPointKind};

thread_local! {
    static CURRENT_OPERATION: Cell<Option<OperationId>> = const { Cell::new(None) };
}

struct SchedulerInner {
    runtime_id: RuntimeId,
    strategy: Box<dyn Strategy>,
    operations: HashMap<OperationId, Operation>,
    registry: ResourceRegistry,
    current: Option<OperationId>,
    trace: ScheduleTrace,
    step_count: u32,
}

impl SchedulerInner {
    fn enabled_operations(&self) -> Vec<OperationId> {
        self.operations.values().filter(|op| op.status.is_enabled()).map(|op| op.id).collect()
    }

    fn all_completed(&self) -> bool {
        self.operations.values().all(|op| op.status.is_completed())
    }

    /// The paused-on-delay operation with the fewest remaining ticks, used to make
    /// forward progress when nothing else is enabled (§4.3 step 4).
    fn smallest_delay_operation(&self) -> Option<OperationId> {
        self.operations
            .values()
            .filter_map(|op| match op.blocked_on {
                crate::operation::BlockedOn::Delay(ticks) => Some((op.id, ticks)),
                _ => None,
            })
            .min_by_key(|&(_, ticks)| ticks)
            .map(|(id, _)| id)
    }

    fn tick_delay_operation(&mut self, id: OperationId) {
        if let Some(op) = self.operations.get_mut(&id) {
            op.tick_delay();
        }
    }

    fn build_deadlock_error(&self) -> RuntimeError {
        let paused: Vec<&Operation> = self.operations.values().filter(|op| op.status.is_paused()).collect();
        RuntimeError::DeadlockDetected {
            operation_ids: paused.iter().map(|op| op.id.raw()).collect(),
            resource_ids: paused
                .iter()
                .map(|op| match &op.blocked_on {
                    crate::operation::BlockedOn::Resource(r) => r.to_string(),
                    crate::operation::BlockedOn::AnyOf(set) | crate::operation::BlockedOn::AllOf(set) => {
                        set.iter().map(ToString::to_string).collect::<Vec<_>>().join("|")
                    }
                    crate::operation::BlockedOn::Delay(_) | crate::operation::BlockedOn::Nothing => "<none>".into(),
                })
                .collect(),
        }
    }
}

/// Owns the one critical section named in §5, the resource registry, and the set of
/// live operations for a single exploration iteration. Construct fresh per iteration
/// via [`Scheduler::new`] — see [`crate::harness::explore`].
pub struct Scheduler {
    config: RuntimeConfig,
    inner: Mutex<SchedulerInner>,
    cv: Condvar,
}

impl Scheduler {
    /// Starts a new iteration: registers the calling thread as the "main" operation
    /// and makes it `current`. `iteration` is recorded in the resulting
    /// [`ScheduleTrace`] for diagnostics.
    #[must_use]
    pub fn new(config: RuntimeConfig, strategy: Box<dyn Strategy>, iteration: u64) -> Arc<Self> {
        let runtime_id = RuntimeId::new();
        let main_operation = Operation::new("main");
        let main_id = main_operation.id;

        let mut operations = HashMap::new();
        operations.insert(main_id, main_operation);

        let trace = ScheduleTrace::new(strategy.name(), strategy.seed(), iteration);
        let inner = SchedulerInner {
            runtime_id,
            strategy,
            operations,
            registry: ResourceRegistry::new(),
            current: Some(main_id),
            trace,
            step_count: 0,
        };

        CURRENT_OPERATION.with(|cell| cell.set(Some(main_id)));
        Arc::new(Self { config, inner: Mutex::new(inner), cv: Condvar::new() })
    }

    #[must_use]
    pub fn runtime_id(&self) -> RuntimeId {
        self.inner.lock().expect("scheduler mutex poisoned").runtime_id
    }

    /// The configuration this scheduler was built with — consulted by
    /// [`crate::hooks`] to decide whether a given primitive should emit a scheduling
    /// point (§6 configuration table).
    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// A snapshot of the trace recorded so far — the sole observable boundary for
    /// asserting on *how* an iteration interleaved (§6).
    #[must_use]
    pub fn trace(&self) -> ScheduleTrace {
        self.inner.lock().expect("scheduler mutex poisoned").trace.clone()
    }

    /// The [`OperationId`] backing the calling OS thread.
    ///
    /// # Errors
    /// Returns [`RuntimeError::UncontrolledSynchronization`] if the calling thread
    /// was never registered as a controlled operation (e.g. a thread spawned with
    /// `std::thread::spawn` directly instead of [`crate::hooks::thread::Thread`]).
    pub fn current_operation_id(&self) -> Result<OperationId, RuntimeError> {
        CURRENT_OPERATION.with(std::cell::Cell::get).ok_or_else(|| RuntimeError::UncontrolledSynchronization {
            message: "called from a thread with no controlled operation".into(),
        })
    }

    // ---------------------------------------------------------------- operations --

    /// Registers and starts a new controlled operation backed by a real OS thread,
    /// then offers a `Create` scheduling point to the calling operation (§4.3, §4.7).
    ///
    /// # Errors
    /// Returns [`RuntimeError::UncontrolledSynchronization`] if called off a
    /// controlled operation, or propagates a structural error from the `Create`
    /// scheduling point.
    pub fn spawn_operation(
        self: &Arc<Self>,
        label: impl Into<String>,
        body: impl FnOnce(Arc<Scheduler>) + Send + 'static,
    ) -> Result<OperationId, RuntimeError> {
        let creator_id = self.current_operation_id()?;
        let operation = Operation::new(label);
        let new_id = operation.id;

        {
            let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
            guard.operations.insert(new_id, operation);
        }

        let scheduler = Arc::clone(self);
        thread::Builder::new()
            .name(new_id.to_string())
            .spawn(move || {
                CURRENT_OPERATION.with(|cell| cell.set(Some(new_id)));
                scheduler.block_until_my_turn(new_id);
                body(Arc::clone(&scheduler));
                scheduler.finish_operation(new_id);
            })
            .expect("failed to spawn OS thread backing a controlled operation");

        let guard = self.inner.lock().expect("scheduler mutex poisoned");
        self.advance_locked(guard, creator_id, SchedulingPointKind::Create)?;
        Ok(new_id)
    }

    /// A voluntary scheduling point that does not block the calling operation — used
    /// by [`crate::hooks`] after every atomic/volatile access and explicit yield
    /// (§4.7, §4.8).
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] if somehow no operation remains
    /// enabled (should not happen at a non-blocking point, but the scheduler does not
    /// special-case it away).
    pub fn yield_point(&self, point: SchedulingPointKind) -> Result<(), RuntimeError> {
        let my_id = self.current_operation_id()?;
        let guard = self.inner.lock().expect("scheduler mutex poisoned");
        self.advance_locked(guard, my_id, point)?;
        Ok(())
    }

    /// Blocks the calling operation on a single delay of `ticks` scheduler steps —
    /// the controlled analogue of `Thread::sleep`/`Task::delay` (§4.7, §4.9). Ticks
    /// are an abstraction over wall-clock time: they elapse only when the scheduler
    /// has nothing else to run, not with real time.
    ///
    /// # Errors
    /// Propagates [`RuntimeError::DeadlockDetected`] if no other operation is enabled
    /// and the delay itself cannot be the one making progress (unreachable in
    /// practice since a pending delay always ticks before a deadlock is raised).
    pub fn delay(&self, ticks: u32) -> Result<(), RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        if let Some(op) = guard.operations.get_mut(&my_id) {
            op.pause_with_delay(ticks);
        }
        self.advance_locked(guard, my_id, SchedulingPointKind::Pause)?;
        Ok(())
    }

    /// Picks a nondeterministic integer in `0..bound`, recording the choice in the
    /// trace so replay reproduces it (§4.10).
    ///
    /// # Errors
    /// Returns [`RuntimeError::ArgumentOutOfRange`] if `bound` is zero.
    pub fn choose_integer(&self, bound: u32) -> Result<u32, RuntimeError> {
        if bound == 0 {
            return Err(RuntimeError::ArgumentOutOfRange { message: "choose_integer bound must be > 0".into() });
        }
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        let value = guard.strategy.next_integer(bound);
        guard.trace.record_integer_choice(bound, value);
        Ok(value)
    }

    /// Picks a nondeterministic boolean, recording the choice in the trace (§4.10).
    pub fn choose_boolean(&self) -> bool {
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        let value = guard.strategy.next_boolean();
        guard.trace.record_boolean_choice(value);
        value
    }

    fn block_until_my_turn(&self, id: OperationId) {
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        while guard.current != Some(id) {
            guard = self.cv.wait(guard).expect("scheduler mutex poisoned");
        }
    }

    fn finish_operation(&self, id: OperationId) {
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        if let Some(op) = guard.operations.get_mut(&id) {
            op.complete();
        }
        loop {
            let enabled = guard.enabled_operations();
            if enabled.is_empty() {
                if let Some(delay_id) = guard.smallest_delay_operation() {
                    guard.tick_delay_operation(delay_id);
                    continue;
                }
                if !guard.all_completed() {
                    let err = guard.build_deadlock_error();
                    drop(guard);
                    self.config.assertion_sink.on_assertion_failure(&err);
                } else {
                    guard.current = None;
                }
                self.cv.notify_all();
                return;
            }
            let chosen = guard.strategy.next_operation(&enabled, id);
            guard.trace.record_operation_choice(SchedulingPointKind::Release, chosen.raw());
            guard.current = Some(chosen);
            self.cv.notify_all();
            return;
        }
    }

    /// The heart of §4.3: computes the enabled set, lets the strategy choose, records
    /// the decision, hands off, and parks the calling operation until it is current
    /// again. Returns the reacquired guard so callers that mutate resource state both
    /// before and after a scheduling point (e.g. a race-checked `Acquire`) can chain
    /// calls without re-locking.
    fn advance_locked<'a>(
        &'a self,
        mut guard: MutexGuard<'a, SchedulerInner>,
        my_id: OperationId,
        point: SchedulingPointKind,
    ) -> Result<MutexGuard<'a, SchedulerInner>, RuntimeError> {
        loop {
            let enabled = guard.enabled_operations();

            if enabled.is_empty() {
                if let Some(delay_id) = guard.smallest_delay_operation() {
                    guard.tick_delay_operation(delay_id);
                    continue;
                }
                if guard.all_completed() {
                    guard.current = None;
                    return Ok(guard);
                }
                let err = guard.build_deadlock_error();
                drop(guard);
                self.config.assertion_sink.on_assertion_failure(&err);
                return Err(err);
            }

            let chosen = guard.strategy.next_operation(&enabled, my_id);
            guard.trace.record_operation_choice(point, chosen.raw());
            guard.current = Some(chosen);
            guard.step_count += 1;
            if guard.step_count > self.config.max_scheduling_steps_per_iteration {
                let err = RuntimeError::AssertionFailure {
                    message: format!(
                        "exceeded {} scheduling steps in one iteration; the program under test is likely non-terminating",
                        self.config.max_scheduling_steps_per_iteration
                    ),
                };
                drop(guard);
                self.config.assertion_sink.on_assertion_failure(&err);
                return Err(err);
            }
            if matches!(point, SchedulingPointKind::Create | SchedulingPointKind::Release) {
                guard.strategy.notify_priority_change_point();
            }
            self.cv.notify_all();

            while guard.current != Some(my_id) {
                guard = self.cv.wait(guard).expect("scheduler mutex poisoned");
            }
            return Ok(guard);
        }
    }

    // -------------------------------------------------------------------- monitor --

    /// Constructs a new [`Monitor`], unowned and with empty queues.
    #[must_use]
    pub fn new_monitor(self: &Arc<Self>) -> Monitor {
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        let id = ResourceId::new();
        guard.registry.insert_monitor(id, MonitorState::new(guard.runtime_id));
        drop(guard);
        Monitor::new(Arc::clone(self), id)
    }

    pub(crate) fn monitor_enter(self: &Arc<Self>, id: ResourceId) -> Result<(), RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");

        if self.config.lock_access_race_checking_enabled
            && guard.registry.monitor(id).is_some_and(|m| m.owner.is_none())
        {
            guard = self.advance_locked(guard, my_id, SchedulingPointKind::Acquire)?;
        }

        loop {
            let monitor = guard
                .registry
                .monitor_mut(id)
                .ok_or_else(|| RuntimeError::AssertionFailure { message: format!("monitor {id} no longer exists") })?;

            if monitor.is_owned_by(my_id) {
                monitor.lock_depth += 1;
                return Ok(());
            }
            if monitor.owner.is_none() {
                monitor.owner = Some(my_id);
                monitor.lock_depth = 1;
                monitor.use_count += 1;
                return Ok(());
            }

            monitor.ready_queue.push_back(my_id);
            if let Some(op) = guard.operations.get_mut(&my_id) {
                op.pause_with_resource(id);
            }
            guard = self.advance_locked(guard, my_id, SchedulingPointKind::Pause)?;
            // Woken because we were signaled as the new owner by `monitor_exit`; loop
            // around once more only to re-derive the `monitor` borrow cleanly.
        }
    }

    pub(crate) fn monitor_try_enter(self: &Arc<Self>, id: ResourceId) -> Result<bool, RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");

        if self.config.lock_access_race_checking_enabled {
            guard = self.advance_locked(guard, my_id, SchedulingPointKind::Acquire)?;
        }

        let monitor = guard
            .registry
            .monitor_mut(id)
            .ok_or_else(|| RuntimeError::AssertionFailure { message: format!("monitor {id} no longer exists") })?;

        if monitor.is_owned_by(my_id) {
            monitor.lock_depth += 1;
            return Ok(true);
        }
        if monitor.owner.is_none() {
            monitor.owner = Some(my_id);
            monitor.lock_depth = 1;
            monitor.use_count += 1;
            return Ok(true);
        }
        Ok(false)
    }

    /// Whether the calling operation currently owns the monitor (§4.4 `isEntered`).
    /// Non-blocking; offers no scheduling point, since it is meant for the program
    /// under test's own logic (e.g. asserting a lock is held), not as a retry loop.
    ///
    /// # Errors
    /// Returns [`RuntimeError::AssertionFailure`] if the resource no longer exists.
    pub(crate) fn monitor_is_entered(&self, id: ResourceId) -> Result<bool, RuntimeError> {
        let my_id = self.current_operation_id()?;
        let guard = self.inner.lock().expect("scheduler mutex poisoned");
        let monitor = guard
            .registry
            .monitor(id)
            .ok_or_else(|| RuntimeError::AssertionFailure { message: format!("monitor {id} no longer exists") })?;
        Ok(monitor.is_owned_by(my_id))
    }

    pub(crate) fn monitor_exit(self: &Arc<Self>, id: ResourceId) -> Result<(), RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");

        let monitor = guard
            .registry
            .monitor_mut(id)
            .ok_or_else(|| RuntimeError::AssertionFailure { message: format!("monitor {id} no longer exists") })?;

        if !monitor.is_owned_by(my_id) {
            return Err(RuntimeError::SynchronizationLockError { operation_id: my_id.raw(), action: "exit" });
        }

        monitor.lock_depth -= 1;
        if monitor.lock_depth > 0 {
            return Ok(());
        }

        monitor.owner = None;
        if let Some(next_owner) = monitor.ready_queue.pop_front() {
            monitor.owner = Some(next_owner);
            monitor.lock_depth = 1;
            if let Some(op) = guard.operations.get_mut(&next_owner) {
                op.signal(id);
            }
        } else {
            monitor.use_count -= 1;
            guard.registry.evict_monitor_if_unused(id);
        }

        self.advance_locked(guard, my_id, SchedulingPointKind::Release)?;
        Ok(())
    }

    pub(crate) fn monitor_wait(self: &Arc<Self>, id: ResourceId) -> Result<(), RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");

        {
            let monitor = guard
                .registry
                .monitor_mut(id)
                .ok_or_else(|| RuntimeError::AssertionFailure { message: format!("monitor {id} no longer exists") })?;
            if !monitor.is_owned_by(my_id) {
                return Err(RuntimeError::SynchronizationLockError { operation_id: my_id.raw(), action: "wait" });
            }
            monitor.wait_queue.push_back(my_id);
            monitor.lock_depth = 0;
            monitor.owner = None;
            if let Some(next_owner) = monitor.ready_queue.pop_front() {
                monitor.owner = Some(next_owner);
                monitor.lock_depth = 1;
                if let Some(op) = guard.operations.get_mut(&next_owner) {
                    op.signal(id);
                }
            }
            if let Some(op) = guard.operations.get_mut(&my_id) {
                op.pause_with_resource(id);
            }
        }

        guard = self.advance_locked(guard, my_id, SchedulingPointKind::Pause)?;
        // `monitor_exit`'s ready-queue hand-off may have already granted this operation
        // direct ownership (depth 1) while it was paused; re-running the full `enter()`
        // protocol in that case would double-count the depth. Only fall back to a fresh
        // acquisition if nobody handed the lock over directly.
        let already_owner = guard.registry.monitor(id).is_some_and(|monitor| monitor.is_owned_by(my_id));
        drop(guard);
        if already_owner {
            return Ok(());
        }
        // Reacquire exactly like a fresh `enter()`; reentrancy depth after a `wait()`
        // always restarts at one level, matching `Monitor.Wait`'s semantics.
        self.monitor_enter(id)
    }

    pub(crate) fn monitor_pulse(self: &Arc<Self>, id: ResourceId, all: bool) -> Result<(), RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");

        let monitor = guard
            .registry
            .monitor_mut(id)
            .ok_or_else(|| RuntimeError::AssertionFailure { message: format!("monitor {id} no longer exists") })?;
        if !monitor.is_owned_by(my_id) {
            return Err(RuntimeError::SynchronizationLockError { operation_id: my_id.raw(), action: "pulse" });
        }

        let woken: Vec<OperationId> =
            if all { monitor.wait_queue.drain(..).collect() } else { monitor.wait_queue.pop_front().into_iter().collect() };

        for waiter in woken {
            let monitor = guard.registry.monitor_mut(id).expect("checked above");
            monitor.ready_queue.push_back(waiter);
            if let Some(op) = guard.operations.get_mut(&waiter) {
                op.try_enable(id);
            }
            if self.config.lock_access_race_checking_enabled {
                guard = self.advance_locked(guard, my_id, SchedulingPointKind::Default)?;
            }
        }

        Ok(())
    }

    // ------------------------------------------------------------------ semaphore --

    /// Constructs a new [`Semaphore`] with `initial` permits available, up to `max`.
    ///
    /// # Errors
    /// Returns [`RuntimeError::ArgumentOutOfRange`] if `max == 0` or `initial > max`.
    pub fn new_semaphore(self: &Arc<Self>, initial: u32, max: u32) -> Result<Semaphore, RuntimeError> {
        if max == 0 {
            return Err(RuntimeError::ArgumentOutOfRange { message: "semaphore max must be greater than zero".into() });
        }
        if initial > max {
            return Err(RuntimeError::ArgumentOutOfRange {
                message: format!("semaphore initial count {initial} exceeds max {max}"),
            });
        }
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        let id = ResourceId::new();
        guard.registry.insert_semaphore(id, SemaphoreState::new(guard.runtime_id, initial, max));
        drop(guard);
        Ok(Semaphore::new(Arc::clone(self), id))
    }

    pub(crate) fn semaphore_wait(self: &Arc<Self>, id: ResourceId) -> Result<(), RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");

        loop {
            let semaphore = guard.registry.semaphore_mut(id).ok_or_else(|| RuntimeError::AssertionFailure {
                message: format!("semaphore {id} no longer exists"),
            })?;

            if semaphore.count > 0 {
                semaphore.count -= 1;
                return Ok(());
            }

            semaphore.waiters.push_back(my_id);
            semaphore.use_count += 1;
            if let Some(op) = guard.operations.get_mut(&my_id) {
                op.pause_with_resource(id);
            }
            guard = self.advance_locked(guard, my_id, SchedulingPointKind::Pause)?;
            // Woken "without decrementing" (§4.5): loop to recheck the count, since
            // another woken waiter may have raced us to the permit that was released.
            if let Some(semaphore) = guard.registry.semaphore_mut(id) {
                semaphore.use_count -= 1;
            }
        }
    }

    pub(crate) fn semaphore_try_wait(self: &Arc<Self>, id: ResourceId) -> Result<bool, RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        guard = self.advance_locked(guard, my_id, SchedulingPointKind::Acquire)?;

        let semaphore = guard
            .registry
            .semaphore_mut(id)
            .ok_or_else(|| RuntimeError::AssertionFailure { message: format!("semaphore {id} no longer exists") })?;
        if semaphore.count > 0 {
            semaphore.count -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    pub(crate) fn semaphore_release(self: &Arc<Self>, id: ResourceId, n: u32) -> Result<(), RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");

        let semaphore = guard
            .registry
            .semaphore_mut(id)
            .ok_or_else(|| RuntimeError::AssertionFailure { message: format!("semaphore {id} no longer exists") })?;

        if semaphore.count + n > semaphore.max {
            return Err(RuntimeError::SemaphoreFull { count: semaphore.count + n, max: semaphore.max });
        }
        semaphore.count += n;

        let to_wake: Vec<OperationId> = semaphore.waiters.drain(..(n as usize).min(semaphore.waiters.len())).collect();
        for waiter in to_wake {
            if let Some(op) = guard.operations.get_mut(&waiter) {
                op.try_enable(id);
            }
        }

        guard = self.advance_locked(guard, my_id, SchedulingPointKind::Release)?;
        drop(guard);
        Ok(())
    }

    pub(crate) fn semaphore_count(&self, id: ResourceId) -> Result<u32, RuntimeError> {
        let guard = self.inner.lock().expect("scheduler mutex poisoned");
        guard
            .registry
            .semaphore(id)
            .map(|s| s.count)
            .ok_or_else(|| RuntimeError::AssertionFailure { message: format!("semaphore {id} no longer exists") })
    }

    // ---------------------------------------------------------------- wait handle --

    /// Constructs a new [`WaitHandle`] of the given `kind`, initially signaled iff
    /// `initial_state`.
    #[must_use]
    pub fn new_wait_handle(self: &Arc<Self>, kind: WaitHandleKind, initial_state: bool) -> WaitHandle {
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        let id = ResourceId::new();
        guard.registry.insert_wait_handle(id, WaitHandleState::new(guard.runtime_id, kind, initial_state));
        drop(guard);
        WaitHandle::new(Arc::clone(self), id)
    }

    /// Removes the wait handle from the registry (§4.6 Close/Dispose). Any operation
    /// still queued on it is left paused forever, same as closing an OS handle out
    /// from under a real waiter — callers are expected to `set()` before `close()` if
    /// waiters must observe completion.
    ///
    /// # Errors
    /// Returns [`RuntimeError::AssertionFailure`] if the resource no longer exists.
    pub(crate) fn wait_handle_close(&self, id: ResourceId) -> Result<(), RuntimeError> {
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        if guard.registry.wait_handle(id).is_none() {
            return Err(RuntimeError::AssertionFailure { message: format!("wait handle {id} no longer exists") });
        }
        guard.registry.remove_wait_handle(id);
        Ok(())
    }

    fn uncontrolled_wait_handle(id: ResourceId, action: &'static str) -> RuntimeError {
        let message = format!("wait handle {id} no longer exists (closed); {action} fell back to uncontrolled");
        tracing::warn!(%id, action, "uncontrolled synchronization: wait handle was closed");
        RuntimeError::UncontrolledSynchronization { message }
    }

    pub(crate) fn wait_handle_set(self: &Arc<Self>, id: ResourceId) -> Result<(), RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");

        let handle = guard
            .registry
            .wait_handle_mut(id)
            .ok_or_else(|| Self::uncontrolled_wait_handle(id, "set"))?;
        handle.signaled = true;

        let woken: Vec<OperationId> = match handle.kind {
            WaitHandleKind::AutoReset => handle.waiters.pop_front().into_iter().collect(),
            WaitHandleKind::ManualReset => handle.waiters.drain(..).collect(),
        };
        if matches!(handle.kind, WaitHandleKind::AutoReset) && !woken.is_empty() {
            handle.signaled = false;
        }

        for waiter in &woken {
            if let Some(op) = guard.operations.get_mut(waiter) {
                op.signal(id);
            }
        }

        guard = self.advance_locked(guard, my_id, SchedulingPointKind::Release)?;
        drop(guard);
        Ok(())
    }

    pub(crate) fn wait_handle_reset(&self, id: ResourceId) -> Result<(), RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");
        {
            let handle = guard.registry.wait_handle_mut(id).ok_or_else(|| Self::uncontrolled_wait_handle(id, "reset"))?;
            handle.signaled = false;
        }
        let _ = self.advance_locked(guard, my_id, SchedulingPointKind::Default)?;
        Ok(())
    }

    pub(crate) fn wait_handle_wait_one(self: &Arc<Self>, id: ResourceId) -> Result<(), RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");

        loop {
            let handle =
                guard.registry.wait_handle_mut(id).ok_or_else(|| Self::uncontrolled_wait_handle(id, "wait_one"))?;

            if handle.signaled {
                if matches!(handle.kind, WaitHandleKind::AutoReset) {
                    handle.signaled = false;
                }
                return Ok(());
            }

            handle.waiters.push_back(my_id);
            handle.use_count += 1;
            if let Some(op) = guard.operations.get_mut(&my_id) {
                op.pause_with_resource(id);
            }
            guard = self.advance_locked(guard, my_id, SchedulingPointKind::Pause)?;
            if let Some(handle) = guard.registry.wait_handle_mut(id) {
                handle.use_count -= 1;
                guard.registry.evict_wait_handle_if_unused(id);
            }
            // `AutoReset`'s `set()` may have popped us directly off `waiters` and
            // already cleared the shared flag on our behalf (only one waiter ever gets
            // to consume a given signal); rechecking `signaled` itself would miss that
            // grant and re-queue us forever. `last_signaled_by` records the direct hand-off.
            if guard.operations.get(&my_id).is_some_and(|op| op.last_signaled_by == Some(id)) {
                return Ok(());
            }
        }
    }

    pub(crate) fn wait_handles_wait_all(self: &Arc<Self>, ids: &[ResourceId]) -> Result<(), RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");

        let unsignaled: std::collections::HashSet<ResourceId> = ids
            .iter()
            .copied()
            .filter(|id| !guard.registry.wait_handle(*id).is_some_and(|h| h.signaled))
            .collect();

        if unsignaled.is_empty() {
            return Ok(());
        }

        for id in &unsignaled {
            if let Some(handle) = guard.registry.wait_handle_mut(*id) {
                handle.waiters.push_back(my_id);
            }
        }
        if let Some(op) = guard.operations.get_mut(&my_id) {
            op.pause_with_resources(unsignaled, true);
        }
        self.advance_locked(guard, my_id, SchedulingPointKind::Pause)?;
        Ok(())
    }

    pub(crate) fn wait_handles_wait_any(self: &Arc<Self>, ids: &[ResourceId]) -> Result<ResourceId, RuntimeError> {
        let my_id = self.current_operation_id()?;
        let mut guard = self.inner.lock().expect("scheduler mutex poisoned");

        for id in ids {
            if guard.registry.wait_handle(*id).is_some_and(|h| h.signaled) {
                return Ok(*id);
            }
        }

        let set: std::collections::HashSet<ResourceId> = ids.iter().copied().collect();
        for id in ids {
            if let Some(handle) = guard.registry.wait_handle_mut(*id) {
                handle.waiters.push_back(my_id);
            }
        }
        if let Some(op) = guard.operations.get_mut(&my_id) {
            op.pause_with_resources(set, false);
        }
        guard = self.advance_locked(guard, my_id, SchedulingPointKind::Pause)?;
        let winner = guard
            .operations
            .get(&my_id)
            .and_then(|op| op.last_signaled_by)
            .expect("an operation resumed from PausedOnAnyResource always records its winner");
        Ok(winner)
    }

    // ------------------------------------------------------------------- status ---

    /// Reports whether the given operation has already completed — used by
    /// [`crate::task::Task`] to implement non-blocking `is_completed` checks.
    #[must_use]
    pub fn is_completed(&self, id: OperationId) -> bool {
        self.inner
            .lock()
            .expect("scheduler mutex poisoned")
            .operations
            .get(&id)
            .is_some_and(|op| op.status == OperationStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;
    use crate::strategy::test_support::FirstChoiceStrategy;

    fn scheduler() -> Arc<Scheduler> {
        Scheduler::new(RuntimeConfig::default(), Box::new(FirstChoiceStrategy), 0)
    }

    #[test_case(0, 1; "starts empty, room for one")]
    #[test_case(1, 1; "starts full")]
    #[test_case(0, 4; "starts empty, room for several")]
    #[test_case(4, 4; "starts at max")]
    fn new_semaphore_accepts_initial_within_max(initial: u32, max: u32) {
        let scheduler = scheduler();
        let sem = scheduler.new_semaphore(initial, max).expect("initial <= max must be accepted");
        assert_eq!(sem.count().expect("semaphore still registered"), initial);
    }

    #[test_case(2, 1; "one over")]
    #[test_case(5, 0; "max is zero, initial above it too")]
    fn new_semaphore_rejects_initial_above_max(initial: u32, max: u32) {
        let scheduler = scheduler();
        let err = scheduler.new_semaphore(initial, max).expect_err("initial > max must be rejected");
        assert!(matches!(err, RuntimeError::ArgumentOutOfRange { .. }));
    }

    #[test_case(0, 0; "max of zero alone, even with initial at zero")]
    fn new_semaphore_rejects_zero_max(initial: u32, max: u32) {
        let scheduler = scheduler();
        let err = scheduler.new_semaphore(initial, max).expect_err("max of zero must be rejected");
        assert!(matches!(err, RuntimeError::ArgumentOutOfRange { .. }));
    }

    #[test]
    fn choose_integer_rejects_zero_bound() {
        let scheduler = scheduler();
        let err = scheduler.choose_integer(0).expect_err("bound of zero is out of range");
        assert!(matches!(err, RuntimeError::ArgumentOutOfRange { .. }));
    }
}
