// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Cross-component scenarios straight out of the worked examples: a monitor
//! producer/consumer, a semaphore at its bounds, `WaitAny`, an `AutoReset` event, a
//! reentrant lock, a two-monitor deadlock, a closed wait handle, and a flattened
//! task-of-a-task. Each one drives the public API the way a program under test
//! would, through a real [`Scheduler`] with real spawned operations.

use std::sync::{Arc, Mutex};

use interleave::error::AssertionSink;
use interleave::hooks::Thread;
use interleave::strategy::{RandomStrategy, Strategy};
use interleave::sync::{wait_any, WaitHandleKind};
use interleave::task::Task;
use interleave::{OperationId, RuntimeConfig, RuntimeError, Scheduler, SchedulingPointKind};
use pretty_assertions::assert_eq;

fn scheduler(seed: u64) -> Arc<Scheduler> {
    Scheduler::new(RuntimeConfig::default(), Box::new(RandomStrategy::new(seed)), 0)
}

#[test]
fn producer_consumer_monitor_wait_then_pulse_hands_back_the_lock() -> Result<(), RuntimeError> {
    let scheduler = scheduler(1);
    let monitor = scheduler.new_monitor();

    let pulser = {
        let monitor = monitor.clone();
        Thread::spawn(&scheduler, "pulser-b", move || -> Result<(), RuntimeError> {
            monitor.enter()?;
            monitor.pulse()?;
            monitor.exit()
        })?
    };

    // Plays the role of "A": enter, wait (releases the lock and blocks until pulsed),
    // exit. `pulser-b` cannot observe an empty wait queue racily here: it can only
    // acquire the monitor once this operation's `wait()` has actually released it,
    // by which point this operation is already queued.
    monitor.enter()?;
    monitor.wait()?;
    monitor.exit()?;

    pulser.join()??;

    // A spawned checker, not this operation, is the only way to tell whether the
    // monitor is genuinely free (this operation is always its own reentrant owner as
    // far as `try_enter` is concerned).
    let checker_monitor = monitor.clone();
    let is_free = Thread::spawn(&scheduler, "checker", move || checker_monitor.try_enter())?.join()??;
    assert!(is_free, "monitor must be fully released after one wait()+pulse()+exit() round trip");

    Ok(())
}

#[test]
fn reentrant_enter_tracks_depth_before_releasing_ownership() -> Result<(), RuntimeError> {
    let scheduler = scheduler(2);
    let monitor = scheduler.new_monitor();

    monitor.enter()?;
    monitor.enter()?;
    monitor.enter()?; // depth == 3
    monitor.exit()?;
    monitor.exit()?; // depth == 1, still owned by this operation

    let probe = monitor.clone();
    let acquired_mid = Thread::spawn(&scheduler, "checker-mid", move || probe.try_enter())?.join()??;
    assert!(!acquired_mid, "monitor must remain owned after only two of three exits");

    monitor.exit()?; // depth == 0, released

    let probe = monitor.clone();
    let acquired_after = Thread::spawn(&scheduler, "checker-after", move || -> Result<bool, RuntimeError> {
        let acquired = probe.try_enter()?;
        if acquired {
            probe.exit()?;
        }
        Ok(acquired)
    })?
    .join()??;
    assert!(acquired_after, "monitor must be acquirable once the reentrant depth fully unwinds");

    Ok(())
}

#[test]
fn is_entered_reports_ownership_from_the_calling_operation_s_perspective() -> Result<(), RuntimeError> {
    let scheduler = scheduler(7);
    let monitor = scheduler.new_monitor();

    monitor.enter()?;
    assert!(monitor.is_entered()?, "the owner must see itself as entered");

    let probe = monitor.clone();
    let seen_by_other = Thread::spawn(&scheduler, "checker", move || probe.is_entered())?.join()??;
    assert!(!seen_by_other, "a non-owner must not see itself as entered");

    monitor.exit()?;
    Ok(())
}

#[test]
fn semaphore_enforces_its_bound_and_wakes_a_waiter_on_release() -> Result<(), RuntimeError> {
    let scheduler = scheduler(3);
    let sem = scheduler.new_semaphore(0, 1)?;

    let waiter = {
        let sem = sem.clone();
        Thread::spawn(&scheduler, "waiter", move || -> Result<u32, RuntimeError> {
            sem.wait()?;
            sem.count()
        })?
    };

    sem.release(1)?;
    let count_seen_by_waiter = waiter.join()??;
    assert_eq!(count_seen_by_waiter, 0, "the permit released is the one the waiter consumed");

    sem.release(1)?;
    assert_eq!(sem.count()?, 1);

    let overflow = sem.release(1).expect_err("releasing past max must be rejected");
    assert!(matches!(overflow, RuntimeError::SemaphoreFull { count: 2, max: 1 }));

    Ok(())
}

#[test]
fn wait_any_resolves_to_whichever_handle_is_signaled() -> Result<(), RuntimeError> {
    let scheduler = scheduler(4);
    let e1 = scheduler.new_wait_handle(WaitHandleKind::ManualReset, false);
    let e2 = scheduler.new_wait_handle(WaitHandleKind::ManualReset, false);

    let waiter = {
        let handles = [e1.clone(), e2.clone()];
        Thread::spawn(&scheduler, "waiter", move || wait_any(&handles))?
    };

    e2.set()?;
    let winner_index = waiter.join()??;
    assert_eq!(winner_index, 1, "wait_any must report the index of e2, not e1");

    Ok(())
}

#[test]
fn deadlock_is_detected_when_two_monitors_are_acquired_in_opposite_order() {
    let sink = Arc::new(RecordingSink::default());
    let config = RuntimeConfig::default().with_assertion_sink(Arc::clone(&sink) as Arc<dyn AssertionSink>);
    let scheduler = Scheduler::new(config, Box::new(RandomStrategy::new(5)), 0);

    let m1 = scheduler.new_monitor();
    let m2 = scheduler.new_monitor();
    let ready1 = scheduler.new_wait_handle(WaitHandleKind::ManualReset, false);
    let ready2 = scheduler.new_wait_handle(WaitHandleKind::ManualReset, false);

    // Neither thread is joined here: whichever one the scheduler picks to detect the
    // circular wait returns `DeadlockDetected` and completes normally, but the other
    // stays parked forever by construction — that's the point of the scenario.
    {
        let (m1, m2, ready1, ready2) = (m1.clone(), m2.clone(), ready1.clone(), ready2.clone());
        Thread::spawn(&scheduler, "thread-a", move || -> Result<(), RuntimeError> {
            m1.enter()?;
            ready1.set()?;
            ready2.wait_one()?;
            m2.enter()?;
            m2.exit()?;
            m1.exit()
        })
        .expect("spawn thread-a");
    }
    {
        let (m1, m2, ready1, ready2) = (m1.clone(), m2.clone(), ready1.clone(), ready2.clone());
        Thread::spawn(&scheduler, "thread-b", move || -> Result<(), RuntimeError> {
            m2.enter()?;
            ready2.set()?;
            ready1.wait_one()?;
            m1.enter()?;
            m1.exit()?;
            m2.exit()
        })
        .expect("spawn thread-b");
    }

    let deadlock = sink.wait_for_capture().expect("scheduler should have detected the circular wait");
    assert_eq!(deadlock.operation_ids.len(), 2);
    assert_eq!(deadlock.resource_ids.len(), 2);
}

#[test]
fn autoreset_event_wakes_exactly_one_waiter_per_set_in_arrival_order() -> Result<(), RuntimeError> {
    let scheduler = Scheduler::new(RuntimeConfig::default(), Box::new(FairRoundRobin::new()), 0);
    let event = scheduler.new_wait_handle(WaitHandleKind::AutoReset, false);
    let order: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    let spawn_waiter = |label: &'static str, tag: u32| {
        let event = event.clone();
        let order = Arc::clone(&order);
        Thread::spawn(&scheduler, label, move || -> Result<(), RuntimeError> {
            event.wait_one()?;
            order.lock().expect("order mutex poisoned").push(tag);
            Ok(())
        })
    };

    let waiter1 = spawn_waiter("waiter-1", 1)?;
    let waiter2 = spawn_waiter("waiter-2", 2)?;

    // Fair round-robin rotates through every enabled operation each cycle, so a
    // handful of voluntary yields is enough to guarantee both waiters have reached
    // their blocking `wait_one()` and registered before the first `set()`.
    settle(&scheduler, 8)?;
    event.set()?;
    settle(&scheduler, 8)?;
    event.set()?;

    waiter1.join()??;
    waiter2.join()??;

    assert_eq!(*order.lock().expect("order mutex poisoned"), vec![1, 2]);
    Ok(())
}

#[test]
fn closed_wait_handle_surfaces_as_uncontrolled_synchronization() -> Result<(), RuntimeError> {
    let scheduler = scheduler(6);
    let event = scheduler.new_wait_handle(WaitHandleKind::ManualReset, false);

    event.close()?;

    let err = event.set().expect_err("set() on a closed handle must not silently succeed");
    assert!(matches!(err, RuntimeError::UncontrolledSynchronization { .. }));

    let err = event.wait_one().expect_err("wait_one() on a closed handle must not silently succeed");
    assert!(matches!(err, RuntimeError::UncontrolledSynchronization { .. }));

    Ok(())
}

#[test]
fn unwrap_flattens_a_task_of_a_task_into_the_inner_result() -> Result<(), RuntimeError> {
    let scheduler = scheduler(8);

    let outer = Task::run(&scheduler, {
        let scheduler = Arc::clone(&scheduler);
        move || Task::run(&scheduler, || 42).expect("inner task spawns cleanly")
    })?;
    let flattened = Task::unwrap(&scheduler, outer)?;

    assert_eq!(flattened.result()?, 42);
    Ok(())
}

fn settle(scheduler: &Scheduler, rounds: u32) -> Result<(), RuntimeError> {
    for _ in 0..rounds {
        scheduler.yield_point(SchedulingPointKind::Yield)?;
    }
    Ok(())
}

/// Records the last structural error handed to it, for tests that want to assert on
/// the error value rather than catch the default sink's panic (per
/// [`RuntimeConfig::with_assertion_sink`]'s own doc comment).
#[derive(Default)]
struct RecordingSink {
    captured: Mutex<Option<CapturedDeadlock>>,
}

struct CapturedDeadlock {
    operation_ids: Vec<u64>,
    resource_ids: Vec<String>,
}

impl RecordingSink {
    /// Busy-polls (plain OS sleep, outside the controlled scheduler) for up to one
    /// second for a captured deadlock. Safe to call from the test's own uncontrolled
    /// thread: the operations that detect the deadlock run on genuinely independent
    /// OS threads regardless of which one the scheduler currently considers "current".
    fn wait_for_capture(&self) -> Option<CapturedDeadlock> {
        for _ in 0..200 {
            if let Some(found) = self.captured.lock().expect("sink mutex poisoned").take() {
                return Some(found);
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        None
    }
}

impl AssertionSink for RecordingSink {
    fn on_assertion_failure(&self, error: &RuntimeError) {
        if let RuntimeError::DeadlockDetected { operation_ids, resource_ids } = error {
            *self.captured.lock().expect("sink mutex poisoned") =
                Some(CapturedDeadlock { operation_ids: operation_ids.clone(), resource_ids: resource_ids.clone() });
        }
    }
}

/// A strictly fair rotation over the enabled set, unlike the shipped
/// [`interleave::strategy::RoundRobinStrategy`] (which always favors the
/// lowest-numbered operation and can starve everyone else). Only used here, to make
/// the `AutoReset` scenario's interleaving easy to reason about without relying on
/// timing.
struct FairRoundRobin {
    last: Option<OperationId>,
}

impl FairRoundRobin {
    fn new() -> Self {
        Self { last: None }
    }
}

impl Strategy for FairRoundRobin {
    fn name(&self) -> &'static str {
        "fair-round-robin-for-test"
    }

    fn seed(&self) -> u64 {
        0
    }

    fn next_operation(&mut self, enabled: &[OperationId], _current: OperationId) -> OperationId {
        let mut sorted: Vec<OperationId> = enabled.to_vec();
        sorted.sort();
        let next = match self.last {
            Some(last) => sorted.iter().copied().find(|id| *id > last).unwrap_or(sorted[0]),
            None => sorted[0],
        };
        self.last = Some(next);
        next
    }

    fn next_integer(&mut self, _bound: u32) -> u32 {
        0
    }

    fn next_boolean(&mut self) -> bool {
        false
    }
}
