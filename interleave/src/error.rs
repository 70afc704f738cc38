// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Error taxonomy for the runtime. See [`RuntimeError`].

/// Every failure mode the runtime can produce.
///
/// Variants split into two propagation classes (see [`RuntimeError::is_structural`]):
///
/// - *Structural* errors (`DeadlockDetected`, `AssertionFailure`,
///   `UncontrolledInvocation`) indicate the harness itself found a bug in the
///   exploration, not in the program under test's own logic. They are routed through
///   [`AssertionSink`] and terminate the current iteration.
/// - *Primitive* errors (`SynchronizationLockError`, `SemaphoreFull`,
///   `ArgumentOutOfRange`) are what the un-intercepted primitive itself would have
///   returned, and propagate as an ordinary `Result` to the caller.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum RuntimeError {
    /// A monitor `wait`/`pulse`/`exit` was attempted by an operation that does not
    /// own the lock.
    #[error("operation {operation_id} attempted {action} on monitor it does not own")]
    #[diagnostic(
        code(interleave::sync_lock),
        help("enter() the monitor before wait()/pulse()/exit()ing it")
    )]
    SynchronizationLockError { operation_id: u64, action: &'static str },

    /// A `release(n)` would push `count` above `max`.
    #[error("semaphore release({count}) would exceed max permits ({max})")]
    #[diagnostic(
        code(interleave::semaphore_full),
        help("the program under test released more permits than it ever acquired")
    )]
    SemaphoreFull { count: u32, max: u32 },

    /// A timeout, sync-object identity, or semaphore bound was out of its valid range.
    #[error("argument out of range: {message}")]
    #[diagnostic(code(interleave::argument_out_of_range))]
    ArgumentOutOfRange { message: String },

    /// An internal invariant was violated (cross-iteration resource reuse, exit
    /// without acquire, registry corruption).
    #[error("assertion failure: {message}")]
    #[diagnostic(
        code(interleave::assertion_failure),
        help("this is a bug in the runtime itself, or in how a resource crossed an iteration boundary")
    )]
    AssertionFailure { message: String },

    /// An intercepted call found no controlled operation for the calling thread.
    #[error("uncontrolled synchronization: {message}")]
    #[diagnostic(
        code(interleave::uncontrolled_synchronization),
        help("the call happened off a controlled operation; it fell back to the uncontrolled primitive")
    )]
    UncontrolledSynchronization { message: String },

    /// No enabled operation remains and no delay is pending.
    #[error("deadlock detected among operations {operation_ids:?} blocked on resources {resource_ids:?}")]
    #[diagnostic(
        code(interleave::deadlock_detected),
        help("each named operation is paused waiting on a resource that no enabled operation can signal")
    )]
    DeadlockDetected {
        operation_ids: Vec<u64>,
        resource_ids: Vec<String>,
    },

    /// A primitive was reached that this runtime does not support controlling.
    #[error("uncontrolled invocation: {message}")]
    #[diagnostic(code(interleave::uncontrolled_invocation))]
    UncontrolledInvocation { message: String },
}

impl RuntimeError {
    /// Structural errors indicate a bug found by the exploration itself (or in the
    /// runtime's own bookkeeping) rather than a value-level error the intercepted
    /// primitive would normally return. See the type-level docs for the split.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RuntimeError::DeadlockDetected { .. }
                | RuntimeError::AssertionFailure { .. }
                | RuntimeError::UncontrolledInvocation { .. }
        )
    }
}

/// The Rust realization of the "assertion-failure channel" named in §6/§7 of the
/// design: a sink that structural [`RuntimeError`]s are routed through before the
/// current iteration terminates.
///
/// The default sink logs via `tracing::error!` and panics, which is how an iteration
/// actually terminates inside a Rust test process (the [`crate::harness::explore`]
/// loop catches the panic with [`std::panic::catch_unwind`] and treats it as a failed
/// iteration).
pub trait AssertionSink: Send + Sync {
    fn on_assertion_failure(&self, error: &RuntimeError);
}

/// Logs the error and panics. Used unless a caller installs a different sink via
/// [`crate::config::RuntimeConfig::with_assertion_sink`].
#[derive(Debug, Default)]
pub struct PanickingAssertionSink;

impl AssertionSink for PanickingAssertionSink {
    fn on_assertion_failure(&self, error: &RuntimeError) {
        tracing::error!(error = %error, "structural runtime error");
        panic!("{error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_are_flagged() {
        let deadlock = RuntimeError::DeadlockDetected {
            operation_ids: vec![1, 2],
            resource_ids: vec!["m1".into(), "m2".into()],
        };
        assert!(deadlock.is_structural());

        let full = RuntimeError::SemaphoreFull { count: 2, max: 1 };
        assert!(!full.is_structural());
    }

    #[test]
    fn lock_error_message_names_operation_and_action() {
        let err = RuntimeError::SynchronizationLockError {
            operation_id: 7,
            action: "pulse",
        };
        let message = err.to_string();
        assert!(message.contains('7'));
        assert!(message.contains("pulse"));
    }
}
