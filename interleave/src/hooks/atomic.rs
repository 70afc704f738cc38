// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Controlled atomics: thin wrappers over `std::sync::atomic` that insert a `Default`
//! scheduling point around every access, so the scheduler can interleave a context
//! switch between what would otherwise be invisible lock-free steps (§4.8).

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::error::RuntimeError;
use crate::scheduler::{Scheduler, SchedulingPointKind};

macro_rules! controlled_atomic {
    ($name:ident, $std_atomic:ty, $value:ty) => {
        #[doc = concat!(
            "Controlled counterpart of [`std::sync::atomic::", stringify!($std_atomic), "`]: ",
            "every method offers a scheduling point before touching the underlying value."
        )]
        pub struct $name {
            scheduler: Arc<Scheduler>,
            inner: $std_atomic,
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name)).field("inner", &self.inner).finish_non_exhaustive()
            }
        }

        impl $name {
            #[must_use]
            pub fn new(scheduler: Arc<Scheduler>, value: $value) -> Self {
                Self { scheduler, inner: <$std_atomic>::new(value) }
            }

            /// Offers a scheduling point only when
            /// [`crate::config::RuntimeConfig::atomic_operation_race_checking_enabled`]
            /// is set, per §4.7.
            fn maybe_yield(&self) -> Result<(), RuntimeError> {
                if self.scheduler.config().atomic_operation_race_checking_enabled {
                    self.scheduler.yield_point(SchedulingPointKind::Default)?;
                }
                Ok(())
            }

            /// # Errors
            /// Propagates [`RuntimeError::DeadlockDetected`] from the scheduling point.
            pub fn load(&self, order: Ordering) -> Result<$value, RuntimeError> {
                self.maybe_yield()?;
                Ok(self.inner.load(order))
            }

            /// # Errors
            /// Propagates [`RuntimeError::DeadlockDetected`] from the scheduling point.
            pub fn store(&self, value: $value, order: Ordering) -> Result<(), RuntimeError> {
                self.maybe_yield()?;
                self.inner.store(value, order);
                Ok(())
            }

            /// # Errors
            /// Propagates [`RuntimeError::DeadlockDetected`] from the scheduling point.
            pub fn swap(&self, value: $value, order: Ordering) -> Result<$value, RuntimeError> {
                self.maybe_yield()?;
                Ok(self.inner.swap(value, order))
            }

            /// # Errors
            /// Propagates [`RuntimeError::DeadlockDetected`] from the scheduling point.
            pub fn fetch_add(&self, value: $value, order: Ordering) -> Result<$value, RuntimeError> {
                self.maybe_yield()?;
                Ok(self.inner.fetch_add(value, order))
            }

            /// # Errors
            /// Propagates [`RuntimeError::DeadlockDetected`] from the scheduling point.
            pub fn fetch_sub(&self, value: $value, order: Ordering) -> Result<$value, RuntimeError> {
                self.maybe_yield()?;
                Ok(self.inner.fetch_sub(value, order))
            }

            /// # Errors
            /// Propagates [`RuntimeError::DeadlockDetected`] from the scheduling point.
            pub fn compare_exchange(
                &self,
                current: $value,
                new: $value,
                success: Ordering,
                failure: Ordering,
            ) -> Result<Result<$value, $value>, RuntimeError> {
                self.maybe_yield()?;
                Ok(self.inner.compare_exchange(current, new, success, failure))
            }
        }
    };
}

controlled_atomic!(ControlledAtomicUsize, std::sync::atomic::AtomicUsize, usize);
controlled_atomic!(ControlledAtomicU32, std::sync::atomic::AtomicU32, u32);
controlled_atomic!(ControlledAtomicU64, std::sync::atomic::AtomicU64, u64);
controlled_atomic!(ControlledAtomicI32, std::sync::atomic::AtomicI32, i32);
controlled_atomic!(ControlledAtomicI64, std::sync::atomic::AtomicI64, i64);
controlled_atomic!(ControlledAtomicBool, std::sync::atomic::AtomicBool, bool);
