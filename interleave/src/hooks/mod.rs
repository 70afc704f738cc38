// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Scheduling-point hooks for primitives that don't have their own resource state
//! machine: atomics, volatiles, spin-waits, and controlled OS threads (§4.7, §4.8).

pub mod atomic;
pub mod spin;
pub mod thread;
pub mod volatile;

pub use atomic::{
    ControlledAtomicBool, ControlledAtomicI32, ControlledAtomicI64, ControlledAtomicU32, ControlledAtomicU64,
    ControlledAtomicUsize,
};
pub use spin::{spin_until, spin_until_bounded, SpinWait};
pub use thread::{Thread, ThreadHandle};
pub use volatile::Volatile;
