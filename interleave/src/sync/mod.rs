// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Controlled synchronization primitives: the public, intercepted counterparts of
//! `std::sync` types named in §3/§4.4-§4.6.

pub mod monitor;
pub mod semaphore;
pub mod wait_handle;

pub use monitor::Monitor;
pub use semaphore::Semaphore;
pub use wait_handle::{wait_all, wait_any, WaitHandle, WaitHandleKind};
