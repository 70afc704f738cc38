// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Tracing setup for the runtime, mirroring the teacher crate's thread-local vs
//! global subscriber split: global for apps embedding the runtime, thread-local for
//! tests so each test gets its own subscriber.

use tracing::dispatcher;
use tracing_core::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Minimal logging configuration for the runtime. Every scheduling point, resource
/// transition, and error flows through `tracing`; this just picks the verbosity.
#[derive(Debug, Clone, Copy)]
pub struct LogConfig {
    pub level_filter: LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level_filter: LevelFilter::WARN }
    }
}

impl LogConfig {
    #[must_use]
    pub fn with_level(mut self, level_filter: LevelFilter) -> Self {
        self.level_filter = level_filter;
        self
    }

    /// Installs a thread-local subscriber. Intended for tests: each test thread gets
    /// its own subscriber, so concurrent test runs don't race on a shared global one.
    ///
    /// Drop the returned guard to restore the previous dispatcher for this thread.
    #[must_use]
    pub fn install_thread_local(self) -> dispatcher::DefaultGuard {
        let subscriber = tracing_subscriber::registry()
            .with(self.level_filter)
            .with(fmt::layer().with_test_writer());
        subscriber.set_default()
    }

    /// Installs the process-wide global subscriber. Can only be called once; later
    /// calls are no-ops (mirrors `tracing`'s own "first writer wins" semantics).
    pub fn install_global(self) {
        let subscriber = tracing_subscriber::registry()
            .with(self.level_filter)
            .with(fmt::layer());
        let _ = subscriber.try_init();
    }
}
