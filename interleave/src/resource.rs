// Copyright (c) 2025 R3BL LLC. Licensed under Apache License, Version 2.0.

//! Opaque ids for resources and runtime iterations. See [`ResourceId`] and
//! [`RuntimeId`].

use std::fmt;

use uuid::Uuid;

/// An opaque, process-unique handle to a resource state machine (monitor, semaphore,
/// or wait handle). Each resource owns exactly one (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(Uuid);

impl ResourceId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[cfg(test)]
    pub(crate) fn for_test(n: u64) -> Self {
        Self(Uuid::from_u128(u128::from(n)))
    }
}

impl Default for ResourceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rsrc#{}", &self.0.simple().to_string()[..8])
    }
}

/// Identifies one test iteration. Every resource records the [`RuntimeId`] that
/// created it (§3, §9 "Global mutable state"). Unlike the reference design's
/// process-wide registry keyed by object identity, each [`crate::scheduler::Scheduler`]
/// owns an entirely separate [`crate::registry::ResourceRegistry`] and every resource
/// handle (e.g. [`crate::sync::monitor::Monitor`]) holds a strong reference to the
/// specific scheduler that created it — so a handle from a finished iteration has no
/// path back into a later iteration's registry to begin with. `runtime_id` is kept on
/// each resource regardless, for inclusion in diagnostic output when debugging which
/// iteration a leaked resource reference belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeId(Uuid);

impl RuntimeId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RuntimeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "runtime#{}", &self.0.simple().to_string()[..8])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_ids_are_unique() {
        assert_ne!(ResourceId::new(), ResourceId::new());
    }

    #[test]
    fn runtime_ids_are_unique() {
        assert_ne!(RuntimeId::new(), RuntimeId::new());
    }
}
