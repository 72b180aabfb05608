// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Handle newtypes for IPC nodes and request correlation
//! OWNERS: @kernel-ipc-team
//! PUBLIC API: NodeId, RequestTag
//! INVARIANTS: NodeId embeds an arena generation; stale handles never alias a reused slot
//!
//! Newtypes keep node handles, arena indices and request tags from being mixed up at call
//! sites; they are `Copy` and cost nothing at runtime.

use core::fmt;

/// Handle to an IPC node owned by a [`crate::NodeTable`].
///
/// **Invariant**: the generation changes every time the arena slot is reused, so a handle to a
/// removed node resolves to `IpcError::NoSuchNode` instead of a newer node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

static_assertions::assert_eq_size!(NodeId, u64);

impl NodeId {
    #[inline]
    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Arena slot of the node.
    #[inline]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Generation of the arena slot when the handle was issued.
    #[inline]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    #[inline]
    pub(crate) const fn as_index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}.{}", self.index, self.generation)
    }
}

/// Per-sender correlation tag stamped on every outgoing message.
///
/// A reply is only accepted when it carries the tag of the request its recipient is still
/// waiting on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RequestTag(u64);

impl RequestTag {
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn as_raw(self) -> u64 {
        self.0
    }
}

/// Monotonic tag generator (deterministic, wraps).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) struct TagGen {
    next: u64,
}

impl TagGen {
    pub(crate) const fn new() -> Self {
        Self { next: 0 }
    }

    pub(crate) fn next_tag(&mut self) -> RequestTag {
        let out = RequestTag(self.next);
        self.next = self.next.wrapping_add(1);
        out
    }
}
