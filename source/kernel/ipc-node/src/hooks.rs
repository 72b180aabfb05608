// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Scheduler integration points invoked by the IPC state machine
//! OWNERS: @kernel-ipc-team @kernel-sched-team
//! PUBLIC API: SchedHooks
//!
//! Hooks run synchronously inside the operation that triggers them, inside the caller's
//! serialization domain. `on_received` may run for a node before the operation that suspended
//! its peer has returned, so an implementation must not assume the peer is already parked.

use crate::error::Abort;

/// Implemented by the execution context that embeds an IPC node.
pub trait SchedHooks {
    /// The node is about to wait for a receipt; park the owning context.
    fn on_suspend(&mut self);

    /// A message of `size` bytes landed in the node's inbound slot; resume the context.
    fn on_received(&mut self, size: usize);

    /// A message this node sent was refused after leaving it, or its awaited reply was lost.
    ///
    /// If `abort.wait_cancelled` is set the node is no longer waiting and must be resumed.
    fn on_aborted(&mut self, abort: Abort);
}

/// Hook sink for nodes whose context does not need notifications.
impl SchedHooks for () {
    fn on_suspend(&mut self) {}

    fn on_received(&mut self, _size: usize) {}

    fn on_aborted(&mut self, _abort: Abort) {}
}
