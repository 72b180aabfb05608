// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Message descriptors and the per-node inbound slot
//! OWNERS: @kernel-ipc-team
//! PUBLIC API: MessageKind, Message, ReplyRoute, InboundSlot
//! INVARIANTS: Capacity and received length are separate fields; an oversized copy never lands

use alloc::vec::Vec;

use crate::types::{NodeId, RequestTag};

/// Whether a message obligates its receiver to reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// The receiver enters `PrepareReply` and owes the origin a reply.
    Request,
    /// Fire-and-forget; the receiver stays free.
    Note,
}

impl MessageKind {
    #[inline]
    pub const fn expects_reply(self) -> bool {
        matches!(self, Self::Request)
    }
}

/// A request or note on its way to a destination node.
///
/// The payload is copied out of the sender's buffer when the message is built, so the sender's
/// memory is free again as soon as the send call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    origin: NodeId,
    tag: RequestTag,
    kind: MessageKind,
    payload: Vec<u8>,
}

impl Message {
    pub(crate) fn new(origin: NodeId, tag: RequestTag, kind: MessageKind, payload: &[u8]) -> Self {
        Self { origin, tag, kind, payload: payload.to_vec() }
    }

    pub fn origin(&self) -> NodeId {
        self.origin
    }

    pub fn tag(&self) -> RequestTag {
        self.tag
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub(crate) fn route(&self) -> ReplyRoute {
        ReplyRoute { origin: self.origin, tag: self.tag }
    }
}

/// Where the reply to a received request must go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyRoute {
    pub origin: NodeId,
    pub tag: RequestTag,
}

/// Receive buffer of a node.
///
/// Armed with a capacity before each wait; holds the bytes and the reply route of the last
/// received request or note. Replies overwrite the bytes but keep the route, so a node in
/// `PrepareAndAwaitReply` still knows whom it owes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundSlot {
    capacity: usize,
    data: Vec<u8>,
    origin: Option<ReplyRoute>,
}

impl InboundSlot {
    pub const fn new() -> Self {
        Self { capacity: 0, data: Vec::new(), origin: None }
    }

    /// Maximum payload size the slot currently accepts.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Size of the last received payload.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Route of the last received request or note.
    pub fn origin(&self) -> Option<ReplyRoute> {
        self.origin
    }

    /// Moves the received payload out, leaving the slot empty.
    pub fn take_payload(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.data)
    }

    /// Sets the capacity for the next receipt and drops stale bytes; the route stays.
    pub(crate) fn arm(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.data.clear();
    }

    pub(crate) fn fits(&self, size: usize) -> bool {
        size <= self.capacity
    }

    /// Copies a request/note in and records its route. Caller checked `fits`.
    pub(crate) fn store_message(&mut self, msg: &Message) {
        debug_assert!(self.fits(msg.len()));
        self.copy_in(msg.payload());
        self.origin = Some(msg.route());
    }

    /// Copies a reply in without touching the recorded route. Caller checked `fits`.
    pub(crate) fn store_reply(&mut self, payload: &[u8]) {
        debug_assert!(self.fits(payload.len()));
        self.copy_in(payload);
    }

    fn copy_in(&mut self, payload: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(payload);
    }
}
