// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: IPC node state machine (one per schedulable context)
//! OWNERS: @kernel-ipc-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below + tests_prop.rs + tests/rendezvous.rs
//! PUBLIC API: IpcNode (state/inbound/pending/hooks), Announced, Receipt, ReplyOutcome
//! DEPENDS_ON: message::{Message, InboundSlot}, queue::RequestQueue, hooks::SchedHooks
//! INVARIANTS: Exactly one state; `awaited` set iff the state awaits a reply; no cross-node
//!             field access (other nodes only go through announce/deliver_reply/abort)
//!
//! The node performs no locking. Operations on different nodes are orchestrated by
//! [`crate::NodeTable`], which must itself run inside one serialization domain.

use log::{debug, error, trace, warn};

use crate::error::{Abort, AbortReason, DiscardReason, IpcError};
use crate::hooks::SchedHooks;
use crate::message::{InboundSlot, Message, MessageKind, ReplyRoute};
use crate::queue::RequestQueue;
use crate::state::{NodeState, StateSet};
use crate::types::{NodeId, RequestTag, TagGen};

/// How an announced message reached its destination.
#[must_use = "announce outcomes must be handled"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Announced {
    /// The destination was waiting and received the message synchronously.
    Delivered,
    /// The destination was busy; the message sits in its request queue.
    Queued,
}

/// Result of `await_request`.
#[must_use = "receipts must be handled"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    /// A queued message was received synchronously; no suspension happened.
    Received { size: usize, kind: MessageKind },
    /// Nothing was queued; the node now waits and `on_suspend` ran.
    Waiting,
}

/// Result of `send_reply`.
#[must_use = "reply outcomes must be handled"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The reply landed in the requester's inbound slot.
    Delivered { size: usize },
    /// The node did not owe a reply; nothing happened.
    NothingOwed,
    /// The reply was dropped; the replier is free again regardless.
    Discarded(DiscardReason),
}

/// One step of draining the request queue during `await_request`.
pub(crate) enum PendingStep {
    Received { size: usize, kind: MessageKind },
    Rejected { msg: Message, capacity: usize },
    Empty,
}

#[cold]
#[track_caller]
fn contract_violation(op: &'static str, state: NodeState) -> ! {
    error!(target: "ipc", "contract violation: {op} invoked in state {state}");
    panic!("ipc contract violation: {op} invoked in state {state}");
}

/// Rendezvous IPC endpoint.
pub struct IpcNode<H> {
    state: NodeState,
    inbound: InboundSlot,
    pending: RequestQueue,
    awaited: Option<RequestTag>,
    tags: TagGen,
    hooks: H,
}

impl<H> IpcNode<H> {
    /// Creates an inactive node. `queue_limit` bounds its request queue (`None` = unbounded).
    pub const fn new(hooks: H, queue_limit: Option<usize>) -> Self {
        Self {
            state: NodeState::Inactive,
            inbound: InboundSlot::new(),
            pending: RequestQueue::with_limit(queue_limit),
            awaited: None,
            tags: TagGen::new(),
            hooks,
        }
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn inbound(&self) -> &InboundSlot {
        &self.inbound
    }

    pub fn pending(&self) -> &RequestQueue {
        &self.pending
    }

    /// Tag of the request whose reply the node waits for.
    pub fn awaited(&self) -> Option<RequestTag> {
        self.awaited
    }

    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    pub(crate) fn into_parts(self) -> (H, RequestQueue) {
        (self.hooks, self.pending)
    }

    /// Route of the requester this node owes a reply to, if it can reply right now.
    pub fn owed_route(&self) -> Option<ReplyRoute> {
        match self.state {
            NodeState::PrepareReply => self.inbound.origin(),
            _ => None,
        }
    }

    /// Panics unless the current state is in `allowed`.
    #[track_caller]
    pub(crate) fn require(&self, allowed: StateSet, op: &'static str) {
        if !self.state.is_in(allowed) {
            contract_violation(op, self.state);
        }
    }

    /// Checks, without side effects, whether `announce` of `size` bytes would succeed.
    pub fn check_announce(&self, size: usize) -> Result<(), IpcError> {
        if self.state == NodeState::AwaitRequest {
            if !self.inbound.fits(size) {
                return Err(IpcError::Oversized { size, capacity: self.inbound.capacity() });
            }
            return Ok(());
        }
        self.pending.ensure_room()
    }

    fn set_state(&mut self, next: NodeState) {
        if self.state != next {
            trace!(target: "ipc", "state {} -> {}", self.state, next);
        }
        self.state = next;
        if !next.awaits_reply() {
            self.awaited = None;
        }
    }
}

impl<H: SchedHooks> IpcNode<H> {
    /// Local half of `send_request_await_reply`: arm for the reply, wait, build the request.
    #[track_caller]
    pub(crate) fn begin_request(
        &mut self,
        me: NodeId,
        payload: &[u8],
        reply_capacity: usize,
    ) -> Message {
        self.require(StateSet::MAY_SEND, "send_request_await_reply");
        let tag = self.tags.next_tag();
        let msg = Message::new(me, tag, MessageKind::Request, payload);
        self.inbound.arm(reply_capacity);
        let next = match self.state {
            NodeState::PrepareReply => NodeState::PrepareAndAwaitReply,
            _ => NodeState::AwaitReply,
        };
        self.set_state(next);
        self.awaited = Some(tag);
        self.hooks.on_suspend();
        msg
    }

    /// Local half of `send_note`: build the note; the state stays as is.
    #[track_caller]
    pub(crate) fn begin_note(&mut self, me: NodeId, payload: &[u8]) -> Message {
        self.require(StateSet::MAY_SEND, "send_note");
        let tag = self.tags.next_tag();
        Message::new(me, tag, MessageKind::Note, payload)
    }

    /// Entry point for other nodes handing us a request or note.
    ///
    /// A waiting node receives the message immediately; otherwise it is queued.
    pub fn announce(&mut self, msg: Message) -> Result<Announced, IpcError> {
        self.check_announce(msg.len())?;
        if self.state == NodeState::AwaitRequest {
            self.receive(msg);
            return Ok(Announced::Delivered);
        }
        debug!(
            target: "ipc",
            "queue {:?} from {} ({} bytes, depth {})",
            msg.kind(),
            msg.origin(),
            msg.len(),
            self.pending.len() + 1
        );
        self.pending.enqueue(msg)?;
        Ok(Announced::Queued)
    }

    fn receive(&mut self, msg: Message) {
        self.inbound.store_message(&msg);
        let next = match msg.kind() {
            MessageKind::Request => NodeState::PrepareReply,
            MessageKind::Note => NodeState::Inactive,
        };
        self.set_state(next);
        self.hooks.on_received(self.inbound.len());
    }

    /// Arms the inbound slot for `await_request`.
    #[track_caller]
    pub(crate) fn begin_await(&mut self, capacity: usize) {
        self.require(StateSet::INACTIVE, "await_request");
        self.inbound.arm(capacity);
    }

    /// Takes the head of the request queue and receives it if it fits.
    pub(crate) fn take_pending(&mut self) -> PendingStep {
        let Some(msg) = self.pending.dequeue() else {
            return PendingStep::Empty;
        };
        if !self.inbound.fits(msg.len()) {
            let capacity = self.inbound.capacity();
            warn!(
                target: "ipc",
                "reject oversized {:?} from {}: {} > {}",
                msg.kind(),
                msg.origin(),
                msg.len(),
                capacity
            );
            return PendingStep::Rejected { msg, capacity };
        }
        let kind = msg.kind();
        self.receive(msg);
        PendingStep::Received { size: self.inbound.len(), kind }
    }

    /// Nothing queued: start waiting for an announcement.
    pub(crate) fn wait_for_request(&mut self) {
        self.set_state(NodeState::AwaitRequest);
        self.hooks.on_suspend();
    }

    /// Entry point for a replier answering our request `tag`.
    pub fn deliver_reply(
        &mut self,
        replier: NodeId,
        tag: RequestTag,
        payload: &[u8],
    ) -> ReplyOutcome {
        if !self.state.awaits_reply() || self.awaited != Some(tag) {
            return ReplyOutcome::Discarded(DiscardReason::NotAwaiting);
        }
        if !self.inbound.fits(payload.len()) {
            let (size, capacity) = (payload.len(), self.inbound.capacity());
            self.set_state(self.state.after_reply());
            self.hooks.on_aborted(Abort {
                peer: replier,
                tag,
                kind: MessageKind::Request,
                reason: AbortReason::ReplyTooLarge { size, capacity },
                wait_cancelled: true,
            });
            return ReplyOutcome::Discarded(DiscardReason::TooLarge { size, capacity });
        }
        self.inbound.store_reply(payload);
        self.set_state(self.state.after_reply());
        self.hooks.on_received(self.inbound.len());
        ReplyOutcome::Delivered { size: payload.len() }
    }

    /// Entry point for a peer refusing a message we sent.
    ///
    /// Cancels our wait only if we are still waiting for the reply to exactly that request.
    pub fn abort(&mut self, peer: NodeId, tag: RequestTag, kind: MessageKind, reason: AbortReason) {
        let wait_cancelled =
            kind.expects_reply() && self.state.awaits_reply() && self.awaited == Some(tag);
        if wait_cancelled {
            self.set_state(self.state.cancelled());
        }
        self.hooks.on_aborted(Abort { peer, tag, kind, reason, wait_cancelled });
    }

    /// Replier side of `send_reply`, after the reply left: back to inactive.
    pub(crate) fn complete_reply(&mut self) {
        if self.state == NodeState::PrepareReply {
            self.set_state(NodeState::Inactive);
        }
    }

    /// Stops waiting for a receipt. Local only; no other node is told.
    pub fn cancel_waiting(&mut self) -> NodeState {
        self.set_state(self.state.cancelled());
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    #[derive(Default)]
    struct Log {
        suspends: usize,
        received: Vec<usize>,
        aborts: Vec<Abort>,
    }

    impl SchedHooks for Log {
        fn on_suspend(&mut self) {
            self.suspends += 1;
        }

        fn on_received(&mut self, size: usize) {
            self.received.push(size);
        }

        fn on_aborted(&mut self, abort: Abort) {
            self.aborts.push(abort);
        }
    }

    const ME: NodeId = NodeId::new(0, 0);
    const PEER: NodeId = NodeId::new(1, 0);

    fn node() -> IpcNode<Log> {
        IpcNode::new(Log::default(), None)
    }

    #[test]
    fn starts_inactive() {
        let n = node();
        assert_eq!(n.state(), NodeState::Inactive);
        assert!(n.pending().is_empty());
        assert_eq!(n.awaited(), None);
    }

    #[test]
    fn request_moves_to_await_reply_and_suspends() {
        let mut n = node();
        let msg = n.begin_request(ME, b"hi", 8);
        assert_eq!(msg.kind(), MessageKind::Request);
        assert_eq!(n.state(), NodeState::AwaitReply);
        assert_eq!(n.awaited(), Some(msg.tag()));
        assert_eq!(n.hooks().suspends, 1);
        assert_eq!(n.inbound().capacity(), 8);
    }

    #[test]
    fn announce_while_busy_queues() {
        let mut n = node();
        let msg = Message::new(PEER, RequestTag::from_raw(0), MessageKind::Request, b"x");
        assert_eq!(n.announce(msg), Ok(Announced::Queued));
        assert_eq!(n.pending().len(), 1);
        assert_eq!(n.state(), NodeState::Inactive);
        assert!(n.hooks().received.is_empty());
    }

    #[test]
    fn announce_while_waiting_delivers() {
        let mut n = node();
        n.begin_await(4);
        n.wait_for_request();
        let msg = Message::new(PEER, RequestTag::from_raw(3), MessageKind::Note, b"abc");
        assert_eq!(n.announce(msg), Ok(Announced::Delivered));
        assert_eq!(n.state(), NodeState::Inactive);
        assert_eq!(n.inbound().payload(), b"abc");
        assert_eq!(n.hooks().received, [3]);
    }

    #[test]
    fn oversized_direct_announce_is_refused() {
        let mut n = node();
        n.begin_await(2);
        n.wait_for_request();
        let msg = Message::new(PEER, RequestTag::from_raw(0), MessageKind::Request, b"abc");
        assert_eq!(n.announce(msg), Err(IpcError::Oversized { size: 3, capacity: 2 }));
        assert_eq!(n.state(), NodeState::AwaitRequest);
        assert!(n.inbound().is_empty());
    }

    #[test]
    fn stale_tag_reply_is_discarded() {
        let mut n = node();
        let msg = n.begin_request(ME, b"q", 8);
        let stale = RequestTag::from_raw(msg.tag().as_raw() + 1);
        assert_eq!(
            n.deliver_reply(PEER, stale, b"r"),
            ReplyOutcome::Discarded(DiscardReason::NotAwaiting)
        );
        assert_eq!(n.state(), NodeState::AwaitReply);
        assert_eq!(n.deliver_reply(PEER, msg.tag(), b"r"), ReplyOutcome::Delivered { size: 1 });
        assert_eq!(n.state(), NodeState::Inactive);
    }

    #[test]
    fn oversized_reply_cancels_wait() {
        let mut n = node();
        let msg = n.begin_request(ME, b"q", 2);
        assert_eq!(
            n.deliver_reply(PEER, msg.tag(), b"long"),
            ReplyOutcome::Discarded(DiscardReason::TooLarge { size: 4, capacity: 2 })
        );
        assert_eq!(n.state(), NodeState::Inactive);
        assert!(n.inbound().is_empty());
        let abort = n.hooks().aborts[0];
        assert!(abort.wait_cancelled);
        assert_eq!(abort.reason, AbortReason::ReplyTooLarge { size: 4, capacity: 2 });
    }

    #[test]
    fn abort_for_other_tag_keeps_waiting() {
        let mut n = node();
        let msg = n.begin_request(ME, b"q", 2);
        let other = RequestTag::from_raw(msg.tag().as_raw().wrapping_add(9));
        n.abort(PEER, other, MessageKind::Request, AbortReason::PeerRemoved);
        assert_eq!(n.state(), NodeState::AwaitReply);
        assert!(!n.hooks().aborts[0].wait_cancelled);
    }

    #[test]
    #[should_panic(expected = "ipc contract violation")]
    fn await_request_requires_inactive() {
        let mut n = node();
        let _ = n.begin_request(ME, b"q", 2);
        n.begin_await(4);
    }

    #[test]
    #[should_panic(expected = "ipc contract violation")]
    fn note_from_waiting_state_panics() {
        let mut n = node();
        n.begin_await(4);
        n.wait_for_request();
        let _ = n.begin_note(ME, b"n");
    }

    #[test]
    #[should_panic(expected = "ipc contract violation")]
    fn second_request_while_awaiting_reply_panics() {
        let mut n = node();
        let _ = n.begin_request(ME, b"one", 4);
        let _ = n.begin_request(ME, b"two", 4);
    }
}
