// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Node arena and the five rendezvous IPC operations
//! OWNERS: @kernel-ipc-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests below + tests/rendezvous.rs
//! PUBLIC API: NodeTable (create/remove/node/state, send_request_await_reply, await_request,
//!             send_reply, send_note, cancel_waiting)
//! DEPENDS_ON: node::IpcNode, config::IpcConfig, trace::TraceRing (feature `trace-ring`)
//! INVARIANTS: Nodes only reach each other through NodeId handles; errors are returned before
//!             any state change or hook; `NodeTable` is !Sync (serialize via `Domain`)

use alloc::vec::Vec;
use core::cell::Cell;
use core::marker::PhantomData;

use log::{debug, warn};

use crate::config::IpcConfig;
use crate::error::{AbortReason, DiscardReason, IpcError, Result};
use crate::hooks::SchedHooks;
use crate::message::Message;
use crate::node::{Announced, IpcNode, PendingStep, Receipt, ReplyOutcome};
use crate::state::{NodeState, StateSet};
#[cfg(feature = "trace-ring")]
use crate::trace::TraceRing;
use crate::trace::TraceKind;
use crate::types::NodeId;

struct Entry<H> {
    generation: u32,
    node: Option<IpcNode<H>>,
}

/// Owner of all IPC nodes of one serialization domain.
pub struct NodeTable<H> {
    entries: Vec<Entry<H>>,
    free: Vec<u32>,
    live: usize,
    config: IpcConfig,
    #[cfg(feature = "trace-ring")]
    trace: TraceRing,
    // Operations mutate several nodes at once; sharing across CPUs needs a Domain.
    _not_sync: PhantomData<Cell<()>>,
}
static_assertions::assert_not_impl_any!(NodeTable<()>: Sync);
static_assertions::assert_impl_all!(NodeTable<()>: Send);

impl<H> NodeTable<H> {
    /// Creates an empty table.
    pub const fn new(config: IpcConfig) -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            live: 0,
            config,
            #[cfg(feature = "trace-ring")]
            trace: TraceRing::new(),
            _not_sync: PhantomData,
        }
    }

    pub fn config(&self) -> &IpcConfig {
        &self.config
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    pub fn node(&self, id: NodeId) -> Result<&IpcNode<H>> {
        self.entries
            .get(id.as_index())
            .filter(|entry| entry.generation == id.generation())
            .and_then(|entry| entry.node.as_ref())
            .ok_or(IpcError::NoSuchNode(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut IpcNode<H>> {
        self.entries
            .get_mut(id.as_index())
            .filter(|entry| entry.generation == id.generation())
            .and_then(|entry| entry.node.as_mut())
            .ok_or(IpcError::NoSuchNode(id))
    }

    pub fn state(&self, id: NodeId) -> Result<NodeState> {
        self.node(id).map(IpcNode::state)
    }

    #[cfg(feature = "trace-ring")]
    pub fn trace(&self) -> &TraceRing {
        &self.trace
    }

    #[inline]
    fn record(&mut self, kind: TraceKind, node: NodeId, peer: Option<NodeId>, len: usize) {
        #[cfg(feature = "trace-ring")]
        self.trace.record(kind, node, peer, len);
        #[cfg(not(feature = "trace-ring"))]
        let _ = (kind, node, peer, len);
    }
}

impl<H: SchedHooks> NodeTable<H> {
    /// Adds an inactive node driven by `hooks`.
    pub fn create(&mut self, hooks: H) -> Result<NodeId> {
        let capacity = self.config.max_nodes;
        if self.live >= capacity {
            return Err(IpcError::TableFull { capacity });
        }
        let node = IpcNode::new(hooks, self.config.queue_limit);
        let id = match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.node = Some(node);
                NodeId::new(index, entry.generation)
            }
            None => {
                let index =
                    u32::try_from(self.entries.len()).map_err(|_| IpcError::TableFull { capacity })?;
                self.entries.push(Entry { generation: 0, node: Some(node) });
                NodeId::new(index, 0)
            }
        };
        self.live += 1;
        debug!(target: "ipc", "create {id}");
        Ok(id)
    }

    /// Removes an inactive node and returns its hooks.
    ///
    /// Messages still queued for it are dropped and their senders get
    /// `on_aborted(PeerRemoved)`; a requester among them stops waiting.
    pub fn remove(&mut self, id: NodeId) -> Result<H> {
        if self.node(id)?.state() != NodeState::Inactive {
            return Err(IpcError::Busy(id));
        }
        let entry = &mut self.entries[id.as_index()];
        let node = entry.node.take().ok_or(IpcError::NoSuchNode(id))?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index());
        self.live -= 1;

        let (hooks, mut pending) = node.into_parts();
        let orphans: Vec<Message> = pending.drain().collect();
        for msg in &orphans {
            self.refuse(msg, id, AbortReason::PeerRemoved);
        }
        self.record(TraceKind::Remove, id, None, orphans.len());
        debug!(target: "ipc", "remove {id} ({} queued messages refused)", orphans.len());
        Ok(hooks)
    }

    /// Tells the origin of `msg` that `peer` refused it. A vanished origin is ignored.
    fn refuse(&mut self, msg: &Message, peer: NodeId, reason: AbortReason) {
        match self.node_mut(msg.origin()) {
            Ok(origin) => origin.abort(peer, msg.tag(), msg.kind(), reason),
            Err(_) => debug!(target: "ipc", "refused message from vanished {}", msg.origin()),
        }
    }

    /// Pre-checks shared by request and note sends; no side effects.
    #[track_caller]
    fn check_send(
        &self,
        caller: NodeId,
        dest: NodeId,
        size: usize,
        op: &'static str,
    ) -> Result<()> {
        self.node(caller)?.require(StateSet::MAY_SEND, op);
        self.node(dest)?.check_announce(size)
    }

    fn announce(&mut self, dest: NodeId, msg: Message) -> Result<Announced> {
        let (origin, len) = (msg.origin(), msg.len());
        let announced = self.node_mut(dest)?.announce(msg)?;
        let kind = match announced {
            Announced::Delivered => TraceKind::Deliver,
            Announced::Queued => TraceKind::Queue,
        };
        self.record(kind, origin, Some(dest), len);
        Ok(announced)
    }

    /// Sends `payload` to `dest` and suspends `caller` until the reply arrives.
    ///
    /// The reply lands in the caller's inbound slot, which accepts up to `reply_capacity`
    /// bytes. `on_suspend` runs on the caller before `dest` learns about the request, and
    /// `dest`'s `on_received` may run before this call returns.
    ///
    /// # Panics
    /// If `caller` is neither inactive nor preparing a reply.
    #[track_caller]
    pub fn send_request_await_reply(
        &mut self,
        caller: NodeId,
        dest: NodeId,
        payload: &[u8],
        reply_capacity: usize,
    ) -> Result<Announced> {
        self.check_send(caller, dest, payload.len(), "send_request_await_reply")?;
        let msg = self.node_mut(caller)?.begin_request(caller, payload, reply_capacity);
        self.announce(dest, msg)
    }

    /// Receives the oldest queued request or note, or suspends `caller` until one arrives.
    ///
    /// Queued messages larger than `capacity` are refused (their senders get `on_aborted`)
    /// and skipped.
    ///
    /// # Panics
    /// If `caller` is not inactive.
    #[track_caller]
    pub fn await_request(&mut self, caller: NodeId, capacity: usize) -> Result<Receipt> {
        self.node_mut(caller)?.begin_await(capacity);
        loop {
            match self.node_mut(caller)?.take_pending() {
                PendingStep::Received { size, kind } => {
                    self.record(TraceKind::Receive, caller, None, size);
                    return Ok(Receipt::Received { size, kind });
                }
                PendingStep::Rejected { msg, capacity } => {
                    self.record(TraceKind::Reject, caller, Some(msg.origin()), msg.len());
                    let reason = AbortReason::Rejected { size: msg.len(), capacity };
                    self.refuse(&msg, caller, reason);
                }
                PendingStep::Empty => {
                    self.node_mut(caller)?.wait_for_request();
                    self.record(TraceKind::Wait, caller, None, 0);
                    return Ok(Receipt::Waiting);
                }
            }
        }
    }

    /// Answers the request `caller` last received. A no-op unless `caller` is preparing a
    /// reply; afterwards `caller` is inactive even if the reply had to be discarded.
    pub fn send_reply(&mut self, caller: NodeId, payload: &[u8]) -> Result<ReplyOutcome> {
        let Some(route) = self.node(caller)?.owed_route() else {
            return Ok(ReplyOutcome::NothingOwed);
        };
        let outcome = match self.node_mut(route.origin) {
            Ok(requester) => requester.deliver_reply(caller, route.tag, payload),
            Err(_) => ReplyOutcome::Discarded(DiscardReason::RequesterGone),
        };
        self.node_mut(caller)?.complete_reply();
        match outcome {
            ReplyOutcome::Discarded(reason) => {
                warn!(target: "ipc", "{caller} reply to {} discarded: {reason}", route.origin);
                self.record(TraceKind::Discard, caller, Some(route.origin), payload.len());
            }
            _ => self.record(TraceKind::Reply, caller, Some(route.origin), payload.len()),
        }
        Ok(outcome)
    }

    /// Announces a note to `dest`; `caller` keeps its state and is not suspended.
    ///
    /// # Panics
    /// If `caller` is neither inactive nor preparing a reply.
    #[track_caller]
    pub fn send_note(&mut self, caller: NodeId, dest: NodeId, payload: &[u8]) -> Result<Announced> {
        self.check_send(caller, dest, payload.len(), "send_note")?;
        let msg = self.node_mut(caller)?.begin_note(caller, payload);
        self.announce(dest, msg)
    }

    /// Stops `caller` from waiting and returns its new state. Other nodes are not told; a
    /// request already delivered or queued elsewhere stays there.
    pub fn cancel_waiting(&mut self, caller: NodeId) -> Result<NodeState> {
        let node = self.node_mut(caller)?;
        let before = node.state();
        let after = node.cancel_waiting();
        if before != after {
            self.record(TraceKind::Cancel, caller, None, 0);
        }
        Ok(after)
    }
}

impl<H> Default for NodeTable<H> {
    fn default() -> Self {
        Self::new(IpcConfig::DEFAULT)
    }
}
