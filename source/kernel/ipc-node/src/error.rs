// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Error and failure-signal types for the IPC node state machine
//! OWNERS: @kernel-ipc-team
//! PUBLIC API: IpcError, Result, DiscardReason, AbortReason, Abort
//! INVARIANTS: Contract violations are never represented here; they panic at the call site

use core::fmt;

use crate::message::MessageKind;
use crate::types::{NodeId, RequestTag};

/// Result type returned by node table operations.
pub type Result<T> = core::result::Result<T, IpcError>;

/// Recoverable errors returned to the caller of an IPC operation.
///
/// Every error is reported before the caller's node changes state or any hook runs.
#[must_use = "ipc errors must be handled explicitly"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcError {
    /// The handle does not refer to a live node.
    NoSuchNode(NodeId),
    /// The destination is waiting with a buffer smaller than the message.
    Oversized { size: usize, capacity: usize },
    /// The destination request queue reached its configured depth.
    QueueFull { capacity: usize },
    /// No free node slot left in the table.
    TableFull { capacity: usize },
    /// The node is still waiting or owes a reply.
    Busy(NodeId),
}

impl fmt::Display for IpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSuchNode(id) => write!(f, "{id} does not exist"),
            Self::Oversized { size, capacity } => {
                write!(f, "message of {size} bytes exceeds receive capacity {capacity}")
            }
            Self::QueueFull { capacity } => write!(f, "request queue full ({capacity} entries)"),
            Self::TableFull { capacity } => write!(f, "node table full ({capacity} nodes)"),
            Self::Busy(id) => write!(f, "{id} is busy"),
        }
    }
}

/// Why a reply was not delivered to its requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// The requester was removed from the table.
    RequesterGone,
    /// The requester is no longer waiting for this request (cancelled or moved on).
    NotAwaiting,
    /// The reply exceeds the requester's declared reply capacity.
    TooLarge { size: usize, capacity: usize },
}

impl fmt::Display for DiscardReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequesterGone => write!(f, "requester gone"),
            Self::NotAwaiting => write!(f, "requester not awaiting this reply"),
            Self::TooLarge { size, capacity } => {
                write!(f, "reply of {size} bytes exceeds capacity {capacity}")
            }
        }
    }
}

/// Why a message sent by a node was refused after it left the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The receiver picked the message from its queue but its buffer was too small.
    Rejected { size: usize, capacity: usize },
    /// The reply to our request did not fit the reply buffer.
    ReplyTooLarge { size: usize, capacity: usize },
    /// The destination was removed while the message was still queued.
    PeerRemoved,
}

/// Signal handed to [`crate::SchedHooks::on_aborted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Abort {
    /// Node the refused message was addressed to (or the replier).
    pub peer: NodeId,
    /// Tag of the refused message.
    pub tag: RequestTag,
    /// Kind of the refused message.
    pub kind: MessageKind,
    pub reason: AbortReason,
    /// `true` when the node stopped waiting because of this abort; the scheduler must resume it.
    pub wait_cancelled: bool,
}
