// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: The five IPC node states and precondition sets
//! OWNERS: @kernel-ipc-team
//! PUBLIC API: NodeState, StateSet
//!
//! Transitions (operation -> resulting state):
//!
//! ```text
//!   Inactive      --send_request_await_reply-->  AwaitReply
//!   PrepareReply  --send_request_await_reply-->  PrepareAndAwaitReply
//!   Inactive      --await_request (queue empty)-> AwaitRequest
//!   Inactive      --await_request (request)----> PrepareReply
//!   AwaitRequest  --request announced----------> PrepareReply
//!   AwaitRequest  --note announced-------------> Inactive
//!   PrepareReply  --send_reply-----------------> Inactive
//!   AwaitReply    --reply received-------------> Inactive
//!   PrepareAndAwaitReply --reply received------> PrepareReply
//!   AwaitReply | AwaitRequest --cancel_waiting-> Inactive
//!   PrepareAndAwaitReply      --cancel_waiting-> PrepareReply
//! ```

use bitflags::bitflags;
use core::fmt;

/// State of an IPC node. Exactly one holds at any time.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    /// Not sending, not expecting anything, no reply owed.
    #[default]
    Inactive = 1,
    /// Sent a request and waits for its reply.
    AwaitReply = 2,
    /// Waits for any node to announce a request or note.
    AwaitRequest = 3,
    /// Received a request and owes its origin a reply.
    PrepareReply = 4,
    /// Owes a reply and waits for the reply to its own newer request.
    PrepareAndAwaitReply = 5,
}

impl NodeState {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::AwaitReply => "await-reply",
            Self::AwaitRequest => "await-request",
            Self::PrepareReply => "prepare-reply",
            Self::PrepareAndAwaitReply => "prepare-and-await-reply",
        }
    }

    pub const fn as_set(self) -> StateSet {
        match self {
            Self::Inactive => StateSet::INACTIVE,
            Self::AwaitReply => StateSet::AWAIT_REPLY,
            Self::AwaitRequest => StateSet::AWAIT_REQUEST,
            Self::PrepareReply => StateSet::PREPARE_REPLY,
            Self::PrepareAndAwaitReply => StateSet::PREPARE_AND_AWAIT_REPLY,
        }
    }

    #[inline]
    pub const fn is_in(self, set: StateSet) -> bool {
        set.contains(self.as_set())
    }

    /// Whether a reply delivered now would be accepted.
    #[inline]
    pub const fn awaits_reply(self) -> bool {
        self.is_in(StateSet::AWAITS_REPLY)
    }

    /// State after a reply lands (or the wait for it is given up).
    pub const fn after_reply(self) -> Self {
        match self {
            Self::PrepareAndAwaitReply => Self::PrepareReply,
            _ => Self::Inactive,
        }
    }

    /// State after `cancel_waiting`.
    pub const fn cancelled(self) -> Self {
        match self {
            Self::PrepareAndAwaitReply => Self::PrepareReply,
            Self::AwaitReply | Self::AwaitRequest => Self::Inactive,
            other => other,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Set of node states, used for operation preconditions.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct StateSet: u8 {
        const INACTIVE = 1 << 0;
        const AWAIT_REPLY = 1 << 1;
        const AWAIT_REQUEST = 1 << 2;
        const PREPARE_REPLY = 1 << 3;
        const PREPARE_AND_AWAIT_REPLY = 1 << 4;

        /// States a node may send a request or note from.
        const MAY_SEND = Self::INACTIVE.bits() | Self::PREPARE_REPLY.bits();
        /// States in which a reply is accepted.
        const AWAITS_REPLY = Self::AWAIT_REPLY.bits() | Self::PREPARE_AND_AWAIT_REPLY.bits();
        /// States in which the owning context is parked.
        const WAITING = Self::AWAITS_REPLY.bits() | Self::AWAIT_REQUEST.bits();
        /// States that owe a reply to some requester.
        const OWES_REPLY = Self::PREPARE_REPLY.bits() | Self::PREPARE_AND_AWAIT_REPLY.bits();
    }
}
