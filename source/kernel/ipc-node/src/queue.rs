// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: FIFO of requests and notes announced to a node that is not yet listening
//! OWNERS: @kernel-ipc-team
//! PUBLIC API: RequestQueue (enqueue/dequeue/drain/len)
//! INVARIANTS: Strict FIFO; never holds replies; optional depth bound rejects deterministically

use alloc::collections::VecDeque;

use crate::error::IpcError;
use crate::message::Message;

/// Pending messages of one node, oldest first.
#[derive(Debug, Default)]
pub struct RequestQueue {
    queue: VecDeque<Message>,
    limit: Option<usize>,
}

impl RequestQueue {
    /// Creates an unbounded queue.
    pub const fn new() -> Self {
        Self { queue: VecDeque::new(), limit: None }
    }

    /// Creates a queue rejecting `enqueue` once `limit` messages are pending.
    pub const fn with_limit(limit: Option<usize>) -> Self {
        Self { queue: VecDeque::new(), limit }
    }

    /// Returns `Err(QueueFull)` if one more message would exceed the depth bound.
    pub fn ensure_room(&self) -> Result<(), IpcError> {
        match self.limit {
            Some(capacity) if self.queue.len() >= capacity => Err(IpcError::QueueFull { capacity }),
            _ => Ok(()),
        }
    }

    /// Appends `msg` at the tail. Message size is not checked here.
    pub fn enqueue(&mut self, msg: Message) -> Result<(), IpcError> {
        self.ensure_room()?;
        self.queue.push_back(msg);
        Ok(())
    }

    /// Removes the head of the queue.
    pub fn dequeue(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }

    /// Removes every pending message, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = Message> + '_ {
        self.queue.drain(..)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
