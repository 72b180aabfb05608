// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Rendezvous IPC endpoint state machine for NEURON kernel threads
//! OWNERS: @kernel-ipc-team
//! STATUS: Functional
//! API_STABILITY: Unstable
//! TEST_COVERAGE: Unit tests per module, proptest (tests_prop.rs), tests/rendezvous.rs
//!
//! PUBLIC API:
//!   - NodeTable: node arena + send_request_await_reply / await_request / send_reply /
//!     send_note / cancel_waiting
//!   - IpcNode, NodeState: per-context state machine and its five states
//!   - SchedHooks: scheduler integration (suspend / received / aborted)
//!   - Domain: spin-locked NodeTable for multi-CPU callers
//!
//! DEPENDENCIES:
//!   - spin: serialization domain
//!   - bitflags: state precondition sets
//!   - log: diagnostics (target "ipc")
//!
//! Each node has one inbound slot, one request queue and at most one owed reply. Replies
//! travel by handle straight back to the requester; requests and notes are delivered
//! immediately when the destination waits, otherwise queued in FIFO order.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

extern crate alloc;

pub mod config;
pub mod domain;
pub mod error;
pub mod hooks;
pub mod message;
pub mod node;
pub mod queue;
pub mod state;
pub mod table;
pub mod trace;
pub mod types;

#[cfg(test)]
mod tests_prop;

pub use config::IpcConfig;
pub use domain::Domain;
pub use error::{Abort, AbortReason, DiscardReason, IpcError, Result};
pub use hooks::SchedHooks;
pub use message::{InboundSlot, Message, MessageKind, ReplyRoute};
pub use node::{Announced, IpcNode, Receipt, ReplyOutcome};
pub use state::{NodeState, StateSet};
pub use table::NodeTable;
pub use types::{NodeId, RequestTag};
