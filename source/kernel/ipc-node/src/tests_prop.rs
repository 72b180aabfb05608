// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg(test)]
//! CONTEXT: Property-based tests for the IPC node table
//! OWNERS: @kernel-ipc-team
//! NOTE: Tests only; no kernel logic. Drives random operation sequences through NodeTable.
//!
//! TEST_SCOPE:
//!   - State invariants under arbitrary legal operation sequences
//!   - FIFO delivery of queued messages across senders
//!   - Capacity enforcement for requests and replies
//!   - cancel_waiting downgrade and idempotence
//!
//! TEST_SCENARIOS:
//!   - random_ops_keep_invariants(): awaited tag <-> awaiting state, len <= capacity
//!   - queued_messages_arrive_in_fifo_order(): notes from many senders keep arrival order
//!   - oversized_never_lands(): a message above capacity never reaches the inbound slot
//!   - reply_capacity_is_enforced(): an oversized reply is discarded and frees both nodes
//!   - cancel_is_idempotent(): a second cancel never changes the state again

use proptest::prelude::*;

use crate::{
    Announced, IpcConfig, NodeId, NodeState, NodeTable, Receipt, ReplyOutcome, StateSet,
};

const NODES: usize = 3;

#[derive(Debug, Clone)]
enum Op {
    Request { from: usize, to: usize, size: usize, cap: usize },
    Note { from: usize, to: usize, size: usize },
    Await { node: usize, cap: usize },
    Reply { node: usize, size: usize },
    Cancel { node: usize },
}

fn arb_op() -> impl Strategy<Value = Op> {
    let node = 0..NODES;
    let size = 0usize..24;
    prop_oneof![
        (node.clone(), node.clone(), size.clone(), size.clone())
            .prop_map(|(from, to, size, cap)| Op::Request { from, to, size, cap }),
        (node.clone(), node.clone(), size.clone())
            .prop_map(|(from, to, size)| Op::Note { from, to, size }),
        (node.clone(), size.clone()).prop_map(|(node, cap)| Op::Await { node, cap }),
        (node.clone(), size).prop_map(|(node, size)| Op::Reply { node, size }),
        node.prop_map(|node| Op::Cancel { node }),
    ]
}

fn setup() -> (NodeTable<()>, Vec<NodeId>) {
    let mut table = NodeTable::new(IpcConfig::DEFAULT);
    let ids = (0..NODES).map(|_| table.create(()).unwrap()).collect();
    (table, ids)
}

fn state(table: &NodeTable<()>, id: NodeId) -> NodeState {
    table.state(id).unwrap()
}

/// Applies `op` if its preconditions hold; contract violations are skipped, not provoked.
fn apply(table: &mut NodeTable<()>, ids: &[NodeId], op: &Op) {
    match *op {
        Op::Request { from, to, size, cap } => {
            if state(table, ids[from]).is_in(StateSet::MAY_SEND) {
                let _ = table.send_request_await_reply(ids[from], ids[to], &vec![0xA5; size], cap);
            }
        }
        Op::Note { from, to, size } => {
            if state(table, ids[from]).is_in(StateSet::MAY_SEND) {
                let _ = table.send_note(ids[from], ids[to], &vec![0x5A; size]);
            }
        }
        Op::Await { node, cap } => {
            if state(table, ids[node]) == NodeState::Inactive {
                let _ = table.await_request(ids[node], cap).unwrap();
            }
        }
        Op::Reply { node, size } => {
            let _ = table.send_reply(ids[node], &vec![0x11; size]).unwrap();
        }
        Op::Cancel { node } => {
            table.cancel_waiting(ids[node]).unwrap();
        }
    }
}

proptest! {
    #[test]
    fn random_ops_keep_invariants(ops in proptest::collection::vec(arb_op(), 1..64)) {
        let (mut table, ids) = setup();
        for op in &ops {
            apply(&mut table, &ids, op);
            for &id in &ids {
                let node = table.node(id).unwrap();
                prop_assert_eq!(node.awaited().is_some(), node.state().awaits_reply(), "{:?}", op);
                prop_assert!(node.inbound().len() <= node.inbound().capacity(), "{:?}", op);
                if node.state().is_in(StateSet::OWES_REPLY) {
                    prop_assert!(node.inbound().origin().is_some());
                }
                if node.state() == NodeState::AwaitRequest {
                    prop_assert!(node.pending().is_empty());
                }
            }
        }
    }

    #[test]
    fn queued_messages_arrive_in_fifo_order(senders in proptest::collection::vec(0usize..NODES - 1, 1..16)) {
        let (mut table, ids) = setup();
        let receiver = ids[NODES - 1];
        for (seq, &sender) in senders.iter().enumerate() {
            let announced = table.send_note(ids[sender], receiver, &[seq as u8]).unwrap();
            prop_assert_eq!(announced, Announced::Queued);
        }
        for seq in 0..senders.len() {
            let receipt = table.await_request(receiver, 1).unwrap();
            let received = matches!(receipt, Receipt::Received { size: 1, .. });
            prop_assert!(received);
            let node = table.node(receiver).unwrap();
            prop_assert_eq!(node.inbound().payload(), &[seq as u8][..]);
            prop_assert_eq!(node.inbound().origin().map(|r| r.origin), Some(ids[senders[seq]]));
        }
        prop_assert_eq!(table.await_request(receiver, 1).unwrap(), Receipt::Waiting);
    }

    #[test]
    fn oversized_never_lands(size in 0usize..64, cap in 0usize..64, waiting in any::<bool>()) {
        let (mut table, ids) = setup();
        let (client, server) = (ids[0], ids[1]);
        if waiting {
            prop_assert_eq!(table.await_request(server, cap).unwrap(), Receipt::Waiting);
        }
        let sent = table.send_request_await_reply(client, server, &vec![7u8; size], 64);
        if !waiting {
            prop_assert_eq!(sent, Ok(Announced::Queued));
            let _ = table.await_request(server, cap).unwrap();
        }
        let node = table.node(server).unwrap();
        if size > cap {
            prop_assert!(node.inbound().is_empty());
            prop_assert_eq!(state(&table, client), NodeState::Inactive);
            prop_assert_ne!(node.state(), NodeState::PrepareReply);
        } else {
            prop_assert_eq!(node.inbound().len(), size);
            prop_assert_eq!(node.state(), NodeState::PrepareReply);
        }
    }

    #[test]
    fn reply_capacity_is_enforced(size in 0usize..32, cap in 0usize..32) {
        let (mut table, ids) = setup();
        let (client, server) = (ids[0], ids[1]);
        let _ = table.await_request(server, 8).unwrap();
        let _ = table.send_request_await_reply(client, server, b"q", cap).unwrap();
        let outcome = table.send_reply(server, &vec![3u8; size]).unwrap();
        prop_assert_eq!(state(&table, server), NodeState::Inactive);
        prop_assert_eq!(state(&table, client), NodeState::Inactive);
        let inbound = table.node(client).unwrap().inbound();
        if size > cap {
            prop_assert!(matches!(outcome, ReplyOutcome::Discarded(_)));
            prop_assert!(inbound.is_empty());
        } else {
            prop_assert_eq!(outcome, ReplyOutcome::Delivered { size });
            prop_assert_eq!(inbound.len(), size);
        }
    }

    #[test]
    fn cancel_is_idempotent(ops in proptest::collection::vec(arb_op(), 0..32), node in 0..NODES) {
        let (mut table, ids) = setup();
        for op in &ops {
            apply(&mut table, &ids, op);
        }
        let once = table.cancel_waiting(ids[node]).unwrap();
        prop_assert!(!once.is_in(StateSet::WAITING));
        prop_assert_eq!(table.cancel_waiting(ids[node]).unwrap(), once);
    }
}
