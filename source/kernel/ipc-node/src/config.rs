// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Static sizing of the IPC node table
//! OWNERS: @kernel-ipc-team
//! PUBLIC API: IpcConfig, DEFAULT_MAX_NODES

/// Default number of live nodes a table accepts.
pub const DEFAULT_MAX_NODES: usize = 256;

/// Table-wide limits, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcConfig {
    /// Maximum number of live nodes; `create` fails with `TableFull` beyond it.
    pub max_nodes: usize,
    /// Per-node request queue depth; `None` leaves queues unbounded.
    pub queue_limit: Option<usize>,
}

impl IpcConfig {
    pub const DEFAULT: Self = Self { max_nodes: DEFAULT_MAX_NODES, queue_limit: None };

    pub const fn with_max_nodes(self, max_nodes: usize) -> Self {
        Self { max_nodes, ..self }
    }

    pub const fn with_queue_limit(self, limit: usize) -> Self {
        Self { queue_limit: Some(limit), ..self }
    }
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
