// Copyright 2024 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Single serialization domain for all IPC node operations
//! OWNERS: @kernel-ipc-team @kernel-sync-team
//! PUBLIC API: Domain (new/with/try_with/into_inner)
//! DEPENDS_ON: spin::Mutex
//! INVARIANTS: Every operation, including the hooks it triggers, completes under one lock

use spin::Mutex;

use crate::config::IpcConfig;
use crate::table::NodeTable;

/// A [`NodeTable`] behind one spin lock, shareable between CPUs.
///
/// Hooks run with the lock held; they must not call back into the same domain.
pub struct Domain<H> {
    table: Mutex<NodeTable<H>>,
}
static_assertions::assert_impl_all!(Domain<()>: Send, Sync);

impl<H> Domain<H> {
    pub const fn new(config: IpcConfig) -> Self {
        Self { table: Mutex::new(NodeTable::new(config)) }
    }

    /// Runs `f` with exclusive access to the table.
    pub fn with<R>(&self, f: impl FnOnce(&mut NodeTable<H>) -> R) -> R {
        let mut table = self.table.lock();
        f(&mut *table)
    }

    /// Like [`Domain::with`], but returns `None` instead of spinning if the lock is held.
    pub fn try_with<R>(&self, f: impl FnOnce(&mut NodeTable<H>) -> R) -> Option<R> {
        self.table.try_lock().map(|mut table| f(&mut *table))
    }

    pub fn into_inner(self) -> NodeTable<H> {
        self.table.into_inner()
    }
}
