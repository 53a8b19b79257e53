// Copyright (c) Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::table::FabricTable;
use fabric_table_types::FabricIndex;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Observer of fabric table lifecycle events. Default bodies are no-ops so implementors only
/// override what they care about.
pub trait FabricTableDelegate: Send + Sync {
    fn will_remove(&self, _table: &FabricTable, _index: FabricIndex) {}
    fn on_removed(&self, _table: &FabricTable, _index: FabricIndex) {}
    fn on_updated(&self, _table: &FabricTable, _index: FabricIndex) {}
    fn on_committed(&self, _table: &FabricTable, _index: FabricIndex) {}
}

/// Returned by `FabricTable::register_delegate`; pass back to `unregister_delegate` to remove it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DelegateHandle(u64);

/// A list of observers notified synchronously, in registration order. Implemented as a `Vec`
/// behind a lock rather than the source's intrusive singly-linked list, but preserving its
/// reentrancy contract: each notification iterates over a snapshot taken before any callback
/// runs, so a delegate unregistering itself (or another delegate) mid-callback cannot corrupt or
/// skip the in-progress notification.
#[derive(Default)]
pub struct DelegateList {
    next_id: AtomicU64,
    delegates: RwLock<Vec<(u64, Arc<dyn FabricTableDelegate>)>>,
}

impl DelegateList {
    pub fn register(&self, delegate: Arc<dyn FabricTableDelegate>) -> DelegateHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.delegates.write().push((id, delegate));
        DelegateHandle(id)
    }

    pub fn unregister(&self, handle: DelegateHandle) {
        self.delegates.write().retain(|(id, _)| *id != handle.0);
    }

    fn snapshot(&self) -> Vec<Arc<dyn FabricTableDelegate>> {
        self.delegates.read().iter().map(|(_, d)| d.clone()).collect()
    }

    pub fn notify_will_remove(&self, table: &FabricTable, index: FabricIndex) {
        for delegate in self.snapshot() {
            delegate.will_remove(table, index);
        }
    }

    pub fn notify_on_removed(&self, table: &FabricTable, index: FabricIndex) {
        for delegate in self.snapshot() {
            delegate.on_removed(table, index);
        }
    }

    pub fn notify_on_updated(&self, table: &FabricTable, index: FabricIndex) {
        for delegate in self.snapshot() {
            delegate.on_updated(table, index);
        }
    }

    pub fn notify_on_committed(&self, table: &FabricTable, index: FabricIndex) {
        for delegate in self.snapshot() {
            delegate.on_committed(table, index);
        }
    }
}
