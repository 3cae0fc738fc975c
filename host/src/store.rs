use crate::domain::{NodeId, Snapshot};
use std::collections::BTreeMap;

/// snapshots waiting for the next log flush
///
/// holds at most one entry per node (the latest merge wins), so a node that
/// reported five times between two ticks still produces a single log line.
/// entries drain in node id order.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    pending: BTreeMap<NodeId, Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// mark a node dirty with its latest snapshot
    pub fn stage(&mut self, snapshot: Snapshot) {
        self.pending.insert(snapshot.node.clone(), snapshot);
    }

    /// take everything staged since the last drain, leaving the store empty
    pub fn drain(&mut self) -> Vec<Snapshot> {
        std::mem::take(&mut self.pending).into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
