//! ==============================================================================
//! aggregator.rs - per-node live state with fill-forward merge
//! ==============================================================================
//!
//! purpose:
//!     owns what every node "currently" reads. readings come in partial (a node
//!     may only send temperature this cycle), so each merge keeps the last known
//!     value of any measurement the new reading does not carry.
//!
//! relationships:
//!     - fed by: ingest.rs and the /api/frames handler (parser output)
//!     - drained by: flusher.rs (pending snapshots, once per tick)
//!     - read by: server.rs (/api) and any live-push subscriber
//!
//! locking:
//!     current state and the pending store sit behind ONE mutex, so a flush
//!     sees a node either before or after a merge, never halfway.
//!
//! ==============================================================================

use crate::battery;
use crate::domain::{NodeId, Reading, Snapshot};
use crate::parser;
use crate::store::SnapshotStore;

use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// display form of `Snapshot::observed_at`: month/day/year, 12-hour clock
pub const OBSERVED_AT_FORMAT: &str = "%-m/%-d/%Y, %-I:%M %p";

#[derive(Default)]
struct AggregatorState {
    current: HashMap<NodeId, Snapshot>,
    pending: SnapshotStore,
}

/// clone-able handle to the shared node state
#[derive(Clone)]
pub struct StateAggregator {
    state: Arc<Mutex<AggregatorState>>,
    live: broadcast::Sender<Snapshot>,
}

impl StateAggregator {
    /// `live_capacity` is how many snapshots a slow subscriber may lag behind
    pub fn new(live_capacity: usize) -> Self {
        let (live, _) = broadcast::channel(live_capacity.max(1));
        Self {
            state: Arc::new(Mutex::new(AggregatorState::default())),
            live,
        }
    }

    /// merge a reading at the current local time
    pub async fn merge(&self, reading: Reading) -> Snapshot {
        self.merge_at(reading, Local::now()).await
    }

    /// merge a reading, stamping it with `now`
    pub async fn merge_at(&self, reading: Reading, now: DateTime<Local>) -> Snapshot {
        let observed_at = now.format(OBSERVED_AT_FORMAT).to_string();

        let mut state = self.state.lock().await;
        let snapshot = fill_forward(state.current.get(&reading.node), reading, observed_at);
        state.current.insert(snapshot.node.clone(), snapshot.clone());
        state.pending.stage(snapshot.clone());

        // no subscribers is fine, live push is best effort
        let _ = self.live.send(snapshot.clone());
        snapshot
    }

    /// parse a raw frame and merge every reading in it
    pub async fn ingest_frame(&self, raw: &str) -> Vec<Snapshot> {
        let now = Local::now();
        let mut merged = Vec::new();
        for reading in parser::parse(raw) {
            merged.push(self.merge_at(reading, now).await);
        }
        merged
    }

    /// current snapshot of every node seen so far, ordered by node id
    pub async fn current(&self) -> Vec<Snapshot> {
        let state = self.state.lock().await;
        let mut all: Vec<Snapshot> = state.current.values().cloned().collect();
        all.sort_by(|a, b| a.node.cmp(&b.node));
        all
    }

    /// current snapshot of a single node
    #[cfg(test)]
    pub async fn get(&self, node: &NodeId) -> Option<Snapshot> {
        self.state.lock().await.current.get(node).cloned()
    }

    /// take the snapshots merged since the previous call (the dirty set)
    pub async fn drain_pending(&self) -> Vec<Snapshot> {
        self.state.lock().await.pending.drain()
    }

    #[cfg(test)]
    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// subscribe to every merged snapshot from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Snapshot> {
        self.live.subscribe()
    }
}

/// build the next snapshot of a node from its prior one and a new reading
///
/// measurements fill forward, gps always comes from the reading, the battery
/// percent is recomputed from whatever voltage results.
pub fn fill_forward(prior: Option<&Snapshot>, reading: Reading, observed_at: String) -> Snapshot {
    let battery_voltage = reading
        .battery_voltage
        .or(prior.and_then(|s| s.battery_voltage));

    Snapshot {
        battery_percent: battery::percent(battery_voltage),
        battery_voltage,
        temperature: reading.temperature.or(prior.and_then(|s| s.temperature)),
        ph: reading.ph.or(prior.and_then(|s| s.ph)),
        conductivity: reading.conductivity.or(prior.and_then(|s| s.conductivity)),
        dissolved_oxygen: reading
            .dissolved_oxygen
            .or(prior.and_then(|s| s.dissolved_oxygen)),
        latitude: reading.latitude,
        longitude: reading.longitude,
        satellites: reading.satellites,
        node: reading.node,
        observed_at,
    }
}
