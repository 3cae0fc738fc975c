//! ==============================================================================
//! main.rs - field telemetry hub entry point
//! ==============================================================================
//!
//! purpose:
//!     collects the frames that field nodes (battery, temperature, pH, EC, DO,
//!     gps) send through a radio gateway, keeps what every node currently
//!     reads, writes a snapshot line per reporting node every interval, and
//!     serves history queries over that log.
//!
//! responsibilities:
//!     - load hub.toml and set up logging
//!     - repair/create the snapshot log header
//!     - run the gateway tcp ingest, the flush timer and the http api
//!     - echo live snapshots when `logging.show_frames` is on
//!
//! architecture:
//!
//!     ┌─────────────────────────────────────────────────────────────┐
//!     │                    field hub (this file)                     │
//!     │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//!     │  │ tcp ingest  │  │ http api    │  │ flush timer         │  │
//!     │  │ (gateways)  │  │ (port 3000) │  │ (60s default)       │  │
//!     │  └──────┬──────┘  └──────┬──────┘  └──────────┬──────────┘  │
//!     │         │                │                    │             │
//!     │         └────────────────┼────────────────────┘             │
//!     │                          │                                  │
//!     │                   ┌──────┴──────┐                           │
//!     │                   │ aggregator  │ <- aggregator.rs          │
//!     │                   └──────┬──────┘                           │
//!     │        (Clone-able handle to the shared node state)          │
//!     └──────────────────────────┼──────────────────────────────────┘
//!                                │ append-only
//!                        ┌───────┴───────┐
//!                        ▼               ▼
//!                 ┌─────────────┐  ┌─────────────┐
//!                 │ snapshot    │  │ query       │
//!                 │ log (txt)   │─▶│ engine      │
//!                 └─────────────┘  └─────────────┘
//!
//! ==============================================================================

use anyhow::Result;
use field_hub::config::HubConfig;
use field_hub::server::{self, HubState};
use field_hub::{ingest, logging, LogFlusher, QueryEngine, StateAggregator};
use log::{error, info, warn};
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> Result<()> {
    // startup banner
    println!("===========================================================");
    println!("  Field Telemetry Hub");
    println!("===========================================================");

    // step 1: load configuration
    let config = HubConfig::load_or_default();
    config.print_summary();
    logging::init(&config.logging.level);

    // step 2: shared node state
    let aggregator = StateAggregator::new(config.live.channel_capacity);

    // step 3: log file must start with its header before anything is appended
    let flusher = LogFlusher::new(config.storage.log_path.clone(), aggregator.clone());
    if let Err(e) = flusher.ensure_header() {
        // the flusher retries the header on every tick, keep going
        error!("[STARTUP] Cannot prepare log file: {:#}", e);
    }

    // step 4: flush timer
    let interval = config.storage.flush_interval();
    info!("[STARTUP] Flushing snapshots every {}s", interval.as_secs());
    tokio::spawn(flusher.run(interval));

    // step 5: gateway ingest
    if config.ingest.enabled {
        let ingest_aggregator = aggregator.clone();
        let bind = config.ingest.bind.clone();
        let separator = config.ingest.separator.clone();
        let max_frame_bytes = config.ingest.max_frame_bytes;
        let show_frames = config.logging.show_frames;
        tokio::spawn(async move {
            if let Err(e) = ingest::run_tcp_ingest(
                bind,
                separator,
                max_frame_bytes,
                ingest_aggregator,
                show_frames,
            )
            .await
            {
                error!("[INGEST] Listener stopped: {:#}", e);
            }
        });
    }

    // step 6: live echo
    if config.logging.show_frames {
        let mut live = aggregator.subscribe();
        tokio::spawn(async move {
            loop {
                match live.recv().await {
                    Ok(s) => info!(
                        "[LIVE] {} | Bat: {:?}V ({:?}%) | Temp: {:?} | pH: {:?} | EC: {:?} | DO: {:?} | Sat: {}",
                        s.node, s.battery_voltage, s.battery_percent, s.temperature, s.ph,
                        s.conductivity, s.dissolved_oxygen, s.satellites
                    ),
                    Err(RecvError::Lagged(n)) => warn!("[LIVE] Echo skipped {} snapshots", n),
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    // step 7: http api (runs until the process stops)
    let state = HubState {
        aggregator,
        query: QueryEngine::new(config.storage.log_path.clone()),
    };
    server::run_server(&config.server.bind, state).await
}
