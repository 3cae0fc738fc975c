//! field-hub: aggregates field sensor telemetry frames into live per-node
//! state, persists it to an append-only log and answers history queries.

pub mod aggregator;
pub mod assembler;
pub mod battery;
pub mod config;
pub mod domain;
pub mod flusher;
pub mod ingest;
pub mod logging;
pub mod parser;
pub mod query;
pub mod record;
pub mod server;
pub mod store;

pub use aggregator::StateAggregator;
pub use domain::{NodeId, Reading, Snapshot};
pub use flusher::LogFlusher;
pub use query::QueryEngine;
