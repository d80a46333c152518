//! Telemetry store
//!
//! Embedded SQLite persistence for query events and Auto Run records:
//! - Schema migrations tracked via PRAGMA user_version
//! - Filtered retrieval, aggregation, and CSV export
//! - Periodic vacuum with backup, tracked in a sidecar file

pub mod repo;
pub mod schema;

pub use repo::{AggregatedStats, NewQueryEvent, QueryFilter, TelemetryStore};
