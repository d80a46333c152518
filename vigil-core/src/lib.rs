//! # vigil-core
//!
//! Core library for vigil - a supervisor for AI coding-agent sessions.
//!
//! This library provides:
//! - Line event parsers normalizing per-agent CLI output into one event model
//! - Session transcript indexing with bounded scans and cursor pagination
//! - Usage aggregation and context-window estimation
//! - A SQLite telemetry store with migrations, aggregation, and CSV export
//! - Configuration management and logging infrastructure
//!
//! ## Example
//!
//! ```rust,no_run
//! use vigil_core::{Config, TelemetryStore};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open the telemetry store
//! let store = TelemetryStore::initialize(&Config::store_path(), &config.maintenance)
//!     .expect("failed to open telemetry store");
//! ```

// Re-export commonly used items at the crate root
pub use config::Config;
pub use error::{Error, Result};
pub use events::{create_all_parsers, parser_for, EventParser};
pub use sessions::{OverlayStore, PageRequest, SessionIndex, SessionPage};
pub use store::{AggregatedStats, NewQueryEvent, QueryFilter, TelemetryStore};
pub use types::*;

// Public modules
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod sessions;
pub mod store;
pub mod types;
pub mod usage;
