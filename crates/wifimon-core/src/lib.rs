//! # wifimon-core
//!
//! **Walk the building, measure the WiFi, keep the history.**
//!
//! `wifimon-core` samples WiFi quality (throughput, latency, packet loss,
//! signal strength) at named physical locations, tags each pass with a run
//! number, and appends the samples to a durable per-location store that a
//! dashboard can aggregate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wifimon_core::{CollectionController, JsonFileStore, Location, MonitorConfig, SensorSuite};
//!
//! let config = MonitorConfig::default();
//! let store = Arc::new(JsonFileStore::new(&config.store_path));
//! let sensors = Arc::new(SensorSuite::system(&config.sensors));
//! let controller = CollectionController::new(store, sensors, config.collection());
//!
//! let status = controller.start(vec![Location::new("ECC", 67.12, -43.45)]);
//! println!("{status}");
//! let report = controller.wait();
//! ```
//!
//! ## Architecture
//!
//! Trigger → Run numbering → Session loop → Sensors → Store → Aggregation
//!
//! - [`sensors`]: three independent fallible probes (speed test, ping,
//!   signal quality), each returning a `Result` and never panicking.
//! - [`runs`]: next run number from the maximum already persisted.
//! - [`session`]: the start/stop/status controller and the worker loop.
//! - [`store`]: the append/scan contract and its file-backed implementation.
//! - [`aggregate`]: the read path: flattened rows, groupings, recent samples.
//! - [`seed`]: synthetic history for trying the dashboard without hardware.
//! - [`config`]: TOML configuration with defaults for every field.

pub mod aggregate;
pub mod config;
pub mod model;
pub mod runs;
pub mod seed;
pub mod sensors;
pub mod session;
pub mod store;

pub use aggregate::{
    Dimension, FilterOptions, GroupSummary, LocationSummary, Metric, MetricMeans, RowFilter,
    SampleRow, group_by, load_all, location_summary, read_recent, series,
};
pub use config::{ConfigError, MonitorConfig, SensorConfig, ServerConfig};
pub use model::{Location, Sample};
pub use runs::{RunsExhausted, next_run_number};
pub use seed::{SeedConfig, SeedError};
pub use sensors::{
    Measurement, PingSensor, PingStats, SensorError, SensorInfo, SensorSuite, SignalSensor,
    Throughput, ThroughputSensor,
};
pub use session::{
    CollectionConfig, CollectionController, Session, SessionReport, SkipReason, StartStatus,
    StopStatus, run_session,
};
pub use store::{JsonFileStore, LocationRecord, MemoryStore, MirroredStore, SampleStore, StoreError};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
