//! Runtime state and request metrics aggregation for web servers
//!
//! This crate provides the in-process state engine behind a server's status page:
//! - Non-blocking event reporting for requests, errors and HTTP status codes
//! - Single-consumer aggregation into per-URL, per-message and per-minute counters
//! - Automatic eviction of stale per-minute buckets
//! - Point-in-time snapshots and an HTML status report
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pulsestate_core::{ServerState, StateConfig, minute_key, SystemClock, Clock};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let state = ServerState::start(StateConfig::default())?;
//!
//!     // Called by the dispatch layer once per handled request
//!     state.add_request_count("/Index", 1).await;
//!     state.add_http_code_count("/Index", 200, 1).await;
//!
//!     state.flush().await;
//!     let key = minute_key(SystemClock.now());
//!     println!("requests this minute: {}", state.query_interval_request_data(&key));
//!     println!("{}", state.show_html_data());
//!
//!     state.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - **Hot-path friendly**: producers only copy fields into a pooled record and enqueue it
//! - **Backpressure**: each event kind has a bounded queue; a full queue makes the caller wait
//! - **Bounded windows**: minute buckets older than the retention period are swept periodically
//! - **Isolated instances**: every `ServerState` is constructed explicitly, no global state

pub mod clock;
pub mod config;
pub mod counter;
mod ingest;
pub mod pool;
pub mod record;
pub mod report;
pub mod state;
pub mod sweeper;
mod worker;

pub use clock::{Clock, ManualClock, SystemClock, minute_key, parse_minute_key};
pub use config::{PoolConfig, StateConfig};
pub use counter::{CounterReadGuard, CounterStore};
pub use ingest::QueueDepths;
pub use pool::{PoolStats, RecordPool, Recycle};
pub use record::{ErrorRecord, HttpCodeRecord, RecordPoolStats, RecordPools, RequestRecord};
pub use report::StateSnapshot;
pub use state::{ServerState, StateStores};
pub use sweeper::SweepReport;

/// Result type for state engine operations
pub type Result<T> = std::result::Result<T, StateError>;

/// State engine error types
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State engine must be started inside a Tokio runtime")]
    NoRuntime,
}

/// Default state engine configuration
pub fn default_config() -> StateConfig {
    StateConfig::default()
}
