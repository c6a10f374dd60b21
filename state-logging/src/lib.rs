//! Logging setup for PulseState servers
//!
//! The state engine only emits `tracing` events; this crate is what a
//! composition root calls once at startup to decide where they go:
//! - `RUST_LOG`-style filtering with a configured fallback level
//! - Pretty, compact or JSON line output
//! - Stdout, stderr, or daily rolling files written off the calling thread
//!
//! # Example
//!
//! ```rust,no_run
//! use pulsestate_logging::{LoggingConfig, init_logging};
//!
//! fn main() {
//!     let _guard = init_logging(&LoggingConfig::default()).expect("Failed to initialize logging");
//!
//!     tracing::info!(component = "state", "Server state logging ready");
//! }
//! ```

pub mod config;
pub mod init;

pub use config::{LogFormat, LogOutput, LoggingConfig};
pub use init::{LoggingGuard, build_subscriber, init_logging};

/// Result type for logging operations
pub type Result<T> = std::result::Result<T, LoggingError>;

/// Logging error types
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tracing error: {0}")]
    Tracing(String),
}

#[cfg(test)]
mod lib_tests;
