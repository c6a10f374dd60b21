//! Logging configuration

use crate::{LoggingError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Where and how log lines are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directives used when `RUST_LOG` is unset, e.g. `info,pulsestate_core=debug`
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Colour output on terminals; never applied to files or JSON
    pub ansi: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "pretty")]
    Pretty,
    #[serde(rename = "compact")]
    Compact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "type")]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily rolling files named `<file_prefix>.<YYYY-MM-DD>` in `directory`
    File {
        directory: PathBuf,
        file_prefix: String,
    },
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Check the fallback filter directives and file settings
    pub fn validate(&self) -> Result<()> {
        EnvFilter::try_new(&self.level)
            .map_err(|e| LoggingError::Config(format!("Invalid log level '{}': {e}", self.level)))?;

        if let LogOutput::File { file_prefix, .. } = &self.output {
            if file_prefix.is_empty() || file_prefix.contains(['/', '\\']) {
                return Err(LoggingError::Config(format!(
                    "Invalid log file prefix '{file_prefix}'"
                )));
            }
        }
        Ok(())
    }

    /// Filter from `RUST_LOG` when set, otherwise from `level`
    pub fn env_filter(&self) -> Result<EnvFilter> {
        match std::env::var(EnvFilter::DEFAULT_ENV) {
            Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
                .map_err(|e| LoggingError::Config(format!("Invalid RUST_LOG '{directives}': {e}"))),
            _ => EnvFilter::try_new(&self.level)
                .map_err(|e| LoggingError::Config(format!("Invalid log level '{}': {e}", self.level))),
        }
    }

    pub fn writes_to_terminal(&self) -> bool {
        matches!(self.output, LogOutput::Stdout | LogOutput::Stderr)
    }
}
