//! Subscriber construction and global installation

use crate::config::{LogFormat, LogOutput, LoggingConfig};
use crate::{LoggingError, Result};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::prelude::*;

/// Keeps the background file writer alive; flushes pending lines on drop
#[derive(Debug, Default)]
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file_writer: Option<WorkerGuard>,
}

/// Build a subscriber for `config` without installing it
pub fn build_subscriber(
    config: &LoggingConfig,
) -> Result<(impl Subscriber + Send + Sync + 'static, LoggingGuard)> {
    config.validate()?;
    let filter = config.env_filter()?;

    let (writer, file_writer) = match &config.output {
        LogOutput::Stdout => (BoxMakeWriter::new(std::io::stdout), None),
        LogOutput::Stderr => (BoxMakeWriter::new(std::io::stderr), None),
        LogOutput::File {
            directory,
            file_prefix,
        } => {
            std::fs::create_dir_all(directory)?;
            let appender = tracing_appender::rolling::daily(directory, file_prefix);
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
    };
    let ansi = config.ansi && config.writes_to_terminal();

    let layer = match config.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(writer)
            .with_ansi(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_ansi(ansi)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_ansi(ansi)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(layer).with(filter);
    Ok((
        subscriber,
        LoggingGuard {
            _file_writer: file_writer,
        },
    ))
}

/// Install the process-wide subscriber.
///
/// Fails instead of panicking when a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingGuard> {
    let (subscriber, guard) = build_subscriber(config)?;
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LoggingError::Tracing(e.to_string()))?;
    Ok(guard)
}
