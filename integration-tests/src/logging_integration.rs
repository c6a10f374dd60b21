//! Integration tests for state engine events routed through the logging crate

use crate::test_utils::*;
use pulsestate_logging::{LogFormat, LogOutput, LoggingConfig, LoggingError, build_subscriber, init_logging};
use std::path::Path;

fn file_config(directory: &Path) -> LoggingConfig {
    LoggingConfig {
        level: "info,pulsestate_core=debug".to_string(),
        format: LogFormat::Json,
        output: LogOutput::File {
            directory: directory.to_path_buf(),
            file_prefix: "pulsestate".to_string(),
        },
        ansi: false,
    }
}

fn read_log_dir(directory: &Path) -> String {
    let mut contents = String::new();
    for entry in std::fs::read_dir(directory).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("pulsestate."), "unexpected log file {name}");
        contents.push_str(&std::fs::read_to_string(&path).unwrap());
    }
    contents
}

#[tokio::test]
async fn test_engine_lifecycle_is_logged() {
    let dir = tempfile::tempdir().unwrap();
    let (subscriber, guard) = build_subscriber(&file_config(dir.path())).unwrap();
    let default_guard = tracing::subscriber::set_default(subscriber);

    let (state, _clock) = start_manual_state(test_state_config());
    state.add_request_count("/logged", 3).await;
    state.add_error_count("/logged", "disk full", 1).await;
    state.flush().await;
    state.shutdown().await;

    drop(default_guard);
    drop(guard);

    let contents = read_log_dir(dir.path());
    assert!(contents.contains("Server state started"));
    assert!(contents.contains("Aggregation worker started"));
    assert!(contents.contains("Aggregation worker stopped"));
    assert!(contents.contains("Server state stopped"));
    if std::env::var("RUST_LOG").is_err() {
        assert!(contents.contains("Opened interval bucket"));
    }

    for line in contents.lines() {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value.get("level").is_some(), "missing level in {line}");
    }
}

#[tokio::test]
async fn test_reports_after_shutdown_are_dropped_quietly() {
    let dir = tempfile::tempdir().unwrap();
    let (subscriber, guard) = build_subscriber(&file_config(dir.path())).unwrap();
    let default_guard = tracing::subscriber::set_default(subscriber);

    let (state, _clock) = start_manual_state(test_state_config());
    state.shutdown().await;
    assert_eq!(state.add_request_count("/after", 1).await, 1);
    assert_eq!(state.detail_request_page_data().get("/after"), 0);

    drop(default_guard);
    drop(guard);

    if std::env::var("RUST_LOG").is_err() {
        let contents = read_log_dir(dir.path());
        assert!(contents.contains("dropping event record"));
    }
}

#[test]
fn test_global_logging_installs_once() {
    let dir = tempfile::tempdir().unwrap();
    let first = init_logging(&file_config(dir.path()));
    let second = init_logging(&file_config(dir.path()));

    // Another test in this binary may already own the global subscriber.
    if first.is_ok() {
        assert!(matches!(second, Err(LoggingError::Tracing(_))));
    } else {
        assert!(matches!(first, Err(LoggingError::Tracing(_))));
    }
}
