//! Integration tests for interval bucket eviction

use crate::test_utils::*;
use chrono::Duration as ChronoDuration;
use pulsestate_core::{ManualClock, ServerState, StateConfig, minute_key};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

const SWEEP_CONFIG: &str = r#"
channel_capacity = 64
retention_minutes = 5
sweep_interval_secs = 60
sweep_min_keys = 3
"#;

fn sweep_config_from_file() -> StateConfig {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SWEEP_CONFIG.as_bytes()).unwrap();
    StateConfig::from_file(file.path()).unwrap()
}

/// One request and one error in each of `minutes` consecutive minute buckets
async fn fill_minutes(state: &ServerState, clock: &ManualClock, minutes: i64) {
    for _ in 0..minutes {
        state.add_request_count("/tick", 1).await;
        state.add_error_count("/tick", "tick failed", 1).await;
        state.flush().await;
        clock.advance(ChronoDuration::minutes(1));
    }
    clock.advance(ChronoDuration::minutes(-1));
}

#[tokio::test]
async fn test_config_file_drives_retention() {
    let config = sweep_config_from_file();
    assert_eq!(config.retention_minutes, 5);
    assert_eq!(config.sweep_interval(), Duration::from_secs(60));
    assert_eq!(config.reserved_prefix, StateConfig::default().reserved_prefix);

    let (state, clock) = start_manual_state(config);
    fill_minutes(&state, &clock, 9).await;
    assert_eq!(state.interval_request_data().len(), 9);

    // Now at minute 8: minutes 0..=2 are more than 5 minutes old, minute 3 is exactly 5.
    let report = state.sweep_now();
    assert_eq!(report.request_removed, 3);
    assert_eq!(report.error_removed, 3);

    let start = test_start_time();
    assert_eq!(state.query_interval_request_data(&minute_key(start)), 0);
    assert_eq!(
        state.query_interval_request_data(&minute_key(start + ChronoDuration::minutes(3))),
        1
    );
    assert_eq!(state.interval_error_data().len(), 6);

    // Detail stores are never evicted.
    assert_eq!(state.detail_request_page_data().get("/tick"), 9);
    assert_eq!(state.detail_error_data().get("tick failed"), 9);
    assert_eq!(state.total_request_count(), 9);
    state.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_periodic_sweeper_runs_on_schedule() {
    let (state, clock) = start_manual_state(sweep_config_from_file());
    fill_minutes(&state, &clock, 9).await;

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(state.interval_request_data().len(), 9);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(state.interval_request_data().len(), 6);
    assert_eq!(state.interval_error_data().len(), 6);

    // An hour later every remaining bucket is stale.
    clock.advance(ChronoDuration::hours(1));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(state.interval_request_data().is_empty());
    assert!(state.interval_error_data().is_empty());

    state.shutdown().await;
}

#[tokio::test]
async fn test_small_stores_are_left_alone() {
    let (state, clock) = start_manual_state(sweep_config_from_file());
    fill_minutes(&state, &clock, 3).await;
    clock.advance(ChronoDuration::days(1));

    let report = state.sweep_now();
    assert_eq!(report.total(), 0);
    assert_eq!(state.interval_request_data().len(), 3);
    state.shutdown().await;
}

#[tokio::test]
async fn test_stale_buckets_count_again_after_eviction() {
    let (state, clock) = start_manual_state(sweep_config_from_file());
    fill_minutes(&state, &clock, 9).await;
    state.sweep_now();

    let first_minute = minute_key(test_start_time());
    assert_eq!(state.query_interval_request_data(&first_minute), 0);

    // A late report for an evicted minute starts a fresh bucket.
    clock.set(test_start_time());
    state.add_request_count("/tick", 4).await;
    state.flush().await;
    assert_eq!(state.query_interval_request_data(&first_minute), 4);
    state.shutdown().await;
}

#[tokio::test]
async fn test_sweeper_stops_on_shutdown() {
    let clock = Arc::new(ManualClock::new(test_start_time()));
    let state = ServerState::start_with_clock(sweep_config_from_file(), clock).unwrap();

    state.add_request_count("/tick", 1).await;
    let probe = &state;
    wait_for_condition(
        move || async move { probe.detail_request_page_data().get("/tick") == 1 },
        Duration::from_secs(1),
        Duration::from_millis(10),
    )
    .await
    .unwrap();

    tokio::time::timeout(Duration::from_secs(5), state.shutdown())
        .await
        .expect("shutdown did not finish");
}
