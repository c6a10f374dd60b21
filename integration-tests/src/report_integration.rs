//! Integration tests for the status page and snapshots

use crate::test_utils::*;
use pulsestate_core::{StateConfig, StateSnapshot, minute_key};

/// Traffic a small site might see in one minute
async fn record_sample_traffic(state: &pulsestate_core::ServerState) {
    state.add_request_count("/Index", 5).await;
    state.add_request_count("/api/Orders", 3).await;
    state.add_request_count("/pulsestate/report", 7).await;

    state.add_http_code_count("/Index", 200, 5).await;
    state.add_http_code_count("/api/Orders", 500, 1).await;
    state.add_http_code_count("/pulsestate/report", 200, 7).await;

    state.add_error_count("/api/Orders", "db <timeout> & retry", 1).await;
    state.flush().await;
}

#[tokio::test]
async fn test_status_page_reflects_traffic() {
    let (state, _clock) = start_manual_state(test_state_config());
    record_sample_traffic(&state).await;

    let bucket = minute_key(test_start_time());
    let html = state.show_html_data();

    assert!(html.starts_with("<html><body><div>ServerStartTime : 2024-05-01 09:30:00<br>"));
    assert!(html.contains("TotalRequestCount : 8<br>"));
    assert!(html.contains("TotalErrorCount : 1<br>"));
    assert!(html.contains(&format!("IntervalRequestData : {{\"{bucket}\":8}}")));
    assert!(html.contains(r#"DetailRequestPageData : {"/api/orders":3,"/index":5}"#));
    assert!(html.contains(r#"DetailErrorPageData : {"/api/orders":1}"#));
    assert!(html.contains(r#"DetailErrorData : {"db &lt;timeout&gt; &amp; retry":1}"#));
    assert!(html.contains(r#"DetailHttpCodeData : {"200":5,"500":1}"#));
    assert!(!html.contains("pulsestate/report"));
    assert!(html.ends_with("</div></body></html>"));

    state.shutdown().await;
}

#[tokio::test]
async fn test_snapshot_matches_status_page() {
    let (state, _clock) = start_manual_state(test_state_config());
    record_sample_traffic(&state).await;

    let snapshot = state.snapshot();
    assert_eq!(snapshot.server_start_time, test_start_time());
    assert_eq!(snapshot.total_request_count, 8);
    assert_eq!(snapshot.total_error_count, 1);
    assert_eq!(snapshot.detail_http_code_data["200"], 5);
    assert_eq!(snapshot.detail_error_data["db <timeout> & retry"], 1);

    let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(json["total_request_count"], 8);
    assert_eq!(json["detail_request_page_data"]["/index"], 5);
    assert_eq!(json["server_start_time"], "2024-05-01T09:30:00");

    // Snapshots are copies; later traffic does not touch them.
    state.add_request_count("/index", 1).await;
    state.flush().await;
    assert_eq!(snapshot.detail_request_page_data["/index"], 5);
    assert_ne!(state.snapshot(), snapshot);

    state.shutdown().await;
}

#[tokio::test]
async fn test_custom_reserved_prefix() {
    let config = StateConfig::from_toml_str(
        r#"
        reserved_prefix = "/internal/"

        [pool]
        enabled = false
        "#,
    )
    .unwrap();
    let (state, _clock) = start_manual_state(config);

    state.add_request_count("/internal/health", 1).await;
    state.add_request_count("/pulsestate/report", 1).await;
    state.add_http_code_count("/internal/health", 200, 1).await;
    state.flush().await;

    let snapshot: StateSnapshot = state.snapshot();
    assert_eq!(snapshot.total_request_count, 1);
    assert!(snapshot.detail_request_page_data.contains_key("/pulsestate/report"));
    assert!(snapshot.detail_http_code_data.is_empty());
    assert_eq!(state.pool_stats().request.reused, 0);

    state.shutdown().await;
}

#[tokio::test]
async fn test_http_code_returns_error_total() {
    let (state, _clock) = start_manual_state(test_state_config());

    assert_eq!(state.add_http_code_count("/index", 404, 1).await, 0);
    state.add_error_count("/index", "not found", 2).await;
    assert_eq!(state.add_http_code_count("/index", 404, 1).await, 2);
    state.flush().await;

    assert_eq!(state.total_error_count(), 2);
    assert_eq!(state.detail_http_code_data().get("404"), 2);
    state.shutdown().await;
}
