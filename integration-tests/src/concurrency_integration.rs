//! Integration tests for concurrent producers against one state engine

use crate::test_utils::*;
use futures::future::join_all;
use pulsestate_core::{StateConfig, minute_key};
use std::time::Duration;

const PRODUCERS: u64 = 32;
const EVENTS_PER_PRODUCER: u64 = 250;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_lose_no_events() {
    let (state, _clock) = start_manual_state(test_state_config());

    let producers = (0..PRODUCERS).map(|id| {
        let state = state.clone();
        tokio::spawn(async move {
            let page = format!("/Shop/Item{}", id % 4);
            for n in 0..EVENTS_PER_PRODUCER {
                state.add_request_count(&page, 1).await;
                if n % 10 == 0 {
                    state.add_error_count(&page, "timeout", 1).await;
                    state.add_http_code_count(&page, 504, 1).await;
                }
            }
        })
    });
    for result in join_all(producers).await {
        result.unwrap();
    }
    state.flush().await;

    let requests = PRODUCERS * EVENTS_PER_PRODUCER;
    let errors = PRODUCERS * EVENTS_PER_PRODUCER / 10;
    assert_eq!(state.total_request_count(), requests);
    assert_eq!(state.total_error_count(), errors);

    let bucket = minute_key(test_start_time());
    assert_eq!(state.query_interval_request_data(&bucket), requests);
    assert_eq!(state.query_interval_error_data(&bucket), errors);

    let pages = state.detail_request_page_data().snapshot();
    assert_eq!(pages.len(), 4);
    assert_eq!(pages.values().sum::<u64>(), requests);
    assert_eq!(pages["/shop/item0"], requests / 4);

    assert_eq!(state.detail_error_data().get("timeout"), errors);
    assert_eq!(state.detail_http_code_data().get("504"), errors);
    assert_eq!(state.detail_error_page_data().read().total(), errors);

    state.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_request_totals_are_monotonic_per_producer() {
    let (state, _clock) = start_manual_state(test_state_config());

    let producers = (0..8).map(|_| {
        let state = state.clone();
        tokio::spawn(async move {
            let mut last = 0;
            for _ in 0..200 {
                let total = state.add_request_count("/poll", 1).await;
                assert!(total > last, "total went from {last} to {total}");
                last = total;
            }
        })
    });
    for result in join_all(producers).await {
        result.unwrap();
    }

    assert_eq!(state.total_request_count(), 1600);
    state.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_queries_run_while_producers_write() {
    let (state, _clock) = start_manual_state(test_state_config());
    let bucket = minute_key(test_start_time());

    let writer = {
        let state = state.clone();
        tokio::spawn(async move {
            for _ in 0..2000 {
                state.add_request_count("/busy", 1).await;
            }
        })
    };

    let mut previous = 0;
    while !writer.is_finished() {
        let seen = state.query_interval_request_data(&bucket);
        assert!(seen >= previous, "bucket shrank from {previous} to {seen}");
        previous = seen;
        let _ = state.show_html_data();
        tokio::task::yield_now().await;
    }
    writer.await.unwrap();
    state.flush().await;

    assert_eq!(state.query_interval_request_data(&bucket), 2000);
    state.shutdown().await;
}

#[tokio::test]
async fn test_tiny_queue_applies_backpressure_without_loss() {
    let config = StateConfig {
        channel_capacity: 1,
        ..test_state_config()
    };
    let (state, _clock) = start_manual_state(config);

    let producers = (0..4).map(|i| {
        let state = state.clone();
        async move {
            for _ in 0..50 {
                state.add_request_count(&format!("/q{i}"), 2).await;
            }
        }
    });
    tokio::time::timeout(Duration::from_secs(10), join_all(producers))
        .await
        .expect("producers stalled on a full queue");
    state.flush().await;

    assert_eq!(state.total_request_count(), 400);
    assert_eq!(state.detail_request_page_data().read().total(), 400);
    let depths = state.queue_depths();
    assert_eq!(depths.request, 0);
    state.shutdown().await;
}

#[tokio::test]
async fn test_records_are_recycled_under_load() {
    let (state, _clock) = start_manual_state(test_state_config());

    for _ in 0..500 {
        state.add_request_count("/reuse", 1).await;
    }
    state.flush().await;

    let stats = state.pool_stats();
    assert_eq!(stats.request.allocated + stats.request.reused, 500);
    assert!(stats.request.reused > 0);
    assert!(stats.request.idle <= 32);
    state.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_with_producers_in_flight() {
    let (state, _clock) = start_manual_state(test_state_config());

    let producer = {
        let state = state.clone();
        tokio::spawn(async move {
            for _ in 0..1000 {
                state.add_request_count("/late", 1).await;
            }
        })
    };
    tokio::time::sleep(Duration::from_millis(1)).await;
    state.shutdown().await;
    producer.await.unwrap();

    // Totals always count; stores hold whatever reached the worker before it stopped.
    assert_eq!(state.total_request_count(), 1000);
    assert!(state.detail_request_page_data().get("/late") <= 1000);
}
