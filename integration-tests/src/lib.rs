//! Integration tests for the PulseState runtime state engine
//!
//! These tests drive the state facade the way a web server would: many
//! concurrent producers, a real Tokio runtime, configuration loaded from
//! files, and logging routed through `pulsestate-logging`.

pub mod concurrency_integration;
pub mod eviction_integration;
pub mod logging_integration;
pub mod report_integration;

/// Common test utilities for integration tests
pub mod test_utils {
    use chrono::{NaiveDate, NaiveDateTime};
    use pulsestate_core::{ManualClock, PoolConfig, ServerState, StateConfig};
    use std::sync::Arc;
    use std::time::Duration;

    /// Fixed wall-clock time every manual clock starts at
    pub fn test_start_time() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|day| day.and_hms_opt(9, 30, 0))
            .unwrap_or_default()
    }

    /// Create a test-friendly state config with small queues and pools
    pub fn test_state_config() -> StateConfig {
        StateConfig {
            channel_capacity: 16, // Small queues so producers hit backpressure
            pool: PoolConfig {
                enabled: true,
                max_idle: 32,
            },
            ..StateConfig::default()
        }
    }

    /// Start a state engine driven by a manual clock
    pub fn start_manual_state(config: StateConfig) -> (Arc<ServerState>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(test_start_time()));
        let state = ServerState::start_with_clock(config, clock.clone())
            .unwrap_or_else(|e| panic!("Failed to start state engine: {e}"));
        (state, clock)
    }

    /// Wait for a condition with timeout
    pub async fn wait_for_condition<F, Fut>(
        mut condition: F,
        timeout_duration: Duration,
        check_interval: Duration,
    ) -> Result<(), Box<dyn std::error::Error>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let start = tokio::time::Instant::now();
        while start.elapsed() < timeout_duration {
            if condition().await {
                return Ok(());
            }
            tokio::time::sleep(check_interval).await;
        }
        Err("Condition timeout".into())
    }
}
