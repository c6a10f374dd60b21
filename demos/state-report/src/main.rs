//! State report demo
//!
//! Starts a state engine, pushes synthetic web traffic through it from
//! several concurrent producers, then prints the minute query results,
//! the HTML status page, and a JSON snapshot.
//!
//! Pass a TOML file path as the first argument to override the defaults.

use anyhow::{Context, Result};
use futures::future::join_all;
use pulsestate_core::{Clock, ServerState, StateConfig, SystemClock, minute_key};
use pulsestate_logging::{LogOutput, LoggingConfig, init_logging};
use std::sync::Arc;
use tracing::info;

const PAGES: [&str; 4] = ["/Index", "/Products/List", "/Cart", "/pulsestate/report"];
const PRODUCERS: usize = 8;
const ROUNDS: usize = 100;

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = init_logging(&LoggingConfig {
        output: LogOutput::Stderr,
        ..Default::default()
    })
    .context("Failed to initialize logging")?;

    let config = match std::env::args().nth(1) {
        Some(path) => StateConfig::from_file(&path)
            .with_context(|| format!("Failed to load state config from {path}"))?,
        None => pulsestate_core::default_config(),
    };

    let clock = Arc::new(SystemClock);
    let state = ServerState::start_with_clock(config, clock.clone())
        .context("Failed to start state engine")?;

    let producers = (0..PRODUCERS).map(|id| {
        let state = Arc::clone(&state);
        tokio::spawn(async move { simulate_traffic(&state, id).await })
    });
    for result in join_all(producers).await {
        result.context("Traffic producer panicked")?;
    }
    state.flush().await;

    let bucket = minute_key(clock.now());
    info!(
        bucket = %bucket,
        requests = state.query_interval_request_data(&bucket),
        errors = state.query_interval_error_data(&bucket),
        "Current minute"
    );

    println!("{}", state.show_html_data());
    println!(
        "{}",
        state
            .snapshot()
            .to_json_pretty()
            .context("Failed to serialize snapshot")?
    );
    info!(queues = ?state.queue_depths(), pools = ?state.pool_stats(), "Engine internals");

    state.shutdown().await;
    Ok(())
}

async fn simulate_traffic(state: &ServerState, producer: usize) {
    for round in 0..ROUNDS {
        let page = PAGES[(producer + round) % PAGES.len()];
        state.add_request_count(page, 1).await;

        let code = match (producer * ROUNDS + round) % 20 {
            0 => 500,
            1 => 404,
            _ => 200,
        };
        if code >= 400 {
            state
                .add_error_count(page, &format!("HTTP {code} on {page}"), 1)
                .await;
        }
        state.add_http_code_count(page, code, 1).await;
    }
}
