//! Periodic eviction of stale interval buckets

use crate::clock::{Clock, parse_minute_key};
use crate::counter::CounterStore;
use crate::state::StateStores;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Keys removed by one eviction pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub request_removed: usize,
    pub error_removed: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.request_removed + self.error_removed
    }
}

/// Remove minute buckets older than `retention` from an interval store.
///
/// Nothing is scanned unless the store holds more than `min_keys` keys. Keys
/// that do not parse as minute keys are always removed. The scan runs under
/// the shared lock; each removal then takes the write lock on its own.
pub fn sweep_interval_store(
    store: &CounterStore,
    now: NaiveDateTime,
    retention: chrono::Duration,
    min_keys: usize,
) -> usize {
    let stale: Vec<String> = {
        let entries = store.read();
        if entries.len() <= min_keys {
            return 0;
        }
        entries
            .keys()
            .filter(|key| match parse_minute_key(key) {
                Some(bucket) => now - bucket > retention,
                None => true,
            })
            .map(str::to_string)
            .collect()
    };

    for key in &stale {
        store.remove(key);
    }
    stale.len()
}

/// Sweep both interval stores
pub(crate) fn sweep_stores(
    stores: &StateStores,
    now: NaiveDateTime,
    retention: chrono::Duration,
    min_keys: usize,
) -> SweepReport {
    SweepReport {
        request_removed: sweep_interval_store(&stores.interval_request, now, retention, min_keys),
        error_removed: sweep_interval_store(&stores.interval_error, now, retention, min_keys),
    }
}

/// Sleeps for `period`, sweeps, and schedules the next run until shutdown
pub(crate) struct EvictionSweeper {
    stores: Arc<StateStores>,
    clock: Arc<dyn Clock>,
    period: Duration,
    retention: chrono::Duration,
    min_keys: usize,
    shutdown: watch::Receiver<bool>,
}

impl EvictionSweeper {
    pub fn new(
        stores: Arc<StateStores>,
        clock: Arc<dyn Clock>,
        period: Duration,
        retention: chrono::Duration,
        min_keys: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            stores,
            clock,
            period,
            retention,
            min_keys,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        debug!(period_secs = self.period.as_secs(), "Eviction sweeper started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.period) => {}
                _ = self.shutdown.changed() => break,
            }

            let report = sweep_stores(&self.stores, self.clock.now(), self.retention, self.min_keys);
            if report.total() > 0 {
                info!(
                    request_removed = report.request_removed,
                    error_removed = report.error_removed,
                    "Evicted stale interval buckets"
                );
            } else {
                debug!("Eviction sweep found nothing to remove");
            }
        }

        debug!("Eviction sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::minute_key;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 30)
            .unwrap()
    }

    fn minutes_ago(m: i64) -> String {
        minute_key(now() - chrono::Duration::minutes(m))
    }

    fn retention() -> chrono::Duration {
        chrono::Duration::minutes(60)
    }

    #[test]
    fn test_small_store_is_not_scanned() {
        let store = CounterStore::new("IntervalRequestData");
        for m in 0..5 {
            store.set(&minutes_ago(200 + m), 1);
        }
        store.set("garbage", 1);

        assert_eq!(sweep_interval_store(&store, now(), retention(), 10), 0);
        assert_eq!(store.len(), 6);
    }

    #[test]
    fn test_exactly_threshold_keys_is_not_scanned() {
        let store = CounterStore::new("IntervalRequestData");
        for m in 0..10 {
            store.set(&minutes_ago(100 + m), 1);
        }
        assert_eq!(sweep_interval_store(&store, now(), retention(), 10), 0);
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn test_stale_and_malformed_keys_removed() {
        let store = CounterStore::new("IntervalRequestData");
        for m in 0..8 {
            store.set(&minutes_ago(m), 10 + m as u64);
        }
        for m in [61, 90, 240] {
            store.set(&minutes_ago(m), 1);
        }
        store.set("not-a-minute", 5);

        let removed = sweep_interval_store(&store, now(), retention(), 10);
        assert_eq!(removed, 4);
        assert_eq!(store.len(), 8);
        for m in 0..8 {
            assert_eq!(store.get(&minutes_ago(m)), 10 + m as u64);
        }
        assert_eq!(store.get("not-a-minute"), 0);
        assert_eq!(store.get(&minutes_ago(90)), 0);
    }

    #[test]
    fn test_retention_boundary_uses_bucket_start() {
        let store = CounterStore::new("IntervalErrorData");
        // The bucket 60 minutes back started 60m30s ago, so it is just past retention;
        // the one 59 minutes back is inside it.
        for m in 50..=60 {
            store.set(&minutes_ago(m), 1);
        }
        let removed = sweep_interval_store(&store, now(), retention(), 10);
        assert_eq!(removed, 1);
        assert_eq!(store.get(&minutes_ago(59)), 1);
        assert_eq!(store.get(&minutes_ago(60)), 0);
    }

    #[test]
    fn test_future_buckets_are_kept() {
        let store = CounterStore::new("IntervalRequestData");
        for m in 0..12 {
            store.set(&minutes_ago(-m), 1);
        }
        assert_eq!(sweep_interval_store(&store, now(), retention(), 10), 0);
        assert_eq!(store.len(), 12);
    }

    #[test]
    fn test_sweep_stores_reports_both_views() {
        let stores = StateStores::new();
        for m in 0..11 {
            stores.interval_request.set(&minutes_ago(m * 10), 1);
            stores.interval_error.set(&minutes_ago(m), 1);
        }
        let report = sweep_stores(&stores, now(), retention(), 10);
        // 60..=100 minutes back are stale in the request view
        assert_eq!(report.request_removed, 5);
        assert_eq!(report.error_removed, 0);
        assert_eq!(report.total(), 5);
    }
}
