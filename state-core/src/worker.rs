//! Single-consumer aggregation of queued event records

use crate::clock::{Clock, minute_key};
use crate::ingest::{IngestReceivers, KindCounts};
use crate::record::{ErrorRecord, HttpCodeRecord, RecordPools, RequestRecord};
use crate::state::StateStores;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Drains every ingestion queue and applies records to the counter stores
pub(crate) struct AggregationWorker {
    stores: Arc<StateStores>,
    pools: Arc<RecordPools>,
    clock: Arc<dyn Clock>,
    receivers: IngestReceivers,
    minute: MinuteKeyCache,
    applied: watch::Sender<KindCounts>,
    shutdown: watch::Receiver<bool>,
}

impl AggregationWorker {
    pub fn new(
        stores: Arc<StateStores>,
        pools: Arc<RecordPools>,
        clock: Arc<dyn Clock>,
        receivers: IngestReceivers,
        applied: watch::Sender<KindCounts>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            stores,
            pools,
            clock,
            receivers,
            minute: MinuteKeyCache::default(),
            applied,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        info!("Aggregation worker started");

        loop {
            tokio::select! {
                Some(record) = self.receivers.request.recv() => self.apply_request(record),
                Some(record) = self.receivers.error.recv() => self.apply_error(record),
                Some(record) = self.receivers.http_code.recv() => self.apply_http_code(record),
                _ = self.shutdown.changed() => break,
                else => break,
            }
        }

        let drained = self.drain();
        info!(drained, "Aggregation worker stopped");
    }

    /// Apply whatever is still queued after refusing new records
    fn drain(&mut self) -> usize {
        self.receivers.request.close();
        self.receivers.error.close();
        self.receivers.http_code.close();

        let mut drained = 0;
        while let Ok(record) = self.receivers.request.try_recv() {
            self.apply_request(record);
            drained += 1;
        }
        while let Ok(record) = self.receivers.error.try_recv() {
            self.apply_error(record);
            drained += 1;
        }
        while let Ok(record) = self.receivers.http_code.try_recv() {
            self.apply_http_code(record);
            drained += 1;
        }
        drained
    }

    fn apply_request(&mut self, record: Box<RequestRecord>) {
        self.stores.detail_request_page.add(&record.url, record.num);

        let key = self.minute.key_for(self.clock.now());
        self.stores.interval_request.add(key, record.num);

        self.pools.request.release(record);
        self.applied.send_modify(|n| n.request += 1);
    }

    fn apply_error(&mut self, record: Box<ErrorRecord>) {
        self.stores.detail_error_page.add(&record.url, record.num);
        self.stores.detail_error.add(&record.message, record.num);

        let key = self.minute.key_for(self.clock.now());
        self.stores.interval_error.add(key, record.num);

        self.pools.error.release(record);
        self.applied.send_modify(|n| n.error += 1);
    }

    fn apply_http_code(&mut self, record: Box<HttpCodeRecord>) {
        let key = record.code.to_string();
        self.stores.detail_http_code.add(&key, record.num);

        self.pools.http_code.release(record);
        self.applied.send_modify(|n| n.http_code += 1);
    }
}

/// Formats the minute key once per wall-clock minute
#[derive(Debug, Default)]
struct MinuteKeyCache {
    minute: Option<i64>,
    key: String,
}

impl MinuteKeyCache {
    fn key_for(&mut self, now: NaiveDateTime) -> &str {
        let minute = now.and_utc().timestamp().div_euclid(60);
        if self.minute != Some(minute) {
            self.key = minute_key(now);
            self.minute = Some(minute);
            debug!(key = %self.key, "Opened interval bucket");
        }
        &self.key
    }
}
