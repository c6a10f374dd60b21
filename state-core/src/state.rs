//! Server state facade
//!
//! `ServerState` is the only entry point callers need: the dispatch layer reports
//! events through the `add_*` methods, and status pages read through the query
//! and report methods. Reporting never aggregates on the caller's task; it only
//! copies the event into a pooled record and hands it to the aggregation worker.

use crate::clock::{Clock, SystemClock};
use crate::config::StateConfig;
use crate::counter::CounterStore;
use crate::ingest::{self, EnqueueCounters, IngestSenders, KindCounts, QueueDepths};
use crate::pool::{RecordPool, Recycle};
use crate::record::{RecordPoolStats, RecordPools};
use crate::report::{self, StateSnapshot};
use crate::sweeper::{self, EvictionSweeper, SweepReport};
use crate::worker::AggregationWorker;
use crate::{Result, StateError};
use chrono::NaiveDateTime;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The six aggregate views maintained by the worker
#[derive(Debug)]
pub struct StateStores {
    /// Requests per minute, keyed `YYYYMMDDhhmm`
    pub interval_request: CounterStore,
    /// Requests per lower-cased path
    pub detail_request_page: CounterStore,
    /// Errors per minute, keyed `YYYYMMDDhhmm`
    pub interval_error: CounterStore,
    /// Errors per lower-cased path
    pub detail_error_page: CounterStore,
    /// Errors per message text
    pub detail_error: CounterStore,
    /// Responses per decimal status code
    pub detail_http_code: CounterStore,
}

impl StateStores {
    pub fn new() -> Self {
        Self {
            interval_request: CounterStore::new("IntervalRequestData"),
            detail_request_page: CounterStore::new("DetailRequestPageData"),
            interval_error: CounterStore::new("IntervalErrorData"),
            detail_error_page: CounterStore::new("DetailErrorPageData"),
            detail_error: CounterStore::new("DetailErrorData"),
            detail_http_code: CounterStore::new("DetailHttpCodeData"),
        }
    }

    /// Every store, in report order
    pub fn all(&self) -> [&CounterStore; 6] {
        [
            &self.interval_request,
            &self.detail_request_page,
            &self.interval_error,
            &self.detail_error_page,
            &self.detail_error,
            &self.detail_http_code,
        ]
    }
}

impl Default for StateStores {
    fn default() -> Self {
        Self::new()
    }
}

/// Process runtime state: cumulative totals plus the aggregate views
pub struct ServerState {
    config: StateConfig,
    start_time: NaiveDateTime,
    total_request_count: AtomicU64,
    total_error_count: AtomicU64,
    stores: Arc<StateStores>,
    pools: Arc<RecordPools>,
    clock: Arc<dyn Clock>,
    senders: IngestSenders,
    enqueued: EnqueueCounters,
    applied: watch::Receiver<KindCounts>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ServerState {
    /// Build the state and spawn its aggregation worker and eviction sweeper
    /// on the current Tokio runtime.
    pub fn start(config: StateConfig) -> Result<Arc<Self>> {
        Self::start_with_clock(config, Arc::new(SystemClock))
    }

    /// Like [`start`](Self::start), reading wall-clock time from `clock`
    pub fn start_with_clock(config: StateConfig, clock: Arc<dyn Clock>) -> Result<Arc<Self>> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| StateError::NoRuntime)?;

        let stores = Arc::new(StateStores::new());
        let pools = Arc::new(RecordPools::new(&config.pool));
        let (senders, receivers) = ingest::channels(config.channel_capacity);
        let (applied_tx, applied_rx) = watch::channel(KindCounts::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = AggregationWorker::new(
            Arc::clone(&stores),
            Arc::clone(&pools),
            Arc::clone(&clock),
            receivers,
            applied_tx,
            shutdown_rx.clone(),
        );
        let sweeper = EvictionSweeper::new(
            Arc::clone(&stores),
            Arc::clone(&clock),
            config.sweep_interval(),
            config.retention(),
            config.sweep_min_keys,
            shutdown_rx,
        );
        let tasks = vec![runtime.spawn(worker.run()), runtime.spawn(sweeper.run())];

        info!(
            channel_capacity = config.channel_capacity,
            retention_minutes = config.retention_minutes,
            sweep_interval_secs = config.sweep_interval_secs,
            reserved_prefix = %config.reserved_prefix,
            "Server state started"
        );

        Ok(Arc::new(Self {
            start_time: clock.now(),
            config,
            total_request_count: AtomicU64::new(0),
            total_error_count: AtomicU64::new(0),
            stores,
            pools,
            clock,
            senders,
            enqueued: EnqueueCounters::default(),
            applied: applied_rx,
            shutdown: shutdown_tx,
            tasks: Mutex::new(tasks),
        }))
    }

    /// Count `num` requests to `page`, returning the new cumulative request total.
    ///
    /// Pages under the reserved prefix are ignored and the current total is returned.
    /// Waits while the request queue is full.
    pub async fn add_request_count(&self, page: &str, num: u64) -> u64 {
        if self.config.is_reserved(page) {
            return self.total_request_count.load(Ordering::Relaxed);
        }
        let total = saturating_add(&self.total_request_count, num);

        let mut record = self.pools.request.acquire();
        record.fill(page, num);
        self.enqueue(
            &self.senders.request,
            &self.enqueued.request,
            record,
            &self.pools.request,
        )
        .await;
        total
    }

    /// Count `num` occurrences of `error` on `page`, returning the new cumulative error total
    pub async fn add_error_count<E>(&self, page: &str, error: &E, num: u64) -> u64
    where
        E: fmt::Display + ?Sized,
    {
        let total = saturating_add(&self.total_error_count, num);

        let mut record = self.pools.error.acquire();
        record.fill(page, error, num);
        self.enqueue(
            &self.senders.error,
            &self.enqueued.error,
            record,
            &self.pools.error,
        )
        .await;
        total
    }

    /// Count `num` responses with status `code` on `page`.
    ///
    /// Returns the cumulative error total, which this call never changes.
    pub async fn add_http_code_count(&self, page: &str, code: u16, num: u64) -> u64 {
        if !self.config.is_reserved(page) {
            let mut record = self.pools.http_code.acquire();
            record.fill(code, num);
            self.enqueue(
                &self.senders.http_code,
                &self.enqueued.http_code,
                record,
                &self.pools.http_code,
            )
            .await;
        }
        self.total_error_count.load(Ordering::Relaxed)
    }

    async fn enqueue<T: Recycle>(
        &self,
        tx: &mpsc::Sender<Box<T>>,
        enqueued: &AtomicU64,
        record: Box<T>,
        pool: &RecordPool<T>,
    ) {
        match tx.reserve().await {
            Ok(permit) => {
                // Count before the record becomes visible to the worker.
                enqueued.fetch_add(1, Ordering::AcqRel);
                permit.send(record);
            }
            Err(mpsc::error::SendError(())) => {
                debug!("Aggregation worker stopped, dropping event record");
                pool.release(record);
            }
        }
    }

    /// Requests counted in the minute bucket `key`, 0 when unknown
    pub fn query_interval_request_data(&self, key: &str) -> u64 {
        self.stores.interval_request.get(key)
    }

    /// Errors counted in the minute bucket `key`, 0 when unknown
    pub fn query_interval_error_data(&self, key: &str) -> u64 {
        self.stores.interval_error.get(key)
    }

    /// Render every total and store as a small HTML page
    pub fn show_html_data(&self) -> String {
        report::render_html(
            self.start_time,
            self.total_request_count(),
            self.total_error_count(),
            &self.stores,
        )
    }

    /// Copy of all totals and stores
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot::capture(
            self.start_time,
            self.total_request_count(),
            self.total_error_count(),
            &self.stores,
        )
    }

    /// Run one eviction pass now instead of waiting for the sweeper
    pub fn sweep_now(&self) -> SweepReport {
        sweeper::sweep_stores(
            &self.stores,
            self.clock.now(),
            self.config.retention(),
            self.config.sweep_min_keys,
        )
    }

    /// Wait until every event enqueued before this call has been aggregated.
    ///
    /// Each queue is FIFO with one consumer, so reaching a kind's admitted
    /// count means every earlier record of that kind has been applied.
    pub async fn flush(&self) {
        let target = self.enqueued.load();
        let mut applied = self.applied.clone();
        // An error means the worker is gone and nothing more will be applied.
        let _ = applied.wait_for(|n| n.covers(&target)).await;
    }

    /// Stop the worker and sweeper; records already queued are applied first.
    ///
    /// Later reports still update the cumulative totals but reach no store.
    pub async fn shutdown(&self) {
        self.shutdown.send_replace(true);

        let tasks = std::mem::take(&mut *self.tasks.lock().unwrap_or_else(PoisonError::into_inner));
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "State task ended abnormally");
            }
        }
        info!(
            total_requests = self.total_request_count(),
            total_errors = self.total_error_count(),
            "Server state stopped"
        );
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    pub fn start_time(&self) -> NaiveDateTime {
        self.start_time
    }

    pub fn total_request_count(&self) -> u64 {
        self.total_request_count.load(Ordering::Relaxed)
    }

    pub fn total_error_count(&self) -> u64 {
        self.total_error_count.load(Ordering::Relaxed)
    }

    pub fn stores(&self) -> &StateStores {
        &self.stores
    }

    pub fn interval_request_data(&self) -> &CounterStore {
        &self.stores.interval_request
    }

    pub fn detail_request_page_data(&self) -> &CounterStore {
        &self.stores.detail_request_page
    }

    pub fn interval_error_data(&self) -> &CounterStore {
        &self.stores.interval_error
    }

    pub fn detail_error_page_data(&self) -> &CounterStore {
        &self.stores.detail_error_page
    }

    pub fn detail_error_data(&self) -> &CounterStore {
        &self.stores.detail_error
    }

    pub fn detail_http_code_data(&self) -> &CounterStore {
        &self.stores.detail_http_code
    }

    /// Records waiting in each ingestion queue
    pub fn queue_depths(&self) -> QueueDepths {
        self.senders.depths()
    }

    pub fn pool_stats(&self) -> RecordPoolStats {
        self.pools.stats()
    }
}

/// Add to a running total without wrapping; returns the new value
fn saturating_add(total: &AtomicU64, num: u64) -> u64 {
    let previous = total
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |t| {
            Some(t.saturating_add(num))
        })
        .unwrap_or_else(|t| t);
    previous.saturating_add(num)
}

impl fmt::Debug for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerState")
            .field("start_time", &self.start_time)
            .field("total_request_count", &self.total_request_count())
            .field("total_error_count", &self.total_error_count())
            .field("queue_depths", &self.queue_depths())
            .finish_non_exhaustive()
    }
}
