//! Bounded per-kind ingestion queues

use crate::record::{ErrorRecord, HttpCodeRecord, RequestRecord};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

/// Producer side of the three event queues
#[derive(Debug, Clone)]
pub(crate) struct IngestSenders {
    pub request: mpsc::Sender<Box<RequestRecord>>,
    pub error: mpsc::Sender<Box<ErrorRecord>>,
    pub http_code: mpsc::Sender<Box<HttpCodeRecord>>,
}

/// Consumer side, owned by the aggregation worker
#[derive(Debug)]
pub(crate) struct IngestReceivers {
    pub request: mpsc::Receiver<Box<RequestRecord>>,
    pub error: mpsc::Receiver<Box<ErrorRecord>>,
    pub http_code: mpsc::Receiver<Box<HttpCodeRecord>>,
}

/// Queued-but-unprocessed records per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueDepths {
    pub request: usize,
    pub error: usize,
    pub http_code: usize,
}

/// Records counted per event kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct KindCounts {
    pub request: u64,
    pub error: u64,
    pub http_code: u64,
}

impl KindCounts {
    /// True when every kind has reached `target`
    pub fn covers(&self, target: &KindCounts) -> bool {
        self.request >= target.request
            && self.error >= target.error
            && self.http_code >= target.http_code
    }
}

/// Records admitted to each queue.
///
/// A producer bumps its kind's counter after reserving a slot and before
/// sending, so a queue never holds a record its counter has not seen.
#[derive(Debug, Default)]
pub(crate) struct EnqueueCounters {
    pub request: AtomicU64,
    pub error: AtomicU64,
    pub http_code: AtomicU64,
}

impl EnqueueCounters {
    pub fn load(&self) -> KindCounts {
        KindCounts {
            request: self.request.load(Ordering::Acquire),
            error: self.error.load(Ordering::Acquire),
            http_code: self.http_code.load(Ordering::Acquire),
        }
    }
}

/// Create one queue of `capacity` records per event kind
pub(crate) fn channels(capacity: usize) -> (IngestSenders, IngestReceivers) {
    let (request_tx, request_rx) = mpsc::channel(capacity);
    let (error_tx, error_rx) = mpsc::channel(capacity);
    let (http_code_tx, http_code_rx) = mpsc::channel(capacity);

    (
        IngestSenders {
            request: request_tx,
            error: error_tx,
            http_code: http_code_tx,
        },
        IngestReceivers {
            request: request_rx,
            error: error_rx,
            http_code: http_code_rx,
        },
    )
}

impl IngestSenders {
    pub fn depths(&self) -> QueueDepths {
        QueueDepths {
            request: depth(&self.request),
            error: depth(&self.error),
            http_code: depth(&self.http_code),
        }
    }
}

fn depth<T>(tx: &mpsc::Sender<T>) -> usize {
    if tx.is_closed() {
        return 0;
    }
    tx.max_capacity() - tx.capacity()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channels_are_fifo_per_kind() {
        let (tx, mut rx) = channels(8);
        for i in 0..3 {
            let mut record = Box::<RequestRecord>::default();
            record.fill("/a", i);
            tx.request.send(record).await.unwrap();
        }
        for i in 0..3 {
            assert_eq!(rx.request.recv().await.unwrap().num, i);
        }
    }

    #[tokio::test]
    async fn test_depths_track_queued_records() {
        let (tx, mut rx) = channels(4);
        tx.error.send(Box::default()).await.unwrap();
        tx.error.send(Box::default()).await.unwrap();
        tx.http_code.send(Box::default()).await.unwrap();

        let depths = tx.depths();
        assert_eq!(depths.request, 0);
        assert_eq!(depths.error, 2);
        assert_eq!(depths.http_code, 1);

        rx.error.recv().await.unwrap();
        assert_eq!(tx.depths().error, 1);
    }

    #[test]
    fn test_full_queue_applies_backpressure() {
        let (tx, mut rx) = channels(1);
        tokio_test::block_on(tx.request.send(Box::default())).unwrap();

        let mut blocked = tokio_test::task::spawn(tx.request.send(Box::default()));
        tokio_test::assert_pending!(blocked.poll());

        tokio_test::block_on(rx.request.recv()).unwrap();
        assert!(blocked.is_woken());
        tokio_test::assert_ready_ok!(blocked.poll());
        assert_eq!(tx.depths().request, 1);
    }

    #[test]
    fn test_counts_cover_each_kind_separately() {
        let target = KindCounts {
            request: 2,
            error: 1,
            http_code: 0,
        };
        let ahead_on_one_kind = KindCounts {
            request: 5,
            error: 0,
            http_code: 9,
        };
        assert!(!ahead_on_one_kind.covers(&target));
        assert!(
            KindCounts {
                request: 2,
                error: 1,
                http_code: 0,
            }
            .covers(&target)
        );
    }
}
