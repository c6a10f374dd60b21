//! Free-list pool for event records
//!
//! Pooling only saves allocations: a pool built with [`RecordPool::unpooled`]
//! hands out fresh records and drops released ones, with identical behaviour.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

/// A value that can be cleared and handed out again
pub trait Recycle: Default + Send {
    /// Reset to the empty state, keeping allocated capacity
    fn recycle(&mut self);
}

/// Allocation counters for one pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Records created because the free list was empty
    pub allocated: u64,
    /// Records served from the free list
    pub reused: u64,
    /// Records currently idle in the free list
    pub idle: usize,
}

/// Bounded free list of boxed records
#[derive(Debug)]
pub struct RecordPool<T> {
    idle: Mutex<Vec<Box<T>>>,
    max_idle: usize,
    allocated: AtomicU64,
    reused: AtomicU64,
}

impl<T: Recycle> RecordPool<T> {
    /// Pool keeping at most `max_idle` released records
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::with_capacity(max_idle.min(64))),
            max_idle,
            allocated: AtomicU64::new(0),
            reused: AtomicU64::new(0),
        }
    }

    /// Pool that never keeps anything: every acquire allocates
    pub fn unpooled() -> Self {
        Self::new(0)
    }

    /// Take an empty record; the caller owns it exclusively until [`release`](Self::release)
    pub fn acquire(&self) -> Box<T> {
        let recycled = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        match recycled {
            Some(record) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                record
            }
            None => {
                self.allocated.fetch_add(1, Ordering::Relaxed);
                Box::default()
            }
        }
    }

    /// Return a record for reuse; dropped when the pool is full
    pub fn release(&self, mut record: Box<T>) {
        if self.max_idle == 0 {
            return;
        }
        record.recycle();
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(record);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            idle: self.idle.lock().unwrap_or_else(PoisonError::into_inner).len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Scratch {
        text: String,
        hits: u64,
    }

    impl Recycle for Scratch {
        fn recycle(&mut self) {
            self.text.clear();
            self.hits = 0;
        }
    }

    #[test]
    fn test_acquire_allocates_when_empty() {
        let pool: RecordPool<Scratch> = RecordPool::new(4);
        let record = pool.acquire();
        assert!(record.text.is_empty());
        assert_eq!(pool.stats().allocated, 1);
        assert_eq!(pool.stats().reused, 0);
    }

    #[test]
    fn test_release_then_acquire_reuses_cleared_record() {
        let pool: RecordPool<Scratch> = RecordPool::new(4);
        let mut record = pool.acquire();
        record.text.push_str("/some/long/path/that/allocates");
        record.hits = 7;
        let capacity = record.text.capacity();
        pool.release(record);
        assert_eq!(pool.stats().idle, 1);

        let again = pool.acquire();
        assert!(again.text.is_empty());
        assert_eq!(again.hits, 0);
        assert_eq!(again.text.capacity(), capacity);

        let stats = pool.stats();
        assert_eq!(stats.allocated, 1);
        assert_eq!(stats.reused, 1);
        assert_eq!(stats.idle, 0);
    }

    #[test]
    fn test_idle_list_is_bounded() {
        let pool: RecordPool<Scratch> = RecordPool::new(2);
        let records: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        for record in records {
            pool.release(record);
        }
        assert_eq!(pool.stats().idle, 2);
    }

    #[test]
    fn test_unpooled_never_reuses() {
        let pool: RecordPool<Scratch> = RecordPool::unpooled();
        for _ in 0..3 {
            let record = pool.acquire();
            pool.release(record);
        }
        let stats = pool.stats();
        assert_eq!(stats.allocated, 3);
        assert_eq!(stats.reused, 0);
        assert_eq!(stats.idle, 0);
    }

    #[test]
    fn test_concurrent_acquire_release() {
        use std::sync::Arc;

        let pool: Arc<RecordPool<Scratch>> = Arc::new(RecordPool::new(16));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = Arc::clone(&pool);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut record = pool.acquire();
                        assert!(record.text.is_empty());
                        record.text.push_str(&i.to_string());
                        pool.release(record);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.allocated + stats.reused, 800);
        assert!(stats.idle <= 16);
    }
}
