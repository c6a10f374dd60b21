//! Wall-clock source and minute-key formatting

use chrono::{Local, NaiveDateTime};
use std::sync::{Mutex, PoisonError};

/// Layout of interval bucket keys, e.g. `202405011230`
pub const MINUTE_KEY_FORMAT: &str = "%Y%m%d%H%M";

/// Source of local wall-clock time for minute buckets and eviction
pub trait Clock: Send + Sync {
    /// Current local wall-clock time
    fn now(&self) -> NaiveDateTime;
}

/// Clock backed by the operating system's local time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Format a timestamp as a 12-digit minute key
pub fn minute_key(at: NaiveDateTime) -> String {
    at.format(MINUTE_KEY_FORMAT).to_string()
}

/// Parse a minute key back into the start of its minute.
///
/// Only exactly twelve ASCII digits forming a valid date and time are accepted.
pub fn parse_minute_key(key: &str) -> Option<NaiveDateTime> {
    if key.len() != 12 || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(key, MINUTE_KEY_FORMAT).ok()
}
