//! Event records carried from producers to the aggregation worker

use crate::config::PoolConfig;
use crate::pool::{PoolStats, RecordPool, Recycle};
use serde::Serialize;
use std::fmt::{self, Write};

/// A completed request
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    /// Lower-cased request path
    pub url: String,
    pub num: u64,
}

/// An error raised while serving a request
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Lower-cased request path
    pub url: String,
    /// Display text of the error, as reported
    pub message: String,
    pub num: u64,
}

/// An HTTP status code sent for a request; counted per code, not per path
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct HttpCodeRecord {
    pub code: u16,
    pub num: u64,
}

impl RequestRecord {
    pub fn fill(&mut self, page: &str, num: u64) {
        push_lowercase(&mut self.url, page);
        self.num = num;
    }
}

impl ErrorRecord {
    pub fn fill(&mut self, page: &str, error: &(impl fmt::Display + ?Sized), num: u64) {
        push_lowercase(&mut self.url, page);
        // Writing into a String cannot fail.
        let _ = write!(self.message, "{error}");
        self.num = num;
    }
}

impl HttpCodeRecord {
    pub fn fill(&mut self, code: u16, num: u64) {
        self.code = code;
        self.num = num;
    }
}

impl Recycle for RequestRecord {
    fn recycle(&mut self) {
        self.url.clear();
        self.num = 0;
    }
}

impl Recycle for ErrorRecord {
    fn recycle(&mut self) {
        self.url.clear();
        self.message.clear();
        self.num = 0;
    }
}

impl Recycle for HttpCodeRecord {
    fn recycle(&mut self) {
        self.code = 0;
        self.num = 0;
    }
}

fn push_lowercase(dst: &mut String, src: &str) {
    if src.is_ascii() {
        dst.extend(src.chars().map(|c| c.to_ascii_lowercase()));
    } else {
        dst.extend(src.chars().flat_map(char::to_lowercase));
    }
}

/// One pool per event kind
#[derive(Debug)]
pub struct RecordPools {
    pub request: RecordPool<RequestRecord>,
    pub error: RecordPool<ErrorRecord>,
    pub http_code: RecordPool<HttpCodeRecord>,
}

/// Pool counters for every event kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecordPoolStats {
    pub request: PoolStats,
    pub error: PoolStats,
    pub http_code: PoolStats,
}

impl RecordPools {
    pub fn new(config: &PoolConfig) -> Self {
        if config.enabled {
            Self {
                request: RecordPool::new(config.max_idle),
                error: RecordPool::new(config.max_idle),
                http_code: RecordPool::new(config.max_idle),
            }
        } else {
            Self {
                request: RecordPool::unpooled(),
                error: RecordPool::unpooled(),
                http_code: RecordPool::unpooled(),
            }
        }
    }

    pub fn stats(&self) -> RecordPoolStats {
        RecordPoolStats {
            request: self.request.stats(),
            error: self.error.stats(),
            http_code: self.http_code.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_record_lowercases_url() {
        let mut record = RequestRecord::default();
        record.fill("/Home/Index", 3);
        assert_eq!(record.url, "/home/index");
        assert_eq!(record.num, 3);
    }

    #[test]
    fn test_non_ascii_url_lowercased() {
        let mut record = RequestRecord::default();
        record.fill("/ÜBER/Straße", 1);
        assert_eq!(record.url, "/über/straße");
    }

    #[test]
    fn test_error_record_keeps_message_case() {
        let err = std::io::Error::other("Disk Full");
        let mut record = ErrorRecord::default();
        record.fill("/Upload", &err, 2);
        assert_eq!(record.url, "/upload");
        assert_eq!(record.message, "Disk Full");
        assert_eq!(record.num, 2);
    }

    #[test]
    fn test_http_code_record_fill() {
        let mut record = HttpCodeRecord::default();
        record.fill(404, 3);
        assert_eq!(record.code, 404);
        assert_eq!(record.num, 3);
    }

    #[test]
    fn test_recycle_clears_fields() {
        let mut record = ErrorRecord::default();
        record.fill("/a", "boom", 9);
        record.recycle();
        assert_eq!(record, ErrorRecord::default());

        let mut record = HttpCodeRecord::default();
        record.fill(500, 9);
        record.recycle();
        assert_eq!(record, HttpCodeRecord::default());
    }

    #[test]
    fn test_disabled_pools_do_not_keep_records() {
        let pools = RecordPools::new(&PoolConfig {
            enabled: false,
            max_idle: 100,
        });
        let record = pools.request.acquire();
        pools.request.release(record);
        assert_eq!(pools.stats().request.idle, 0);
    }
}
