use serde::Serialize;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Default)]
struct InnerMetrics {
    rows_extracted: AtomicU64,
    rows_valid: AtomicU64,
    rows_rejected: AtomicU64,
    rows_loaded_stg: AtomicU64,
    rows_loaded_dlq: AtomicU64,
    dlq_duplicates_removed: AtomicU64,
    retry_count: AtomicU64,
    failed_units: AtomicU64,
}

/// Run-wide counters shared by every unit.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<InnerMetrics>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub rows_extracted: u64,
    pub rows_valid: u64,
    pub rows_rejected: u64,
    pub rows_loaded_stg: u64,
    pub rows_loaded_dlq: u64,
    pub dlq_duplicates_removed: u64,
    pub retry_count: u64,
    pub failed_units: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Metrics {
            inner: Arc::new(InnerMetrics::default()),
        }
    }

    pub fn increment_extracted(&self, count: u64) {
        self.inner.rows_extracted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_split(&self, valid: u64, rejected: u64) {
        self.inner.rows_valid.fetch_add(valid, Ordering::Relaxed);
        self.inner.rows_rejected.fetch_add(rejected, Ordering::Relaxed);
    }

    pub fn increment_loaded_stg(&self, count: u64) {
        self.inner.rows_loaded_stg.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_loaded_dlq(&self, count: u64) {
        self.inner.rows_loaded_dlq.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_dlq_removed(&self, count: u64) {
        self.inner
            .dlq_duplicates_removed
            .fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_retries(&self, count: u64) {
        self.inner.retry_count.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_failed_units(&self, count: u64) {
        self.inner.failed_units.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rows_extracted: self.inner.rows_extracted.load(Ordering::Relaxed),
            rows_valid: self.inner.rows_valid.load(Ordering::Relaxed),
            rows_rejected: self.inner.rows_rejected.load(Ordering::Relaxed),
            rows_loaded_stg: self.inner.rows_loaded_stg.load(Ordering::Relaxed),
            rows_loaded_dlq: self.inner.rows_loaded_dlq.load(Ordering::Relaxed),
            dlq_duplicates_removed: self.inner.dlq_duplicates_removed.load(Ordering::Relaxed),
            retry_count: self.inner.retry_count.load(Ordering::Relaxed),
            failed_units: self.inner.failed_units.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
