// Offer cache metrics collection
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lock-free counters describing what the offer cache has done since start.
///
/// Counters are bumped from inside the cache's critical sections, so a
/// snapshot taken afterwards never shows an operation half-recorded.
#[derive(Debug)]
pub struct CacheMetrics {
    // Producer side
    pushed: AtomicU64,
    replaced: AtomicU64,
    evicted: AtomicU64,

    // Rescind side
    rescinded: AtomicU64,
    rescind_misses: AtomicU64,

    // Consumer side
    popped: AtomicU64,
    handed_off: AtomicU64,
    restored: AtomicU64,

    start_time: SystemTime,
}

/// Point-in-time view of the cache counters and occupancy
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,

    pub len: usize,
    pub capacity: usize,
    pub waiting: usize,

    pub pushed: u64,
    pub replaced: u64,
    pub evicted: u64,
    pub rescinded: u64,
    pub rescind_misses: u64,
    pub popped: u64,
    pub handed_off: u64,
    pub restored: u64,

    /// Fraction of distinct pushed offers that reached a worker
    pub delivery_ratio: f64,
}

/// Occupancy figures only the cache itself knows
#[derive(Debug, Clone, Copy, Default)]
pub struct Occupancy {
    pub len: usize,
    pub capacity: usize,
    pub waiting: usize,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self {
            pushed: AtomicU64::new(0),
            replaced: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
            rescinded: AtomicU64::new(0),
            rescind_misses: AtomicU64::new(0),
            popped: AtomicU64::new(0),
            handed_off: AtomicU64::new(0),
            restored: AtomicU64::new(0),
            start_time: SystemTime::now(),
        }
    }

    pub fn record_push(&self) {
        self.pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_replace(&self) {
        self.replaced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evicted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rescind(&self, removed: bool) {
        if removed {
            self.rescinded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rescind_misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_pop(&self) {
        self.popped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hand_off(&self) {
        self.handed_off.fetch_add(1, Ordering::Relaxed);
    }

    /// An offer handed to an abandoned waiter went back into the cache
    pub fn record_restore(&self) {
        self.restored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, occupancy: Occupancy) -> MetricsSnapshot {
        let pushed = self.pushed.load(Ordering::Relaxed);
        let popped = self.popped.load(Ordering::Relaxed);

        let delivery_ratio = if pushed > 0 {
            popped as f64 / pushed as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            timestamp: Utc::now(),
            uptime_seconds: self.start_time.elapsed().unwrap_or_default().as_secs(),
            len: occupancy.len,
            capacity: occupancy.capacity,
            waiting: occupancy.waiting,
            pushed,
            replaced: self.replaced.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            rescinded: self.rescinded.load(Ordering::Relaxed),
            rescind_misses: self.rescind_misses.load(Ordering::Relaxed),
            popped,
            handed_off: self.handed_off.load(Ordering::Relaxed),
            restored: self.restored.load(Ordering::Relaxed),
            delivery_ratio,
        }
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}
