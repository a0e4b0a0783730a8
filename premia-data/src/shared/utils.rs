use std::{
    fmt::Debug,
    sync::atomic::{AtomicU64, Ordering},
};

use chrono::Utc;

pub fn current_timestamp_utc() -> u64 {
    Utc::now().timestamp_millis() as u64
}

pub fn current_timestamp_secs() -> u64 {
    Utc::now().timestamp() as u64
}

/*----- */
// Clock
/*----- */
pub trait Clock: Send + Sync + Debug {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        current_timestamp_utc()
    }
}

// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self(AtomicU64::new(start_ms))
    }

    pub fn set(&self, now_ms: u64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by_ms: u64) {
        self.0.fetch_add(by_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Split `items` into consecutive batches of at most `size` (a size of zero is treated as one).
pub fn batches<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items
        .chunks(size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

pub fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
