//! Training-run counters.
//!
//! All counters use `Relaxed` ordering — they are observational only and not
//! used as synchronization primitives. Obtain a [`Snapshot`] with
//! [`snapshot()`]. Individual counter loads are individually atomic but not
//! globally consistent with each other.

use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct Stats {
    /// Total records processed across all phases.
    pub records_processed: AtomicU64,
    /// Total sketch `update_block`/`update` calls issued.
    pub sketch_updates: AtomicU64,
    /// Total Top-K `push` calls issued.
    pub topk_pushes: AtomicU64,
    /// Top-K pushes that caused an eviction (heap was full and replaced its minimum).
    pub topk_evictions: AtomicU64,
    /// Batches drained by the consumer.
    pub batches_drained: AtomicU64,
}

impl Stats {
    const fn new() -> Self {
        Self {
            records_processed: AtomicU64::new(0),
            sketch_updates: AtomicU64::new(0),
            topk_pushes: AtomicU64::new(0),
            topk_evictions: AtomicU64::new(0),
            batches_drained: AtomicU64::new(0),
        }
    }
}

pub(crate) static STATS: Stats = Stats::new();

/// A point-in-time snapshot of all training counters.
#[derive(Clone, Copy, Debug, Default)]
pub struct Snapshot {
    pub records_processed: u64,
    pub sketch_updates: u64,
    pub topk_pushes: u64,
    pub topk_evictions: u64,
    pub batches_drained: u64,
}

/// Load all counters with `Relaxed` ordering and return a [`Snapshot`].
pub fn snapshot() -> Snapshot {
    let s = &STATS;
    Snapshot {
        records_processed: s.records_processed.load(Ordering::Relaxed),
        sketch_updates: s.sketch_updates.load(Ordering::Relaxed),
        topk_pushes: s.topk_pushes.load(Ordering::Relaxed),
        topk_evictions: s.topk_evictions.load(Ordering::Relaxed),
        batches_drained: s.batches_drained.load(Ordering::Relaxed),
    }
}
