//! Bounded single-producer/single-consumer hand-off queue (C5).
//!
//! The producer enqueues parsed records one at a time; the consumer drains
//! the whole backlog in one swap rather than popping record-by-record, so a
//! batch's worth of work hands off to the worker pool in one lock
//! acquisition. Capacity is a soft `FULL` threshold enforced by the
//! producer spin-sleeping, not a hard ring-buffer bound.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::sync::SpinMutex;

/// A bounded FIFO hand-off buffer of `T`. Exactly one producer and one
/// consumer are expected per instance.
pub struct BatchQueue<T> {
    buf: SpinMutex<Vec<T>>,
    full: usize,
    done: AtomicBool,
}

impl<T> BatchQueue<T> {
    pub fn new(full: usize) -> Self {
        assert!(full > 0, "queue FULL threshold must be > 0");
        Self {
            buf: SpinMutex::new(Vec::new()),
            full,
            done: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.full
    }

    /// Push `item`, spin-sleeping at one-second granularity while the
    /// queue is at or above `FULL`. Only the producer thread calls this.
    pub fn enqueue(&self, item: T) {
        while self.is_full() {
            std::thread::sleep(Duration::from_secs(1));
        }
        self.buf.lock().push(item);
    }

    /// Atomically swap the internal backlog into `out`, leaving the
    /// (now-empty) `out` buffer behind internally. `out` must be empty on
    /// entry — any prior contents are dropped by the swap. Only the
    /// consumer thread calls this.
    pub fn retrieve(&self, out: &mut Vec<T>) {
        debug_assert!(out.is_empty(), "retrieve() expects a cleared buffer");
        let mut guard = self.buf.lock();
        std::mem::swap(&mut *guard, out);
    }

    /// Mark the queue as permanently exhausted: the producer has no more
    /// records to push. The consumer keeps draining until `is_empty()` and
    /// `is_done()` are both true.
    pub fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}
