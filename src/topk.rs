//! Top-K heavy-hitters heap (C3).
//!
//! A fixed-capacity min-heap keyed on `|value|`, with two companion maps:
//! `dict` (key → heap position, for O(1) membership/update) and `fdict`
//! (key → last signed value observed, independent of heap admission). The
//! heap never reheapifies before it is full, and once full it only evicts
//! when a new magnitude clears the current minimum by the `EPS` hysteresis
//! band — this keeps near-tied features from thrashing in and out on every
//! batch.

use std::collections::HashMap;
use std::fs::File;
use std::hash::Hash;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::TrainError;
use crate::stat_inc;

/// Multiplicative hysteresis band: a new value must exceed `minimum * EPS`
/// to evict, and a re-pushed key only reheapifies once its magnitude moves
/// outside `[old/EPS, old*EPS]`.
pub const EPS: f32 = 1.05;

struct Entry<K> {
    mag: f32,
    key: K,
}

/// Round-trip a heap key to/from one text line, for [`TopKHeap::save`]/[`TopKHeap::load`].
pub trait PersistKey: Sized {
    fn to_line(&self) -> String;
    fn from_line(line: &str) -> Result<Self, TrainError>;
}

impl PersistKey for i32 {
    fn to_line(&self) -> String {
        self.to_string()
    }
    fn from_line(line: &str) -> Result<Self, TrainError> {
        line.trim()
            .parse()
            .map_err(|_| TrainError::PersistenceMismatch(format!("bad i32 key: {line:?}")))
    }
}

impl<const LEN: usize> PersistKey for [u8; LEN] {
    fn to_line(&self) -> String {
        self.iter().map(|b| format!("{b:02x}")).collect()
    }
    fn from_line(line: &str) -> Result<Self, TrainError> {
        let line = line.trim();
        if line.len() != LEN * 2 {
            return Err(TrainError::PersistenceMismatch(format!(
                "expected {} hex chars for a {LEN}-byte key, got {}",
                LEN * 2,
                line.len()
            )));
        }
        let mut out = [0u8; LEN];
        for (i, slot) in out.iter_mut().enumerate() {
            let byte_str = &line[i * 2..i * 2 + 2];
            *slot = u8::from_str_radix(byte_str, 16)
                .map_err(|_| TrainError::PersistenceMismatch(format!("bad hex byte {byte_str:?}")))?;
        }
        Ok(out)
    }
}

pub struct TopKHeap<K> {
    capacity: usize,
    heap: Vec<Entry<K>>,
    dict: HashMap<K, usize>,
    fdict: HashMap<K, f32>,
}

impl<K: Eq + Hash + Clone> TopKHeap<K> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "topk capacity must be > 0");
        Self {
            capacity,
            heap: Vec::with_capacity(capacity),
            dict: HashMap::with_capacity(capacity),
            fdict: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    pub fn contains(&self, key: &K) -> bool {
        self.dict.contains_key(key)
    }

    /// Last signed value recorded for `key`, regardless of current heap
    /// membership.
    pub fn value_for(&self, key: &K) -> Option<f32> {
        self.fdict.get(key).copied()
    }

    /// Smallest magnitude currently in the heap, or 0 if not yet full.
    pub fn minimum(&self) -> f32 {
        if self.is_full() {
            self.heap[0].mag
        } else {
            0.0
        }
    }

    /// All keys currently resident in the heap (for union-of-heaps active
    /// sets during inference).
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.heap.iter().map(|e| &e.key)
    }

    /// Admit `value` (signed) for `key`. `fdict` is updated unconditionally;
    /// heap admission follows the EPS-hysteresis rule described in the
    /// module docs.
    pub fn push(&mut self, key: K, value: f32) {
        self.fdict.insert(key.clone(), value);
        let m = value.abs();

        if let Some(&p) = self.dict.get(&key) {
            let c = self.heap[p].mag;
            if !self.is_full() {
                self.heap[p].mag = m;
            } else if m >= c * EPS || m <= c / EPS {
                self.heap[p].mag = m;
                self.reheapify_from(p);
            }
            return;
        }

        if !self.is_full() {
            self.heap.push(Entry { mag: m, key: key.clone() });
            let pos = self.heap.len() - 1;
            self.dict.insert(key, pos);
            if self.is_full() {
                self.build_heap();
            }
            return;
        }

        if m > self.minimum() * EPS {
            let evicted = self.heap[0].key.clone();
            self.dict.remove(&evicted);
            self.heap[0] = Entry { mag: m, key: key.clone() };
            self.dict.insert(key, 0);
            self.sink(0);
            stat_inc!(topk_evictions);
        }
    }

    fn build_heap(&mut self) {
        let n = self.heap.len();
        for i in (0..n / 2).rev() {
            self.sink(i);
        }
        self.reindex();
    }

    fn reindex(&mut self) {
        for (i, e) in self.heap.iter().enumerate() {
            self.dict.insert(e.key.clone(), i);
        }
    }

    fn reheapify_from(&mut self, p: usize) {
        let after_up = self.bubble_up(p);
        self.sink(after_up);
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.dict.insert(self.heap[a].key.clone(), a);
        self.dict.insert(self.heap[b].key.clone(), b);
    }

    fn bubble_up(&mut self, mut i: usize) -> usize {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[i].mag < self.heap[parent].mag {
                self.swap(i, parent);
                i = parent;
            } else {
                break;
            }
        }
        i
    }

    fn sink(&mut self, mut i: usize) {
        let n = self.heap.len();
        loop {
            let l = 2 * i + 1;
            let r = 2 * i + 2;
            let mut smallest = i;
            if l < n && self.heap[l].mag < self.heap[smallest].mag {
                smallest = l;
            }
            if r < n && self.heap[r].mag < self.heap[smallest].mag {
                smallest = r;
            }
            if smallest == i {
                break;
            }
            self.swap(i, smallest);
            i = smallest;
        }
    }

    /// Assert the min-heap order property and `dict`'s position index both
    /// hold. Test-only; walks the whole heap, so not for hot-path use.
    #[cfg(test)]
    pub(crate) fn check(&self) {
        for i in 0..self.heap.len() {
            let l = 2 * i + 1;
            let r = 2 * i + 2;
            if l < self.heap.len() {
                assert!(self.heap[i].mag <= self.heap[l].mag, "heap order violated at {i}/{l}");
            }
            if r < self.heap.len() {
                assert!(self.heap[i].mag <= self.heap[r].mag, "heap order violated at {i}/{r}");
            }
        }
        assert_eq!(self.dict.len(), self.heap.len(), "dict/heap size mismatch");
        for (i, e) in self.heap.iter().enumerate() {
            assert_eq!(self.dict[&e.key], i, "dict position stale for heap slot {i}");
        }
    }
}

impl<K: Eq + Hash + Clone + PersistKey> TopKHeap<K> {
    /// Persist current heap contents: line 1 is the count, followed by one
    /// `(key, signed_value)` line pair per entry.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TrainError> {
        let file = File::create(path)?;
        let mut w = BufWriter::new(file);
        writeln!(w, "{}", self.heap.len())?;
        for entry in &self.heap {
            let value = self.fdict.get(&entry.key).copied().unwrap_or(0.0);
            writeln!(w, "{}", entry.key.to_line())?;
            writeln!(w, "{value}")?;
        }
        Ok(())
    }

    /// Load a heap of `capacity`, replaying the persisted entries directly
    /// (they were already selected as the top-K, so admission re-runs the
    /// EPS rule rather than trusting the file blindly — corrupt or
    /// hand-edited files can't exceed capacity this way).
    pub fn load(capacity: usize, path: impl AsRef<Path>) -> Result<Self, TrainError> {
        let file = File::open(path)?;
        let mut lines = BufReader::new(file).lines();
        let count: usize = lines
            .next()
            .ok_or_else(|| TrainError::PersistenceMismatch("empty top-k file".into()))??
            .trim()
            .parse()
            .map_err(|_| TrainError::PersistenceMismatch("bad top-k count".into()))?;

        let mut heap = TopKHeap::new(capacity);
        for _ in 0..count {
            let key_line = lines
                .next()
                .ok_or_else(|| TrainError::PersistenceMismatch("truncated top-k file".into()))??;
            let value_line = lines
                .next()
                .ok_or_else(|| TrainError::PersistenceMismatch("truncated top-k file".into()))??;
            let key = K::from_line(&key_line)?;
            let value: f32 = value_line
                .trim()
                .parse()
                .map_err(|_| TrainError::PersistenceMismatch(format!("bad value: {value_line:?}")))?;
            heap.push(key, value);
        }
        Ok(heap)
    }
}
