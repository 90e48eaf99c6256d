//! Streaming training pipeline (C6): producer/consumer skeleton shared by
//! both model variants.
//!
//! `run_phase` is the single copy of "read records, hand batches to a
//! worker pool, gradient-update the sketch, maintain Top-K" that both
//! [`Binary`] and [`Multiclass`] ride on — they differ only in their
//! `Model::parse`/`Model::process` implementations, never in the
//! threading or queueing around them.

use std::fs::File;
use std::hash::Hash;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use crate::config::{Params, KEY_LEN};
use crate::error::TrainError;
use crate::io;
use crate::queue::BatchQueue;
use crate::simd::{self, Block};
use crate::sketch::{CountSketch, HashCache};
use crate::sync::SpinMutex;
use crate::topk::TopKHeap;
use crate::{stat_add, stat_inc};

/// Per-worker scratch reused across the records in one batch chunk: hash
/// caches for the current record's features, plus a logits buffer for the
/// Multiclass forward/backward pass. `Binary` leaves `logits` empty.
#[derive(Default)]
pub struct Scratch {
    caches: Vec<HashCache>,
    logits: Vec<Block>,
}

/// Per-worker (or, for `Binary`, single shared) Top-K heap partitioning.
///
/// `Multiclass` uses one heap per worker thread to avoid cross-worker
/// contention during training, reconciling with a union at inference time
/// (see [`WorkerHeaps::contains_any`]). `Binary` uses a single logical
/// partition — every worker index resolves to the same heap, `SpinMutex`
/// serializing the otherwise-racy concurrent access the original reference
/// implementation left unsynchronized.
pub struct WorkerHeaps<K> {
    heaps: Vec<SpinMutex<TopKHeap<K>>>,
}

impl<K: Eq + Hash + Clone> WorkerHeaps<K> {
    pub fn new(partitions: usize, capacity: usize) -> Self {
        let partitions = partitions.max(1);
        Self {
            heaps: (0..partitions)
                .map(|_| SpinMutex::new(TopKHeap::new(capacity)))
                .collect(),
        }
    }

    pub fn partitions(&self) -> usize {
        self.heaps.len()
    }

    pub fn worker(&self, idx: usize) -> &SpinMutex<TopKHeap<K>> {
        &self.heaps[idx % self.heaps.len()]
    }

    /// Union (OR) of `contains(key)` across every partition's heap — the
    /// active-set reconciliation for inference.
    pub fn contains_any(&self, key: &K) -> bool {
        self.heaps.iter().any(|h| h.lock().contains(key))
    }
}

/// The capability set shared by `Binary` and `Multiclass`: parse one input
/// line into a record, then run one record's forward/backward pass.
pub trait Model: Send + Sync {
    type Key: Eq + Hash + Clone + Send + Sync;
    type Record: Send;

    /// Parse one input line. `line_no` is the source line's 1-indexed
    /// position, threaded through purely for error diagnostics.
    fn parse(line: &str, line_no: usize, cfg: &Params) -> Result<Self::Record, TrainError>;

    /// Number of Top-K heap partitions this variant wants.
    fn heap_count(cfg: &Params) -> usize;

    /// Run one record's forward pass (and, if `train`, backward pass and
    /// Top-K maintenance). Returns this record's loss contribution and,
    /// when `!train`, the prediction line to emit.
    #[allow(clippy::too_many_arguments)]
    fn process(
        &self,
        sketch: &CountSketch,
        heaps: &WorkerHeaps<Self::Key>,
        worker: usize,
        record: &Self::Record,
        train: bool,
        cfg: &Params,
        scratch: &mut Scratch,
    ) -> (f32, Option<String>);
}

/// Binary logistic regression over explicit `(feature_id, value)` pairs.
pub struct Binary;

impl Model for Binary {
    type Key = i32;
    type Record = io::BinaryRecord;

    fn parse(line: &str, line_no: usize, _cfg: &Params) -> Result<Self::Record, TrainError> {
        io::parse_binary_line(line, line_no)
    }

    /// A single logical partition: the original reference implementation
    /// never shares the logistic Top-K heap across threads, so the binary
    /// phase must never run more workers than heap partitions (see
    /// `run_phase`'s worker-count calculation).
    fn heap_count(_cfg: &Params) -> usize {
        1
    }

    fn process(
        &self,
        sketch: &CountSketch,
        heaps: &WorkerHeaps<i32>,
        worker: usize,
        record: &io::BinaryRecord,
        train: bool,
        cfg: &Params,
        scratch: &mut Scratch,
    ) -> (f32, Option<String>) {
        scratch.caches.clear();
        for (id, _) in &record.features {
            let mut hc = HashCache::with_capacity(cfg.n);
            sketch.precompute(&id.to_le_bytes(), &mut hc);
            scratch.caches.push(hc);
        }

        let heap = heaps.worker(worker);
        let logit: f32 = {
            let guard = heap.lock();
            record
                .features
                .iter()
                .map(|(id, value)| guard.value_for(id).unwrap_or(0.0) * value)
                .sum()
        };
        let sigmoid = 1.0 / (1.0 + (-logit).exp());
        let label = record.label;
        let loss = label * sigmoid.ln() + (1.0 - label) * (1.0 - sigmoid).ln();

        if !train {
            return (loss, Some(format!("{label} {sigmoid}")));
        }

        let gradient = label - sigmoid;
        let mut guard = heap.lock();
        for ((id, value), hc) in record.features.iter().zip(scratch.caches.iter()) {
            let new_weight = sketch.update(hc, cfg.lr * gradient * value);
            stat_inc!(sketch_updates);
            guard.push(*id, new_weight);
            stat_inc!(topk_pushes);
        }

        (loss, None)
    }
}

/// One-vs-rest multiclass softmax over fixed-width string feature keys.
pub struct Multiclass;

impl Model for Multiclass {
    type Key = [u8; KEY_LEN];
    type Record = io::MulticlassRecord;

    fn parse(line: &str, line_no: usize, cfg: &Params) -> Result<Self::Record, TrainError> {
        io::parse_multiclass_line(line, line_no, cfg.max_features, cfg.k)
    }

    fn heap_count(cfg: &Params) -> usize {
        cfg.threads
    }

    fn process(
        &self,
        sketch: &CountSketch,
        heaps: &WorkerHeaps<[u8; KEY_LEN]>,
        worker: usize,
        record: &io::MulticlassRecord,
        train: bool,
        cfg: &Params,
        scratch: &mut Scratch,
    ) -> (f32, Option<String>) {
        let cnt = sketch.cnt();

        scratch.caches.clear();
        for key in &record.features {
            let mut hc = HashCache::with_capacity(cfg.n);
            sketch.precompute(key, &mut hc);
            scratch.caches.push(hc);
        }

        scratch.logits.clear();
        scratch.logits.resize(cnt, Block::ZERO);

        let own_heap = heaps.worker(worker);
        for (key, hc) in record.features.iter().zip(scratch.caches.iter()) {
            // Training reads only this worker's own heap (the heavy-hitter
            // projection); inference unions every worker's heap, since a
            // prediction is not tied to the worker that trained a feature.
            let active = if train {
                own_heap.lock().contains(key)
            } else {
                heaps.contains_any(key)
            };
            if active {
                for b in 0..cnt {
                    scratch.logits[b] = scratch.logits[b] + sketch.retrieve_block(hc, b);
                }
            }
        }

        let (max_value, argmax) = simd::max(&scratch.logits, cfg.k);
        simd::softmax_inplace(&mut scratch.logits, cfg.k, max_value);
        let p = simd::get(&scratch.logits, record.label);
        let loss = (p + 1e-10).ln();
        simd::add_at(&mut scratch.logits, record.label, -1.0);

        if !train {
            return (loss, Some(format!("{} {}", record.label, argmax)));
        }

        for (_key, hc) in record.features.iter().zip(scratch.caches.iter()) {
            for b in 0..cnt {
                sketch.update_block(hc, b, scratch.logits[b] * -cfg.lr);
                stat_inc!(sketch_updates);
            }
        }

        let mut heap = own_heap.lock();
        for (key, hc) in record.features.iter().zip(scratch.caches.iter()) {
            let mut l1 = Block::ZERO;
            for b in 0..cnt {
                l1 = l1 + simd::abs(sketch.retrieve_block(hc, b));
            }
            let value: f32 = (0..8).map(|lane| l1[lane]).sum();
            heap.push(*key, value);
            stat_inc!(topk_pushes);
        }

        (loss, None)
    }
}

/// Run one TRAIN or EVAL phase: a fresh producer/consumer pair reading
/// `input_path`, writing predictions to `pred_path` when `!train`.
///
/// A malformed record aborts the whole phase: the spec treats training on
/// corrupt input as worse than stopping, so a parse failure on any worker
/// propagates out through the batch's thread handles and fails the call.
pub fn run_phase<M: Model>(
    model: &M,
    sketch: &CountSketch,
    heaps: &WorkerHeaps<M::Key>,
    input_path: impl AsRef<Path>,
    train: bool,
    cfg: &Params,
    pred_path: Option<&Path>,
) -> Result<(), TrainError> {
    cfg.validate()?;

    let queue: BatchQueue<(usize, String)> = BatchQueue::new(cfg.queue_capacity);
    let pred_writer = pred_path
        .map(|p| File::create(p).map(|f| SpinMutex::new(BufWriter::new(f))))
        .transpose()?;
    let input_path = input_path.as_ref();

    // Never run more concurrent workers than the model has heap
    // partitions: a heap touched by more than one worker would need
    // cross-worker synchronization the pipeline doesn't otherwise provide
    // (see `Binary::heap_count`, which pins this to 1).
    let workers = M::heap_count(cfg).max(1);

    std::thread::scope(|scope| -> Result<(), TrainError> {
        let producer = scope.spawn(|| -> Result<(), TrainError> {
            for (idx, line) in io::lines(input_path)?.enumerate() {
                queue.enqueue((idx + 1, line?));
            }
            queue.mark_done();
            Ok(())
        });

        let mut cnt: u64 = 0;
        loop {
            let producer_running = !queue.is_done();
            if queue.is_empty() && !producer_running {
                break;
            }
            if !queue.is_full() && producer_running {
                std::thread::sleep(Duration::from_secs(1));
                continue;
            }

            let mut batch: Vec<(usize, String)> = Vec::new();
            queue.retrieve(&mut batch);
            if batch.is_empty() {
                continue;
            }
            stat_add!(batches_drained, 1);
            cnt += batch.len() as u64;

            let chunk_size = batch.len().div_ceil(workers).max(1);
            let loss: f32 = std::thread::scope(|inner| -> Result<f32, TrainError> {
                let handles: Vec<_> = batch
                    .chunks(chunk_size)
                    .enumerate()
                    .map(|(worker_id, chunk)| {
                        let pred_writer = pred_writer.as_ref();
                        inner.spawn(move || -> Result<f32, TrainError> {
                            let mut scratch = Scratch::default();
                            let mut local_loss = 0.0f32;
                            for (line_no, line) in chunk {
                                let record = M::parse(line, *line_no, cfg)?;
                                let (loss, pred) = model.process(
                                    sketch, heaps, worker_id, &record, train, cfg, &mut scratch,
                                );
                                local_loss += loss;
                                stat_inc!(records_processed);
                                if let (Some(text), Some(writer)) = (pred, pred_writer) {
                                    let mut guard = writer.lock();
                                    let _ = writeln!(guard, "{text}");
                                }
                            }
                            Ok(local_loss)
                        })
                    })
                    .collect();
                let mut total = 0.0f32;
                for h in handles {
                    total += h.join().expect("worker thread panicked")?;
                }
                Ok(total)
            })?;

            if train {
                let avg_neg_loss = -loss / batch.len() as f32;
                log::info!("{cnt}\t{avg_neg_loss}");
            } else {
                log::debug!("{cnt}\trecords evaluated");
            }
        }

        producer.join().expect("producer thread panicked")?;
        Ok(())
    })
}
