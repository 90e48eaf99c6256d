//! Gradient correctness (invariant 7): one training step must move the
//! logistic model's log-likelihood toward zero (i.e. reduce cross-entropy
//! loss) for a sufficiently small learning rate.

use sketchtrain::config::{Params, Variant};
use sketchtrain::{io, Binary, CountSketch, Model, Scratch, WorkerHeaps};

fn fixed_seeds(start: u32) -> impl FnMut() -> u32 {
    let mut x = start;
    move || {
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        x
    }
}

#[test]
fn single_gradient_step_reduces_cross_entropy_loss() {
    let mut cfg = Params::for_variant(Variant::Binary);
    cfg.lr = 0.01;
    cfg.d = 1 << 14;
    cfg.n = 3;

    let sketch = CountSketch::new(cfg.k, cfg.d, cfg.n, fixed_seeds(0xA5A5_5A5A)).unwrap();
    let heaps: WorkerHeaps<i32> = WorkerHeaps::new(Binary::heap_count(&cfg), cfg.topk_capacity);
    let model = Binary;
    let mut scratch = Scratch::default();
    let record = io::parse_binary_line("1 10:1.0 20:-0.5", 1).unwrap();

    let (ll_before, _) = model.process(&sketch, &heaps, 0, &record, false, &cfg, &mut scratch);
    model.process(&sketch, &heaps, 0, &record, true, &cfg, &mut scratch);
    let (ll_after, _) = model.process(&sketch, &heaps, 0, &record, false, &cfg, &mut scratch);

    // `process` returns log-likelihood (label*ln(p) + (1-label)*ln(1-p)), so
    // cross-entropy loss is its negation: loss goes down iff log-likelihood
    // goes up.
    assert!(
        ll_after > ll_before,
        "expected log-likelihood to increase after a gradient step: before={ll_before} after={ll_after}"
    );
}

#[test]
fn repeated_small_steps_monotonically_improve_likelihood() {
    let mut cfg = Params::for_variant(Variant::Binary);
    cfg.lr = 0.005;
    cfg.d = 1 << 14;
    cfg.n = 3;

    let sketch = CountSketch::new(cfg.k, cfg.d, cfg.n, fixed_seeds(0x1111_2222)).unwrap();
    let heaps: WorkerHeaps<i32> = WorkerHeaps::new(Binary::heap_count(&cfg), cfg.topk_capacity);
    let model = Binary;
    let mut scratch = Scratch::default();
    let record = io::parse_binary_line("1 3:0.8 4:0.2", 1).unwrap();

    let mut prev = f32::MIN;
    for _ in 0..20 {
        let (ll, _) = model.process(&sketch, &heaps, 0, &record, false, &cfg, &mut scratch);
        assert!(ll >= prev - 1e-4, "log-likelihood regressed: prev={prev} now={ll}");
        prev = ll;
        model.process(&sketch, &heaps, 0, &record, true, &cfg, &mut scratch);
    }
}
