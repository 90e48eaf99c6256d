//! Output determinism (invariant 8): with fixed seeds, identical input
//! produces byte-identical persisted sketch contents across independent
//! runs. Binary training is single-worker by construction (its heap has
//! exactly one partition, see `Binary::heap_count`), so this needs no
//! `cfg.threads` tuning to hold.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use sketchtrain::config::{Params, Variant};
use sketchtrain::{run_phase, Binary, CountSketch, WorkerHeaps};

fn fixed_seeds(start: u32) -> impl FnMut() -> u32 {
    let mut x = start;
    move || {
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        x
    }
}

fn temp_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("determinism-{tag}-{}.txt", std::process::id()))
}

#[test]
fn identical_input_and_seeds_produce_identical_sketch() {
    let mut cfg = Params::for_variant(Variant::Binary);
    cfg.d = 1 << 12;
    cfg.n = 3;
    cfg.queue_capacity = 4;

    let train_path = temp_path("train");
    {
        let mut f = File::create(&train_path).unwrap();
        for i in 0..20 {
            let label = if i % 2 == 0 { 1 } else { -1 };
            writeln!(f, "{label} 1:{:.3} 2:{:.3}", i as f32 * 0.1, -(i as f32) * 0.05).unwrap();
        }
    }

    let run_once = |out_path: &std::path::Path| {
        let sketch = CountSketch::new(cfg.k, cfg.d, cfg.n, fixed_seeds(0x9E37_79B9)).unwrap();
        let heaps: WorkerHeaps<i32> = WorkerHeaps::new(Binary::heap_count(&cfg), cfg.topk_capacity);
        run_phase(&Binary, &sketch, &heaps, &train_path, true, &cfg, None).unwrap();
        sketch.save(out_path).unwrap();
    };

    let out_a = temp_path("a");
    let out_b = temp_path("b");
    run_once(&out_a);
    run_once(&out_b);

    let bytes_a = std::fs::read(&out_a).unwrap();
    let bytes_b = std::fs::read(&out_b).unwrap();
    assert_eq!(bytes_a, bytes_b, "identical seeds/input must yield identical sketch contents");

    std::fs::remove_file(&train_path).ok();
    std::fs::remove_file(&out_a).ok();
    std::fs::remove_file(&out_b).ok();
}
