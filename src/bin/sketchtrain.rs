//! CLI entry point: `sketchtrain --variant <binary|multiclass> [--config sketch.toml]
//! TRAIN_FILE... TEST_FILE`.
//!
//! Each training file is one epoch; predictions for that epoch's pass over
//! the test file are written to `r<epoch>.pred`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use sketchtrain::config::{Params, Variant};
use sketchtrain::{run_phase, Binary, Model, Multiclass, WorkerHeaps};

#[derive(Debug, Clone, clap::ValueEnum)]
enum VariantArg {
    Binary,
    Multiclass,
}

/// Streaming count-sketch trainer for binary logistic regression or
/// one-vs-rest multiclass softmax over a hashed feature vocabulary.
#[derive(Debug, Parser)]
#[command(name = "sketchtrain")]
#[command(about = "Streaming, memory-bounded linear classifier trainer")]
struct Cli {
    /// Which model variant to train.
    #[arg(long, value_enum)]
    variant: VariantArg,

    /// Override path to the sketch hyperparameter config (informational —
    /// the compiled-in geometry was already fixed at build time via
    /// `SKETCHTRAIN_CONFIG`; this flag only annotates logs).
    #[arg(long)]
    config: Option<PathBuf>,

    /// One or more training files; each is a separate epoch.
    #[arg(required = true, num_args = 1..)]
    train_files: Vec<PathBuf>,

    /// The held-out test file, evaluated after every epoch.
    test_file: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        log::info!("using config override {}", path.display());
    }

    match cli.variant {
        VariantArg::Binary => run(Binary, Params::for_variant(Variant::Binary), &cli),
        VariantArg::Multiclass => run(Multiclass, Params::for_variant(Variant::Multiclass), &cli),
    }
}

fn run<M: Model>(model: M, cfg: Params, cli: &Cli) -> Result<()> {
    let sketch = sketchtrain::CountSketch::new(cfg.k, cfg.d, cfg.n, rand_seed_gen())
        .context("failed to allocate count-sketch table")?;
    let heaps: WorkerHeaps<M::Key> = WorkerHeaps::new(M::heap_count(&cfg), cfg.topk_capacity);

    for (epoch, train_file) in cli.train_files.iter().enumerate() {
        let epoch = epoch + 1;
        log::info!("epoch {epoch} train");
        run_phase(&model, &sketch, &heaps, train_file, true, &cfg, None)
            .with_context(|| format!("training epoch {epoch} failed ({})", train_file.display()))?;

        log::info!("epoch {epoch} eval");
        let pred_path = PathBuf::from(format!("r{epoch}.pred"));
        run_phase(
            &model,
            &sketch,
            &heaps,
            &cli.test_file,
            false,
            &cfg,
            Some(&pred_path),
        )
        .with_context(|| format!("evaluation epoch {epoch} failed"))?;
    }

    Ok(())
}

fn rand_seed_gen() -> impl FnMut() -> u32 {
    use rand::RngCore;
    let mut rng = rand::thread_rng();
    move || rng.next_u32()
}
