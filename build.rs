use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Default)]
struct ConfigSection {
    d: Option<usize>,
    n: Option<usize>,
    lr: Option<f32>,
    topk_capacity: Option<usize>,
    key_len: Option<usize>,
    threads: Option<usize>,
    max_features: Option<usize>,
    queue_capacity: Option<usize>,
    k: Option<usize>,
}

#[derive(Deserialize, Default)]
struct Config {
    #[serde(default)]
    config: ConfigSection,
}

struct Resolved {
    d: usize,
    n: usize,
    lr: f32,
    topk_capacity: usize,
    key_len: usize,
    threads: usize,
    max_features: usize,
    queue_capacity: usize,
    k: usize,
}

fn resolve(cfg: &ConfigSection) -> Resolved {
    let d = cfg.d.unwrap_or(16_777_215);
    let n = cfg.n.unwrap_or(3);
    let lr = cfg.lr.unwrap_or(0.01);
    let topk_capacity = cfg.topk_capacity.unwrap_or(1_048_575);
    let key_len = cfg.key_len.unwrap_or(12);
    let threads = cfg.threads.unwrap_or(8);
    let max_features = cfg.max_features.unwrap_or(1024);
    let queue_capacity = cfg.queue_capacity.unwrap_or(64);
    let k = cfg.k.unwrap_or(193);

    assert!(d > 0, "config.d must be > 0");
    assert!(n > 0, "config.n must be > 0");
    assert!(lr > 0.0, "config.lr must be > 0");
    assert!(topk_capacity > 0, "config.topk_capacity must be > 0");
    assert!(key_len > 0, "config.key_len must be > 0");
    assert!(threads > 0, "config.threads must be > 0");
    assert!(max_features > 0, "config.max_features must be > 0");
    assert!(queue_capacity > 0, "config.queue_capacity must be > 0");
    assert!(k > 0, "config.k must be > 0");

    Resolved {
        d,
        n,
        lr,
        topk_capacity,
        key_len,
        threads,
        max_features,
        queue_capacity,
        k,
    }
}

fn default_config_path() -> String {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap();
    format!("{}/sketch.toml", manifest_dir)
}

fn generate(cfg: &Resolved, out_path: &Path) {
    let code = format!(
        "// Auto-generated by build.rs. Do not edit.\n\n\
         pub const AVX: usize = 8;\n\
         pub const D: usize = {};\n\
         pub const N: usize = {};\n\
         pub const LR: f32 = {};\n\
         pub const TOPK_CAPACITY: usize = {};\n\
         pub const KEY_LEN: usize = {};\n\
         pub const THREADS: usize = {};\n\
         pub const MAX_FEATURES: usize = {};\n\
         pub const QUEUE_CAPACITY: usize = {};\n\
         pub const DEFAULT_MULTICLASS_K: usize = {};\n",
        cfg.d, cfg.n, cfg.lr, cfg.topk_capacity, cfg.key_len, cfg.threads, cfg.max_features,
        cfg.queue_capacity, cfg.k,
    );
    fs::write(out_path, code).expect("failed to write config_gen.rs");
}

fn main() {
    println!("cargo:rerun-if-env-changed=SKETCHTRAIN_CONFIG");

    let out_dir = env::var("OUT_DIR").unwrap();
    let config_path = env::var("SKETCHTRAIN_CONFIG").unwrap_or_else(|_| default_config_path());
    println!("cargo:rerun-if-changed={}", config_path);

    let content = fs::read_to_string(&config_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {}", config_path, e));
    let config: Config = toml::from_str(&content).expect("failed to parse TOML config");
    let resolved = resolve(&config.config);

    generate(&resolved, &Path::new(&out_dir).join("config_gen.rs"));
}
