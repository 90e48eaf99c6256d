//! Build-time and run-time knobs.
//!
//! The numeric sketch geometry (`D`, `N`, learning rate, Top-K capacity,
//! thread count, ...) is baked in at compile time from `sketch.toml` by
//! `build.rs`, the same way the teacher bakes allocator size classes in from
//! `rtmalloc.toml` — these values shape fixed-size allocations and must be
//! known before the first `CountSketch` is built. `K` (the number of
//! classes) is the one knob that genuinely varies per run (binary vs.
//! multiclass), so it stays a runtime field on [`Params`] instead.

use crate::error::TrainError;

include!(concat!(env!("OUT_DIR"), "/config_gen.rs"));

/// Which model variant to train.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    Binary,
    Multiclass,
}

/// Resolved run parameters: compile-time defaults plus CLI overrides.
#[derive(Clone, Debug)]
pub struct Params {
    pub variant: Variant,
    pub k: usize,
    pub d: usize,
    pub n: usize,
    pub lr: f32,
    pub topk_capacity: usize,
    pub key_len: usize,
    pub threads: usize,
    pub max_features: usize,
    pub queue_capacity: usize,
}

impl Params {
    /// Parameters for `variant`, using the compiled-in defaults for
    /// everything `build.rs` resolved from `sketch.toml`.
    pub fn for_variant(variant: Variant) -> Self {
        let k = match variant {
            Variant::Binary => 1,
            Variant::Multiclass => DEFAULT_MULTICLASS_K,
        };
        Self {
            variant,
            k,
            d: D,
            n: N,
            lr: LR,
            topk_capacity: TOPK_CAPACITY,
            key_len: KEY_LEN,
            threads: THREADS,
            max_features: MAX_FEATURES,
            queue_capacity: QUEUE_CAPACITY,
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Reject geometry that would make the sketch or pipeline meaningless
    /// (a zero in any of these turns into a division-by-zero, an empty
    /// table, or a channel that can never hold a batch).
    pub fn validate(&self) -> Result<(), TrainError> {
        let checks: &[(&str, usize)] = &[
            ("k", self.k),
            ("d", self.d),
            ("n", self.n),
            ("threads", self.threads),
            ("topk_capacity", self.topk_capacity),
            ("queue_capacity", self.queue_capacity),
        ];
        for (name, value) in checks {
            if *value == 0 {
                return Err(TrainError::InvalidConfig(format!("{name} must be > 0, got 0")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_variant_forces_k_equal_one() {
        let p = Params::for_variant(Variant::Binary);
        assert_eq!(p.k, 1);
    }

    #[test]
    fn multiclass_variant_uses_compiled_default_k() {
        let p = Params::for_variant(Variant::Multiclass);
        assert_eq!(p.k, DEFAULT_MULTICLASS_K);
    }

    #[test]
    fn with_k_overrides_default() {
        let p = Params::for_variant(Variant::Multiclass).with_k(50);
        assert_eq!(p.k, 50);
    }

    #[test]
    fn validate_accepts_compiled_defaults() {
        assert!(Params::for_variant(Variant::Binary).validate().is_ok());
        assert!(Params::for_variant(Variant::Multiclass).validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_threads() {
        let p = Params::for_variant(Variant::Multiclass).with_threads(0);
        let err = p.validate().unwrap_err();
        assert!(matches!(err, TrainError::InvalidConfig(_)));
    }

    #[test]
    fn validate_rejects_zero_k() {
        let p = Params::for_variant(Variant::Multiclass).with_k(0);
        let err = p.validate().unwrap_err();
        assert!(matches!(err, TrainError::InvalidConfig(_)));
    }
}
