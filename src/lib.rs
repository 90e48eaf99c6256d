//! sketchtrain: a streaming, memory-bounded trainer for high-dimensional
//! linear classifiers over a hashed feature vocabulary.
//!
//! Two model variants share one pipeline: binary logistic regression over
//! explicit `(feature_id, value)` pairs, and one-vs-rest multiclass softmax
//! over string features. Both ride on a Count-Sketch weight oracle ([`sketch`])
//! and a Top-K heavy-hitters heap ([`topk`]) that together keep the working
//! set bounded regardless of how large the feature vocabulary actually is.

pub mod config;
pub mod error;
pub mod hash;
pub mod io;
pub mod pipeline;
mod queue;
pub mod simd;
pub mod sketch;
pub mod stats;
pub mod sync;
pub mod topk;

#[macro_use]
mod macros;

pub use config::{Params, Variant};
pub use error::TrainError;
pub use pipeline::{run_phase, Binary, Model, Multiclass, Scratch, WorkerHeaps};
pub use sketch::{CountSketch, HashCache};
pub use topk::TopKHeap;
