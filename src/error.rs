//! Library-level error type.
//!
//! Internal modules return `TrainError`; the binary wraps calls into it with
//! `anyhow::Context` to attach file paths / record numbers before printing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not allocate resource: {0}")]
    ResourceExhausted(String),

    #[error("persisted file does not match the running configuration: {0}")]
    PersistenceMismatch(String),

    #[error("malformed input record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
