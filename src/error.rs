//! Error types for orthant.

use thiserror::Error;

/// Errors that can occur during training, hashing, querying, or persistence.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Invalid parameter value (out-of-range code width, sample size, etc.).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dataset problem: dimension mismatch, non-finite scalar, empty dataset.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Eigendecomposition or SVD did not converge.
    #[error("training failed: {0}")]
    Training(String),

    /// I/O error (file open, read, write, short read).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialized stream inconsistent with its own announced layout.
    #[error("format error: {0}")]
    Format(String),

    /// Operation invoked in the wrong lifecycle state.
    #[error("invalid state: operation requires a {expected} index, but the index is {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Result type alias for orthant operations.
pub type Result<T> = std::result::Result<T, IndexError>;
