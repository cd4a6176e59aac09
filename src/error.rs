//! Error types for abundance-statistics

use thiserror::Error;

/// Errors raised by measurement-group construction, multiple testing
/// correction, and the comparison pipeline.
///
/// Degenerate measurements (fewer than two replicates, zero variance in both
/// groups) are not errors; they flow through the pipeline as NaN. Everything
/// in this enum is a precondition violation surfaced to the caller.
#[derive(Error, Debug)]
pub enum StatsError {
    #[error("Significance level must be in (0, 1), got {alpha}")]
    InvalidAlpha { alpha: f64 },

    #[error("Entity mismatch: {reason}")]
    EntityMismatch { reason: String },

    #[error("Invalid p-value at index {index}: {value}")]
    InvalidPValue { index: usize, value: f64 },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },
}

/// Result type alias for abundance-statistics operations
pub type Result<T> = std::result::Result<T, StatsError>;
