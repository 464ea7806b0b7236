//! Error types for the cortex-coda library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum CodaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Degenerate composition: {0}")]
    DegenerateComposition(String),

    #[error("Invalid composition: {0}")]
    InvalidComposition(String),

    #[error("Insufficient sample for group '{group}': {rows} rows, need at least {required}")]
    InsufficientSample {
        group: String,
        rows: usize,
        required: usize,
    },

    #[error("Rank-deficient design: {0}")]
    RankDeficientDesign(String),

    #[error("Stratum '{stratum}' has no rows labelled '{label}'")]
    MissingStratumLabel { stratum: String, label: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Missing column '{0}' in input table")]
    MissingColumn(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, CodaError>;
