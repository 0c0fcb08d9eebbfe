use rts_core::CoreError;
use thiserror::Error;

/// Errors raised by the adjustment engine.
#[derive(Debug, Error)]
pub enum AdjustError {
    #[error("insufficient redundancy: {equations} equations for {parameters} parameters")]
    InsufficientRedundancy { equations: usize, parameters: usize },
    #[error("variance entry {index} is not positive and finite: {value}")]
    InvalidVariance { index: usize, value: f64 },
    #[error("degenerate geometry: {0}")]
    DegenerateGeometry(String),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("chi-square quantile unavailable: {0}")]
    Statistics(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type AdjustResult<T> = Result<T, AdjustError>;
