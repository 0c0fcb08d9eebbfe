use crate::frames::FrameId;
use thiserror::Error;

/// Errors raised while building or correcting observation sets.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("observation set is empty")]
    EmptyObservations,
    #[error("non-finite timestamp at index {index}")]
    InvalidTimestamp { index: usize },
    #[error("variance entry {index} is not positive and finite: {value}")]
    InvalidVariance { index: usize, value: f64 },
    #[error("variance configuration `{name}` must be positive and finite, got {value}")]
    InvalidVarianceConfig { name: &'static str, value: f64 },
    #[error("insufficient points for {what}: got {got}, need at least {min}")]
    InsufficientPoints {
        what: &'static str,
        got: usize,
        min: usize,
    },
    #[error("length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },
    #[error("degenerate line fit: {0}")]
    DegenerateLineFit(String),
    #[error("no transformation from frame {from} to frame {to}")]
    UnsupportedFrame { from: FrameId, to: FrameId },
}

pub type CoreResult<T> = Result<T, CoreError>;
