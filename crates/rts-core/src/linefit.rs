//! Weighted least-squares line fit.

use crate::error::{CoreError, CoreResult};
use crate::Real;
use serde::{Deserialize, Serialize};

/// Result of [`fit_line_2d`]: `y ≈ slope · x + intercept`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    pub slope: Real,
    pub intercept: Real,
    /// `y - (slope · x + intercept)` for every input sample.
    pub residuals: Vec<Real>,
}

impl LineFit {
    #[inline]
    pub fn eval(&self, x: Real) -> Real {
        self.slope * x + self.intercept
    }
}

/// Fit a straight line to `(x, y)` by (optionally weighted) least squares.
///
/// The abscissa is centred on its weighted mean before solving, which keeps
/// the normal equations well conditioned for large values such as epoch
/// timestamps. The returned intercept refers to the original `x`.
///
/// # Errors
///
/// - [`CoreError::LengthMismatch`] if `x`, `y` (and `weights`) differ in length.
/// - [`CoreError::InsufficientPoints`] with fewer than two samples.
/// - [`CoreError::DegenerateLineFit`] for non-positive weights or when all
///   `x` coincide.
pub fn fit_line_2d(x: &[Real], y: &[Real], weights: Option<&[Real]>) -> CoreResult<LineFit> {
    if x.len() != y.len() {
        return Err(CoreError::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    if let Some(w) = weights {
        if w.len() != x.len() {
            return Err(CoreError::LengthMismatch {
                left: x.len(),
                right: w.len(),
            });
        }
        if let Some(bad) = w.iter().find(|wi| !(wi.is_finite() && **wi > 0.0)) {
            return Err(CoreError::DegenerateLineFit(format!(
                "weights must be positive and finite, got {bad}"
            )));
        }
    }
    if x.len() < 2 {
        return Err(CoreError::InsufficientPoints {
            what: "line fit",
            got: x.len(),
            min: 2,
        });
    }

    let weight = |i: usize| weights.map_or(1.0, |w| w[i]);

    // accumulate relative to the first sample to avoid cancellation in the mean
    let x_ref = x[0];
    let mut sum_w = 0.0;
    let mut sum_wx = 0.0;
    let mut sum_wy = 0.0;
    for i in 0..x.len() {
        let wi = weight(i);
        sum_w += wi;
        sum_wx += wi * (x[i] - x_ref);
        sum_wy += wi * y[i];
    }
    let x_offset = sum_wx / sum_w;
    let x_mean = x_ref + x_offset;
    let y_mean = sum_wy / sum_w;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for i in 0..x.len() {
        let wi = weight(i);
        let dx = (x[i] - x_ref) - x_offset;
        sxx += wi * dx * dx;
        sxy += wi * dx * (y[i] - y_mean);
    }
    if sxx <= Real::EPSILON * sum_w {
        return Err(CoreError::DegenerateLineFit(
            "abscissa values are (nearly) identical".to_string(),
        ));
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;
    let residuals = x
        .iter()
        .zip(y)
        .map(|(xi, yi)| yi - (slope * ((xi - x_ref) - x_offset) + y_mean))
        .collect();

    Ok(LineFit {
        slope,
        intercept,
        residuals,
    })
}
