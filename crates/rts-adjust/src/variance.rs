//! Variance component estimation around the Gauss-Helmert solver.
//!
//! After every adjustment the a-posteriori variance factor
//! `σ̂² = vᵗ C⁻¹ v / r` is compared with one. While it deviates by more than
//! [`VARIANCE_FACTOR_TOLERANCE`] the stochastic model is multiplied by `σ̂²`
//! and the adjustment repeated, at most [`MAX_VARIANCE_ITERATIONS`] times.
//! A χ² global test is evaluated for every pass; it is diagnostic only and
//! never ends the loop. Factors below [`MIN_VARIANCE_FACTOR`] come from
//! residuals at roundoff level (exact observations) and end the loop without
//! rescaling.

use crate::error::{AdjustError, AdjustResult};
use crate::model::FunctionalModel;
use crate::solver::{check_inputs, solve, SolverOptions};
use nalgebra::{DMatrix, DVector};
use rts_core::Real;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF};

pub const MAX_VARIANCE_ITERATIONS: usize = 5;
pub const VARIANCE_FACTOR_TOLERANCE: Real = 1e-3;
pub const GLOBAL_TEST_CONFIDENCE: Real = 0.95;
/// Smallest variance factor still used to rescale the stochastic model.
pub const MIN_VARIANCE_FACTOR: Real = 1e-10;

/// Options of the outer variance component loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VarianceOptions {
    pub max_iterations: usize,
    /// Accepted deviation `|σ̂² - 1|`.
    pub tolerance: Real,
    /// Confidence level of the global test.
    pub confidence: Real,
}

impl Default for VarianceOptions {
    fn default() -> Self {
        Self {
            max_iterations: MAX_VARIANCE_ITERATIONS,
            tolerance: VARIANCE_FACTOR_TOLERANCE,
            confidence: GLOBAL_TEST_CONFIDENCE,
        }
    }
}

/// Inner and outer loop options of a complete adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustOptions {
    pub solver: SolverOptions,
    pub variance: VarianceOptions,
}

/// χ² test of `τ = σ̂² · r` against the quantile with `r` degrees of freedom.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalTest {
    pub statistic: Real,
    pub quantile: Real,
    pub confidence: Real,
    pub passed: bool,
}

/// Diagnostics of one outer pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceIteration {
    pub variance_factor: Real,
    pub global_test: GlobalTest,
    pub solver_iterations: usize,
    pub converged: bool,
}

/// Final outcome of [`adjust`].
#[derive(Debug, Clone)]
pub struct AdjustmentResult {
    pub parameters: DVector<Real>,
    pub covariance: DMatrix<Real>,
    pub residuals: DVector<Real>,
    pub adjusted_observations: DVector<Real>,
    /// Variance factor of the last pass.
    pub variance_factor: Real,
    pub redundancy: usize,
    /// Inner iterations of the last pass.
    pub iterations: usize,
    /// Whether the last inner adjustment converged.
    pub converged: bool,
    pub history: Vec<VarianceIteration>,
    /// Product of all factors applied to the input variances.
    pub variance_scale: Real,
    /// Variances used in the last pass.
    pub variances: DVector<Real>,
}

impl AdjustmentResult {
    /// Standard deviations of the estimated parameters.
    pub fn std_devs(&self) -> DVector<Real> {
        self.covariance.diagonal().map(|v| v.max(0.0).sqrt())
    }
}

/// `vᵗ C⁻¹ v / r` for a diagonal covariance `C = diag(variances)`.
pub fn variance_factor(
    residuals: &DVector<Real>,
    variances: &DVector<Real>,
    redundancy: usize,
) -> Real {
    let weighted: Real = residuals
        .iter()
        .zip(variances.iter())
        .map(|(v, var)| v * v / var)
        .sum();
    weighted / redundancy as Real
}

pub fn global_test(
    variance_factor: Real,
    redundancy: usize,
    confidence: Real,
) -> AdjustResult<GlobalTest> {
    let dist = ChiSquared::new(redundancy as Real)
        .map_err(|err| AdjustError::Statistics(format!("{err}")))?;
    let quantile = dist.inverse_cdf(confidence);
    let statistic = variance_factor * redundancy as Real;
    Ok(GlobalTest {
        statistic,
        quantile,
        confidence,
        passed: statistic <= quantile,
    })
}

/// Adjust `model`, re-estimating the scale of the stochastic model.
///
/// `variances` is the diagonal of the a-priori observation covariance.
pub fn adjust<M: FunctionalModel>(
    model: &M,
    variances: &DVector<Real>,
    solver: &SolverOptions,
    options: &VarianceOptions,
) -> AdjustResult<AdjustmentResult> {
    check_inputs(model, variances)?;
    let redundancy = model.redundancy() as usize;
    let max_passes = options.max_iterations.max(1);

    let mut variances = variances.clone();
    let mut variance_scale = 1.0;
    let mut history = Vec::with_capacity(max_passes);

    loop {
        let solution = solve(model, &variances, solver)?;
        let factor = variance_factor(&solution.residuals, &variances, redundancy);
        let test = global_test(factor, redundancy, options.confidence)?;

        log::info!(
            "{}: global test passed: {} (quantile {:.3}, test value {:.3}, variance factor {:.4}, redundancy {})",
            model.name(),
            test.passed,
            test.quantile,
            test.statistic,
            factor,
            redundancy
        );
        history.push(VarianceIteration {
            variance_factor: factor,
            global_test: test,
            solver_iterations: solution.iterations,
            converged: solution.converged,
        });

        let degenerate = !factor.is_finite() || factor <= 0.0;
        if degenerate {
            log::warn!(
                "{}: variance factor {factor} cannot rescale the stochastic model",
                model.name()
            );
        }
        let exact = !degenerate && factor < MIN_VARIANCE_FACTOR;
        if exact {
            log::debug!(
                "{}: residuals at roundoff level (variance factor {factor:.3e}), keeping the stochastic model",
                model.name()
            );
        }
        let settled = (factor - 1.0).abs() <= options.tolerance;
        if degenerate || exact || settled || history.len() >= max_passes {
            return Ok(AdjustmentResult {
                parameters: solution.parameters,
                covariance: solution.covariance,
                residuals: solution.residuals,
                adjusted_observations: solution.adjusted_observations,
                variance_factor: factor,
                redundancy,
                iterations: solution.iterations,
                converged: solution.converged,
                history,
                variance_scale,
                variances,
            });
        }

        log::info!("{}: rescaling variances by {factor:.4}", model.name());
        variances *= factor;
        variance_scale *= factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_test_uses_upper_chi_square_quantile() {
        // χ²(26) at 95 %
        let test = global_test(1.0, 26, 0.95).unwrap();
        assert!((test.quantile - 38.885).abs() < 1e-2, "quantile {}", test.quantile);
        assert!(test.passed);

        let fail = global_test(2.0, 26, 0.95).unwrap();
        assert!(!fail.passed);
        assert_eq!(fail.statistic, 52.0);
    }

    #[test]
    fn variance_factor_is_weighted_square_sum_over_redundancy() {
        let v = DVector::from_vec(vec![1.0, 2.0, -2.0]);
        let var = DVector::from_vec(vec![1.0, 4.0, 2.0]);
        // 1 + 1 + 2
        assert!((variance_factor(&v, &var, 2) - 2.0).abs() < 1e-15);
    }
}
