//! Iterative Gauss-Helmert (mixed model) adjustment.
//!
//! Each iteration linearises `f(Θ, l + v) = 0` at the current estimate:
//!
//! ```text
//! A ΔΘ + B v + w = 0,   w = f(Θ, l + v_prev) - B v_prev
//! M  = B C Bᵗ
//! ΔΘ = -(Aᵗ M⁻¹ A)⁻¹ Aᵗ M⁻¹ w
//! k  = -M⁻¹ (A ΔΘ + w)
//! v  = C Bᵗ k
//! ```
//!
//! `M` is factored with a sparse Cholesky decomposition; only the
//! parameter-sized normal matrix is dense.

use crate::error::{AdjustError, AdjustResult};
use crate::model::FunctionalModel;
use crate::sparse::{spmv, spmv_transpose, SparseSpdSolver};
use nalgebra::{DMatrix, DVector};
use rts_core::Real;
use serde::{Deserialize, Serialize};

pub const MAX_SOLVER_ITERATIONS: usize = 30;

/// Smallest accepted Cholesky pivot of the unit-diagonal scaled normal matrix.
///
/// A pivot is `1 - R²` of one parameter column regressed on the previous
/// ones; below this threshold the parameter is not separable from the others.
pub const MIN_RELATIVE_PIVOT: Real = 1e-10;

/// Options of the inner adjustment loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub max_iterations: usize,
    /// Absolute threshold on every parameter update; `None` uses the
    /// model's [`FunctionalModel::default_tolerance`].
    pub tolerance: Option<Real>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: MAX_SOLVER_ITERATIONS,
            tolerance: None,
        }
    }
}

impl SolverOptions {
    pub fn validate(&self) -> AdjustResult<()> {
        if self.max_iterations == 0 {
            return Err(AdjustError::InvalidOptions(
                "solver needs at least one iteration".to_string(),
            ));
        }
        if let Some(tolerance) = self.tolerance {
            if !(tolerance.is_finite() && tolerance >= 0.0) {
                return Err(AdjustError::InvalidOptions(format!(
                    "tolerance must be finite and non-negative, got {tolerance}"
                )));
            }
        }
        Ok(())
    }
}

/// Result of a single (inner) adjustment.
#[derive(Debug, Clone)]
pub struct Solution {
    pub parameters: DVector<Real>,
    /// `(Aᵗ M⁻¹ A)⁻¹` at the final linearisation point.
    pub covariance: DMatrix<Real>,
    /// Observation residuals `v`.
    pub residuals: DVector<Real>,
    /// Adjusted observations `l + v`.
    pub adjusted_observations: DVector<Real>,
    pub iterations: usize,
    pub converged: bool,
    /// Largest absolute parameter update of the last iteration.
    pub last_update: Real,
}

/// Mutable estimate threaded through the iterations of one adjustment.
struct WorkingState {
    params: DVector<Real>,
    residuals: DVector<Real>,
    adjusted: DVector<Real>,
}

impl WorkingState {
    fn new(params: DVector<Real>, observations: &DVector<Real>) -> Self {
        Self {
            params,
            residuals: DVector::zeros(observations.len()),
            adjusted: observations.clone(),
        }
    }
}

/// One linearised step.
struct Step {
    delta: DVector<Real>,
    residuals: DVector<Real>,
    normal: DMatrix<Real>,
}

/// Validate the stochastic model and the redundancy of `model`.
pub(crate) fn check_inputs<M: FunctionalModel>(
    model: &M,
    variances: &DVector<Real>,
) -> AdjustResult<()> {
    let n_obs = model.observations().len();
    if variances.len() != n_obs {
        return Err(AdjustError::DimensionMismatch {
            what: "variance vector",
            expected: n_obs,
            got: variances.len(),
        });
    }
    if let Some((index, &value)) = variances
        .iter()
        .enumerate()
        .find(|(_, v)| !(v.is_finite() && **v > 0.0))
    {
        return Err(AdjustError::InvalidVariance { index, value });
    }
    if model.redundancy() <= 0 {
        return Err(AdjustError::InsufficientRedundancy {
            equations: model.num_equations(),
            parameters: model.num_parameters(),
        });
    }
    Ok(())
}

/// Run the Gauss-Helmert iteration for `model` with diagonal observation
/// variances `variances`.
///
/// Reaching [`SolverOptions::max_iterations`] is not an error: the last
/// iterate is returned with `converged == false`.
///
/// # Errors
///
/// - [`AdjustError::InvalidOptions`] for a zero iteration cap or a negative
///   tolerance.
/// - [`AdjustError::InvalidVariance`] for a non-positive or non-finite variance.
/// - [`AdjustError::InsufficientRedundancy`] if there are not more equations
///   than parameters.
/// - [`AdjustError::DegenerateGeometry`] if `M` or the normal matrix is not
///   positive definite, or some parameter is not separable from the others
///   (see [`MIN_RELATIVE_PIVOT`]).
pub fn solve<M: FunctionalModel>(
    model: &M,
    variances: &DVector<Real>,
    options: &SolverOptions,
) -> AdjustResult<Solution> {
    options.validate()?;
    check_inputs(model, variances)?;
    let tolerance = options.tolerance.unwrap_or_else(|| model.default_tolerance());
    let observations = model.observations();

    let mut state = WorkingState::new(model.initial_parameters(), observations);
    let mut iterations = 0;
    let mut converged = false;
    let mut last_update = Real::INFINITY;
    let mut normal = DMatrix::zeros(model.num_parameters(), model.num_parameters());

    while iterations < options.max_iterations {
        let step = linearized_step(model, &state, variances)?;
        model.update_parameters(&mut state.params, &step.delta);
        state.adjusted = observations + &step.residuals;
        state.residuals = step.residuals;
        normal = step.normal;
        iterations += 1;

        last_update = step.delta.amax();
        log::trace!(
            "{}: iteration {iterations}, max |Δ| = {last_update:.3e}",
            model.name()
        );
        if step.delta.iter().all(|d| d.abs() < tolerance) {
            converged = true;
            break;
        }
    }

    if converged {
        log::debug!("{}: converged after {iterations} iterations", model.name());
    } else {
        log::error!(
            "{}: adjustment did not converge after {iterations} iterations (max |Δ| = {last_update:.3e})",
            model.name()
        );
    }

    let covariance = normal.try_inverse().ok_or_else(|| {
        AdjustError::DegenerateGeometry(format!("{}: singular normal matrix", model.name()))
    })?;
    if let Some(i) = covariance
        .diagonal()
        .iter()
        .position(|v| !(v.is_finite() && *v > 0.0))
    {
        return Err(AdjustError::DegenerateGeometry(format!(
            "{}: variance of parameter {i} is not positive",
            model.name()
        )));
    }

    Ok(Solution {
        parameters: state.params,
        covariance,
        residuals: state.residuals,
        adjusted_observations: state.adjusted,
        iterations,
        converged,
        last_update,
    })
}

fn linearized_step<M: FunctionalModel>(
    model: &M,
    state: &WorkingState,
    variances: &DVector<Real>,
) -> AdjustResult<Step> {
    let u = model.num_parameters();
    let n = model.num_equations();

    let a = model.design_matrix(&state.params, &state.adjusted);
    let b_triplets = model.condition_matrix(&state.params, &state.adjusted);
    if a.nrows() != n || a.ncols() != u {
        return Err(AdjustError::DimensionMismatch {
            what: "design matrix entries",
            expected: n * u,
            got: a.nrows() * a.ncols(),
        });
    }
    if b_triplets.nrows() != n || b_triplets.ncols() != variances.len() {
        return Err(AdjustError::DimensionMismatch {
            what: "condition matrix entries",
            expected: n * variances.len(),
            got: b_triplets.nrows() * b_triplets.ncols(),
        });
    }

    let b = b_triplets.to_csc();
    let bc = b_triplets.scale_columns(variances).to_csc();
    let m = &bc * &b.transpose();
    let m_solver = SparseSpdSolver::factor(&m)?;

    let w =
        model.functional_relation(&state.params, &state.adjusted) - spmv(&b, &state.residuals);

    // M⁻¹ [A | w] in one pass
    let mut rhs = DMatrix::zeros(n, u + 1);
    rhs.columns_mut(0, u).copy_from(&a);
    rhs.set_column(u, &w);
    let m_inv = m_solver.solve(&rhs);
    let m_inv_a = m_inv.columns(0, u);
    let m_inv_w = m_inv.column(u);

    let a_t = a.transpose();
    let normal = &a_t * &m_inv_a;
    let normal_rhs = &a_t * &m_inv_w;
    let delta = -solve_normal(model.name(), &normal, &normal_rhs)?;

    let correlates = -(&m_inv_a * &delta + &m_inv_w);
    let residuals = variances.component_mul(&spmv_transpose(&b, &correlates));

    Ok(Step {
        delta,
        residuals,
        normal,
    })
}

/// Solve `N x = b` through the Cholesky factor of `D^-1/2 N D^-1/2`,
/// `D = diag(N)`.
///
/// The scaled pivots do not depend on parameter units, so a single threshold
/// detects parameters that are (nearly) linear combinations of the others.
fn solve_normal(
    name: &str,
    normal: &DMatrix<Real>,
    rhs: &DVector<Real>,
) -> AdjustResult<DVector<Real>> {
    let diagonal = normal.diagonal();
    if let Some(i) = diagonal.iter().position(|d| !(d.is_finite() && *d > 0.0)) {
        return Err(AdjustError::DegenerateGeometry(format!(
            "{name}: parameter {i} is not constrained by the observations"
        )));
    }
    let inv_sqrt = diagonal.map(|d| 1.0 / d.sqrt());
    let u = normal.nrows();
    let scaled = DMatrix::from_fn(u, u, |r, c| normal[(r, c)] * inv_sqrt[r] * inv_sqrt[c]);

    let chol = scaled.cholesky().ok_or_else(|| {
        AdjustError::DegenerateGeometry(format!("{name}: normal matrix is not positive definite"))
    })?;
    let l = chol.l_dirty();
    if let Some((i, pivot)) = (0..u)
        .map(|i| (i, l[(i, i)] * l[(i, i)]))
        .find(|(_, pivot)| !(*pivot >= MIN_RELATIVE_PIVOT))
    {
        return Err(AdjustError::DegenerateGeometry(format!(
            "{name}: parameter {i} is not separable from the others (pivot {pivot:.3e})"
        )));
    }

    let x = chol.solve(&rhs.component_mul(&inv_sqrt));
    Ok(x.component_mul(&inv_sqrt))
}
