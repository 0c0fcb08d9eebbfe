use crate::sparse::SparseTriplets;
use nalgebra::{DMatrix, DVector};
use rts_core::Real;

/// Implicit functional model `f(parameters, observations) = 0` of a
/// Gauss-Helmert adjustment.
///
/// Observations are the flattened polar vector of an
/// [`rts_core::ObservationSet`]; each model owns a snapshot of it.
pub trait FunctionalModel {
    /// Human readable name used in log messages.
    fn name(&self) -> &'static str;

    /// Number of estimated parameters.
    fn num_parameters(&self) -> usize;

    /// Number of scalar condition equations (rows of `A` and `B`).
    fn num_equations(&self) -> usize;

    /// Original observation vector `l`.
    fn observations(&self) -> &DVector<Real>;

    /// Absolute convergence threshold on every parameter update.
    fn default_tolerance(&self) -> Real;

    fn initial_parameters(&self) -> DVector<Real>;

    /// `A = ∂f/∂parameters`, `num_equations × num_parameters`.
    fn design_matrix(&self, params: &DVector<Real>, obs: &DVector<Real>) -> DMatrix<Real>;

    /// `B = ∂f/∂observations`, `num_equations × observations().len()`.
    fn condition_matrix(&self, params: &DVector<Real>, obs: &DVector<Real>) -> SparseTriplets;

    /// Contradiction `f(parameters, observations)`.
    fn functional_relation(&self, params: &DVector<Real>, obs: &DVector<Real>) -> DVector<Real>;

    fn update_parameters(&self, params: &mut DVector<Real>, delta: &DVector<Real>) {
        *params += delta;
    }

    fn redundancy(&self) -> isize {
        self.num_equations() as isize - self.num_parameters() as isize
    }
}
