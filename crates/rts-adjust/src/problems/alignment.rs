//! Rigid alignment of a station's observations onto known target positions.
//!
//! Per target the model states
//! `target - (shift + polar_to_local(d, h + φ, v)) = 0`
//! with four parameters `[x, y, z, φ]`: a translation and a rotation about
//! the vertical axis.

use crate::error::{AdjustError, AdjustResult};
use crate::model::FunctionalModel;
use crate::sparse::SparseTriplets;
use crate::variance::{adjust, AdjustOptions, AdjustmentResult};
use nalgebra::{DMatrix, DVector};
use rts_core::{polar_to_local, ObservationSet, Pt3, Real, Vec3};
use serde::{Deserialize, Serialize};

pub const ALIGNMENT_TOLERANCE: Real = 1e-10;

/// Translation and yaw of an aligned station.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AlignmentParameters {
    pub x: Real,
    pub y: Real,
    pub z: Real,
    /// Rotation about the vertical axis (rad), added to horizontal angles.
    pub phi: Real,
}

impl AlignmentParameters {
    pub const LEN: usize = 4;

    pub fn from_vector(v: &DVector<Real>) -> Self {
        Self {
            x: v[0],
            y: v[1],
            z: v[2],
            phi: v[3],
        }
    }

    pub fn to_vector(&self) -> DVector<Real> {
        DVector::from_vec(vec![self.x, self.y, self.z, self.phi])
    }

    pub fn shift(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// Gauss-Helmert model of the 4-parameter alignment.
#[derive(Debug, Clone)]
pub struct AlignmentModel {
    targets: Vec<Vec3>,
    observations: DVector<Real>,
}

impl AlignmentModel {
    /// Pair `targets[i]` with the `i`-th sample of `observations`.
    pub fn new(targets: &[Pt3], observations: &ObservationSet) -> AdjustResult<Self> {
        if targets.len() != observations.len() {
            return Err(AdjustError::DimensionMismatch {
                what: "alignment targets",
                expected: observations.len(),
                got: targets.len(),
            });
        }
        Ok(Self {
            targets: targets.iter().map(|p| p.coords).collect(),
            observations: observations.to_vector(),
        })
    }

    pub fn num_targets(&self) -> usize {
        self.targets.len()
    }

    fn polar(obs: &DVector<Real>, i: usize) -> (Real, Real, Real) {
        (obs[3 * i], obs[3 * i + 1], obs[3 * i + 2])
    }
}

impl FunctionalModel for AlignmentModel {
    fn name(&self) -> &'static str {
        "alignment"
    }

    fn num_parameters(&self) -> usize {
        AlignmentParameters::LEN
    }

    fn num_equations(&self) -> usize {
        3 * self.targets.len()
    }

    fn observations(&self) -> &DVector<Real> {
        &self.observations
    }

    fn default_tolerance(&self) -> Real {
        ALIGNMENT_TOLERANCE
    }

    /// Mean offset between targets and unrotated observations, zero yaw.
    fn initial_parameters(&self) -> DVector<Real> {
        let n = self.targets.len().max(1) as Real;
        let sum = self
            .targets
            .iter()
            .enumerate()
            .fold(Vec3::zeros(), |acc, (i, target)| {
                let (d, h, v) = Self::polar(&self.observations, i);
                acc + (target - polar_to_local(d, h, v))
            });
        let shift = sum / n;
        DVector::from_vec(vec![shift.x, shift.y, shift.z, 0.0])
    }

    fn design_matrix(&self, params: &DVector<Real>, obs: &DVector<Real>) -> DMatrix<Real> {
        let phi = params[3];
        let mut a = DMatrix::zeros(self.num_equations(), AlignmentParameters::LEN);
        for i in 0..self.targets.len() {
            let (d, h, v) = Self::polar(obs, i);
            let (sin_hp, cos_hp) = (h + phi).sin_cos();
            let sin_v = v.sin();
            let r = 3 * i;

            a[(r, 0)] = -1.0;
            a[(r, 3)] = -d * sin_v * cos_hp;
            a[(r + 1, 1)] = -1.0;
            a[(r + 1, 3)] = d * sin_v * sin_hp;
            a[(r + 2, 2)] = -1.0;
        }
        a
    }

    fn condition_matrix(&self, params: &DVector<Real>, obs: &DVector<Real>) -> SparseTriplets {
        let phi = params[3];
        let n = self.targets.len();
        let mut b = SparseTriplets::with_capacity(3 * n, 3 * n, 8 * n);
        for i in 0..n {
            let (d, h, v) = Self::polar(obs, i);
            let (sin_hp, cos_hp) = (h + phi).sin_cos();
            let (sin_v, cos_v) = v.sin_cos();
            let (r, c) = (3 * i, 3 * i);

            b.push(r, c, -sin_v * sin_hp);
            b.push(r, c + 1, -d * sin_v * cos_hp);
            b.push(r, c + 2, -d * cos_v * sin_hp);

            b.push(r + 1, c, -sin_v * cos_hp);
            b.push(r + 1, c + 1, d * sin_v * sin_hp);
            b.push(r + 1, c + 2, -d * cos_v * cos_hp);

            b.push(r + 2, c, -cos_v);
            b.push(r + 2, c + 2, d * sin_v);
        }
        b
    }

    fn functional_relation(&self, params: &DVector<Real>, obs: &DVector<Real>) -> DVector<Real> {
        let shift = Vec3::new(params[0], params[1], params[2]);
        let phi = params[3];
        let mut w = DVector::zeros(self.num_equations());
        for (i, target) in self.targets.iter().enumerate() {
            let (d, h, v) = Self::polar(obs, i);
            let f = target - (shift + polar_to_local(d, h + phi, v));
            w.fixed_rows_mut::<3>(3 * i).copy_from(&f);
        }
        w
    }
}

/// Outcome of [`fit_alignment`].
#[derive(Debug, Clone)]
pub struct AlignmentFit {
    pub parameters: AlignmentParameters,
    pub std_devs: AlignmentParameters,
    pub adjustment: AdjustmentResult,
}

/// Estimate shift and yaw that move `observations` onto `targets`.
///
/// The variance scale found by the variance component estimation is written
/// back into the observation set's stochastic model.
pub fn fit_alignment(
    targets: &[Pt3],
    observations: &mut ObservationSet,
    options: &AdjustOptions,
) -> AdjustResult<AlignmentFit> {
    log::info!("aligning {} samples", observations.len());
    let model = AlignmentModel::new(targets, observations)?;
    let adjustment = adjust(
        &model,
        &observations.variance_vector(),
        &options.solver,
        &options.variance,
    )?;
    observations.apply_variance_factor(adjustment.variance_scale);

    Ok(AlignmentFit {
        parameters: AlignmentParameters::from_vector(&adjustment.parameters),
        std_devs: AlignmentParameters::from_vector(&adjustment.std_devs()),
        adjustment,
    })
}
