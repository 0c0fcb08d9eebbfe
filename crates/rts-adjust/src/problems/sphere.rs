//! Sphere fit with a time shift between the angle and distance channels.
//!
//! A target moving on a sphere is scanned while the instrument follows it.
//! If the angles lag behind the distance by `τ`, the points built from the
//! raw readings leave the sphere. The model evaluates every sample at the
//! shifted angle state `h + ω_h·τ`, `v + ω_v·τ` and requires
//!
//! `‖p(d, h + ω_h τ, v + ω_v τ) - c‖² - r² = 0`.
//!
//! A single scan circle only constrains the sphere centre horizontally: any
//! sphere through the ring fits equally well. The height of the centre is
//! therefore pinned ([`SphereModelOptions::center_z`]) and the model
//! estimates `[center_x, center_y, radius, time_shift]`.

use crate::error::AdjustResult;
use crate::model::FunctionalModel;
use crate::sparse::SparseTriplets;
use crate::variance::{adjust, AdjustOptions, AdjustmentResult};
use nalgebra::{DMatrix, DVector};
use rts_core::{angular_rates, polar_to_local, ObservationSet, Real, Vec3};
use serde::{Deserialize, Serialize};

pub const SPHERE_TOLERANCE: Real = 1e-5;

/// Where the angular velocities of the shifted angle state come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngularVelocitySource {
    /// Recomputed from the current observation estimate in every evaluation.
    #[default]
    Estimated,
    /// Computed once from the input observation set.
    Observed,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SphereModelOptions {
    /// Height the sphere centre is pinned to; `None` uses the centroid height
    /// of the scan.
    pub center_z: Option<Real>,
    pub angular_velocity: AngularVelocitySource,
}

/// Sphere and time shift; `center_z` is fixed, not estimated.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SphereParameters {
    pub center_x: Real,
    pub center_y: Real,
    pub center_z: Real,
    pub radius: Real,
    /// Delay of the angles relative to the distance (s).
    pub time_shift: Real,
}

impl SphereParameters {
    /// Number of estimated entries: `[center_x, center_y, radius, time_shift]`.
    pub const ESTIMATED: usize = 4;

    pub fn from_estimate(v: &DVector<Real>, center_z: Real) -> Self {
        Self {
            center_x: v[0],
            center_y: v[1],
            center_z,
            radius: v[2],
            time_shift: v[3],
        }
    }

    pub fn estimate_vector(&self) -> DVector<Real> {
        DVector::from_vec(vec![
            self.center_x,
            self.center_y,
            self.radius,
            self.time_shift,
        ])
    }
}

/// Standard deviations of the estimated sphere parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SphereStdDevs {
    pub center_x: Real,
    pub center_y: Real,
    pub radius: Real,
    pub time_shift: Real,
}

/// Shifted point and its partial derivatives for one sample.
struct ShiftedPoint {
    point: Vec3,
    /// Unit direction, `∂p/∂d`.
    direction: Vec3,
    d_horizontal: Vec3,
    d_vertical: Vec3,
}

impl ShiftedPoint {
    fn new(distance: Real, horizontal: Real, vertical: Real) -> Self {
        let (sin_h, cos_h) = horizontal.sin_cos();
        let (sin_v, cos_v) = vertical.sin_cos();
        let direction = Vec3::new(sin_v * sin_h, sin_v * cos_h, cos_v);
        Self {
            point: direction * distance,
            direction,
            d_horizontal: Vec3::new(sin_v * cos_h, -sin_v * sin_h, 0.0) * distance,
            d_vertical: Vec3::new(cos_v * sin_h, cos_v * cos_h, -sin_v) * distance,
        }
    }
}

/// Gauss-Helmert model of the sphere fit with time shift.
#[derive(Debug, Clone)]
pub struct SphereModel {
    observations: DVector<Real>,
    timestamps: Vec<Real>,
    observed_rates: (Vec<Real>, Vec<Real>),
    center_z: Real,
    angular_velocity: AngularVelocitySource,
}

impl SphereModel {
    pub fn new(observations: &ObservationSet, options: &SphereModelOptions) -> Self {
        let vector = observations.to_vector();
        let center_z = options.center_z.unwrap_or_else(|| {
            let points = raw_points(&vector);
            points.iter().map(|p| p.z).sum::<Real>() / points.len().max(1) as Real
        });
        Self {
            observations: vector,
            timestamps: observations.sensor_timestamps(),
            observed_rates: (observations.horizontal_rates(), observations.vertical_rates()),
            center_z,
            angular_velocity: options.angular_velocity,
        }
    }

    /// Height the centre is pinned to.
    pub fn center_z(&self) -> Real {
        self.center_z
    }

    fn num_samples(&self) -> usize {
        self.timestamps.len()
    }

    fn rates(&self, obs: &DVector<Real>) -> (Vec<Real>, Vec<Real>) {
        match self.angular_velocity {
            AngularVelocitySource::Observed => self.observed_rates.clone(),
            AngularVelocitySource::Estimated => {
                let h: Vec<Real> = obs.iter().skip(1).step_by(3).copied().collect();
                let v: Vec<Real> = obs.iter().skip(2).step_by(3).copied().collect();
                (
                    angular_rates(&h, &self.timestamps),
                    angular_rates(&v, &self.timestamps),
                )
            }
        }
    }

    /// Shifted points with the rates used to build them.
    fn shifted_points(
        &self,
        params: &DVector<Real>,
        obs: &DVector<Real>,
    ) -> Vec<(ShiftedPoint, Real, Real)> {
        let tau = params[3];
        let (h_rates, v_rates) = self.rates(obs);
        (0..self.num_samples())
            .map(|i| {
                let (d, h, v) = (obs[3 * i], obs[3 * i + 1], obs[3 * i + 2]);
                let (wh, wv) = (h_rates[i], v_rates[i]);
                (ShiftedPoint::new(d, h + wh * tau, v + wv * tau), wh, wv)
            })
            .collect()
    }

    fn center(&self, params: &DVector<Real>) -> Vec3 {
        Vec3::new(params[0], params[1], self.center_z)
    }
}

impl FunctionalModel for SphereModel {
    fn name(&self) -> &'static str {
        "sphere"
    }

    fn num_parameters(&self) -> usize {
        SphereParameters::ESTIMATED
    }

    fn num_equations(&self) -> usize {
        self.num_samples()
    }

    fn observations(&self) -> &DVector<Real> {
        &self.observations
    }

    fn default_tolerance(&self) -> Real {
        SPHERE_TOLERANCE
    }

    /// Centroid of the raw points and their mean distance to it, zero shift.
    fn initial_parameters(&self) -> DVector<Real> {
        let points = raw_points(&self.observations);
        let n = points.len().max(1) as Real;
        let centroid = points.iter().fold(Vec3::zeros(), |acc, p| acc + p) / n;
        let center = Vec3::new(centroid.x, centroid.y, self.center_z);
        let radius = points.iter().map(|p| (p - center).norm()).sum::<Real>() / n;
        DVector::from_vec(vec![center.x, center.y, radius, 0.0])
    }

    fn design_matrix(&self, params: &DVector<Real>, obs: &DVector<Real>) -> DMatrix<Real> {
        let center = self.center(params);
        let radius = params[2];
        let mut a = DMatrix::zeros(self.num_samples(), SphereParameters::ESTIMATED);
        for (i, (sp, wh, wv)) in self.shifted_points(params, obs).iter().enumerate() {
            let e = sp.point - center;
            a[(i, 0)] = -2.0 * e.x;
            a[(i, 1)] = -2.0 * e.y;
            a[(i, 2)] = -2.0 * radius;
            a[(i, 3)] = 2.0 * e.dot(&(sp.d_horizontal * *wh + sp.d_vertical * *wv));
        }
        a
    }

    fn condition_matrix(&self, params: &DVector<Real>, obs: &DVector<Real>) -> SparseTriplets {
        let center = self.center(params);
        let n = self.num_samples();
        let mut b = SparseTriplets::with_capacity(n, 3 * n, 3 * n);
        for (i, (sp, _, _)) in self.shifted_points(params, obs).iter().enumerate() {
            let e = sp.point - center;
            b.push(i, 3 * i, 2.0 * e.dot(&sp.direction));
            b.push(i, 3 * i + 1, 2.0 * e.dot(&sp.d_horizontal));
            b.push(i, 3 * i + 2, 2.0 * e.dot(&sp.d_vertical));
        }
        b
    }

    fn functional_relation(&self, params: &DVector<Real>, obs: &DVector<Real>) -> DVector<Real> {
        let center = self.center(params);
        let radius = params[2];
        DVector::from_iterator(
            self.num_samples(),
            self.shifted_points(params, obs)
                .iter()
                .map(|(sp, _, _)| (sp.point - center).norm_squared() - radius * radius),
        )
    }
}

/// Points built from unshifted polar samples.
fn raw_points(obs: &DVector<Real>) -> Vec<Vec3> {
    obs.as_slice()
        .chunks_exact(3)
        .map(|dhv| polar_to_local(dhv[0], dhv[1], dhv[2]))
        .collect()
}

/// Outcome of [`fit_sphere`].
#[derive(Debug, Clone)]
pub struct SphereFit {
    pub parameters: SphereParameters,
    pub std_devs: SphereStdDevs,
    pub adjustment: AdjustmentResult,
}

/// Fit a sphere and the angle/distance time shift to a circular scan.
///
/// The variance scale found by the variance component estimation is written
/// back into the observation set's stochastic model.
pub fn fit_sphere(
    observations: &mut ObservationSet,
    model_options: &SphereModelOptions,
    options: &AdjustOptions,
) -> AdjustResult<SphereFit> {
    log::info!(
        "fitting sphere to {} samples ({:?} angular velocities)",
        observations.len(),
        model_options.angular_velocity
    );
    let model = SphereModel::new(observations, model_options);
    let adjustment = adjust(
        &model,
        &observations.variance_vector(),
        &options.solver,
        &options.variance,
    )?;
    observations.apply_variance_factor(adjustment.variance_scale);

    let std = adjustment.std_devs();
    let parameters = SphereParameters::from_estimate(&adjustment.parameters, model.center_z());
    log::info!(
        "sphere radius {:.4} m, time shift {:.3} ms (± {:.3} ms)",
        parameters.radius,
        parameters.time_shift * 1e3,
        std[3] * 1e3
    );

    Ok(SphereFit {
        parameters,
        std_devs: SphereStdDevs {
            center_x: std[0],
            center_y: std[1],
            radius: std[2],
            time_shift: std[3],
        },
        adjustment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdjustError;
    use rts_core::synthetic::scenes::RingScan;
    use rts_core::{StationPose, VarianceConfig};

    fn ring_model(source: AngularVelocitySource) -> SphereModel {
        // one full turn
        let scan = RingScan {
            samples: 100,
            delay: 0.02,
            ..RingScan::default()
        };
        let set = ObservationSet::new(
            scan.observations(),
            VarianceConfig::default(),
            StationPose::default(),
        )
        .unwrap();
        SphereModel::new(
            &set,
            &SphereModelOptions {
                center_z: Some(-1.5),
                angular_velocity: source,
            },
        )
    }

    #[test]
    fn design_matrix_matches_finite_differences() {
        for source in [AngularVelocitySource::Observed, AngularVelocitySource::Estimated] {
            let model = ring_model(source);
            let obs = model.observations().clone();
            let params = DVector::from_vec(vec![0.1, 19.8, 4.9, 0.015]);
            let a = model.design_matrix(&params, &obs);
            for j in 0..4 {
                let h = 1e-6;
                let mut plus = params.clone();
                let mut minus = params.clone();
                plus[j] += h;
                minus[j] -= h;
                let col = (model.functional_relation(&plus, &obs)
                    - model.functional_relation(&minus, &obs))
                    / (2.0 * h);
                assert!((a.column(j) - col).amax() < 1e-4, "{source:?} column {j}");
            }
        }
    }

    #[test]
    fn condition_matrix_matches_finite_differences_with_fixed_rates() {
        let model = ring_model(AngularVelocitySource::Observed);
        let obs = model.observations().clone();
        let params = DVector::from_vec(vec![0.1, 19.8, 4.9, 0.015]);
        let b = model.condition_matrix(&params, &obs).to_dense();
        for j in 0..obs.len() {
            let h = 1e-7;
            let mut plus = obs.clone();
            let mut minus = obs.clone();
            plus[j] += h;
            minus[j] -= h;
            let col = (model.functional_relation(&params, &plus)
                - model.functional_relation(&params, &minus))
                / (2.0 * h);
            assert!((b.column(j) - col).amax() < 1e-4, "column {j}");
        }
    }

    #[test]
    fn initial_guess_is_centroid_and_mean_radius() {
        let model = ring_model(AngularVelocitySource::Estimated);
        let init = model.initial_parameters();
        assert!(init[0].abs() < 0.5, "cx {}", init[0]);
        assert!((init[1] - 20.0).abs() < 0.5, "cy {}", init[1]);
        assert!((init[2] - 5.0).abs() < 0.2, "r {}", init[2]);
        assert_eq!(init[3], 0.0);
        assert_eq!(model.center_z(), -1.5);
    }

    #[test]
    fn too_few_samples_is_insufficient_redundancy() {
        let scan = RingScan {
            samples: 4,
            ..RingScan::default()
        };
        let mut set = ObservationSet::new(
            scan.observations(),
            VarianceConfig::default(),
            StationPose::default(),
        )
        .unwrap();
        let err = fit_sphere(&mut set, &SphereModelOptions::default(), &AdjustOptions::default())
            .unwrap_err();
        assert!(matches!(err, AdjustError::InsufficientRedundancy { .. }));
    }
}
