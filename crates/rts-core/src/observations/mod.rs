//! Time-ordered polar observations of one measurement job.
//!
//! [`ObservationSet`] owns the deduplicated samples together with the stochastic
//! model and the pose of the station that produced them. Derived quantities
//! (Cartesian coordinates, angular velocities, the variance vector) are
//! recomputed on demand from the current sample state, so the two correction
//! routines in [`time_sync`] and [`intrinsic_delay`] only touch timestamps and
//! angles.

mod intrinsic_delay;
mod time_sync;

pub use intrinsic_delay::DelayCorrection;
pub use time_sync::ClockSync;

use crate::error::{CoreError, CoreResult};
use crate::frames::{FrameTransform, INTERMEDIATE_FRAME};
use crate::math::{angular_rates, interpolate_linear, polar_to_local, unwrap_angles};
use crate::types::{Observation, StationPose, VarianceConfig};
use crate::{Pt3, Real, Vec3};
use nalgebra::DVector;
use std::f64::consts::TAU;

/// Deduplicated, strictly time-ordered observations of a single job.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSet {
    observations: Vec<Observation>,
    variances: VarianceConfig,
    pose: StationPose,
}

impl ObservationSet {
    /// Build a set from raw samples.
    ///
    /// Samples are sorted by sensor timestamp (stable) and only the first
    /// sample of every timestamp is kept.
    ///
    /// # Errors
    ///
    /// - [`CoreError::EmptyObservations`] if `observations` is empty.
    /// - [`CoreError::InvalidTimestamp`] for a non-finite sensor timestamp.
    /// - [`CoreError::InvalidVarianceConfig`] if `variances` is not usable.
    pub fn new(
        mut observations: Vec<Observation>,
        variances: VarianceConfig,
        pose: StationPose,
    ) -> CoreResult<Self> {
        if observations.is_empty() {
            return Err(CoreError::EmptyObservations);
        }
        if let Some(index) = observations
            .iter()
            .position(|o| !o.sensor_timestamp.is_finite())
        {
            return Err(CoreError::InvalidTimestamp { index });
        }
        variances.validate()?;

        observations.sort_by(|a, b| a.sensor_timestamp.total_cmp(&b.sensor_timestamp));
        let raw_len = observations.len();
        observations.dedup_by(|later, earlier| later.sensor_timestamp == earlier.sensor_timestamp);
        if observations.len() < raw_len {
            log::debug!(
                "dropped {} samples with duplicate sensor timestamps",
                raw_len - observations.len()
            );
        }

        Ok(Self {
            observations,
            variances,
            pose,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Always `false`: construction rejects empty input.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Current samples, including any corrections applied so far.
    pub fn to_observations(&self) -> Vec<Observation> {
        self.observations.clone()
    }

    pub fn variance_config(&self) -> &VarianceConfig {
        &self.variances
    }

    pub fn set_variance_config(&mut self, variances: VarianceConfig) -> CoreResult<()> {
        variances.validate()?;
        self.variances = variances;
        Ok(())
    }

    /// Multiply every entry of the variance vector by `factor`.
    pub fn apply_variance_factor(&mut self, factor: Real) {
        self.variances.apply_factor(factor);
    }

    pub fn pose(&self) -> &StationPose {
        &self.pose
    }

    pub fn set_pose(&mut self, pose: StationPose) {
        self.pose = pose;
    }

    #[inline]
    pub fn distance(&self, idx: usize) -> Real {
        self.observations[idx].distance
    }

    #[inline]
    pub fn horizontal_angle(&self, idx: usize) -> Real {
        self.observations[idx].horizontal_angle
    }

    #[inline]
    pub fn vertical_angle(&self, idx: usize) -> Real {
        self.observations[idx].vertical_angle
    }

    pub fn distances(&self) -> Vec<Real> {
        self.observations.iter().map(|o| o.distance).collect()
    }

    pub fn horizontal_angles(&self) -> Vec<Real> {
        self.observations.iter().map(|o| o.horizontal_angle).collect()
    }

    pub fn vertical_angles(&self) -> Vec<Real> {
        self.observations.iter().map(|o| o.vertical_angle).collect()
    }

    pub fn sensor_timestamps(&self) -> Vec<Real> {
        self.observations.iter().map(|o| o.sensor_timestamp).collect()
    }

    pub fn controller_timestamps(&self) -> Vec<Real> {
        self.observations
            .iter()
            .map(|o| o.controller_timestamp)
            .collect()
    }

    /// Polar samples flattened to `[d0, h0, v0, d1, h1, v1, ...]`.
    pub fn to_vector(&self) -> DVector<Real> {
        DVector::from_iterator(
            3 * self.len(),
            self.observations
                .iter()
                .flat_map(|o| [o.distance, o.horizontal_angle, o.vertical_angle]),
        )
    }

    /// Diagonal of the observation covariance, ordered like [`Self::to_vector`].
    pub fn variance_vector(&self) -> DVector<Real> {
        let angle = self.variances.angle_variance;
        DVector::from_iterator(
            3 * self.len(),
            self.observations.iter().flat_map(|o| {
                [self.variances.distance_variance_at(o.distance), angle, angle]
            }),
        )
    }

    /// Target offsets from the instrument, rotated by the station orientation.
    pub fn local_xyz(&self) -> Vec<Vec3> {
        let orientation = self.pose.orientation;
        self.observations
            .iter()
            .map(|o| {
                polar_to_local(
                    o.distance,
                    o.horizontal_angle + orientation,
                    o.vertical_angle,
                )
            })
            .collect()
    }

    /// Absolute target positions in the station's reference frame.
    ///
    /// The station position is moved to [`INTERMEDIATE_FRAME`], the local
    /// offsets are added there, and the result is converted back.
    pub fn xyz<T: FrameTransform>(&self, frames: &T) -> CoreResult<Vec<Pt3>> {
        let native = self.pose.frame;
        let station = frames.transform(&self.pose.position(), native, INTERMEDIATE_FRAME)?;
        self.local_xyz()
            .into_iter()
            .map(|offset| frames.transform(&(station + offset), INTERMEDIATE_FRAME, native))
            .collect()
    }

    /// Angular velocity of the horizontal angle (rad/s); zero for the last sample.
    pub fn horizontal_rates(&self) -> Vec<Real> {
        angular_rates(&self.horizontal_angles(), &self.sensor_timestamps())
    }

    /// Angular velocity of the vertical angle (rad/s); zero for the last sample.
    pub fn vertical_rates(&self) -> Vec<Real> {
        angular_rates(&self.vertical_angles(), &self.sensor_timestamps())
    }

    /// Linearly interpolate distance, angles and controller time at `times`.
    ///
    /// Angles are unwrapped before interpolation; horizontal angles are
    /// returned in `[0, 2π)`. Queries outside the covered time span clamp to
    /// the first/last sample. Return codes and response lengths of the
    /// interpolated samples are zero.
    pub fn interpolate_polar(&self, times: &[Real]) -> CoreResult<ObservationSet> {
        let ts = self.sensor_timestamps();
        let controller = self.controller_timestamps();
        let distances = self.distances();
        let h = unwrap_angles(&self.horizontal_angles());
        let v = unwrap_angles(&self.vertical_angles());
        let first = &self.observations[0];

        let samples = times
            .iter()
            .map(|&t| Observation {
                distance: interpolate_linear(&ts, &distances, t),
                horizontal_angle: interpolate_linear(&ts, &h, t).rem_euclid(TAU),
                vertical_angle: interpolate_linear(&ts, &v, t),
                controller_timestamp: interpolate_linear(&ts, &controller, t),
                sensor_timestamp: t,
                response_length: 0,
                geocom_return_code: 0,
                rpc_return_code: 0,
                station_id: first.station_id,
                job_id: first.job_id,
            })
            .collect();

        ObservationSet::new(samples, self.variances, self.pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::IdentityFrames;
    use std::f64::consts::FRAC_PI_2;

    fn sample(t: Real, d: Real) -> Observation {
        Observation::polar(t, d, 0.1 * t, FRAC_PI_2)
    }

    fn set_of(observations: Vec<Observation>) -> ObservationSet {
        ObservationSet::new(
            observations,
            VarianceConfig::default(),
            StationPose::default(),
        )
        .unwrap()
    }

    #[test]
    fn construction_sorts_and_keeps_first_duplicate() {
        let set = set_of(vec![
            sample(2.0, 20.0),
            sample(1.0, 10.0),
            sample(2.0, 99.0),
            sample(3.0, 30.0),
            sample(1.0, 77.0),
        ]);
        assert_eq!(set.len(), 3);
        assert_eq!(set.sensor_timestamps(), vec![1.0, 2.0, 3.0]);
        assert_eq!(set.distances(), vec![10.0, 20.0, 30.0]);
    }

    #[test]
    fn construction_rejects_invalid_input() {
        let empty = ObservationSet::new(vec![], VarianceConfig::default(), StationPose::default());
        assert!(matches!(empty, Err(CoreError::EmptyObservations)));

        let nan = ObservationSet::new(
            vec![sample(0.0, 1.0), sample(Real::NAN, 1.0)],
            VarianceConfig::default(),
            StationPose::default(),
        );
        assert!(matches!(nan, Err(CoreError::InvalidTimestamp { index: 1 })));

        let bad_var = VarianceConfig {
            distance_variance: -1.0,
            ..VarianceConfig::default()
        };
        let res = ObservationSet::new(vec![sample(0.0, 1.0)], bad_var, StationPose::default());
        assert!(matches!(res, Err(CoreError::InvalidVarianceConfig { .. })));
    }

    #[test]
    fn vectors_are_interleaved_per_sample() {
        let set = set_of(vec![sample(0.0, 100.0), sample(1.0, 200.0)]);
        let v = set.to_vector();
        assert_eq!(v.len(), 6);
        assert_eq!(v[0], 100.0);
        assert_eq!(v[3], 200.0);
        assert!((v[4] - 0.1).abs() < 1e-15);

        let cfg = VarianceConfig::from_std_devs(1e-3, 2.0, 1e-5);
        let mut set = set;
        set.set_variance_config(cfg).unwrap();
        let var = set.variance_vector();
        let expected_far = 1e-6 + (2.0 * 1e-6 * 200.0_f64).powi(2);
        assert!((var[3] - expected_far).abs() < 1e-18);
        assert!((var[1] - 1e-10).abs() < 1e-24);
        assert_eq!(var[1], var[5]);
    }

    #[test]
    fn xyz_adds_station_position_and_orientation() {
        let pose = StationPose {
            x: 100.0,
            y: 200.0,
            z: 10.0,
            frame: INTERMEDIATE_FRAME,
            orientation: FRAC_PI_2,
        };
        let set = ObservationSet::new(
            vec![Observation::polar(0.0, 5.0, 0.0, FRAC_PI_2)],
            VarianceConfig::default(),
            pose,
        )
        .unwrap();
        let xyz = set.xyz(&IdentityFrames).unwrap();
        // h + orientation = π/2 points along +x
        assert!((xyz[0] - Pt3::new(105.0, 200.0, 10.0)).norm() < 1e-12);
    }

    #[test]
    fn xyz_surfaces_frame_errors() {
        let pose = StationPose::origin(4326);
        let set =
            ObservationSet::new(vec![sample(0.0, 1.0)], VarianceConfig::default(), pose).unwrap();
        assert!(matches!(
            set.xyz(&IdentityFrames),
            Err(CoreError::UnsupportedFrame { .. })
        ));
    }

    #[test]
    fn interpolation_crosses_the_angle_wrap() {
        let set = set_of(vec![
            Observation::polar(0.0, 10.0, TAU - 0.1, 1.0),
            Observation::polar(1.0, 20.0, 0.1, 1.2),
        ]);
        let mid = set.interpolate_polar(&[0.25, 0.75]).unwrap();
        assert_eq!(mid.len(), 2);
        assert!((mid.distance(0) - 12.5).abs() < 1e-12);
        assert!((mid.horizontal_angle(0) - (TAU - 0.05)).abs() < 1e-12);
        assert!((mid.horizontal_angle(1) - 0.05).abs() < 1e-12);
        assert!((mid.vertical_angle(1) - 1.15).abs() < 1e-12);
    }
}
