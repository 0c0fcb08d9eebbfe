//! Synthetic measurement scenes with known ground truth.

use crate::math::{consecutive_rates, local_to_polar, polar_to_local, unwrap_angles};
use crate::types::Observation;
use crate::{Pt3, Real, Vec3};
use std::f64::consts::TAU;

/// `n` points evenly spaced on a horizontal circle.
pub fn circle_targets(n: usize, radius: Real, center: Pt3) -> Vec<Pt3> {
    (0..n)
        .map(|i| {
            let theta = TAU * i as Real / n as Real;
            center + Vec3::new(radius * theta.cos(), radius * theta.sin(), 0.0)
        })
        .collect()
}

/// Observations of `targets` from a station placed at `shift` and turned by `yaw`.
///
/// The horizontal readings satisfy
/// `target = shift + polar_to_local(d, h + yaw, v)`, i.e. the relation the
/// alignment adjustment inverts. Samples are `dt` seconds apart.
pub fn rigid_observations(targets: &[Pt3], shift: Vec3, yaw: Real, dt: Real) -> Vec<Observation> {
    targets
        .iter()
        .enumerate()
        .map(|(i, target)| {
            let offset = target.coords - shift;
            let (d, h, v) = local_to_polar(&offset);
            Observation::polar(i as Real * dt, d, (h - yaw).rem_euclid(TAU), v)
        })
        .collect()
}

/// Target moving around a horizontal ring, tracked by a station at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingScan {
    /// Ring centre in the station frame.
    pub center: Pt3,
    pub radius: Real,
    /// Angular speed of the target around the ring (rad/s).
    pub ring_rate: Real,
    pub samples: usize,
    pub dt: Real,
    /// Delay of the angle channel relative to the distance channel (s).
    pub delay: Real,
}

impl Default for RingScan {
    fn default() -> Self {
        Self {
            center: Pt3::new(0.0, 20.0, -1.5),
            radius: 5.0,
            ring_rate: TAU / 20.0,
            samples: 200,
            dt: 0.2,
            delay: 0.0,
        }
    }
}

impl RingScan {
    pub fn true_positions(&self) -> Vec<Pt3> {
        (0..self.samples)
            .map(|i| {
                let theta = self.ring_rate * i as Real * self.dt;
                self.center
                    + Vec3::new(self.radius * theta.sin(), self.radius * theta.cos(), 0.0)
            })
            .collect()
    }

    /// Polar observations whose angles lag by [`Self::delay`].
    ///
    /// Readings satisfy `angle + rate(angle) · delay = true angle`, where
    /// `rate` is the forward-difference angular velocity of the readings
    /// themselves, so shifting them back by the measured rates reproduces the
    /// ring exactly.
    pub fn observations(&self) -> Vec<Observation> {
        let truth: Vec<(Real, Real, Real)> = self
            .true_positions()
            .iter()
            .map(|p| local_to_polar(&p.coords))
            .collect();
        let times: Vec<Real> = (0..self.samples).map(|i| i as Real * self.dt).collect();
        let true_h = unwrap_angles(&truth.iter().map(|t| t.1).collect::<Vec<_>>());
        let true_v: Vec<Real> = truth.iter().map(|t| t.2).collect();

        let mut h = true_h.clone();
        let mut v = true_v.clone();
        if self.delay != 0.0 {
            for _ in 0..60 {
                let h_rate = consecutive_rates(&h, &times);
                let v_rate = consecutive_rates(&v, &times);
                for i in 0..self.samples {
                    h[i] = true_h[i] - h_rate[i] * self.delay;
                    v[i] = true_v[i] - v_rate[i] * self.delay;
                }
            }
        }

        (0..self.samples)
            .map(|i| Observation::polar(times[i], truth[i].0, h[i].rem_euclid(TAU), v[i]))
            .collect()
    }
}

/// Local offset of every observation, without station orientation.
pub fn observed_offsets(observations: &[Observation]) -> Vec<Vec3> {
    observations
        .iter()
        .map(|o| polar_to_local(o.distance, o.horizontal_angle, o.vertical_angle))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::angular_rates;

    #[test]
    fn rigid_observations_reproduce_targets() {
        let targets = circle_targets(10, 5.0, Pt3::origin());
        let shift = Vec3::new(1.0, 2.0, 0.5);
        let yaw = 0.3;
        let obs = rigid_observations(&targets, shift, yaw, 0.1);
        for (o, t) in obs.iter().zip(&targets) {
            let p = shift + polar_to_local(o.distance, o.horizontal_angle + yaw, o.vertical_angle);
            assert!((p - t.coords).norm() < 1e-12);
        }
    }

    #[test]
    fn delayed_ring_angles_shift_back_onto_the_ring() {
        let scan = RingScan {
            delay: 0.03,
            ..RingScan::default()
        };
        let obs = scan.observations();
        let truth = scan.true_positions();
        let times: Vec<Real> = obs.iter().map(|o| o.sensor_timestamp).collect();
        let h: Vec<Real> = obs.iter().map(|o| o.horizontal_angle).collect();
        let v: Vec<Real> = obs.iter().map(|o| o.vertical_angle).collect();
        let h_rate = angular_rates(&h, &times);
        let v_rate = angular_rates(&v, &times);

        for i in 0..obs.len() {
            let p = polar_to_local(
                obs[i].distance,
                h[i] + h_rate[i] * scan.delay,
                v[i] + v_rate[i] * scan.delay,
            );
            assert!((p - truth[i].coords).norm() < 1e-9, "sample {i}");
        }

        // the delay is visible in the raw readings
        let raw = observed_offsets(&obs);
        let worst = raw
            .iter()
            .zip(&truth)
            .map(|(p, t)| (p - t.coords).norm())
            .fold(0.0, Real::max);
        assert!(worst > 1e-2, "worst {worst}");
    }
}
