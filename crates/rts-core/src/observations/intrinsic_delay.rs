//! Correction of the internal delay between distance and angle channels.

use super::ObservationSet;
use crate::Real;
use serde::{Deserialize, Serialize};

pub const INTRINSIC_DELAY_MAX_ITERATIONS: usize = 100;
pub const INTRINSIC_DELAY_TOLERANCE: Real = 1e-6;

/// Outcome of [`ObservationSet::apply_intrinsic_delay`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelayCorrection {
    pub iterations: usize,
    pub converged: bool,
    /// Summed absolute change of both angular velocities in the last pass.
    pub last_change: Real,
}

impl ObservationSet {
    /// Shift angles to the instant the distance was measured.
    ///
    /// Angular velocities can only be estimated from the delayed angles
    /// themselves, so the correction is refined as a fixed point: starting from
    /// the raw angles, `angle = raw + rate(angle) · delay` is repeated until
    /// the summed absolute change of both rates (non-finite entries ignored)
    /// falls below [`INTRINSIC_DELAY_TOLERANCE`].
    ///
    /// `delay == 0` leaves the set untouched. Hitting
    /// [`INTRINSIC_DELAY_MAX_ITERATIONS`] is reported in the result and logged,
    /// the last iterate is kept.
    pub fn apply_intrinsic_delay(&mut self, delay: Real) -> DelayCorrection {
        if delay == 0.0 {
            return DelayCorrection {
                iterations: 0,
                converged: true,
                last_change: 0.0,
            };
        }

        log::info!("correcting intrinsic delay of {:.3} ms", delay * 1e3);

        let raw_h = self.horizontal_angles();
        let raw_v = self.vertical_angles();

        let mut iterations = 0;
        let mut last_change = Real::INFINITY;
        while iterations < INTRINSIC_DELAY_MAX_ITERATIONS {
            let h_before = self.horizontal_rates();
            for ((obs, raw), rate) in self.observations.iter_mut().zip(&raw_h).zip(&h_before) {
                obs.horizontal_angle = raw + rate * delay;
            }
            let h_after = self.horizontal_rates();

            let v_before = self.vertical_rates();
            for ((obs, raw), rate) in self.observations.iter_mut().zip(&raw_v).zip(&v_before) {
                obs.vertical_angle = raw + rate * delay;
            }
            let v_after = self.vertical_rates();

            last_change =
                summed_change(&h_before, &h_after) + summed_change(&v_before, &v_after);
            iterations += 1;
            if last_change < INTRINSIC_DELAY_TOLERANCE {
                log::info!("intrinsic delay correction finished after {iterations} iterations");
                return DelayCorrection {
                    iterations,
                    converged: true,
                    last_change,
                };
            }
        }

        log::warn!(
            "intrinsic delay correction did not converge after {iterations} iterations (change {last_change:.3e})"
        );
        DelayCorrection {
            iterations,
            converged: false,
            last_change,
        }
    }
}

fn summed_change(before: &[Real], after: &[Real]) -> Real {
    before
        .iter()
        .zip(after)
        .map(|(b, a)| (b - a).abs())
        .filter(|d| d.is_finite())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Observation, StationPose, VarianceConfig};

    fn rotating_set(rate: Real) -> ObservationSet {
        let obs = (0..40)
            .map(|i| {
                let t = 0.1 * i as Real;
                Observation::polar(t, 25.0, 0.5 + rate * t, 1.4 + 0.5 * rate * t)
            })
            .collect();
        ObservationSet::new(obs, VarianceConfig::default(), StationPose::default()).unwrap()
    }

    #[test]
    fn zero_delay_is_a_no_op() {
        let mut set = rotating_set(0.7);
        let before = set.clone();
        let report = set.apply_intrinsic_delay(0.0);
        assert_eq!(report.iterations, 0);
        assert!(report.converged);
        assert_eq!(set, before);
    }

    #[test]
    fn constant_rotation_is_shifted_by_rate_times_delay() {
        let rate = 0.7;
        let delay = 0.02;
        let mut set = rotating_set(rate);
        let raw_h = set.horizontal_angles();
        let raw_v = set.vertical_angles();

        let report = set.apply_intrinsic_delay(delay);
        assert!(report.converged, "{report:?}");
        assert!(report.iterations > 1);

        let h = set.horizontal_angles();
        let v = set.vertical_angles();
        let last = h.len() - 1;
        // the zero end rate leaks into the last few samples and decays backwards
        for i in 0..last - 10 {
            assert!((h[i] - raw_h[i] - rate * delay).abs() < 1e-9, "h[{i}]");
            assert!((v[i] - raw_v[i] - 0.5 * rate * delay).abs() < 1e-9, "v[{i}]");
        }
        // the last sample has no forward difference and stays put
        assert_eq!(h[last], raw_h[last]);
    }

    #[test]
    fn delay_beyond_sample_spacing_hits_the_iteration_cap() {
        // delay / dt = 2.5: the fixed-point map amplifies every change
        let mut set = rotating_set(0.7);
        let report = set.apply_intrinsic_delay(0.25);

        assert!(!report.converged, "{report:?}");
        assert_eq!(report.iterations, INTRINSIC_DELAY_MAX_ITERATIONS);
        assert!(report.last_change.is_finite());
        assert!(report.last_change > INTRINSIC_DELAY_TOLERANCE);
        assert!(set
            .horizontal_angles()
            .iter()
            .chain(&set.vertical_angles())
            .all(|a| a.is_finite()));
    }
}
