//! Deterministic noise helpers for synthetic datasets.
//!
//! The generators are keyed by `(seed, stream, index)` and do not depend on
//! any RNG crate, so synthetic scans stay identical across versions and
//! platforms.

use crate::types::Observation;
use crate::Real;
use std::f64::consts::TAU;

/// Deterministic zero-mean Gaussian noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianNoise {
    pub seed: u64,
    pub std_dev: Real,
}

impl GaussianNoise {
    pub fn new(seed: u64, std_dev: Real) -> Self {
        Self { seed, std_dev }
    }

    /// Sample for the key `(stream, index)` via Box-Muller.
    pub fn sample(&self, stream: usize, index: usize) -> Real {
        if self.std_dev == 0.0 {
            return 0.0;
        }
        let key = mix_key(self.seed, stream, index);
        // shift into (0, 1] so the logarithm stays finite
        let u1 = 1.0 - u64_to_unit_f64(splitmix64(key));
        let u2 = u64_to_unit_f64(splitmix64(key ^ 0x94D0_49BB_1331_11EB));
        self.std_dev * (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
    }
}

/// Independent Gaussian noise on the three polar channels of an observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarNoise {
    pub seed: u64,
    pub distance_std_dev: Real,
    pub angle_std_dev: Real,
}

impl PolarNoise {
    pub fn apply(&self, index: usize, obs: &mut Observation) {
        let distance = GaussianNoise::new(self.seed, self.distance_std_dev);
        let angle = GaussianNoise::new(self.seed, self.angle_std_dev);
        obs.distance += distance.sample(0, index);
        obs.horizontal_angle += angle.sample(1, index);
        obs.vertical_angle += angle.sample(2, index);
    }

    pub fn apply_all(&self, observations: &mut [Observation]) {
        for (index, obs) in observations.iter_mut().enumerate() {
            self.apply(index, obs);
        }
    }
}

#[inline]
fn mix_key(seed: u64, stream: usize, index: usize) -> u64 {
    seed ^ (stream as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (index as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

#[inline]
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[inline]
fn u64_to_unit_f64(x: u64) -> Real {
    // top 53 bits -> [0, 1)
    let mantissa = x >> 11;
    (mantissa as Real) * (1.0 / ((1u64 << 53) as Real))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gaussian_noise_is_deterministic_and_keyed() {
        let noise = GaussianNoise::new(7, 0.5);
        assert_eq!(noise.sample(0, 3), noise.sample(0, 3));
        assert_ne!(noise.sample(0, 3), noise.sample(1, 3));
        assert_ne!(noise.sample(0, 3), noise.sample(0, 4));
        assert_eq!(GaussianNoise::new(7, 0.0).sample(0, 3), 0.0);
    }

    #[test]
    fn gaussian_noise_has_expected_moments() {
        let noise = GaussianNoise::new(42, 2.0);
        let n = 20_000;
        let samples: Vec<Real> = (0..n).map(|i| noise.sample(0, i)).collect();
        let mean = samples.iter().sum::<Real>() / n as Real;
        let var = samples.iter().map(|s| (s - mean).powi(2)).sum::<Real>() / (n - 1) as Real;
        assert!(mean.abs() < 0.05, "mean {mean}");
        assert!((var.sqrt() - 2.0).abs() < 0.05, "std {}", var.sqrt());
    }
}
