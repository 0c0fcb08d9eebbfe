use crate::error::{CoreError, CoreResult};
use crate::Real;
use serde::{Deserialize, Serialize};

/// Diagonal stochastic model of a station's observations.
///
/// Distance variance grows with range:
/// `σ_d² = distance_variance + (ppm_factor · 1e-6 · d)²`; both angles share
/// `angle_variance`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VarianceConfig {
    /// Constant distance variance (m²).
    pub distance_variance: Real,
    /// Proportional ranging error in parts per million.
    pub ppm_factor: Real,
    /// Variance of horizontal and vertical angles (rad²).
    pub angle_variance: Real,
}

impl VarianceConfig {
    /// Build from standard deviations as stored in a station record.
    pub fn from_std_devs(distance_std_dev: Real, ppm: Real, angle_std_dev: Real) -> Self {
        Self {
            distance_variance: distance_std_dev * distance_std_dev,
            ppm_factor: ppm,
            angle_variance: angle_std_dev * angle_std_dev,
        }
    }

    #[inline]
    pub fn distance_variance_at(&self, distance: Real) -> Real {
        let proportional = self.ppm_factor * 1e-6 * distance;
        self.distance_variance + proportional * proportional
    }

    /// Rescale so that every entry of the derived variance vector is
    /// multiplied by `factor`.
    ///
    /// The ppm term enters squared, so it scales with `√factor`.
    pub fn apply_factor(&mut self, factor: Real) {
        self.distance_variance *= factor;
        self.angle_variance *= factor;
        self.ppm_factor *= factor.sqrt();
    }

    /// Check that the configuration produces strictly positive variances.
    pub fn validate(&self) -> CoreResult<()> {
        let checks = [
            ("distance_variance", self.distance_variance, true),
            ("angle_variance", self.angle_variance, true),
            ("ppm_factor", self.ppm_factor, false),
        ];
        for (name, value, strictly_positive) in checks {
            let above_bound = if strictly_positive {
                value > 0.0
            } else {
                value >= 0.0
            };
            if !value.is_finite() || !above_bound {
                return Err(CoreError::InvalidVarianceConfig { name, value });
            }
        }
        Ok(())
    }
}

impl Default for VarianceConfig {
    /// 1 mm + 1.5 ppm ranging, 1 mgon angles.
    fn default() -> Self {
        Self::from_std_devs(1e-3, 1.5, 1.5708e-5)
    }
}
