use rts_adjust::{AdjustOptions, SphereModelOptions};
use serde::{Deserialize, Serialize};

/// Options of the internal delay calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InternalDelayConfig {
    pub model: SphereModelOptions,
    pub adjust: AdjustOptions,
    /// Store the estimated time shift in the station registry.
    pub write_back: bool,
}

impl Default for InternalDelayConfig {
    fn default() -> Self {
        Self {
            model: SphereModelOptions::default(),
            adjust: AdjustOptions::default(),
            write_back: true,
        }
    }
}

/// Options of the station alignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    pub adjust: AdjustOptions,
    /// Minimum number of reference samples inside the overlap.
    pub min_samples: usize,
    /// Move the evaluated station in the registry.
    pub write_back: bool,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            adjust: AdjustOptions::default(),
            min_samples: 3,
            write_back: true,
        }
    }
}

/// Configuration of all workflows in [`crate::CalibrationService`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub internal_delay: InternalDelayConfig,
    pub alignment: AlignmentConfig,
}

impl CalibrationConfig {
    /// Configuration with every registry write-back disabled.
    pub fn dry_run() -> Self {
        let mut config = Self::default();
        config.internal_delay.write_back = false;
        config.alignment.write_back = false;
        config
    }
}
