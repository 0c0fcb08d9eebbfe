//! Storage seams for measurement jobs and station settings.
//!
//! The workflows in [`crate::service`] only talk to these traits; an
//! in-memory implementation lives in [`crate::memory`].

use anyhow::{ensure, Result};
use rts_core::{Observation, Real, StationPose, VarianceConfig};
use serde::{Deserialize, Serialize};

pub type JobId = u64;
pub type StationId = u64;

/// Calibration-relevant settings of one station.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationSettings {
    pub pose: StationPose,
    /// Constant part of the distance standard deviation (m).
    pub distance_std_dev: Real,
    /// Distance-proportional standard deviation (ppm).
    pub distance_ppm: Real,
    /// Standard deviation of both angles (rad).
    pub angle_std_dev: Real,
    /// Serial line speed (bit/s).
    pub baudrate: Real,
    /// Delay of the angle channel relative to the distance channel (s).
    pub internal_delay: Real,
    /// Constant offset between the synchronised clocks (s).
    pub external_delay: Real,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            pose: StationPose::default(),
            distance_std_dev: 1e-3,
            distance_ppm: 1.5,
            angle_std_dev: 1.5708e-5,
            baudrate: 115_200.0,
            internal_delay: 0.0,
            external_delay: 0.0,
        }
    }
}

impl StationSettings {
    pub fn variance_config(&self) -> VarianceConfig {
        VarianceConfig::from_std_devs(self.distance_std_dev, self.distance_ppm, self.angle_std_dev)
    }

    /// Reject settings the corrections cannot work with.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.baudrate.is_finite() && self.baudrate > 0.0,
            "baudrate must be positive, got {}",
            self.baudrate
        );
        ensure!(
            self.internal_delay.is_finite() && self.external_delay.is_finite(),
            "station delays must be finite"
        );
        self.variance_config().validate()?;
        Ok(())
    }
}

/// A measurement job: one tracking session of one station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub station_id: StationId,
}

/// Read access to recorded jobs.
pub trait MeasurementStore {
    fn job(&self, id: JobId) -> Result<Job>;

    /// Raw observations of a job in storage order.
    fn measurements(&self, job: JobId) -> Result<Vec<Observation>>;
}

/// Station settings with the write-backs of the calibrations.
pub trait StationRegistry {
    fn station(&self, id: StationId) -> Result<StationSettings>;

    fn update_internal_delay(&mut self, id: StationId, delay: Real) -> Result<()>;

    /// Replace position and orientation of a station.
    fn move_station(&mut self, id: StationId, pose: StationPose) -> Result<()>;

    /// Add a residual clock offset to the station's external delay.
    fn add_to_external_delay(&mut self, id: StationId, shift: Real) -> Result<()>;
}
