//! Synchronisation of the instrument clock with the controller clock.

use super::ObservationSet;
use crate::error::CoreResult;
use crate::linefit::fit_line_2d;
use crate::Real;
use serde::{Deserialize, Serialize};

/// Serial frame size per payload byte: 8 data bits, one start and one stop bit.
pub const BITS_PER_BYTE: Real = 10.0;

/// Clock model recovered by [`ObservationSet::sync_sensor_time`].
///
/// `controller - sensor ≈ slope · sensor + intercept` after removing the
/// serial transmission time from the controller timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClockSync {
    pub slope: Real,
    pub intercept: Real,
    /// Constant subtracted on top of the fitted offset.
    pub external_delay: Real,
    /// Root mean square of the line-fit residuals (s).
    pub rms_residual: Real,
}

impl ClockSync {
    /// Relative drift of the instrument clock in parts per million.
    pub fn drift_ppm(&self) -> Real {
        self.slope * 1e6
    }
}

/// Time needed to transmit `response_length` bytes at `baudrate` bit/s.
#[inline]
pub fn transmission_time(response_length: u32, baudrate: Real) -> Real {
    BITS_PER_BYTE * Real::from(response_length) / baudrate
}

impl ObservationSet {
    /// Map sensor timestamps onto the controller time base.
    ///
    /// Controller timestamps are first corrected for serial transmission time,
    /// then the difference `controller - sensor` is fitted as a line over the
    /// sensor time. Drift and offset are removed from the sensor timestamps
    /// and `external_delay` is subtracted.
    pub fn sync_sensor_time(&mut self, baudrate: Real, external_delay: Real) -> CoreResult<ClockSync> {
        self.sync_sensor_time_weighted(baudrate, external_delay, None)
    }

    /// Like [`Self::sync_sensor_time`] with per-sample line-fit weights.
    ///
    /// On error the set is left unchanged.
    pub fn sync_sensor_time_weighted(
        &mut self,
        baudrate: Real,
        external_delay: Real,
        weights: Option<&[Real]>,
    ) -> CoreResult<ClockSync> {
        let controller: Vec<Real> = self
            .observations
            .iter()
            .map(|o| o.controller_timestamp - transmission_time(o.response_length, baudrate))
            .collect();
        let sensor = self.sensor_timestamps();
        let offsets: Vec<Real> = controller
            .iter()
            .zip(&sensor)
            .map(|(c, s)| c - s)
            .collect();
        let line = fit_line_2d(&sensor, &offsets, weights)?;

        log::info!("total station clock drift: {:.3} ppm", line.slope * 1e6);

        for (obs, controller) in self.observations.iter_mut().zip(controller) {
            let ts = obs.sensor_timestamp;
            obs.controller_timestamp = controller;
            obs.sensor_timestamp = ts + line.slope * ts + line.intercept - external_delay;
        }

        let rms_residual = (line.residuals.iter().map(|r| r * r).sum::<Real>()
            / line.residuals.len() as Real)
            .sqrt();

        Ok(ClockSync {
            slope: line.slope,
            intercept: line.intercept,
            external_delay,
            rms_residual,
        })
    }
}
