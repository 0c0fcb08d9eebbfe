//! Raw polar samples as delivered by a total station.

use crate::Real;
use serde::{Deserialize, Serialize};

/// One polar measurement of a tracked target.
///
/// Angles are in radians, distances in metres and timestamps in seconds.
/// `controller_timestamp` is the host clock at reception of the response,
/// `sensor_timestamp` the instrument clock at measurement time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub distance: Real,
    pub horizontal_angle: Real,
    pub vertical_angle: Real,
    pub controller_timestamp: Real,
    pub sensor_timestamp: Real,
    /// Length of the serial response carrying this sample, in bytes.
    #[serde(default)]
    pub response_length: u32,
    #[serde(default)]
    pub geocom_return_code: i32,
    #[serde(default)]
    pub rpc_return_code: i32,
    #[serde(default)]
    pub station_id: u64,
    #[serde(default)]
    pub job_id: u64,
}

impl Observation {
    /// Sample with both clocks set to `timestamp` and all bookkeeping fields zeroed.
    pub fn polar(timestamp: Real, distance: Real, horizontal: Real, vertical: Real) -> Self {
        Self {
            distance,
            horizontal_angle: horizontal,
            vertical_angle: vertical,
            controller_timestamp: timestamp,
            sensor_timestamp: timestamp,
            response_length: 0,
            geocom_return_code: 0,
            rpc_return_code: 0,
            station_id: 0,
            job_id: 0,
        }
    }
}
