use crate::frames::{FrameId, INTERMEDIATE_FRAME};
use crate::{Pt3, Real};
use serde::{Deserialize, Serialize};

/// Position and heading of a station in a geodetic reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationPose {
    pub x: Real,
    pub y: Real,
    pub z: Real,
    /// Reference frame the coordinates are expressed in.
    pub frame: FrameId,
    /// Horizontal angle offset (rad) added to every horizontal reading.
    pub orientation: Real,
}

impl StationPose {
    /// Station at the origin of `frame` with zero orientation.
    pub fn origin(frame: FrameId) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            frame,
            orientation: 0.0,
        }
    }

    pub fn position(&self) -> Pt3 {
        Pt3::new(self.x, self.y, self.z)
    }
}

impl Default for StationPose {
    fn default() -> Self {
        Self::origin(INTERMEDIATE_FRAME)
    }
}
