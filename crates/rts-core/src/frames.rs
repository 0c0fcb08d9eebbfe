//! Coordinate reference frames.
//!
//! Stations are positioned in some projected frame identified by an EPSG-like
//! code. Observations are converted to an intermediate frame before any
//! geometric comparison. Real geodetic transformations live outside this
//! crate and plug in through [`FrameTransform`].

use crate::error::{CoreError, CoreResult};
use crate::math::Pt3;

/// Identifier of a coordinate reference frame (EPSG code).
pub type FrameId = u32;

/// Frame all cross-station computations are carried out in (ETRS89 / UTM 32N).
pub const INTERMEDIATE_FRAME: FrameId = 25832;

/// Converts points between coordinate reference frames.
pub trait FrameTransform {
    fn transform(&self, point: &Pt3, from: FrameId, to: FrameId) -> CoreResult<Pt3>;
}

/// Transform that only accepts identical source and target frames.
///
/// Any station already configured in the intermediate frame can be used with
/// it; anything else fails with [`CoreError::UnsupportedFrame`].
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityFrames;

impl FrameTransform for IdentityFrames {
    fn transform(&self, point: &Pt3, from: FrameId, to: FrameId) -> CoreResult<Pt3> {
        if from == to {
            Ok(*point)
        } else {
            Err(CoreError::UnsupportedFrame { from, to })
        }
    }
}
