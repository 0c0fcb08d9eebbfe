//! Functional models of the two calibration problems.

pub mod alignment;
pub mod sphere;

pub use alignment::*;
pub use sphere::*;
