//! Observation model for robotic total station calibration.
//!
//! This crate contains:
//! - linear algebra type aliases and angle helpers (`Real`, `Vec3`, `Pt3`, unwrap),
//! - raw polar [`Observation`]s, [`StationPose`] and the diagonal [`VarianceConfig`],
//! - [`ObservationSet`] with clock synchronisation and intrinsic delay correction,
//! - a weighted 2D line fit and the reference-frame seam ([`FrameTransform`]),
//! - deterministic synthetic scenes for tests.
//!
//! Polar convention:
//! `x = d·sin(v)·sin(h)`, `y = d·sin(v)·cos(h)`, `z = d·cos(v)`

/// Typed errors.
pub mod error;
/// Reference frames and the transform seam.
pub mod frames;
/// Weighted least-squares line fit.
pub mod linefit;
/// Linear algebra type aliases and helpers.
pub mod math;
/// Observation sets and their corrections.
pub mod observations;
/// Deterministic synthetic data generation.
pub mod synthetic;
/// Observation, station and stochastic model types.
pub mod types;

pub use error::*;
pub use frames::*;
pub use linefit::*;
pub use math::*;
pub use observations::*;
pub use types::*;
