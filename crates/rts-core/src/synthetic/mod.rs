//! Deterministic synthetic data generation helpers.
//!
//! Building blocks for calibration scenarios with known ground truth, used in
//! tests across the workspace:
//! - circular target sets and rigidly displaced stations observing them,
//! - ring scans with an injected angle-channel delay,
//! - keyed Gaussian noise for polar observations.
//!
//! # Example
//!
//! ```
//! use rts_core::synthetic::scenes;
//! use rts_core::{Pt3, Vec3};
//!
//! let targets = scenes::circle_targets(10, 5.0, Pt3::origin());
//! let obs = scenes::rigid_observations(&targets, Vec3::new(1.0, 2.0, 0.5), 0.3, 0.1);
//! assert_eq!(obs.len(), 10);
//! ```

pub mod noise;
pub mod scenes;
