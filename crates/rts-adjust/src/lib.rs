//! Gauss-Helmert adjustment for robotic total station calibration.
//!
//! This crate contains:
//! - sparse matrix helpers built on `nalgebra-sparse` ([`SparseTriplets`],
//!   [`SparseSpdSolver`]),
//! - the [`FunctionalModel`] trait and a generic mixed-model [`solve`],
//! - variance component estimation with a χ² global test ([`adjust`]),
//! - the alignment and sphere/time-shift models in [`problems`].
//!
//! Typical use goes through the problem-level entry points:
//!
//! ```no_run
//! use rts_adjust::{fit_sphere, AdjustOptions, SphereModelOptions};
//! use rts_core::synthetic::scenes::RingScan;
//! use rts_core::{ObservationSet, StationPose, VarianceConfig};
//!
//! let scan = RingScan { delay: 0.03, ..RingScan::default() };
//! let mut set = ObservationSet::new(
//!     scan.observations(),
//!     VarianceConfig::default(),
//!     StationPose::default(),
//! )
//! .unwrap();
//! let fit = fit_sphere(&mut set, &SphereModelOptions::default(), &AdjustOptions::default()).unwrap();
//! println!("time shift: {:.3} ms", fit.parameters.time_shift * 1e3);
//! ```

pub mod error;
pub mod model;
pub mod problems;
pub mod solver;
pub mod sparse;
pub mod variance;

pub use error::*;
pub use model::FunctionalModel;
pub use problems::*;
pub use solver::{solve, Solution, SolverOptions, MAX_SOLVER_ITERATIONS, MIN_RELATIVE_PIVOT};
pub use sparse::{spmv, spmv_transpose, SparseSpdSolver, SparseTriplets};
pub use variance::*;
