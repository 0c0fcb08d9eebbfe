//! Calibration workflows for robotic total stations.
//!
//! [`CalibrationService`] reads jobs and station settings through the
//! [`MeasurementStore`] and [`StationRegistry`] traits, runs the adjustments
//! of `rts-adjust` and writes the results back to the registry.
//!
//! ```no_run
//! use rts_pipeline::{CalibrationConfig, CalibrationService, MemoryStore};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut store = MemoryStore::load(Path::new("dataset.json"))?;
//! let mut service = CalibrationService::new(&mut store, CalibrationConfig::default());
//! let report = service.estimate_internal_delay(1)?;
//! println!("internal delay: {:.3} ms", report.time_shift * 1e3);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod memory;
pub mod service;
pub mod store;

pub use config::{AlignmentConfig, CalibrationConfig, InternalDelayConfig};
pub use memory::{JobRecord, MemoryStore, StationRecord};
pub use service::{
    compose_pose, AdjustmentSummary, AlignmentReport, CalibrationService, CorrectedObservations,
    InternalDelayReport,
};
pub use store::{Job, JobId, MeasurementStore, StationId, StationRegistry, StationSettings};
