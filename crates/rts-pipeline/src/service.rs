//! Calibration workflows over a [`MeasurementStore`] and a [`StationRegistry`].
//!
//! - corrected observations: clock synchronisation and internal delay
//!   correction with the station's stored settings,
//! - internal delay: sphere fit on the raw scan of a job, the time shift is
//!   stored as the station's internal delay,
//! - alignment: an evaluation job is aligned onto a reference job tracking the
//!   same target, the evaluated station is moved accordingly,
//! - corrected positions: corrected observations placed in the station's
//!   native frame through a [`FrameTransform`].

use crate::config::CalibrationConfig;
use crate::store::{JobId, MeasurementStore, StationId, StationRegistry, StationSettings};
use anyhow::{ensure, Context, Result};
use nalgebra::{Rotation3, Vector3};
use rts_adjust::{fit_alignment, fit_sphere, AdjustmentResult, AlignmentParameters};
use rts_core::{
    has_overlap, ClockSync, DelayCorrection, FrameTransform, IdentityFrames, ObservationSet, Pt3,
    Real, StationPose, Vec3,
};
use serde::{Deserialize, Serialize};

/// Observations of a job after both corrections.
#[derive(Debug, Clone)]
pub struct CorrectedObservations {
    pub observations: ObservationSet,
    pub clock: ClockSync,
    pub delay: DelayCorrection,
}

/// Variance component diagnostics shared by both reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentSummary {
    pub variance_factor: Real,
    /// Accumulated factor applied to the a-priori variances.
    pub variance_scale: Real,
    pub redundancy: usize,
    pub global_test_passed: bool,
    pub converged: bool,
    pub iterations: usize,
}

impl AdjustmentSummary {
    fn from_adjustment(adjustment: &AdjustmentResult) -> Self {
        Self {
            variance_factor: adjustment.variance_factor,
            variance_scale: adjustment.variance_scale,
            redundancy: adjustment.redundancy,
            global_test_passed: adjustment
                .history
                .last()
                .map(|pass| pass.global_test.passed)
                .unwrap_or(false),
            converged: adjustment.converged,
            iterations: adjustment.iterations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InternalDelayReport {
    pub job_id: JobId,
    pub station_id: StationId,
    /// Estimated delay of the angles behind the distance (s).
    pub time_shift: Real,
    pub time_shift_std_dev: Real,
    pub radius: Real,
    pub center: [Real; 3],
    pub summary: AdjustmentSummary,
    pub written_back: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub reference_job_id: JobId,
    pub job_id: JobId,
    /// Shift and yaw of the evaluated station in the local frame of the
    /// reference station.
    pub parameters: AlignmentParameters,
    pub std_devs: AlignmentParameters,
    /// Resulting pose of the evaluated station.
    pub station_pose: StationPose,
    /// Clock offset of the evaluation job left after its stored external
    /// delay (s); accumulated into that delay on write-back.
    pub time_shift: Real,
    /// Reference samples used as targets.
    pub samples: usize,
    pub summary: AdjustmentSummary,
    pub written_back: bool,
}

/// Runs the calibration workflows against a store.
pub struct CalibrationService<'a, S, F = IdentityFrames> {
    store: &'a mut S,
    config: CalibrationConfig,
    frames: F,
}

impl<'a, S: MeasurementStore + StationRegistry> CalibrationService<'a, S> {
    /// Service with [`IdentityFrames`]; corrected positions then need stations
    /// set up in the intermediate frame.
    pub fn new(store: &'a mut S, config: CalibrationConfig) -> Self {
        Self::with_frames(store, config, IdentityFrames)
    }
}

impl<'a, S, F> CalibrationService<'a, S, F>
where
    S: MeasurementStore + StationRegistry,
    F: FrameTransform,
{
    pub fn with_frames(store: &'a mut S, config: CalibrationConfig, frames: F) -> Self {
        Self {
            store,
            config,
            frames,
        }
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    fn job_station(&self, job_id: JobId) -> Result<(StationId, StationSettings)> {
        let job = self.store.job(job_id)?;
        let settings = self
            .store
            .station(job.station_id)
            .with_context(|| format!("station of job {job_id}"))?;
        settings
            .validate()
            .with_context(|| format!("invalid settings of station {}", job.station_id))?;
        Ok((job.station_id, settings))
    }

    /// Observations of a job as recorded, with the station's pose and
    /// stochastic model.
    pub fn raw_observations(&self, job_id: JobId) -> Result<ObservationSet> {
        let (_, settings) = self.job_station(job_id)?;
        let measurements = self.store.measurements(job_id)?;
        ObservationSet::new(measurements, settings.variance_config(), settings.pose)
            .with_context(|| format!("failed to build observations of job {job_id}"))
    }

    /// Raw observations with synchronised sensor time and the stored internal
    /// delay removed.
    pub fn corrected_observations(&self, job_id: JobId) -> Result<CorrectedObservations> {
        let (_, settings) = self.job_station(job_id)?;
        let mut observations = self.raw_observations(job_id)?;
        let clock = observations
            .sync_sensor_time(settings.baudrate, settings.external_delay)
            .with_context(|| format!("failed to synchronise clocks of job {job_id}"))?;
        let delay = observations.apply_intrinsic_delay(settings.internal_delay);
        Ok(CorrectedObservations {
            observations,
            clock,
            delay,
        })
    }

    /// Corrected target positions of a job in its station's native frame.
    pub fn corrected_positions(&self, job_id: JobId) -> Result<Vec<Pt3>> {
        let corrected = self.corrected_observations(job_id)?;
        let frame = corrected.observations.pose().frame;
        corrected
            .observations
            .xyz(&self.frames)
            .with_context(|| format!("failed to place job {job_id} in frame {frame}"))
    }

    /// Estimate the internal delay of the station that recorded `job_id`.
    ///
    /// The job must track a target moving on a sphere around a fixed centre.
    pub fn estimate_internal_delay(&mut self, job_id: JobId) -> Result<InternalDelayReport> {
        let (station_id, _) = self.job_station(job_id)?;
        let mut observations = self.raw_observations(job_id)?;
        let options = self.config.internal_delay;
        let fit = fit_sphere(&mut observations, &options.model, &options.adjust)
            .with_context(|| format!("sphere fit failed for job {job_id}"))?;

        let time_shift = fit.parameters.time_shift;
        log::info!(
            "job {job_id}: internal delay of station {station_id} is {:.3} ms",
            time_shift * 1e3
        );
        if !fit.adjustment.converged {
            log::warn!("job {job_id}: sphere fit did not converge, storing last iterate");
        }
        if options.write_back {
            self.store.update_internal_delay(station_id, time_shift)?;
        }

        let p = fit.parameters;
        Ok(InternalDelayReport {
            job_id,
            station_id,
            time_shift,
            time_shift_std_dev: fit.std_devs.time_shift,
            radius: p.radius,
            center: [p.center_x, p.center_y, p.center_z],
            summary: AdjustmentSummary::from_adjustment(&fit.adjustment),
            written_back: options.write_back,
        })
    }

    /// Align the station of `job_id` onto the station of `reference_job_id`.
    ///
    /// Both jobs are corrected and expressed around their own instrument with
    /// zero orientation. The reference positions inside the common time span
    /// become targets, the evaluation job is interpolated at their
    /// timestamps, and the estimated shift and yaw are composed with the
    /// reference station's pose.
    ///
    /// The 4-parameter model estimates no clock offset; the evaluation job is
    /// corrected with its stored external delay and a zero residual shift is
    /// accumulated into it.
    pub fn estimate_alignment(
        &mut self,
        reference_job_id: JobId,
        job_id: JobId,
    ) -> Result<AlignmentReport> {
        let (_, reference_settings) = self.job_station(reference_job_id)?;
        let (station_id, _) = self.job_station(job_id)?;
        let options = self.config.alignment;

        let mut reference = self.corrected_observations(reference_job_id)?.observations;
        let mut evaluation = self.corrected_observations(job_id)?.observations;
        reference.set_pose(StationPose::origin(reference_settings.pose.frame));
        evaluation.set_pose(StationPose::origin(reference_settings.pose.frame));

        let reference_times = reference.sensor_timestamps();
        let times = evaluation.sensor_timestamps();
        ensure!(
            has_overlap(&reference_times, &times),
            "jobs {reference_job_id} and {job_id} do not overlap in time"
        );

        let (start, end) = (times[0], times[times.len() - 1]);
        let (sample_times, targets): (Vec<Real>, Vec<Pt3>) = reference_times
            .iter()
            .zip(reference.local_xyz())
            .filter(|(t, _)| (start..=end).contains(*t))
            .map(|(t, p)| (*t, Pt3::from(p)))
            .unzip();
        ensure!(
            sample_times.len() >= options.min_samples,
            "only {} reference samples inside the overlap, need {}",
            sample_times.len(),
            options.min_samples
        );
        log::debug!(
            "aligning job {job_id} onto job {reference_job_id} with {} samples",
            sample_times.len()
        );

        let mut paired = evaluation
            .interpolate_polar(&sample_times)
            .with_context(|| format!("failed to interpolate job {job_id}"))?;
        let fit = fit_alignment(&targets, &mut paired, &options.adjust)
            .with_context(|| format!("alignment of job {job_id} onto job {reference_job_id} failed"))?;

        let station_pose = compose_pose(&reference_settings.pose, &fit.parameters);
        log::info!(
            "station {station_id}: position ({:.4}, {:.4}, {:.4}), orientation {:.6} rad",
            station_pose.x,
            station_pose.y,
            station_pose.z,
            station_pose.orientation
        );
        let time_shift = 0.0;
        if options.write_back {
            self.store.move_station(station_id, station_pose)?;
            self.store.add_to_external_delay(station_id, time_shift)?;
        }

        Ok(AlignmentReport {
            reference_job_id,
            job_id,
            parameters: fit.parameters,
            std_devs: fit.std_devs,
            station_pose,
            time_shift,
            samples: sample_times.len(),
            summary: AdjustmentSummary::from_adjustment(&fit.adjustment),
            written_back: options.write_back,
        })
    }
}

/// Pose of a station aligned relative to `reference`.
///
/// The shift is expressed in the reference station's frame with zero
/// orientation, so it is rotated by the reference orientation before it is
/// added. Horizontal angles grow clockwise, hence the negative rotation.
pub fn compose_pose(reference: &StationPose, alignment: &AlignmentParameters) -> StationPose {
    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), -reference.orientation);
    let shift: Vec3 = rotation * alignment.shift();
    StationPose {
        x: reference.x + shift.x,
        y: reference.y + shift.y,
        z: reference.z + shift.z,
        frame: reference.frame,
        orientation: reference.orientation + alignment.phi,
    }
}
