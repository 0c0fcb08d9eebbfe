//! In-memory store, serialisable as a single JSON dataset.

use crate::store::{Job, JobId, MeasurementStore, StationId, StationRegistry, StationSettings};
use anyhow::{anyhow, bail, Context, Result};
use rts_core::{Observation, Real, StationPose};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    pub id: StationId,
    #[serde(default)]
    pub settings: StationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub station_id: StationId,
    pub measurements: Vec<Observation>,
}

/// Stations and jobs held in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStore {
    #[serde(default)]
    pub stations: Vec<StationRecord>,
    #[serde(default)]
    pub jobs: Vec<JobRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a station.
    pub fn insert_station(&mut self, id: StationId, settings: StationSettings) {
        match self.stations.iter_mut().find(|s| s.id == id) {
            Some(record) => record.settings = settings,
            None => self.stations.push(StationRecord { id, settings }),
        }
    }

    /// Insert or replace a job.
    ///
    /// Bookkeeping ids of the measurements are overwritten with the job's ids.
    pub fn insert_job(&mut self, id: JobId, station_id: StationId, mut measurements: Vec<Observation>) {
        for m in &mut measurements {
            m.job_id = id;
            m.station_id = station_id;
        }
        let record = JobRecord {
            id,
            station_id,
            measurements,
        };
        match self.jobs.iter_mut().find(|j| j.id == id) {
            Some(existing) => *existing = record,
            None => self.jobs.push(record),
        }
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        serde_json::from_str(data).context("failed to parse dataset")
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("failed to read dataset {}", path.display()))?;
        Self::from_json_str(&data).with_context(|| format!("in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json_string()?)
            .with_context(|| format!("failed to write dataset {}", path.display()))
    }

    fn job_record(&self, id: JobId) -> Result<&JobRecord> {
        self.jobs
            .iter()
            .find(|j| j.id == id)
            .ok_or_else(|| anyhow!("job {id} not found"))
    }

    fn station_mut(&mut self, id: StationId) -> Result<&mut StationSettings> {
        self.stations
            .iter_mut()
            .find(|s| s.id == id)
            .map(|s| &mut s.settings)
            .ok_or_else(|| anyhow!("station {id} not found"))
    }
}

impl MeasurementStore for MemoryStore {
    fn job(&self, id: JobId) -> Result<Job> {
        let record = self.job_record(id)?;
        Ok(Job {
            id,
            station_id: record.station_id,
        })
    }

    fn measurements(&self, job: JobId) -> Result<Vec<Observation>> {
        Ok(self.job_record(job)?.measurements.clone())
    }
}

impl StationRegistry for MemoryStore {
    fn station(&self, id: StationId) -> Result<StationSettings> {
        self.stations
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.settings)
            .ok_or_else(|| anyhow!("station {id} not found"))
    }

    fn update_internal_delay(&mut self, id: StationId, delay: Real) -> Result<()> {
        if !delay.is_finite() {
            bail!("refusing to store non-finite internal delay for station {id}");
        }
        self.station_mut(id)?.internal_delay = delay;
        Ok(())
    }

    fn move_station(&mut self, id: StationId, pose: StationPose) -> Result<()> {
        self.station_mut(id)?.pose = pose;
        Ok(())
    }

    fn add_to_external_delay(&mut self, id: StationId, shift: Real) -> Result<()> {
        if !shift.is_finite() {
            bail!("refusing to add non-finite time shift to station {id}");
        }
        self.station_mut(id)?.external_delay += shift;
        Ok(())
    }
}
