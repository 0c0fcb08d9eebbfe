use std::{fs, path::Path, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rts_core::{ClockSync, Observation, Pt3};
use rts_pipeline::{CalibrationConfig, CalibrationService, MemoryStore};
use serde::Serialize;

/// Calibration CLI for robotic total stations.
#[derive(Debug, Parser)]
#[command(author, version, about = "Robotic total station calibration")]
struct Args {
    /// Path to the JSON dataset with stations and jobs.
    #[arg(long)]
    dataset: PathBuf,

    /// Optional path to JSON CalibrationConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Save updated station settings back into the dataset file.
    #[arg(long)]
    write_back: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Estimate the internal delay from a job scanning a sphere.
    InternalDelay {
        #[arg(long)]
        job: u64,
    },
    /// Align the station of a job onto the station of a reference job.
    Align {
        #[arg(long)]
        reference_job: u64,
        #[arg(long)]
        job: u64,
    },
    /// Print the corrected observations and positions of a job.
    Corrected {
        #[arg(long)]
        job: u64,
    },
}

#[derive(Debug, Serialize)]
struct CorrectedOutput {
    job_id: u64,
    clock: ClockSync,
    delay_iterations: usize,
    observations: Vec<Observation>,
    /// Target positions in the station's frame.
    positions: Vec<Pt3>,
}

fn load_config(path: Option<&Path>) -> Result<CalibrationConfig> {
    match path {
        Some(path) => {
            let data = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            serde_json::from_str(&data).with_context(|| format!("invalid config {}", path.display()))
        }
        None => Ok(CalibrationConfig::default()),
    }
}

fn run(args: &Args) -> Result<String> {
    let mut store = MemoryStore::load(&args.dataset)?;
    let config = load_config(args.config.as_deref())?;
    let mut service = CalibrationService::new(&mut store, config);

    let json = match args.command {
        Command::InternalDelay { job } => {
            serde_json::to_string_pretty(&service.estimate_internal_delay(job)?)?
        }
        Command::Align { reference_job, job } => {
            serde_json::to_string_pretty(&service.estimate_alignment(reference_job, job)?)?
        }
        Command::Corrected { job } => {
            let corrected = service.corrected_observations(job)?;
            let positions = service.corrected_positions(job)?;
            serde_json::to_string_pretty(&CorrectedOutput {
                job_id: job,
                clock: corrected.clock,
                delay_iterations: corrected.delay.iterations,
                observations: corrected.observations.to_observations(),
                positions,
            })?
        }
    };

    if args.write_back {
        store.save(&args.dataset)?;
    }
    Ok(json)
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let args = Args::parse();
    let json = run(&args)?;
    println!("{json}");
    Ok(())
}
