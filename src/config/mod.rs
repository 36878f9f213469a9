//! Configuration management for driver runs
//!
//! Command-line arguments and the `.CHRG`/`.UHF` marker files are resolved
//! once into an immutable [`RunOptions`] value before anything is evaluated.

mod args;
pub mod charge;

pub use args::Args;
pub use charge::{resolve_charge_and_multiplicity, ChargeMultiplicity, ResolveError, Source};

use color_eyre::eyre::Result;
use std::path::{Path, PathBuf};

pub const DEFAULT_MODEL: &str = "uma-sm";
pub const DEFAULT_FMAX: f64 = 5e-4;
/// Hard cap on optimizer iterations
pub const MAX_OPT_STEPS: usize = 1000;
/// Task head of the potential used for molecules
pub const MODEL_TASK: &str = "omol";

pub const GRADIENT_FILE: &str = "gradient";
pub const ENERGY_FILE: &str = "energy";
pub const TRAJECTORY_FILE: &str = "trajectory.out";
pub const OPTIMIZED_FILE: &str = "omol25-opt.xyz";

/// Everything a run needs, resolved from the command line and marker files.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub structure_file: PathBuf,
    pub charge: i32,
    pub multiplicity: i32,
    pub optimize: bool,
    pub fmax: f64,
    pub max_steps: usize,
    pub model: String,
    pub device: String,
    pub runner: String,
    pub verbose: bool,
    /// Directory receiving the output files
    pub job_dir: PathBuf,
}

impl RunOptions {
    /// Resolve options from parsed arguments. Output files go to the current
    /// working directory.
    pub fn from_args(args: &Args) -> Result<Self> {
        Self::from_args_in(args, PathBuf::from("."))
    }

    pub fn from_args_in(args: &Args, job_dir: PathBuf) -> Result<Self> {
        let marker_dir = marker_directory(&args.structure_file);
        let resolved = resolve_charge_and_multiplicity(
            &marker_dir,
            args.charge,
            args.multiplicity,
            args.verbose,
        )?;

        Ok(RunOptions {
            structure_file: args.structure_file.clone(),
            charge: resolved.charge,
            multiplicity: resolved.multiplicity,
            optimize: args.opt,
            fmax: args.fmax,
            max_steps: MAX_OPT_STEPS,
            model: args.model.clone(),
            device: args.device.clone(),
            runner: args.runner.clone(),
            verbose: args.verbose,
            job_dir,
        })
    }

    pub fn gradient_path(&self) -> PathBuf {
        self.job_dir.join(GRADIENT_FILE)
    }

    pub fn energy_path(&self) -> PathBuf {
        self.job_dir.join(ENERGY_FILE)
    }

    pub fn trajectory_path(&self) -> PathBuf {
        self.job_dir.join(TRAJECTORY_FILE)
    }

    pub fn optimized_path(&self) -> PathBuf {
        self.job_dir.join(OPTIMIZED_FILE)
    }
}

/// Marker files live next to the structure file, not in the working
/// directory.
pub fn marker_directory(structure_file: &Path) -> PathBuf {
    match structure_file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
