//! Command-line argument parsing for the driver

use clap::Parser;
use std::path::PathBuf;

/// Single-point energy and gradient driver for machine-learned potentials
#[derive(Parser, Debug)]
#[command(name = "omol-driver")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Input structure file (XYZ or Turbomole coord)
    pub structure_file: PathBuf,

    /// Override molecular charge
    #[arg(long, allow_hyphen_values = true)]
    pub charge: Option<i32>,

    /// Override spin multiplicity
    #[arg(long, allow_hyphen_values = true)]
    pub multiplicity: Option<i32>,

    /// Optimization threshold / eV/Å
    #[arg(long, default_value_t = super::DEFAULT_FMAX)]
    pub fmax: f64,

    /// Print charge/multiplicity source info and timings
    #[arg(long)]
    pub verbose: bool,

    /// Optimize the structure
    #[arg(long)]
    pub opt: bool,

    /// Model name for the MLIP ("lj" selects the built-in Lennard-Jones potential)
    #[arg(long, default_value = super::DEFAULT_MODEL)]
    pub model: String,

    /// Device handed to the model runner
    #[arg(long, default_value = "cuda")]
    pub device: String,

    /// Command serving the MLIP over stdin/stdout
    #[arg(long, env = "OMOL_RUNNER", default_value = "omol-runner")]
    pub runner: String,
}
