use crate::io::format_wall_time;
use crate::model::Calculator;
use crate::structure::Molecule;
use crate::units::ev_to_hartree;
use color_eyre::eyre::Result;
use nalgebra::Vector3;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Single-point result of the final geometry
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Total energy in Hartree
    pub energy: f64,
    /// Atomic forces in eV/Angstrom
    pub forces: Vec<Vector3<f64>>,
    pub energy_time: Duration,
    pub gradient_time: Duration,
    pub total_time: Duration,
}

/// Timed energy and force evaluation of `mol`. Each wall time is logged as
/// soon as its stage finishes.
pub fn evaluate(calc: &mut Calculator, mol: &Molecule) -> Result<Evaluation> {
    let start = Instant::now();
    let energy_ev = calc.get_potential_energy(mol)?;
    let energy_time = start.elapsed();
    info!(
        "Wall time for single-point energy: {}",
        format_wall_time(energy_time)
    );

    let gradient_start = Instant::now();
    let forces = calc.get_forces(mol)?;
    let gradient_time = gradient_start.elapsed();
    info!(
        "Wall time for nuclear gradient: {}",
        format_wall_time(gradient_time)
    );

    let total_time = start.elapsed();
    info!("Total wall time: {}", format_wall_time(total_time));
    debug!("{} model evaluations in total", calc.number_of_evaluations());

    Ok(Evaluation {
        energy: ev_to_hartree(energy_ev),
        forces,
        energy_time,
        gradient_time,
        total_time,
    })
}
