//! Writers for the Turbomole-style `gradient` and `energy` data groups read
//! back by the host program.

use crate::structure::Molecule;
use crate::units::{angstrom_to_bohr, force_to_gradient};
use color_eyre::eyre::{Result, WrapErr};
use nalgebra::Vector3;
use std::fmt::Write as _;
use std::path::Path;

/// Convert forces in eV/Angstrom into an energy gradient in Hartree/Bohr.
pub fn forces_to_gradient(forces: &[Vector3<f64>]) -> Vec<Vector3<f64>> {
    forces.iter().map(|f| f.map(force_to_gradient)).collect()
}

/// Euclidean norm of the flattened gradient.
pub fn gradient_norm(gradient: &[Vector3<f64>]) -> f64 {
    gradient.iter().map(|g| g.norm_squared()).sum::<f64>().sqrt()
}

/// Format the `$grad` group. Returns the text and the gradient norm.
pub fn format_gradient_block(
    energy: f64,
    forces: &[Vector3<f64>],
    mol: &Molecule,
) -> (String, f64) {
    debug_assert_eq!(forces.len(), mol.natoms());
    let gradient = forces_to_gradient(forces);
    let grad_norm = gradient_norm(&gradient);

    let mut txt = String::from("$grad\n");
    let _ = writeln!(
        txt,
        " cycle = 1   SCF energy = {:.10}  |dE/dxyz| = {:.10}",
        energy, grad_norm
    );
    for (p, symbol) in mol.positions.iter().zip(mol.symbols()) {
        let _ = writeln!(
            txt,
            "{:20.14}  {:20.14}  {:20.14} {:>2}",
            angstrom_to_bohr(p.x),
            angstrom_to_bohr(p.y),
            angstrom_to_bohr(p.z),
            symbol.to_lowercase()
        );
    }
    for g in &gradient {
        let _ = writeln!(txt, "{:20.14} {:20.14} {:20.14}", g.x, g.y, g.z);
    }
    txt.push_str("$end\n");

    (txt, grad_norm)
}

/// Write the `gradient` file, replacing any existing one. `energy` is in
/// Hartree, `forces` in eV/Angstrom. Returns the gradient norm.
pub fn write_gradient_block(
    path: &Path,
    energy: f64,
    forces: &[Vector3<f64>],
    mol: &Molecule,
) -> Result<f64> {
    let (txt, grad_norm) = format_gradient_block(energy, forces, mol);
    std::fs::write(path, txt)
        .wrap_err_with(|| format!("Unable to write gradient file: {}", path.display()))?;
    Ok(grad_norm)
}

/// Format the `$energy` group. The energy fills all three columns.
pub fn format_energy_block(energy: f64) -> String {
    format!(
        "$energy\n     1     {:.10}     {:.10}     {:.10}\n$end\n",
        energy, energy, energy
    )
}

/// Write the `energy` file, replacing any existing one.
pub fn write_energy_block(path: &Path, energy: f64) -> Result<()> {
    std::fs::write(path, format_energy_block(energy))
        .wrap_err_with(|| format!("Unable to write energy file: {}", path.display()))
}
