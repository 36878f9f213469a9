//! The Lennard-Jones model for test purpose

use super::{ChemicalModel, Computed};
use crate::structure::Molecule;
use color_eyre::eyre::Result;
use nalgebra::Vector3;
use tracing::debug;

#[derive(Clone, Copy, Debug)]
pub struct LennardJones {
    /// Energy constant of the Lennard-Jones potential (eV)
    pub epsilon: f64,
    /// Distance constant of the Lennard-Jones potential (Angstrom)
    pub sigma: f64,
}

impl Default for LennardJones {
    fn default() -> Self {
        LennardJones {
            epsilon: 1.0,
            sigma: 1.0,
        }
    }
}

impl LennardJones {
    pub fn new(epsilon: f64, sigma: f64) -> Self {
        LennardJones { epsilon, sigma }
    }

    // vij
    fn pair_energy(&self, r2: f64) -> f64 {
        let s2 = self.sigma * self.sigma / r2;
        let s6 = s2 * s2 * s2;
        4.0 * self.epsilon * (s6 * s6 - s6)
    }

    /// Evaluate energy and forces
    pub fn evaluate(&self, positions: &[Vector3<f64>]) -> (f64, Vec<Vector3<f64>>) {
        let n = positions.len();
        let mut energy = 0.0;
        let mut forces = vec![Vector3::zeros(); n];
        let sigma2 = self.sigma * self.sigma;

        for i in 0..n {
            for j in (i + 1)..n {
                let rij = positions[i] - positions[j];
                let r2 = rij.norm_squared();
                energy += self.pair_energy(r2);

                let inv_r2 = sigma2 / r2;
                let inv_r6 = inv_r2 * inv_r2 * inv_r2;
                let f_mag = 48.0 * self.epsilon * inv_r6 * (inv_r6 - 0.5) / r2;
                let fij = rij * f_mag;

                forces[i] += fij;
                forces[j] -= fij;
            }
        }

        (energy, forces)
    }
}

impl ChemicalModel for LennardJones {
    fn compute(&mut self, mol: &Molecule) -> Result<Computed> {
        if mol.charge != 0 || mol.spin != 1 {
            debug!("LJ model: charge {} and spin {} are ignored", mol.charge, mol.spin);
        }

        let (energy, forces) = self.evaluate(&mol.positions);
        let mut computed = Computed::default();
        computed.set_energy(energy);
        computed.set_forces(forces);
        Ok(computed)
    }
}
