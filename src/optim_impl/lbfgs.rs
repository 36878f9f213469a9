//! Limited-memory BFGS geometry optimizer
//!
//! Follows the conventions of the ASE implementation: memory of 100 steps,
//! at most 0.2 Angstrom displacement per atom and step, and an initial
//! inverse Hessian of 1/70 Angstrom^2/eV.

use super::{max_force, GeometryOptimizer, OptimizationReport};
use crate::io::TrajectoryWriter;
use crate::model::Calculator;
use crate::structure::Molecule;
use color_eyre::eyre::{bail, Result};
use nalgebra::{DVector, Vector3};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// L-BFGS geometry optimizer
pub struct Lbfgs {
    /// Force convergence threshold (eV/Angstrom)
    fmax: f64,
    max_steps: usize,
    /// Number of (s, y) pairs kept
    memory: usize,
    /// Largest displacement of any atom in one step (Angstrom)
    maxstep: f64,
    damping: f64,
    /// Initial Hessian guess (eV/Angstrom^2)
    alpha: f64,
    trajectory: Option<TrajectoryWriter>,

    // state of the two-loop recursion
    s: VecDeque<DVector<f64>>,
    y: VecDeque<DVector<f64>>,
    rho: VecDeque<f64>,
    r0: Option<DVector<f64>>,
    f0: Option<DVector<f64>>,
}

impl Lbfgs {
    pub fn new(fmax: f64, max_steps: usize) -> Self {
        Lbfgs {
            fmax,
            max_steps,
            memory: 100,
            maxstep: 0.2,
            damping: 1.0,
            alpha: 70.0,
            trajectory: None,
            s: VecDeque::new(),
            y: VecDeque::new(),
            rho: VecDeque::new(),
            r0: None,
            f0: None,
        }
    }

    /// Record every visited geometry into `trajectory`.
    pub fn with_trajectory(mut self, trajectory: TrajectoryWriter) -> Self {
        self.trajectory = Some(trajectory);
        self
    }

    // store the latest (s, y) pair
    fn update(&mut self, r: &DVector<f64>, f: &DVector<f64>) {
        if let (Some(r0), Some(f0)) = (&self.r0, &self.f0) {
            let s0 = r - r0;
            let y0 = f0 - f;
            let rho0 = 1.0 / y0.dot(&s0);
            if rho0.is_finite() {
                self.s.push_back(s0);
                self.y.push_back(y0);
                self.rho.push_back(rho0);
            } else {
                debug!("skipping degenerate L-BFGS update");
            }
        }

        while self.s.len() > self.memory {
            self.s.pop_front();
            self.y.pop_front();
            self.rho.pop_front();
        }
    }

    /// Search direction from the two-loop recursion.
    fn direction(&self, f: &DVector<f64>) -> DVector<f64> {
        let k = self.s.len();
        let mut a = vec![0.0; k];
        let mut q = -f.clone();
        for i in (0..k).rev() {
            a[i] = self.rho[i] * self.s[i].dot(&q);
            q -= &self.y[i] * a[i];
        }

        let mut z = q / self.alpha;
        for i in 0..k {
            let b = self.rho[i] * self.y[i].dot(&z);
            z += &self.s[i] * (a[i] - b);
        }

        -z
    }

    /// Scale the step so that no atom moves further than `maxstep`.
    fn determine_step(&self, mut dr: DVector<f64>) -> DVector<f64> {
        let longest = dr
            .as_slice()
            .chunks(3)
            .map(|d| (d[0] * d[0] + d[1] * d[1] + d[2] * d[2]).sqrt())
            .fold(0.0f64, f64::max);
        if longest >= self.maxstep {
            dr *= self.maxstep / longest;
        }
        dr
    }

    fn step(&mut self, mol: &mut Molecule, forces: &[Vector3<f64>]) {
        let r = DVector::from_vec(mol.flat_positions());
        let f = DVector::from_iterator(
            3 * forces.len(),
            forces.iter().flat_map(|v| [v.x, v.y, v.z]),
        );

        self.update(&r, &f);
        let p = self.direction(&f);
        let dr = self.determine_step(p) * self.damping;
        let new_r = &r + dr;
        mol.set_flat_positions(new_r.as_slice());

        self.r0 = Some(r);
        self.f0 = Some(f);
    }
}

impl GeometryOptimizer for Lbfgs {
    fn run(&mut self, mol: &mut Molecule, calc: &mut Calculator) -> Result<OptimizationReport> {
        info!("Starting L-BFGS optimization");
        info!("Max steps: {}", self.max_steps);
        info!("Convergence threshold: {:.6e} eV/Å", self.fmax);

        let mut nsteps = 0;
        loop {
            let energy = calc.get_potential_energy(mol)?;
            let forces = calc.get_forces(mol)?;
            let fmax = max_force(&forces);
            info!("LBFGS: {:4} E = {:15.6} eV, fmax = {:12.6e}", nsteps, energy, fmax);

            if let Some(traj) = self.trajectory.as_mut() {
                traj.write_frame(mol, nsteps, energy, fmax)?;
            }

            if !energy.is_finite() || fmax.is_nan() {
                bail!(
                    "non-finite energy or forces at optimization step {} (E = {}, fmax = {})",
                    nsteps,
                    energy,
                    fmax
                );
            }

            let converged = fmax < self.fmax;
            if converged || nsteps >= self.max_steps {
                if converged {
                    info!("Optimization converged after {} steps", nsteps);
                } else {
                    warn!(
                        "Optimization did not converge within {} steps (fmax = {:.6e} eV/Å)",
                        self.max_steps, fmax
                    );
                }
                if let Some(traj) = self.trajectory.as_ref() {
                    debug!("{} frames written to the trajectory", traj.number_of_frames());
                }
                return Ok(OptimizationReport {
                    converged,
                    steps: nsteps,
                    energy,
                    fmax,
                });
            }

            self.step(mol, &forces);
            nsteps += 1;
        }
    }
}
