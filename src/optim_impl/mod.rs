//! Geometry optimization algorithms
//!
//! Only L-BFGS is provided. Convergence is reached when the largest
//! per-atom force norm drops below the threshold; reaching the step cap
//! first is reported but not treated as an error.

mod lbfgs;

pub use lbfgs::Lbfgs;

use crate::model::Calculator;
use crate::structure::Molecule;
use color_eyre::eyre::Result;
use nalgebra::Vector3;

/// Trait for geometry optimization algorithms
pub trait GeometryOptimizer {
    /// Relax `mol` in place.
    fn run(&mut self, mol: &mut Molecule, calc: &mut Calculator) -> Result<OptimizationReport>;
}

/// Outcome of an optimization
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationReport {
    pub converged: bool,
    /// Number of steps taken
    pub steps: usize,
    /// Energy of the final geometry (eV)
    pub energy: f64,
    /// Largest per-atom force of the final geometry (eV/Angstrom)
    pub fmax: f64,
}

/// Largest per-atom force norm. NaN if any component is not finite.
pub fn max_force(forces: &[Vector3<f64>]) -> f64 {
    if forces.iter().any(|f| f.iter().any(|x| !x.is_finite())) {
        return f64::NAN;
    }
    forces.iter().map(|f| f.norm()).fold(0.0f64, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_force() {
        let forces = vec![Vector3::new(0.0, 3.0, 4.0), Vector3::new(1.0, 0.0, 0.0)];
        assert_eq!(max_force(&forces), 5.0);
        assert_eq!(max_force(&[]), 0.0);

        let broken = vec![Vector3::new(f64::NAN, 0.0, 0.0), Vector3::new(9.0, 0.0, 0.0)];
        assert!(max_force(&broken).is_nan());
        let infinite = vec![Vector3::new(0.0, f64::INFINITY, 0.0)];
        assert!(max_force(&infinite).is_nan());
    }
}
