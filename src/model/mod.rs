//! Energy and force models
//!
//! A [`ChemicalModel`] maps a molecule onto its potential energy (eV) and
//! atomic forces (eV/Angstrom). The [`Calculator`] sits between the driver
//! and a model and avoids repeated evaluations of an unchanged structure.

mod blackbox;
mod lj;

pub use blackbox::BlackBoxModel;
pub use lj::LennardJones;

use crate::config::{RunOptions, MODEL_TASK};
use crate::structure::Molecule;
use color_eyre::eyre::{eyre, Result};
use nalgebra::Vector3;
use periodic_table_on_an_enum::Element;
use tracing::{debug, info};

/// Trait for energy/force evaluators
pub trait ChemicalModel {
    /// Compute energy and forces of `mol` at its current geometry, charge
    /// and spin.
    fn compute(&mut self, mol: &Molecule) -> Result<Computed>;
}

/// Properties returned by a model
#[derive(Debug, Clone, Default)]
pub struct Computed {
    energy: Option<f64>,
    forces: Option<Vec<Vector3<f64>>>,
}

impl Computed {
    pub fn set_energy(&mut self, e: f64) {
        self.energy = Some(e);
    }

    pub fn set_forces(&mut self, f: Vec<Vector3<f64>>) {
        self.forces = Some(f);
    }

    /// Potential energy in eV
    pub fn get_energy(&self) -> Option<f64> {
        self.energy
    }

    /// Atomic forces in eV/Angstrom
    pub fn get_forces(&self) -> Option<&Vec<Vector3<f64>>> {
        self.forces.as_ref()
    }
}

/// Which model a `--model` name refers to
#[derive(Debug, Clone, PartialEq)]
pub enum ModelKind {
    LennardJones,
    External(String),
}

impl ModelKind {
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "lj" | "lennard-jones" => ModelKind::LennardJones,
            _ => ModelKind::External(name.to_string()),
        }
    }
}

/// Build the model selected in the run options.
pub fn build_model(options: &RunOptions) -> Result<Box<dyn ChemicalModel>> {
    let model: Box<dyn ChemicalModel> = match ModelKind::from_name(&options.model) {
        ModelKind::LennardJones => {
            info!("Using built-in Lennard-Jones potential");
            Box::new(LennardJones::default())
        }
        ModelKind::External(name) => {
            info!("Using model {} via runner {:?} on {}", name, options.runner, options.device);
            Box::new(BlackBoxModel::new(&options.runner, &name, &options.device, MODEL_TASK)?)
        }
    };
    Ok(model)
}

// the structure state a cached result belongs to
#[derive(Debug, Clone, PartialEq)]
struct StateKey {
    elements: Vec<Element>,
    positions: Vec<Vector3<f64>>,
    charge: i32,
    spin: i32,
}

impl StateKey {
    fn of(mol: &Molecule) -> Self {
        StateKey {
            elements: mol.elements.clone(),
            positions: mol.positions.clone(),
            charge: mol.charge,
            spin: mol.spin,
        }
    }
}

/// Caching front end of a model.
///
/// Energy and forces come from the same model evaluation, so asking for the
/// forces right after the energy of the same structure is free.
pub struct Calculator {
    model: Box<dyn ChemicalModel>,
    name: String,
    cache: Option<(StateKey, Computed)>,
    ncalls: usize,
}

impl Calculator {
    pub fn new(model: Box<dyn ChemicalModel>, name: &str) -> Self {
        Calculator {
            model,
            name: name.to_string(),
            cache: None,
            ncalls: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Return the number of actual model evaluations
    pub fn number_of_evaluations(&self) -> usize {
        self.ncalls
    }

    fn calculate(&mut self, mol: &Molecule) -> Result<&Computed> {
        let key = StateKey::of(mol);
        let stale = match &self.cache {
            Some((cached, _)) => *cached != key,
            None => true,
        };
        if stale {
            debug!("evaluating model {} for {} atoms", self.name, mol.natoms());
            let computed = self.model.compute(mol)?;
            self.ncalls += 1;
            self.cache = Some((key, computed));
        }
        self.cache
            .as_ref()
            .map(|(_, computed)| computed)
            .ok_or_else(|| eyre!("no result cached for model {}", self.name))
    }

    /// Potential energy in eV
    pub fn get_potential_energy(&mut self, mol: &Molecule) -> Result<f64> {
        let name = self.name.clone();
        self.calculate(mol)?
            .get_energy()
            .ok_or_else(|| eyre!("model {} returned no energy", name))
    }

    /// Atomic forces in eV/Angstrom with constraints applied: fixed atoms
    /// feel no force.
    pub fn get_forces(&mut self, mol: &Molecule) -> Result<Vec<Vector3<f64>>> {
        let name = self.name.clone();
        let mut forces = self
            .calculate(mol)?
            .get_forces()
            .cloned()
            .ok_or_else(|| eyre!("model {} returned no forces", name))?;
        if forces.len() != mol.natoms() {
            return Err(eyre!(
                "model {} returned forces for {} atoms, expected {}",
                name,
                forces.len(),
                mol.natoms()
            ));
        }
        mol.apply_constraints(&mut forces);
        Ok(forces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    // counts calls and returns a constant result
    struct Counting {
        calls: Rc<Cell<usize>>,
    }

    impl ChemicalModel for Counting {
        fn compute(&mut self, mol: &Molecule) -> Result<Computed> {
            self.calls.set(self.calls.get() + 1);
            let mut computed = Computed::default();
            computed.set_energy(-1.0);
            computed.set_forces(vec![Vector3::new(1.0, 0.0, 0.0); mol.natoms()]);
            Ok(computed)
        }
    }

    fn dimer() -> Molecule {
        let h = Element::from_symbol("H").unwrap();
        Molecule::new(
            vec![h.clone(), h],
            vec![Vector3::zeros(), Vector3::new(0.0, 0.0, 0.74)],
        )
    }

    #[test]
    fn test_model_kind() {
        assert_eq!(ModelKind::from_name("lj"), ModelKind::LennardJones);
        assert_eq!(ModelKind::from_name("Lennard-Jones"), ModelKind::LennardJones);
        assert_eq!(ModelKind::from_name("uma-sm"), ModelKind::External("uma-sm".into()));
    }

    #[test]
    fn test_calculator_cache() {
        let calls = Rc::new(Cell::new(0));
        let mut calc = Calculator::new(Box::new(Counting { calls: calls.clone() }), "counting");
        let mut mol = dimer();

        assert_eq!(calc.get_potential_energy(&mol).unwrap(), -1.0);
        assert_eq!(calc.get_forces(&mol).unwrap().len(), 2);
        assert_eq!(calls.get(), 1);
        assert_eq!(calc.number_of_evaluations(), 1);

        mol.positions[1].z = 0.8;
        calc.get_forces(&mol).unwrap();
        assert_eq!(calls.get(), 2);

        mol.set_charge_and_spin(1, 2);
        calc.get_potential_energy(&mol).unwrap();
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_forces_with_constraints() {
        let calls = Rc::new(Cell::new(0));
        let mut calc = Calculator::new(Box::new(Counting { calls }), "counting");
        let mut mol = dimer();
        mol.fixed[0] = true;

        let forces = calc.get_forces(&mol).unwrap();
        assert_eq!(forces[0], Vector3::zeros());
        assert_eq!(forces[1], Vector3::new(1.0, 0.0, 0.0));
    }
}
