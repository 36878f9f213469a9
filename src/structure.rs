//! In-memory molecular structure

use nalgebra::Vector3;
use periodic_table_on_an_enum::Element;

/// An ordered list of atoms with Cartesian positions in Angstrom.
///
/// `charge` and `spin` (the spin multiplicity, 2S+1) are metadata handed to
/// the model together with the geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    pub title: String,
    pub elements: Vec<Element>,
    pub positions: Vec<Vector3<f64>>,
    pub charge: i32,
    pub spin: i32,
    /// Atoms frozen in place (the `f` flag of Turbomole coord files)
    pub fixed: Vec<bool>,
}

impl Molecule {
    pub fn new(elements: Vec<Element>, positions: Vec<Vector3<f64>>) -> Self {
        debug_assert_eq!(elements.len(), positions.len());
        let n = elements.len();
        Molecule {
            title: String::new(),
            elements,
            positions,
            charge: 0,
            spin: 1,
            fixed: vec![false; n],
        }
    }

    pub fn natoms(&self) -> usize {
        self.elements.len()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.elements.iter().map(|e| e.get_symbol())
    }

    /// Set net charge and spin multiplicity before evaluation.
    pub fn set_charge_and_spin(&mut self, charge: i32, spin: i32) {
        self.charge = charge;
        self.spin = spin;
    }

    /// Flattened positions as `[x1, y1, z1, x2, ...]`.
    pub fn flat_positions(&self) -> Vec<f64> {
        self.positions.iter().flat_map(|p| [p.x, p.y, p.z]).collect()
    }

    /// Update positions from a flattened array. Fixed atoms keep their
    /// current position.
    pub fn set_flat_positions(&mut self, flat: &[f64]) {
        debug_assert_eq!(flat.len(), 3 * self.natoms());
        let rows = self.positions.iter_mut().zip(flat.chunks_exact(3));
        for ((p, chunk), &fixed) in rows.zip(&self.fixed) {
            if !fixed {
                *p = Vector3::new(chunk[0], chunk[1], chunk[2]);
            }
        }
    }

    pub fn has_constraints(&self) -> bool {
        self.fixed.iter().any(|&f| f)
    }

    /// Zero the forces acting on fixed atoms.
    pub fn apply_constraints(&self, forces: &mut [Vector3<f64>]) {
        for (f, &fixed) in forces.iter_mut().zip(&self.fixed) {
            if fixed {
                *f = Vector3::zeros();
            }
        }
    }
}

/// Look up an element from a symbol in any letter case (`o`, `O`, `CL`).
pub fn element_from_symbol(symbol: &str) -> Option<Element> {
    let mut chars = symbol.trim().chars();
    let first = chars.next()?;
    let normalized: String = first
        .to_uppercase()
        .chain(chars.flat_map(|c| c.to_lowercase()))
        .collect();
    Element::from_symbol(&normalized)
}
