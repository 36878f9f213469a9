//! Physical constants and unit conversions
//!
//! Models report energies in eV and lengths in Angstrom. The gradient and
//! energy files use Hartree and Bohr.

/// One Bohr in Angstrom
pub const BOHR: f64 = 0.5291772105638411;

/// One Hartree in eV
pub const HARTREE: f64 = 27.211386024367243;

pub fn ev_to_hartree(energy: f64) -> f64 {
    energy / HARTREE
}

pub fn angstrom_to_bohr(length: f64) -> f64 {
    length / BOHR
}

pub fn bohr_to_angstrom(length: f64) -> f64 {
    length * BOHR
}

/// Convert a force component in eV/Angstrom into a gradient component in
/// Hartree/Bohr.
pub fn force_to_gradient(force: f64) -> f64 {
    -force * BOHR / HARTREE
}
