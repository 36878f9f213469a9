//! Input/Output operations for driver runs
//!
//! This module handles structure files, the Turbomole-style result files,
//! and logging setup.

mod coord;
mod error;
mod output;
mod turbomole;
mod xyz;

pub use coord::{is_coord_file, parse_coord};
pub use error::StructureError;
pub use output::{format_wall_time, setup_output};
pub use turbomole::{
    format_energy_block, format_gradient_block, forces_to_gradient, gradient_norm,
    write_energy_block, write_gradient_block,
};
pub use xyz::{format_xyz, parse_xyz_frames, write_xyz, TrajectoryWriter};

use crate::structure::Molecule;
use std::path::Path;
use tracing::debug;

/// Read a structure file, detecting Turbomole coord or XYZ from its content.
pub fn read_structure(path: &Path) -> Result<Molecule, StructureError> {
    let text = std::fs::read_to_string(path).map_err(|source| StructureError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if is_coord_file(&text) {
        debug!("reading {} as Turbomole coord", path.display());
        parse_coord(&text, path)
    } else {
        debug!("reading {} as xyz", path.display());
        xyz::parse_xyz_str(&text, path)
    }
}
