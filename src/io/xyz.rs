//! XYZ structure files and optimization trajectories

use super::error::StructureError;
use crate::structure::{element_from_symbol, Molecule};
use color_eyre::eyre::{Result, WrapErr};
use nalgebra::Vector3;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Parse all frames of an (extended) XYZ text.
///
/// Each frame is an atom count line, a comment line and one
/// `symbol x y z` row per atom. Columns after z are ignored.
pub fn parse_xyz_frames(text: &str, path: &Path) -> Result<Vec<Molecule>, StructureError> {
    let lines: Vec<&str> = text.lines().collect();
    let parse_error = |line: usize, details: String| StructureError::Parse {
        path: path.to_path_buf(),
        format: "xyz",
        line,
        details,
    };

    let mut frames = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let header = lines[i].trim();
        if header.is_empty() {
            i += 1;
            continue;
        }
        let natoms: usize = header
            .parse()
            .map_err(|_| parse_error(i + 1, format!("expected atom count, found {:?}", header)))?;
        if i + 2 + natoms > lines.len() {
            return Err(parse_error(
                lines.len(),
                format!("expected {} atoms, file ends early", natoms),
            ));
        }
        let title = lines[i + 1].trim().to_string();

        let mut elements = Vec::with_capacity(natoms);
        let mut positions = Vec::with_capacity(natoms);
        for (k, line) in lines[i + 2..i + 2 + natoms].iter().enumerate() {
            let lineno = i + 3 + k;
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 {
                return Err(parse_error(lineno, format!("expected symbol x y z, found {:?}", line)));
            }
            let element =
                element_from_symbol(parts[0]).ok_or_else(|| StructureError::UnknownElement {
                    path: path.to_path_buf(),
                    symbol: parts[0].to_string(),
                    line: lineno,
                })?;
            let mut xyz = [0.0; 3];
            for (v, s) in xyz.iter_mut().zip(&parts[1..4]) {
                *v = s
                    .parse()
                    .map_err(|_| parse_error(lineno, format!("invalid coordinate {:?}", s)))?;
            }
            elements.push(element);
            positions.push(Vector3::from(xyz));
        }

        let mut mol = Molecule::new(elements, positions);
        mol.title = title;
        frames.push(mol);
        i += 2 + natoms;
    }

    Ok(frames)
}

/// The last frame of an XYZ text.
pub(crate) fn parse_xyz_str(text: &str, path: &Path) -> Result<Molecule, StructureError> {
    parse_xyz_frames(text, path)?
        .pop()
        .filter(|mol| mol.natoms() > 0)
        .ok_or_else(|| StructureError::Empty { path: path.to_path_buf() })
}

/// Format one XYZ frame, positions in Angstrom.
pub fn format_xyz(mol: &Molecule, comment: &str) -> String {
    let mut txt = format!("{}\n{}\n", mol.natoms(), comment);
    for (symbol, p) in mol.symbols().zip(&mol.positions) {
        txt.push_str(&format!("{:<2} {:16.8} {:16.8} {:16.8}\n", symbol, p.x, p.y, p.z));
    }
    txt
}

/// Write a single-frame XYZ file, replacing any existing file.
pub fn write_xyz(path: &Path, mol: &Molecule, comment: &str) -> Result<()> {
    std::fs::write(path, format_xyz(mol, comment))
        .wrap_err_with(|| format!("Unable to write structure file: {}", path.display()))
}

/// Multi-frame XYZ trajectory, one frame per optimizer iteration.
pub struct TrajectoryWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    nframes: usize,
}

impl TrajectoryWriter {
    /// Create (or truncate) the trajectory file.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .wrap_err_with(|| format!("Unable to create trajectory file: {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            nframes: 0,
        })
    }

    pub fn write_frame(
        &mut self,
        mol: &Molecule,
        step: usize,
        energy: f64,
        fmax: f64,
    ) -> Result<()> {
        let comment = format!("step={} energy={:.10} fmax={:.6e}", step, energy, fmax);
        self.writer
            .write_all(format_xyz(mol, &comment).as_bytes())
            .and_then(|_| self.writer.flush())
            .wrap_err_with(|| {
                format!(
                    "Unable to write trajectory frame to {}",
                    self.path.display()
                )
            })?;
        self.nframes += 1;
        Ok(())
    }

    pub fn number_of_frames(&self) -> usize {
        self.nframes
    }
}
