//! Turbomole `$coord` structure files

use super::error::StructureError;
use crate::structure::{element_from_symbol, Molecule};
use crate::units::bohr_to_angstrom;
use nalgebra::Vector3;
use std::path::Path;

/// Return true if the text starts with a `$coord` data group.
pub fn is_coord_file(text: &str) -> bool {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map_or(false, |l| l.starts_with("$coord"))
}

/// Parse the `$coord` group of a Turbomole file.
///
/// Rows are `x y z symbol [f]` in Bohr unless the group header reads
/// `$coord angs`. A trailing `f` freezes the atom. The group ends at the
/// next line starting with `$`.
pub fn parse_coord(text: &str, path: &Path) -> Result<Molecule, StructureError> {
    let parse_error = |line: usize, details: String| StructureError::Parse {
        path: path.to_path_buf(),
        format: "coord",
        line,
        details,
    };

    let mut lines = text
        .lines()
        .enumerate()
        .skip_while(|(_, l)| !l.trim_start().starts_with("$coord"));
    let (_, header) = lines
        .next()
        .ok_or_else(|| parse_error(1, "missing $coord data group".into()))?;
    let in_angstrom = header.split_whitespace().skip(1).any(|w| w.starts_with("angs"));

    let mut elements = Vec::new();
    let mut positions = Vec::new();
    let mut fixed = Vec::new();
    for (i, line) in lines {
        let lineno = i + 1;
        let line = line.trim();
        if line.starts_with('$') {
            break;
        }
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(parse_error(lineno, format!("expected x y z symbol, found {:?}", line)));
        }
        let mut xyz = [0.0; 3];
        for (v, s) in xyz.iter_mut().zip(&parts[0..3]) {
            let value: f64 = s
                .parse()
                .map_err(|_| parse_error(lineno, format!("invalid coordinate {:?}", s)))?;
            *v = if in_angstrom { value } else { bohr_to_angstrom(value) };
        }
        let element = element_from_symbol(parts[3]).ok_or_else(|| StructureError::UnknownElement {
            path: path.to_path_buf(),
            symbol: parts[3].to_string(),
            line: lineno,
        })?;

        elements.push(element);
        positions.push(Vector3::from(xyz));
        fixed.push(parts.get(4).map_or(false, |flag| flag.eq_ignore_ascii_case("f")));
    }

    if elements.is_empty() {
        return Err(StructureError::Empty { path: path.to_path_buf() });
    }

    let mut mol = Molecule::new(elements, positions);
    mol.fixed = fixed;
    Ok(mol)
}
