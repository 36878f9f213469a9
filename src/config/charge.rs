//! Charge and spin multiplicity resolution
//!
//! Each value is taken from the first source that provides it:
//!
//! 1. the command line (`--charge`, `--multiplicity`)
//! 2. a marker file next to the structure (`.CHRG` holds the net charge,
//!    `.UHF` the number of unpaired electrons)
//! 3. the defaults, charge 0 and multiplicity 1

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

pub const CHARGE_FILE: &str = ".CHRG";
pub const UHF_FILE: &str = ".UHF";

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid integer in {}: {content:?}", path.display())]
    InvalidCharge { path: PathBuf, content: String },

    #[error("Invalid float in {}: {content:?}", path.display())]
    InvalidUhf { path: PathBuf, content: String },
}

/// Where a resolved value came from
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Cli,
    File(PathBuf),
    Default,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Source::Cli => write!(f, "CLI"),
            Source::File(path) => {
                let name = path.file_name().map(|s| s.to_string_lossy()).unwrap_or_default();
                write!(f, "file {}", name)
            }
            Source::Default => write!(f, "default"),
        }
    }
}

/// Charge and multiplicity of one run. Resolved once, never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeMultiplicity {
    pub charge: i32,
    pub multiplicity: i32,
    pub charge_source: Source,
    pub multiplicity_source: Source,
    /// Raw `.UHF` value the multiplicity was derived from
    pub uhf: Option<f64>,
}

impl ChargeMultiplicity {
    /// Line naming where the charge came from.
    pub fn charge_message(&self) -> String {
        match &self.charge_source {
            Source::Cli => format!("Using charge from CLI: {}", self.charge),
            Source::File(_) => format!("Using charge from {}: {}", self.charge_source, self.charge),
            Source::Default => format!("Using default charge: {}", self.charge),
        }
    }

    /// Line naming where the multiplicity came from. A file source also
    /// shows the UHF value as read, e.g. `UHF=2.0`.
    pub fn multiplicity_message(&self) -> String {
        match (&self.multiplicity_source, self.uhf) {
            (Source::Cli, _) => format!("Using multiplicity from CLI: {}", self.multiplicity),
            (Source::File(_), Some(uhf)) => format!(
                "Using multiplicity from {} (UHF={:?}): {}",
                self.multiplicity_source, uhf, self.multiplicity
            ),
            (Source::File(_), None) => format!(
                "Using multiplicity from {}: {}",
                self.multiplicity_source, self.multiplicity
            ),
            (Source::Default, _) => format!("Using default multiplicity: {}", self.multiplicity),
        }
    }
}

/// Determine charge and multiplicity for a structure whose marker files live
/// in `dir`. CLI values take precedence over file-based values.
pub fn resolve_charge_and_multiplicity(
    dir: &Path,
    cli_charge: Option<i32>,
    cli_multiplicity: Option<i32>,
    verbose: bool,
) -> Result<ChargeMultiplicity, ResolveError> {
    let chrg_file = dir.join(CHARGE_FILE);
    let uhf_file = dir.join(UHF_FILE);

    let (charge, charge_source) = match cli_charge {
        Some(charge) => (charge, Source::Cli),
        None if chrg_file.exists() => (read_charge_file(&chrg_file)?, Source::File(chrg_file)),
        None => (0, Source::Default),
    };

    let mut uhf = None;
    let (multiplicity, multiplicity_source) = match cli_multiplicity {
        Some(mult) => (mult, Source::Cli),
        None if uhf_file.exists() => {
            let value = read_uhf_file(&uhf_file)?;
            let mult = multiplicity_from_uhf(value).ok_or_else(|| ResolveError::InvalidUhf {
                path: uhf_file.clone(),
                content: value.to_string(),
            })?;
            uhf = Some(value);
            (mult, Source::File(uhf_file))
        }
        None => (1, Source::Default),
    };

    let resolved = ChargeMultiplicity {
        charge,
        multiplicity,
        charge_source,
        multiplicity_source,
        uhf,
    };
    if verbose {
        info!("{}", resolved.charge_message());
        info!("{}", resolved.multiplicity_message());
    }
    if multiplicity < 1 {
        warn!(
            "Spin multiplicity {} is below 1 ({})",
            multiplicity, resolved.multiplicity_source
        );
    }

    Ok(resolved)
}

/// Multiplicity 2S+1 from the number of unpaired electrons, truncated
/// towards zero. Returns `None` for values that have no integer image.
pub fn multiplicity_from_uhf(uhf: f64) -> Option<i32> {
    let mult = (2.0 * (uhf * 0.5) + 1.0).trunc();
    if mult.is_finite() && mult >= i32::MIN as f64 && mult <= i32::MAX as f64 {
        Some(mult as i32)
    } else {
        None
    }
}

fn read_marker(path: &Path) -> Result<String, ResolveError> {
    std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn read_charge_file(path: &Path) -> Result<i32, ResolveError> {
    let content = read_marker(path)?;
    let text = content.trim();
    text.parse::<i32>().map_err(|_| ResolveError::InvalidCharge {
        path: path.to_path_buf(),
        content: text.to_string(),
    })
}

fn read_uhf_file(path: &Path) -> Result<f64, ResolveError> {
    let content = read_marker(path)?;
    let text = content.trim();
    text.parse::<f64>().map_err(|_| ResolveError::InvalidUhf {
        path: path.to_path_buf(),
        content: text.to_string(),
    })
}
