use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StructureError {
    #[error("failed to read structure file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format} structure {}: {details} (at line {line})", path.display())]
    Parse {
        path: PathBuf,
        format: &'static str,
        line: usize,
        details: String,
    },

    #[error("unknown element symbol {symbol:?} in {} (at line {line})", path.display())]
    UnknownElement {
        path: PathBuf,
        symbol: String,
        line: usize,
    },

    #[error("no atoms found in {}", path.display())]
    Empty { path: PathBuf },
}
