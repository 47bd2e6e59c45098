//! Error types shared by the store and the dataset engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid dataset construction parameters. Raised before any resource
    /// is opened, so a failed build leaves nothing behind.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An assembly, chromosome or condition name that is not in the store.
    #[error("{kind} '{name}' is not registered in the store")]
    NotFound { kind: &'static str, name: String },

    /// Index resolution outside `0..len`. Local to the offending call, the
    /// dataset stays usable.
    #[error("index {index} is out of range for a dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Registering an assembly name twice.
    #[error("assembly '{0}' has already been added to the store")]
    DuplicateAssembly(String),

    /// A data file whose extension is not in the supported set.
    #[error("unsupported file format: '{0}'")]
    UnsupportedFormat(String),

    /// A byte that is not an IUPAC nucleotide code.
    #[error("byte {0:#04x} is not an IUPAC nucleotide code")]
    InvalidNucleotide(u8),

    /// The global coordinate line is bounded by the 32-bit spatial index.
    #[error("assembly '{0}' would extend the coordinate space past the spatial index maximum")]
    CoordinateOverflow(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
