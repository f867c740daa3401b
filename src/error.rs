use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DashError {
    #[error("failed to parse uploaded file: {0}")]
    #[diagnostic(help("upload a .txt or .csv with one accession per line, or a FASTA file"))]
    UploadParse(String),

    #[error("invalid accession: {0}")]
    InvalidAccession(String),

    #[error("invalid molecule type: {0} (expected nucleotide or protein)")]
    InvalidMoleculeType(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    ConfigInvalid(String),

    #[error("NCBI request failed: {0}")]
    NcbiHttp(String),

    #[error("NCBI returned status {status}: {message}")]
    NcbiStatus { status: u16, message: String },

    #[error("failed to parse GenBank records: {0}")]
    GenbankParse(String),

    #[error("failed to read dataset {path}: {message}")]
    DatasetRead { path: String, message: String },

    #[error("invalid dataset {path}: {message}")]
    DatasetParse { path: String, message: String },

    #[error("invalid query parameter: {0}")]
    InvalidQuery(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("server error: {0}")]
    Server(String),
}

impl DashError {
    /// True for failures caused by what the user sent rather than by the
    /// server or the remote database.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            DashError::UploadParse(_)
                | DashError::InvalidAccession(_)
                | DashError::InvalidMoleculeType(_)
                | DashError::InvalidQuery(_)
        )
    }

    pub fn is_remote_error(&self) -> bool {
        matches!(
            self,
            DashError::NcbiHttp(_) | DashError::NcbiStatus { .. } | DashError::GenbankParse(_)
        )
    }
}
