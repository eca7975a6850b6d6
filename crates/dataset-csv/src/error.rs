use netsurvey_core::NormalizationInvariantError;
use std::path::PathBuf;
use thiserror::Error;

/// Dataset write or read failure. Fatal to the batch being appended; earlier batches stay intact.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("dataset io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset csv error on {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("schema mismatch in {}: expected {expected:?}, found {found:?}", .path.display())]
    SchemaMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },
    #[error("refusing to persist corrupt record: {0}")]
    Invariant(#[from] NormalizationInvariantError),
    #[error("dataset lock poisoned")]
    Poisoned,
}

impl PersistenceError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        PersistenceError::Io { path: path.to_path_buf(), source }
    }

    pub(crate) fn csv(path: &std::path::Path, source: csv::Error) -> Self {
        PersistenceError::Csv { path: path.to_path_buf(), source }
    }
}
