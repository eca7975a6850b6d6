use crate::error::PersistenceError;
use crate::schema::{expected_header, header_matches};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Handle to the append-only dataset file.
///
/// Clones share one lock: appends are exclusive, snapshot reads may overlap each other but
/// never an append in progress.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub(crate) path: PathBuf,
    pub(crate) lock: Arc<RwLock<()>>,
}

impl Dataset {
    /// Open a dataset at `path`. The file is created lazily by the first append; an existing
    /// non-empty file must carry the expected header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        if current_len(&path)? > 0 {
            verify_header(&path)?;
        }
        Ok(Dataset { path, lock: Arc::new(RwLock::new(())) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Length of the file in bytes, zero when it does not exist yet.
pub(crate) fn current_len(path: &Path) -> Result<u64, PersistenceError> {
    match std::fs::metadata(path) {
        Ok(m) => Ok(m.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(e) => Err(PersistenceError::io(path, e)),
    }
}

pub(crate) fn verify_header(path: &Path) -> Result<(), PersistenceError> {
    let file = File::open(path).map_err(|e| PersistenceError::io(path, e))?;
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
    let headers = rdr.headers().map_err(|e| PersistenceError::csv(path, e))?;
    if header_matches(headers.iter()) {
        Ok(())
    } else {
        Err(PersistenceError::SchemaMismatch {
            path: path.to_path_buf(),
            expected: expected_header(),
            found: headers.iter().map(str::to_string).collect(),
        })
    }
}
