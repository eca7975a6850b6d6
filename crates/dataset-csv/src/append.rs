use crate::error::PersistenceError;
use crate::models::Row;
use crate::open::{current_len, verify_header, Dataset};
use netsurvey_core::ScanBatch;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendReport {
    pub rows: usize,
    /// The file was created (and the header written) by this append.
    pub created: bool,
}

impl Dataset {
    /// Append one batch. The header is written only when the file is new or empty; the rows
    /// go out in a single write, and a failed write truncates the file back to its prior length.
    pub fn append(&self, batch: &ScanBatch) -> Result<AppendReport, PersistenceError> {
        let _guard = self.lock.write().map_err(|_| PersistenceError::Poisoned)?;
        for r in batch.records() {
            r.check_alignment()?;
        }
        if batch.is_empty() {
            return Ok(AppendReport { rows: 0, created: false });
        }

        let prior_len = current_len(&self.path)?;
        let created = prior_len == 0;
        if !created {
            verify_header(&self.path)?;
        }

        let mut wtr = csv::WriterBuilder::new().has_headers(created).from_writer(Vec::new());
        for r in batch.records() {
            wtr.serialize(Row::from(r)).map_err(|e| PersistenceError::csv(&self.path, e))?;
        }
        let buf = wtr
            .into_inner()
            .map_err(|e| PersistenceError::io(&self.path, e.into_error()))?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PersistenceError::io(&self.path, e))?;
        if let Err(e) = file.write_all(&buf).and_then(|_| file.sync_data()) {
            if let Err(rollback) = file.set_len(prior_len) {
                warn!(path = %self.path.display(), error = %rollback, "could not roll back partial append");
            }
            return Err(PersistenceError::io(&self.path, e));
        }
        debug!(path = %self.path.display(), rows = batch.len(), created, "batch appended");
        Ok(AppendReport { rows: batch.len(), created })
    }
}
