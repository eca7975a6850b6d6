use crate::error::PersistenceError;
use crate::models::Row;
use crate::open::{current_len, verify_header, Dataset};
use netsurvey_core::HostRecord;
use std::fs::File;
use tracing::warn;

impl Dataset {
    /// Read every record in file order. Never observes a half-written append; rows that cannot
    /// be turned back into a record are skipped with a warning.
    pub fn snapshot(&self) -> Result<Vec<HostRecord>, PersistenceError> {
        let _guard = self.lock.read().map_err(|_| PersistenceError::Poisoned)?;
        if current_len(&self.path)? == 0 {
            return Ok(Vec::new());
        }
        verify_header(&self.path)?;

        let file = File::open(&self.path).map_err(|e| PersistenceError::io(&self.path, e))?;
        let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_reader(file);
        let mut out = Vec::new();
        for (i, row) in rdr.deserialize::<Row>().enumerate() {
            let line = i + 2;
            let row = match row {
                Ok(row) => row,
                Err(e) if matches!(e.kind(), csv::ErrorKind::UnequalLengths { .. } | csv::ErrorKind::Deserialize { .. }) => {
                    warn!(path = %self.path.display(), line, error = %e, "skipping malformed dataset row");
                    continue;
                }
                Err(e) => return Err(PersistenceError::csv(&self.path, e)),
            };
            match row.into_record() {
                Ok(r) => out.push(r),
                Err(defect) => warn!(path = %self.path.display(), line, ?defect, "skipping unreadable dataset row"),
            }
        }
        Ok(out)
    }
}
