//! Canonical per-host record and the batch that groups one scan pass.

use crate::error::{BatchError, NormalizationInvariantError};
use serde::Serialize;
use std::collections::HashSet;
use time::OffsetDateTime;

/// One host's findings from one scan pass. Every field is always present; absence is encoded
/// with the defaults applied by [`crate::normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostRecord {
    pub ip: String,
    pub status: String,
    pub hostname: String,
    pub mac_address: String,
    pub vendor: String,
    pub os: String,
    pub open_ports: Vec<String>,
    pub services: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl HostRecord {
    /// Fails when `open_ports` and `services` are not positionally aligned.
    pub fn check_alignment(&self) -> Result<(), NormalizationInvariantError> {
        if self.open_ports.len() == self.services.len() {
            Ok(())
        } else {
            Err(NormalizationInvariantError {
                ip: self.ip.clone(),
                ports: self.open_ports.len(),
                services: self.services.len(),
            })
        }
    }

    pub fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Records produced by one discovery and probe pass, all stamped with the batch timestamp.
#[derive(Debug, Clone)]
pub struct ScanBatch {
    timestamp: OffsetDateTime,
    records: Vec<HostRecord>,
    seen: HashSet<String>,
}

impl ScanBatch {
    pub fn new(timestamp: OffsetDateTime) -> Self {
        ScanBatch { timestamp, records: Vec::new(), seen: HashSet::new() }
    }

    /// Batch stamped with the current UTC time, truncated to whole seconds.
    pub fn starting_now() -> Self {
        let now = OffsetDateTime::now_utc();
        Self::new(now.replace_nanosecond(0).unwrap_or(now))
    }

    pub fn timestamp(&self) -> OffsetDateTime { self.timestamp }

    pub fn push(&mut self, record: HostRecord) -> Result<(), BatchError> {
        if record.timestamp != self.timestamp {
            return Err(BatchError::TimestampMismatch(record.ip));
        }
        record.check_alignment()?;
        if !self.seen.insert(record.ip.clone()) {
            return Err(BatchError::DuplicateHost(record.ip));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[HostRecord] { &self.records }

    pub fn into_records(self) -> Vec<HostRecord> { self.records }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }
}
