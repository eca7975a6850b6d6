//! Error taxonomy shared by every stage of the scan pipeline.

use std::time::Duration;
use thiserror::Error;

/// Malformed range descriptor. Fatal to a run and raised before any packet is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRangeError {
    #[error("empty range descriptor")]
    Empty,
    #[error("invalid CIDR block {input:?}: {reason}")]
    Cidr { input: String, reason: String },
    #[error("invalid host {input:?}")]
    Host { input: String },
    #[error("range {input:?} expands to {count} hosts (limit {limit})")]
    TooLarge { input: String, count: u128, limit: usize },
}

/// Discovery-stage failure surfaced to the caller.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    InvalidRange(#[from] InvalidRangeError),
    #[error("network unreachable: none of the {attempted} hosts could be routed to")]
    Unreachable { attempted: usize },
}

/// Single-host probe failure. Recovered locally: the host is skipped and the batch continues.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("malformed probe response: {0}")]
    Malformed(String),
    #[error("probe task aborted: {0}")]
    Aborted(String),
}

impl From<std::io::Error> for ProbeError {
    fn from(e: std::io::Error) -> Self {
        ProbeError::Connect(e.to_string())
    }
}

/// Open ports and services fell out of alignment for one record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("record for {ip}: {ports} open ports but {services} services")]
pub struct NormalizationInvariantError {
    pub ip: String,
    pub ports: usize,
    pub services: usize,
}

/// Rejected attempt to add a record to a scan batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchError {
    #[error("duplicate host {0} in batch")]
    DuplicateHost(String),
    #[error("record for {0} carries a timestamp different from its batch")]
    TimestampMismatch(String),
    #[error(transparent)]
    Invariant(#[from] NormalizationInvariantError),
}
