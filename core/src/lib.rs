//! Core types for the netsurvey pipeline: host records, raw probe results, the normalizer,
//! and the error taxonomy shared by discovery, probing and persistence.

pub mod error;
pub mod normalize;
pub mod ratelimiter;
pub mod raw;
pub mod record;

pub use error::{BatchError, DiscoveryError, InvalidRangeError, NormalizationInvariantError, ProbeError};
pub use normalize::normalize;
pub use raw::{OsMatch, PortProbe, PortState, RawProbe};
pub use record::{HostRecord, ScanBatch};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!version().is_empty());
    }
}
