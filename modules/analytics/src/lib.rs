//! Read-only analytics over persisted host records: device roles, risky ports and report tables.

pub mod aggregate;
pub mod classify;
pub mod risk;

pub use aggregate::{
    host_port_counts, os_distribution, port_distribution, role_distribution, temporal_series, HostPortCount, OsCount,
    PortCount, Report, RoleCount, TimeBucket,
};
pub use classify::{classify, classify_record, DeviceRole, PortSet};
pub use risk::{detect_risks, risks_for, RiskFinding, ESSENTIAL_PORTS};
