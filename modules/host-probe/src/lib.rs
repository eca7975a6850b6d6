//! Detailed per-host probing: TCP port states, service banners, OS heuristics, names and MACs,
//! plus the bounded pool that turns a host list into one scan batch.

pub mod fingerprint;
pub mod neighbors;
pub mod oui;
pub mod pool;
pub mod ports;
pub mod prober;
pub mod services;

pub use pool::{probe_batch, BatchOutcome, DroppedRecord, PoolOptions, Progress, SkippedHost, DEFAULT_WORKERS};
pub use ports::{default_top_ports, parse_ports, top_ports, PortSpecError, ScanLimits};
pub use prober::{HostProber, ProbeOptions, TcpProber};
