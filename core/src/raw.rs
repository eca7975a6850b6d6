//! Raw probe output as gathered from the wire, before any defaults are applied.

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Open,
    Closed,
    Filtered,
}

impl PortState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortState::Open => "open",
            PortState::Closed => "closed",
            PortState::Filtered => "filtered",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortProbe {
    pub port: u16,
    pub state: PortState,
    pub service: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
}

impl PortProbe {
    pub fn new(port: u16, state: PortState) -> Self {
        PortProbe { port, state, service: None, product: None, version: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsMatch {
    pub name: String,
    /// 0..=100
    pub accuracy: u8,
}

/// Everything a probe learned about one host. Any field may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawProbe {
    pub host: String,
    pub state: Option<String>,
    pub hostnames: Vec<String>,
    pub mac: Option<String>,
    /// Vendor names keyed by MAC address.
    pub vendors: HashMap<String, String>,
    /// Ranked best first.
    pub os_matches: Vec<OsMatch>,
    /// In the order the probe reported them.
    pub ports: Vec<PortProbe>,
}

impl RawProbe {
    pub fn new(host: impl Into<String>) -> Self {
        RawProbe { host: host.into(), ..Default::default() }
    }

    pub fn open_ports(&self) -> impl Iterator<Item = &PortProbe> {
        self.ports.iter().filter(|p| p.state == PortState::Open)
    }
}
