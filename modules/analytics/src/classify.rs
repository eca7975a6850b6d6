//! Device-role tagging from a record's open-port set.

use netsurvey_core::HostRecord;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Ports typical of infrastructure gear.
pub const NETWORK_PORTS: [u16; 4] = [22, 23, 80, 443];
/// Ports typical of hosts offering services.
pub const SERVER_PORTS: [u16; 7] = [21, 22, 80, 443, 3306, 3389, 8080];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DeviceRole {
    #[serde(rename = "Network Device")]
    NetworkDevice,
    Server,
    Client,
}

impl DeviceRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceRole::NetworkDevice => "Network Device",
            DeviceRole::Server => "Server",
            DeviceRole::Client => "Client",
        }
    }
}

impl fmt::Display for DeviceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric view of an open-port token list. Tokens that are not port numbers are only counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet {
    ports: BTreeSet<u16>,
    unparsed: usize,
}

impl PortSet {
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S]) -> Self {
        let mut set = PortSet::default();
        for t in tokens {
            match t.as_ref().trim().parse::<u16>() {
                Ok(p) => {
                    set.ports.insert(p);
                }
                Err(_) => set.unparsed += 1,
            }
        }
        set
    }

    pub fn contains(&self, port: u16) -> bool {
        self.ports.contains(&port)
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty() && self.unparsed == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.ports.iter().copied()
    }

    fn within(&self, allowed: &[u16]) -> bool {
        self.unparsed == 0 && self.ports.iter().all(|p| allowed.contains(p))
    }

    fn touches(&self, wanted: &[u16]) -> bool {
        wanted.iter().any(|p| self.ports.contains(p))
    }
}

/// First matching rule wins: only network ports, then any server port, else client.
/// An empty set satisfies the first rule.
pub fn classify(ports: &PortSet) -> DeviceRole {
    if ports.within(&NETWORK_PORTS) {
        DeviceRole::NetworkDevice
    } else if ports.touches(&SERVER_PORTS) {
        DeviceRole::Server
    } else {
        DeviceRole::Client
    }
}

pub fn classify_record(record: &HostRecord) -> DeviceRole {
    classify(&PortSet::from_tokens(&record.open_ports[..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(tokens: &[&str]) -> DeviceRole {
        classify(&PortSet::from_tokens(tokens))
    }

    #[test]
    fn rule_order() {
        assert_eq!(role(&[]), DeviceRole::NetworkDevice);
        assert_eq!(role(&["80", "443"]), DeviceRole::NetworkDevice);
        assert_eq!(role(&["22", "3306"]), DeviceRole::Server);
        assert_eq!(role(&["3306"]), DeviceRole::Server);
        assert_eq!(role(&["8000"]), DeviceRole::Client);
    }

    #[test]
    fn tokens_compare_numerically() {
        assert_eq!(role(&["022", "0080"]), DeviceRole::NetworkDevice);
        assert!(PortSet::from_tokens(&["022"]).contains(22));
    }

    #[test]
    fn junk_tokens_leave_the_network_set() {
        assert_eq!(role(&["22", "ssh"]), DeviceRole::Server);
        assert_eq!(role(&["junk"]), DeviceRole::Client);
        assert!(!PortSet::from_tokens(&["junk"]).is_empty());
    }
}
