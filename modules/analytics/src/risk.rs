//! Flags open ports that belong to a fixed set of security-sensitive services.

use netsurvey_core::HostRecord;
use serde::Serialize;

/// FTP, SSH, Telnet, SMTP, DNS, NetBIOS and RDP.
pub const ESSENTIAL_PORTS: [u16; 9] = [137, 139, 22, 53, 25, 3389, 20, 21, 23];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskFinding {
    pub ip: String,
    pub port: u16,
}

/// One finding per matching token, in token order. Repeated tokens repeat the finding.
pub fn risks_for(record: &HostRecord) -> Vec<RiskFinding> {
    record
        .open_ports
        .iter()
        .filter_map(|t| t.trim().parse::<u16>().ok())
        .filter(|p| ESSENTIAL_PORTS.contains(p))
        .map(|port| RiskFinding { ip: record.ip.clone(), port })
        .collect()
}

/// Findings for every record, in record order.
pub fn detect_risks<'a>(records: impl IntoIterator<Item = &'a HostRecord>) -> Vec<RiskFinding> {
    records.into_iter().flat_map(risks_for).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn rec(ip: &str, ports: &[&str]) -> HostRecord {
        HostRecord {
            ip: ip.into(),
            status: "up".into(),
            hostname: String::new(),
            mac_address: String::new(),
            vendor: String::new(),
            os: String::new(),
            open_ports: ports.iter().map(|p| p.to_string()).collect(),
            services: ports.iter().map(|_| "Unknown/Unknown".to_string()).collect(),
            timestamp: datetime!(2024-03-01 12:00 UTC),
        }
    }

    #[test]
    fn only_sensitive_ports_are_flagged() {
        let f = risks_for(&rec("10.0.0.1", &["22", "80"]));
        assert_eq!(f, vec![RiskFinding { ip: "10.0.0.1".into(), port: 22 }]);
    }

    #[test]
    fn multiple_findings_keep_token_order() {
        let records = [rec("a", &["3389", "443", "23"]), rec("b", &["8080"]), rec("c", &["21"])];
        let ports: Vec<(String, u16)> = detect_risks(&records).into_iter().map(|f| (f.ip, f.port)).collect();
        assert_eq!(ports, vec![("a".into(), 3389), ("a".into(), 23), ("c".into(), 21)]);
    }
}
