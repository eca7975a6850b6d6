//! Raw probe output to canonical [`HostRecord`], applying the field defaults.

use crate::error::NormalizationInvariantError;
use crate::raw::RawProbe;
use crate::record::HostRecord;
use time::OffsetDateTime;

pub const UNKNOWN: &str = "Unknown";

/// Convert one raw probe result into a record stamped with the batch timestamp.
pub fn normalize(raw: &RawProbe, timestamp: OffsetDateTime) -> Result<HostRecord, NormalizationInvariantError> {
    let mac_address = raw.mac.as_deref().map(str::trim).unwrap_or_default().to_string();
    let vendor = if mac_address.is_empty() {
        String::new()
    } else {
        raw.vendors
            .get(&mac_address)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string()
    };

    let mut open_ports = Vec::new();
    let mut services = Vec::new();
    for p in raw.open_ports() {
        open_ports.push(p.port.to_string());
        services.push(format!("{}/{}", token(p.service.as_deref()), token(p.product.as_deref())));
    }

    let status = raw.state.as_deref().map(str::trim).filter(|s| !s.is_empty()).unwrap_or("unknown");

    let record = HostRecord {
        ip: raw.host.clone(),
        status: status.to_string(),
        hostname: raw.hostnames.first().map(|h| h.trim().to_string()).unwrap_or_default(),
        mac_address,
        vendor,
        os: raw.os_matches.first().map(|m| m.name.clone()).unwrap_or_default(),
        open_ports,
        services,
        timestamp,
    };
    record.check_alignment()?;
    Ok(record)
}

/// Service components are persisted as space-separated tokens, so inner whitespace is folded.
fn token(s: Option<&str>) -> String {
    match s.map(str::trim) {
        Some(v) if !v.is_empty() => v.split_whitespace().collect::<Vec<_>>().join("_"),
        _ => UNKNOWN.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{OsMatch, PortProbe, PortState};
    use time::macros::datetime;

    const TS: OffsetDateTime = datetime!(2024-05-02 08:30:00 UTC);

    #[test]
    fn empty_probe_gets_defaults() {
        let r = normalize(&RawProbe::new("192.168.1.9"), TS).unwrap();
        assert_eq!(r.ip, "192.168.1.9");
        assert_eq!(r.status, "unknown");
        assert_eq!(r.hostname, "");
        assert_eq!(r.mac_address, "");
        assert_eq!(r.vendor, "");
        assert_eq!(r.os, "");
        assert!(r.open_ports.is_empty());
        assert!(r.services.is_empty());
        assert_eq!(r.timestamp, TS);
    }

    #[test]
    fn vendor_falls_back_to_unknown_only_with_mac() {
        let mut raw = RawProbe::new("10.1.1.1");
        raw.mac = Some("B8:27:EB:00:11:22".into());
        assert_eq!(normalize(&raw, TS).unwrap().vendor, "Unknown");
        raw.vendors.insert("B8:27:EB:00:11:22".into(), "Raspberry Pi Foundation".into());
        let r = normalize(&raw, TS).unwrap();
        assert_eq!(r.vendor, "Raspberry Pi Foundation");
        assert_eq!(r.mac_address, "B8:27:EB:00:11:22");
    }

    #[test]
    fn only_open_ports_in_probe_order() {
        let mut raw = RawProbe::new("10.1.1.2");
        raw.state = Some("up".into());
        raw.hostnames = vec!["nas.lan".into(), "nas".into()];
        raw.os_matches = vec![
            OsMatch { name: "Linux 5.x".into(), accuracy: 90 },
            OsMatch { name: "FreeBSD".into(), accuracy: 40 },
        ];
        let mut http = PortProbe::new(443, PortState::Open);
        http.service = Some("https".into());
        http.product = Some("nginx reverse proxy".into());
        let mut ssh = PortProbe::new(22, PortState::Open);
        ssh.service = Some("ssh".into());
        raw.ports = vec![http, PortProbe::new(23, PortState::Closed), ssh, PortProbe::new(25, PortState::Filtered)];

        let r = normalize(&raw, TS).unwrap();
        assert_eq!(r.status, "up");
        assert_eq!(r.hostname, "nas.lan");
        assert_eq!(r.os, "Linux 5.x");
        assert_eq!(r.open_ports, vec!["443", "22"]);
        assert_eq!(r.services, vec!["https/nginx_reverse_proxy", "ssh/Unknown"]);
    }

    #[test]
    fn blank_service_name_renders_unknown() {
        let mut raw = RawProbe::new("10.1.1.3");
        let mut p = PortProbe::new(9999, PortState::Open);
        p.service = Some("  ".into());
        raw.ports.push(p);
        assert_eq!(normalize(&raw, TS).unwrap().services, vec!["Unknown/Unknown"]);
    }
}
