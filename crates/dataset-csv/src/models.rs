use netsurvey_core::HostRecord;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::schema::LEGACY_NO_SERVICES;

/// One dataset row as it appears on disk. Field order follows [`crate::schema::COLUMNS`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Row {
    #[serde(rename = "IP")]
    pub ip: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Hostname", default)]
    pub hostname: String,
    #[serde(rename = "MAC Address", default)]
    pub mac_address: String,
    #[serde(rename = "Vendor", default)]
    pub vendor: String,
    #[serde(rename = "OS", default)]
    pub os: String,
    #[serde(rename = "Open Ports", default)]
    pub open_ports: String,
    #[serde(rename = "Services", default)]
    pub services: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

/// Why a stored row could not be turned back into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowDefect {
    Timestamp(String),
    Misaligned { ports: usize, services: usize },
}

impl From<&HostRecord> for Row {
    fn from(r: &HostRecord) -> Self {
        Row {
            ip: r.ip.clone(),
            status: r.status.clone(),
            hostname: r.hostname.clone(),
            mac_address: r.mac_address.clone(),
            vendor: r.vendor.clone(),
            os: r.os.clone(),
            open_ports: r.open_ports.join(" "),
            services: r.services.join(" "),
            timestamp: format_timestamp(r.timestamp),
        }
    }
}

impl Row {
    pub fn into_record(self) -> Result<HostRecord, RowDefect> {
        let timestamp = parse_timestamp(&self.timestamp).ok_or_else(|| RowDefect::Timestamp(self.timestamp.clone()))?;
        let open_ports: Vec<String> = self.open_ports.split_whitespace().map(str::to_string).collect();
        let services: Vec<String> = if open_ports.is_empty() && self.services.trim() == LEGACY_NO_SERVICES {
            Vec::new()
        } else {
            let tokens: Vec<String> = self.services.split_whitespace().map(str::to_string).collect();
            if tokens.len() == open_ports.len() { tokens } else { regroup_products(&tokens) }
        };
        if open_ports.len() != services.len() {
            return Err(RowDefect::Misaligned { ports: open_ports.len(), services: services.len() });
        }
        Ok(HostRecord {
            ip: self.ip,
            status: self.status,
            hostname: self.hostname,
            mac_address: self.mac_address,
            vendor: self.vendor,
            os: self.os,
            open_ports,
            services,
            timestamp,
        })
    }
}

/// Older files wrote products with embedded spaces (`http/Apache httpd`). Every token carrying a `/`
/// starts a service; the tokens after it belong to its product and are folded back with `_`.
fn regroup_products(tokens: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tok in tokens {
        match out.last_mut() {
            Some(last) if !tok.contains('/') => {
                last.push('_');
                last.push_str(tok);
            }
            _ => out.push(tok.clone()),
        }
    }
    out
}

pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

/// RFC 3339 first, then the naive `YYYY-MM-DD HH:MM:SS[.ffffff]` form older files carry (read as UTC).
pub fn parse_timestamp(s: &str) -> Option<OffsetDateTime> {
    let s = s.trim();
    if let Ok(ts) = OffsetDateTime::parse(s, &Rfc3339) {
        return Some(ts);
    }
    let with_fraction = format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
    let whole = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    PrimitiveDateTime::parse(s, with_fraction)
        .or_else(|_| PrimitiveDateTime::parse(s, whole))
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn legacy_row(ports: &str, services: &str, ts: &str) -> Row {
        Row {
            ip: "192.168.0.4".into(),
            status: "up".into(),
            hostname: String::new(),
            mac_address: String::new(),
            vendor: "Unknown".into(),
            os: String::new(),
            open_ports: ports.into(),
            services: services.into(),
            timestamp: ts.into(),
        }
    }

    #[test]
    fn legacy_sentinel_reads_as_empty_services() {
        let r = legacy_row("", "No services detected", "2023-11-04 21:07:33.512345").into_record().unwrap();
        assert!(r.open_ports.is_empty());
        assert!(r.services.is_empty());
        assert_eq!(r.timestamp, datetime!(2023-11-04 21:07:33.512345 UTC));
    }

    #[test]
    fn naive_timestamp_without_fraction() {
        assert_eq!(parse_timestamp("2023-11-04 21:07:33"), Some(datetime!(2023-11-04 21:07:33 UTC)));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn misaligned_row_is_a_defect() {
        let err = legacy_row("22 80", "ssh/OpenSSH", "2023-11-04T21:07:33Z").into_record().unwrap_err();
        assert_eq!(err, RowDefect::Misaligned { ports: 2, services: 1 });
    }

    #[test]
    fn legacy_products_with_spaces_are_regrouped() {
        let r = legacy_row("22 80 135", "ssh/OpenSSH http/Apache httpd msrpc/Microsoft Windows RPC", "2023-11-04 21:07:33")
            .into_record()
            .unwrap();
        assert_eq!(r.open_ports, ["22", "80", "135"]);
        assert_eq!(r.services, ["ssh/OpenSSH", "http/Apache_httpd", "msrpc/Microsoft_Windows_RPC"]);
    }

    #[test]
    fn regrouping_still_misaligned_is_a_defect() {
        let err = legacy_row("22 80 443", "ssh/OpenSSH http/Apache httpd", "2023-11-04 21:07:33").into_record().unwrap_err();
        assert_eq!(err, RowDefect::Misaligned { ports: 3, services: 2 });
    }
}
