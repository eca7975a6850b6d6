//! Dataset-wide tables: OS and port distributions, per-host port counts, hourly activity and
//! device roles. Every function is pure over the record slice.

use crate::classify::{classify_record, DeviceRole};
use netsurvey_core::HostRecord;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use time::{Duration, OffsetDateTime, Time, UtcOffset};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsCount {
    /// Empty when no fingerprint matched.
    pub os: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortCount {
    pub port: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostPortCount {
    pub ip: String,
    pub open_ports: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBucket {
    #[serde(with = "time::serde::rfc3339")]
    pub hour: OffsetDateTime,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleCount {
    pub role: DeviceRole,
    pub count: usize,
}

/// Records grouped by OS name, largest group first, ties by name.
pub fn os_distribution<'a>(records: impl IntoIterator<Item = &'a HostRecord>) -> Vec<OsCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in records {
        *counts.entry(r.os.as_str()).or_default() += 1;
    }
    let mut out: Vec<OsCount> = counts.into_iter().map(|(os, count)| OsCount { os: os.to_string(), count }).collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.os.cmp(&b.os)));
    out
}

/// Frequency of every open-port token, largest first, ties by port number.
pub fn port_distribution<'a>(records: impl IntoIterator<Item = &'a HostRecord>) -> Vec<PortCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in records {
        for t in &r.open_ports {
            *counts.entry(t.as_str()).or_default() += 1;
        }
    }
    let mut out: Vec<PortCount> = counts.into_iter().map(|(port, count)| PortCount { port: port.to_string(), count }).collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| port_order(&a.port, &b.port)));
    out
}

// numeric tokens first, in numeric order, then anything else lexically
fn port_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u32>(), b.parse::<u32>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Open-port token count of each host's most recent record, hosts in first-appearance order.
/// Equal timestamps resolve to the later row. Duplicate tokens are counted.
pub fn host_port_counts<'a>(records: impl IntoIterator<Item = &'a HostRecord>) -> Vec<HostPortCount> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut out: Vec<HostPortCount> = Vec::new();
    for r in records {
        let entry = HostPortCount { ip: r.ip.clone(), open_ports: r.open_ports.len(), timestamp: r.timestamp };
        match index.get(r.ip.as_str()) {
            Some(&i) if r.timestamp >= out[i].timestamp => out[i] = entry,
            Some(_) => {}
            None => {
                index.insert(r.ip.as_str(), out.len());
                out.push(entry);
            }
        }
    }
    out
}

/// Widest span, in hours, that is zero-filled. Longer spans only list the hours that have records.
pub const MAX_FILLED_HOURS: i64 = 24 * 366;

/// Record counts per UTC hour, oldest first, with empty hours between the ends filled by zero.
/// A span wider than [`MAX_FILLED_HOURS`] falls back to the non-empty hours only.
pub fn temporal_series<'a>(records: impl IntoIterator<Item = &'a HostRecord>) -> Vec<TimeBucket> {
    let mut counts: HashMap<OffsetDateTime, usize> = HashMap::new();
    for r in records {
        *counts.entry(hour_of(r.timestamp)).or_default() += 1;
    }
    let (Some(&first), Some(&last)) = (counts.keys().min(), counts.keys().max()) else {
        return Vec::new();
    };
    let span = (last - first).whole_hours();
    if span > MAX_FILLED_HOURS {
        debug!(span_hours = span, "activity span too wide to zero-fill, listing non-empty hours");
        let mut out: Vec<TimeBucket> = counts.into_iter().map(|(hour, count)| TimeBucket { hour, count }).collect();
        out.sort_by_key(|b| b.hour);
        return out;
    }
    let mut out = Vec::new();
    let mut next = Some(first);
    while let Some(hour) = next.filter(|h| *h <= last) {
        out.push(TimeBucket { hour, count: counts.get(&hour).copied().unwrap_or(0) });
        next = hour.checked_add(Duration::HOUR);
    }
    out
}

fn hour_of(ts: OffsetDateTime) -> OffsetDateTime {
    let utc = ts.to_offset(UtcOffset::UTC);
    utc.replace_time(Time::MIDNIGHT) + Duration::hours(i64::from(utc.hour()))
}

/// Records per device role, largest first.
pub fn role_distribution<'a>(records: impl IntoIterator<Item = &'a HostRecord>) -> Vec<RoleCount> {
    let mut counts: HashMap<DeviceRole, usize> = HashMap::new();
    for r in records {
        *counts.entry(classify_record(r)).or_default() += 1;
    }
    let mut out: Vec<RoleCount> = counts.into_iter().map(|(role, count)| RoleCount { role, count }).collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.role.cmp(&b.role)));
    out
}

/// Every table over one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub records: usize,
    pub os_distribution: Vec<OsCount>,
    /// Same grouping restricted to hosts whose status is `up`.
    pub os_distribution_up: Vec<OsCount>,
    pub port_distribution: Vec<PortCount>,
    pub host_port_counts: Vec<HostPortCount>,
    pub temporal_series: Vec<TimeBucket>,
    pub role_distribution: Vec<RoleCount>,
}

impl Report {
    pub fn build(records: &[HostRecord]) -> Self {
        Report {
            records: records.len(),
            os_distribution: os_distribution(records),
            os_distribution_up: os_distribution(records.iter().filter(|r| r.is_up())),
            port_distribution: port_distribution(records),
            host_port_counts: host_port_counts(records),
            temporal_series: temporal_series(records),
            role_distribution: role_distribution(records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn rec(ip: &str, status: &str, os: &str, ports: &[&str], ts: OffsetDateTime) -> HostRecord {
        HostRecord {
            ip: ip.into(),
            status: status.into(),
            hostname: String::new(),
            mac_address: String::new(),
            vendor: String::new(),
            os: os.into(),
            open_ports: ports.iter().map(|p| p.to_string()).collect(),
            services: ports.iter().map(|_| "Unknown/Unknown".to_string()).collect(),
            timestamp: ts,
        }
    }

    fn sample() -> Vec<HostRecord> {
        vec![
            rec("10.0.0.1", "up", "Linux", &["22", "80"], datetime!(2024-03-01 10:15 UTC)),
            rec("10.0.0.2", "up", "", &["443"], datetime!(2024-03-01 10:40 UTC)),
            rec("10.0.0.3", "down", "Microsoft Windows", &[], datetime!(2024-03-01 10:59 UTC)),
            rec("10.0.0.1", "up", "Linux", &["22", "22", "3306"], datetime!(2024-03-01 13:05 UTC)),
            rec("10.0.0.4", "up", "Linux", &["8000", "22"], datetime!(2024-03-01 13:30 +02:00)),
        ]
    }

    #[test]
    fn os_groups_include_the_empty_bucket() {
        let d = os_distribution(&sample());
        let pairs: Vec<(&str, usize)> = d.iter().map(|c| (c.os.as_str(), c.count)).collect();
        assert_eq!(pairs, vec![("Linux", 3), ("", 1), ("Microsoft Windows", 1)]);
    }

    #[test]
    fn up_only_view_drops_down_hosts() {
        let r = Report::build(&sample());
        assert!(r.os_distribution_up.iter().all(|c| c.os != "Microsoft Windows"));
        assert_eq!(r.records, 5);
    }

    #[test]
    fn ports_sort_by_count_then_number() {
        let d = port_distribution(&sample());
        let pairs: Vec<(&str, usize)> = d.iter().map(|c| (c.port.as_str(), c.count)).collect();
        assert_eq!(pairs, vec![("22", 4), ("80", 1), ("443", 1), ("3306", 1), ("8000", 1)]);
    }

    #[test]
    fn per_host_uses_latest_record_and_keeps_duplicates() {
        let c = host_port_counts(&sample());
        let pairs: Vec<(&str, usize)> = c.iter().map(|h| (h.ip.as_str(), h.open_ports)).collect();
        assert_eq!(pairs, vec![("10.0.0.1", 3), ("10.0.0.2", 1), ("10.0.0.3", 0), ("10.0.0.4", 2)]);
    }

    #[test]
    fn equal_timestamps_prefer_the_later_row() {
        let ts = datetime!(2024-03-01 10:00 UTC);
        let rows = vec![rec("h", "up", "", &["1"], ts), rec("h", "up", "", &["1", "2"], ts)];
        assert_eq!(host_port_counts(&rows)[0].open_ports, 2);
    }

    #[test]
    fn hourly_series_fills_gaps_in_utc() {
        let s = temporal_series(&sample());
        let pairs: Vec<(u8, usize)> = s.iter().map(|b| (b.hour.hour(), b.count)).collect();
        // the +02:00 record lands in 11:00 UTC
        assert_eq!(pairs, vec![(10, 3), (11, 1), (12, 0), (13, 1)]);
        assert!(temporal_series(&Vec::<HostRecord>::new()).is_empty());
    }

    #[test]
    fn last_representable_hour_is_a_bucket() {
        let rows = vec![
            rec("a", "up", "", &[], datetime!(9999-12-31 22:10 UTC)),
            rec("b", "up", "", &[], datetime!(9999-12-31 23:30 UTC)),
        ];
        let s = temporal_series(&rows);
        let pairs: Vec<(u8, usize)> = s.iter().map(|b| (b.hour.hour(), b.count)).collect();
        assert_eq!(pairs, vec![(22, 1), (23, 1)]);
    }

    #[test]
    fn wide_spans_list_only_active_hours() {
        let rows = vec![
            rec("a", "up", "", &[], datetime!(0001-01-01 00:05 UTC)),
            rec("b", "up", "", &[], datetime!(2024-03-01 10:15 UTC)),
            rec("c", "up", "", &[], datetime!(2024-03-01 10:45 UTC)),
        ];
        let s = temporal_series(&rows);
        assert_eq!(s.len(), 2);
        assert_eq!(s[0].hour, datetime!(0001-01-01 00:00 UTC));
        assert_eq!((s[1].hour, s[1].count), (datetime!(2024-03-01 10:00 UTC), 2));
    }

    #[test]
    fn roles_are_counted() {
        let d = role_distribution(&sample());
        let pairs: Vec<(DeviceRole, usize)> = d.iter().map(|c| (c.role, c.count)).collect();
        assert_eq!(pairs, vec![(DeviceRole::NetworkDevice, 3), (DeviceRole::Server, 2)]);
    }

    #[test]
    fn building_twice_is_identical() {
        let rows = sample();
        assert_eq!(Report::build(&rows), Report::build(&rows));
    }
}
