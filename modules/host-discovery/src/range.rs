//! Range descriptor parsing: CIDR blocks, IP literals and hostnames, comma or space separated.

use ipnet::IpNet;
use netsurvey_core::InvalidRangeError;
use std::collections::HashSet;
use std::net::IpAddr;

/// Default ceiling on the number of addresses one descriptor may expand to.
pub const DEFAULT_MAX_HOSTS: usize = 65_536;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RangeEntry {
    Addr(IpAddr),
    /// Resolved at discovery time.
    Name(String),
}

/// Parse and expand a range descriptor without touching the network. Order is preserved and
/// repeated hosts are collapsed onto their first occurrence.
pub fn parse_range(input: &str, max_hosts: usize) -> Result<Vec<RangeEntry>, InvalidRangeError> {
    let tokens: Vec<&str> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(InvalidRangeError::Empty);
    }

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut push = |e: RangeEntry, out: &mut Vec<RangeEntry>| {
        if seen.insert(e.clone()) {
            out.push(e);
        }
    };

    for tok in tokens {
        if tok.contains('/') {
            let net: IpNet = tok.parse().map_err(|e: ipnet::AddrParseError| InvalidRangeError::Cidr {
                input: tok.to_string(),
                reason: e.to_string(),
            })?;
            let count = block_size(&net).saturating_add(out.len() as u128);
            if count > max_hosts as u128 {
                return Err(InvalidRangeError::TooLarge { input: input.to_string(), count, limit: max_hosts });
            }
            for ip in net.hosts() {
                push(RangeEntry::Addr(ip), &mut out);
            }
        } else if let Ok(ip) = tok.parse::<IpAddr>() {
            push(RangeEntry::Addr(ip), &mut out);
        } else if is_hostname(tok) {
            push(RangeEntry::Name(tok.to_ascii_lowercase()), &mut out);
        } else {
            return Err(InvalidRangeError::Host { input: tok.to_string() });
        }
        if out.len() > max_hosts {
            return Err(InvalidRangeError::TooLarge { input: input.to_string(), count: out.len() as u128, limit: max_hosts });
        }
    }
    Ok(out)
}

fn block_size(net: &IpNet) -> u128 {
    let free = u32::from(net.max_prefix_len() - net.prefix_len());
    if free >= 128 { u128::MAX } else { 1u128 << free }
}

/// RFC 1123 host name. All-numeric names are rejected so typos like `10.0.0.300` fail early.
fn is_hostname(s: &str) -> bool {
    let s = s.strip_suffix('.').unwrap_or(s);
    if s.is_empty() || s.len() > 253 {
        return false;
    }
    let labels_ok = s.split('.').all(|l| {
        !l.is_empty()
            && l.len() <= 63
            && !l.starts_with('-')
            && !l.ends_with('-')
            && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    labels_ok && !s.split('.').all(|l| l.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addrs(v: &[RangeEntry]) -> Vec<String> {
        v.iter()
            .map(|e| match e {
                RangeEntry::Addr(ip) => ip.to_string(),
                RangeEntry::Name(n) => n.clone(),
            })
            .collect()
    }

    #[test]
    fn cidr_excludes_network_and_broadcast() {
        let v = parse_range("192.168.10.0/30", DEFAULT_MAX_HOSTS).unwrap();
        assert_eq!(addrs(&v), vec!["192.168.10.1", "192.168.10.2"]);
        let single = parse_range("10.9.8.7/32", DEFAULT_MAX_HOSTS).unwrap();
        assert_eq!(addrs(&single), vec!["10.9.8.7"]);
    }

    #[test]
    fn mixed_list_keeps_order_and_dedups() {
        let v = parse_range("10.0.0.5, gateway.lan 10.0.0.1,10.0.0.5  GATEWAY.lan", DEFAULT_MAX_HOSTS).unwrap();
        assert_eq!(addrs(&v), vec!["10.0.0.5", "gateway.lan", "10.0.0.1"]);
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(parse_range("  , ", DEFAULT_MAX_HOSTS), Err(InvalidRangeError::Empty));
        assert!(matches!(parse_range("10.0.0.0/33", DEFAULT_MAX_HOSTS), Err(InvalidRangeError::Cidr { .. })));
        assert!(matches!(parse_range("10.0.0.300", DEFAULT_MAX_HOSTS), Err(InvalidRangeError::Host { .. })));
        assert!(matches!(parse_range("bad_host!", DEFAULT_MAX_HOSTS), Err(InvalidRangeError::Host { .. })));
    }

    #[test]
    fn oversized_blocks_fail_before_expansion() {
        assert!(matches!(parse_range("10.0.0.0/8", DEFAULT_MAX_HOSTS), Err(InvalidRangeError::TooLarge { .. })));
        assert!(matches!(parse_range("10.0.0.0/29 10.0.1.0/29", 10), Err(InvalidRangeError::TooLarge { .. })));
        assert!(parse_range("2001:db8::/120", DEFAULT_MAX_HOSTS).is_ok());
        assert!(matches!(parse_range("::/0", DEFAULT_MAX_HOSTS), Err(InvalidRangeError::TooLarge { .. })));
        match parse_range("10.0.0.1 ::/0", DEFAULT_MAX_HOSTS) {
            Err(InvalidRangeError::TooLarge { count, .. }) => assert_eq!(count, u128::MAX),
            other => panic!("expected TooLarge, got {:?}", other),
        }
    }
}
