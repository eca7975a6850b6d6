//! Link-layer and name lookups for a probed host: MAC from the neighbor table, name from reverse DNS.

use std::collections::HashMap;
use std::net::IpAddr;
use tokio::process::Command;
use tracing::debug;

/// Neighbor table as `ip -> MAC`, MACs uppercase and colon separated.
/// Reads `/proc/net/arp` and falls back to `arp -an` elsewhere. Empty when neither is available.
pub async fn neighbor_table() -> HashMap<IpAddr, String> {
    if let Ok(text) = tokio::fs::read_to_string("/proc/net/arp").await {
        return parse_proc_arp(&text);
    }
    match Command::new("arp").arg("-an").output().await {
        Ok(out) => parse_arp_output(&String::from_utf8_lossy(&out.stdout)),
        Err(e) => {
            debug!(error = %e, "no neighbor table available");
            HashMap::new()
        }
    }
}

/// MAC address for `ip`, if the neighbor table has a complete entry for it.
pub async fn mac_for(ip: IpAddr) -> Option<String> {
    neighbor_table().await.remove(&ip)
}

fn parse_proc_arp(text: &str) -> HashMap<IpAddr, String> {
    let mut map = HashMap::new();
    for line in text.lines().skip(1) {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 4 {
            continue;
        }
        // flags 0x0 marks an incomplete entry
        if cols[2] == "0x0" {
            continue;
        }
        if let (Ok(ip), Some(mac)) = (cols[0].parse::<IpAddr>(), normalize_mac(cols[3])) {
            map.insert(ip, mac);
        }
    }
    map
}

fn parse_arp_output(text: &str) -> HashMap<IpAddr, String> {
    let mut map = HashMap::new();
    for line in text.lines() {
        let mut ip = None;
        let mut mac = None;
        for part in line.split_whitespace() {
            let clean = part.trim_matches(|c| c == '(' || c == ')');
            if let Ok(addr) = clean.parse::<IpAddr>() {
                ip.get_or_insert(addr);
            } else if let Some(m) = normalize_mac(clean) {
                mac.get_or_insert(m);
            }
        }
        if let (Some(ip), Some(mac)) = (ip, mac) {
            map.insert(ip, mac);
        }
    }
    map
}

/// `aa-bb-c-dd-ee-ff` style input to `AA:BB:0C:DD:EE:FF`. Rejects the all-zero placeholder.
fn normalize_mac(s: &str) -> Option<String> {
    let parts: Vec<&str> = s.split([':', '-']).collect();
    if parts.len() != 6 || parts.iter().any(|p| p.is_empty() || p.len() > 2 || !p.chars().all(|c| c.is_ascii_hexdigit())) {
        return None;
    }
    let mac = parts.iter().map(|p| format!("{:0>2}", p.to_ascii_uppercase())).collect::<Vec<_>>().join(":");
    if mac == "00:00:00:00:00:00" { None } else { Some(mac) }
}

/// Reverse DNS name for `ip`. Answers that merely echo an address back are discarded.
pub async fn reverse_name(ip: IpAddr) -> Option<String> {
    let name = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&ip)).await.ok()?.ok()?;
    let name = name.trim_end_matches('.').to_string();
    if name.is_empty() || name.parse::<IpAddr>().is_ok() {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proc_table_skips_incomplete_entries() {
        let text = "IP address       HW type     Flags       HW address            Mask     Device\n\
                    192.168.1.1      0x1         0x2         dc:15:c8:01:02:03     *        eth0\n\
                    192.168.1.9      0x1         0x0         00:00:00:00:00:00     *        eth0\n";
        let map = parse_proc_arp(text);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&IpAddr::from([192, 168, 1, 1])], "DC:15:C8:01:02:03");
    }

    #[test]
    fn arp_command_output() {
        let text = "? (10.0.0.1) at 0:c:29:ab:cd:ef on en0 ifscope [ethernet]\n\
                    ? (10.0.0.7) at (incomplete) on en0 ifscope [ethernet]\n\
                      10.0.0.20             b8-27-eb-00-11-22     dynamic\n";
        let map = parse_arp_output(text);
        assert_eq!(map[&IpAddr::from([10, 0, 0, 1])], "00:0C:29:AB:CD:EF");
        assert_eq!(map[&IpAddr::from([10, 0, 0, 20])], "B8:27:EB:00:11:22");
        assert!(!map.contains_key(&IpAddr::from([10, 0, 0, 7])));
    }
}
