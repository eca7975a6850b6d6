//! The per-host probe seam and its TCP implementation.

use crate::fingerprint::guess_os;
use crate::neighbors::{mac_for, reverse_name};
use crate::oui::lookup_vendor;
use crate::ports::{default_top_ports, scan_ports, ScanLimits};
use crate::services::{grab_banner, parse_banner, service_name};
use async_trait::async_trait;
use netsurvey_core::{PortState, ProbeError, RawProbe};
use std::net::IpAddr;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::debug;

/// Detailed probe of a single host. Implementations must be safe to call concurrently.
#[async_trait]
pub trait HostProber: Send + Sync {
    async fn probe(&self, ip: IpAddr) -> Result<RawProbe, ProbeError>;
}

#[derive(Clone)]
pub struct ProbeOptions {
    pub ports: Vec<u16>,
    pub limits: ScanLimits,
    pub banner_timeout: Duration,
    pub grab_banners: bool,
    pub resolve_names: bool,
    pub lookup_mac: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        ProbeOptions {
            ports: default_top_ports(),
            limits: ScanLimits::default(),
            banner_timeout: Duration::from_millis(1500),
            grab_banners: true,
            resolve_names: true,
            lookup_mac: true,
        }
    }
}

/// TCP connect prober: port states, service banners, heuristic OS, reverse DNS and neighbor MAC.
pub struct TcpProber {
    opts: ProbeOptions,
}

impl TcpProber {
    pub fn new(opts: ProbeOptions) -> Self {
        TcpProber { opts }
    }

    pub fn options(&self) -> &ProbeOptions {
        &self.opts
    }
}

#[async_trait]
impl HostProber for TcpProber {
    async fn probe(&self, ip: IpAddr) -> Result<RawProbe, ProbeError> {
        let mut raw = RawProbe::new(ip.to_string());
        raw.ports = scan_ports(ip, &self.opts.ports, &self.opts.limits).await?;
        let answered = raw.ports.iter().any(|p| p.state != PortState::Filtered);
        raw.state = Some(if answered { "up" } else { "down" }.to_string());

        for p in raw.ports.iter_mut().filter(|p| p.state == PortState::Open) {
            p.service = service_name(p.port).map(str::to_string);
        }

        let mut banners = Vec::new();
        if self.opts.grab_banners {
            let wait = self.opts.banner_timeout;
            let mut reads = JoinSet::new();
            for port in raw.open_ports().map(|p| p.port) {
                reads.spawn(async move { (port, grab_banner(ip, port, wait).await) });
            }
            while let Some(joined) = reads.join_next().await {
                let Ok((port, Some(bytes))) = joined else { continue };
                let info = parse_banner(&bytes);
                if let Some(p) = raw.ports.iter_mut().find(|p| p.port == port) {
                    p.product = info.product;
                    p.version = info.version;
                }
                banners.push((port, String::from_utf8_lossy(&bytes).into_owned()));
            }
            banners.sort_by_key(|(port, _)| *port);
        }
        raw.os_matches = guess_os(&raw.ports, &banners);

        if self.opts.resolve_names {
            if let Some(name) = reverse_name(ip).await {
                raw.hostnames.push(name);
            }
        }
        if self.opts.lookup_mac {
            if let Some(mac) = mac_for(ip).await {
                if let Some(v) = lookup_vendor(&mac) {
                    raw.vendors.insert(mac.clone(), v);
                }
                raw.mac = Some(mac);
            }
        }
        debug!(%ip, open = raw.open_ports().count(), os = ?raw.os_matches.first().map(|m| &m.name), "host probed");
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn loopback_ssh_like_service_is_identified() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                let Ok((mut s, _)) = listener.accept().await else { break };
                let _ = s.write_all(b"SSH-2.0-OpenSSH_9.2p1 Debian-2\r\n").await;
            }
        });

        let prober = TcpProber::new(ProbeOptions {
            ports: vec![port],
            resolve_names: false,
            lookup_mac: false,
            ..Default::default()
        });
        let raw = prober.probe(IpAddr::from([127, 0, 0, 1])).await.unwrap();
        assert_eq!(raw.state.as_deref(), Some("up"));
        let open: Vec<_> = raw.open_ports().collect();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].product.as_deref(), Some("OpenSSH"));
        assert_eq!(raw.os_matches.first().map(|m| m.name.as_str()), Some("Linux (Debian)"));
    }
}
