//! Host discovery via TCP connect sweep with timeouts and pacing.

pub mod range;

use netsurvey_core::{DiscoveryError, InvalidRangeError};
use range::{parse_range, RangeEntry};
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream};
use tokio::sync::Semaphore;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

pub use range::DEFAULT_MAX_HOSTS;

#[derive(Debug, Clone)]
pub struct DiscoverOptions {
    /// Ports tried for liveness, in order.
    pub ports: Vec<u16>,
    pub timeout_per_attempt: Duration,
    pub concurrency: usize,
    /// Launch pacing across hosts; `None` disables it.
    pub qps: Option<u32>,
    pub max_hosts: usize,
}

impl Default for DiscoverOptions {
    fn default() -> Self {
        DiscoverOptions {
            ports: vec![80, 443, 22],
            timeout_per_attempt: Duration::from_millis(300),
            concurrency: 256,
            qps: None,
            max_hosts: DEFAULT_MAX_HOSTS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Up,
    Down,
    /// Every attempt failed because no route to the host or its network exists.
    NoRoute,
}

/// Validate a range descriptor without any network activity.
pub fn validate_range(input: &str, max_hosts: usize) -> Result<Vec<RangeEntry>, InvalidRangeError> {
    parse_range(input, max_hosts)
}

/// Single lightweight pass over `range`. Returns responsive hosts in range order; an empty list
/// means nothing answered. Fails when the descriptor is malformed or the whole range is unroutable.
pub async fn discover(range: &str, opts: &DiscoverOptions) -> Result<Vec<IpAddr>, DiscoveryError> {
    let entries = parse_range(range, opts.max_hosts)?;
    let ips = resolve_entries(entries).await;
    let attempted = ips.len();
    let results = discover_hosts(ips, opts).await;

    if attempted > 0 && results.iter().all(|(_, l)| *l == Liveness::NoRoute) {
        return Err(DiscoveryError::Unreachable { attempted });
    }
    let live: Vec<IpAddr> = results.into_iter().filter(|(_, l)| *l == Liveness::Up).map(|(ip, _)| ip).collect();
    info!(range, attempted, live = live.len(), "discovery finished");
    Ok(live)
}

/// Resolve hostnames to their first address; unresolvable names are dropped with a warning.
pub async fn resolve_entries(entries: Vec<RangeEntry>) -> Vec<IpAddr> {
    let mut out = Vec::with_capacity(entries.len());
    for e in entries {
        match e {
            RangeEntry::Addr(ip) => out.push(ip),
            RangeEntry::Name(name) => match lookup_host((name.as_str(), 0u16)).await {
                Ok(mut it) => match it.next() {
                    Some(sa) if !out.contains(&sa.ip()) => out.push(sa.ip()),
                    Some(_) => {}
                    None => warn!(host = %name, "hostname resolved to no addresses"),
                },
                Err(e) => warn!(host = %name, error = %e, "hostname did not resolve"),
            },
        }
    }
    out
}

/// TCP-based liveness check. A completed handshake or an active refusal both prove the host is up.
pub async fn probe_liveness(ip: IpAddr, ports: &[u16], per_attempt: Duration) -> Liveness {
    let mut no_route = 0usize;
    for &p in ports {
        let addr = SocketAddr::new(ip, p);
        match timeout(per_attempt, TcpStream::connect(addr)).await {
            Ok(Ok(_)) => return Liveness::Up,
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => return Liveness::Up,
            Ok(Err(e)) if matches!(e.kind(), ErrorKind::NetworkUnreachable | ErrorKind::HostUnreachable) => {
                no_route += 1;
            }
            Ok(Err(e)) => debug!(%ip, port = p, error = %e, "liveness attempt failed"),
            Err(_) => {}
        }
    }
    if !ports.is_empty() && no_route == ports.len() { Liveness::NoRoute } else { Liveness::Down }
}

/// Check every address with bounded concurrency and optional QPS pacing. Results keep input order.
pub async fn discover_hosts(ips: Vec<IpAddr>, opts: &DiscoverOptions) -> Vec<(IpAddr, Liveness)> {
    let sem = Arc::new(Semaphore::new(opts.concurrency.max(1)));
    let mut ticker = opts.qps.map(|q| {
        let mut it = interval(Duration::from_micros(1_000_000 / q.max(1) as u64));
        it.set_missed_tick_behavior(MissedTickBehavior::Delay);
        it
    });

    let mut handles = Vec::with_capacity(ips.len());
    for ip in ips {
        if let Some(t) = ticker.as_mut() {
            t.tick().await;
        }
        let Ok(permit) = sem.clone().acquire_owned().await else { break };
        let ports = opts.ports.clone();
        let per_attempt = opts.timeout_per_attempt;
        handles.push((ip, tokio::spawn(async move {
            let l = probe_liveness(ip, &ports, per_attempt).await;
            drop(permit);
            l
        })));
    }

    let mut out = Vec::with_capacity(handles.len());
    for (ip, h) in handles {
        let l = h.await.unwrap_or(Liveness::Down);
        out.push((ip, l));
    }
    out
}
