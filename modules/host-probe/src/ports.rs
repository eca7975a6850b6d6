//! TCP connect scan with timeouts, retries and concurrency limits.

use netsurvey_core::ratelimiter::RateLimiter;
use netsurvey_core::{PortProbe, PortState, ProbeError};
use rand::{thread_rng, Rng};
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PortSpecError {
    #[error("no ports given")]
    Empty,
    #[error("`{0}` is not a port between 1 and 65535")]
    Port(String),
    #[error("`{0}` is not an ascending port range")]
    Range(String),
}

/// Port list such as `22,80,443` or `1-1024 8080`: single ports and inclusive `lo-hi` ranges,
/// separated by commas or whitespace. The result is ascending and free of repeats.
pub fn parse_ports(list: &str) -> Result<Vec<u16>, PortSpecError> {
    let mut wanted = BTreeSet::new();
    for item in list.split(|c: char| c == ',' || c.is_whitespace()).filter(|t| !t.is_empty()) {
        match item.split_once('-') {
            Some((lo, hi)) => {
                let bad = || PortSpecError::Range(item.to_string());
                let (lo, hi) = (port_number(lo).ok_or_else(bad)?, port_number(hi).ok_or_else(bad)?);
                if lo > hi {
                    return Err(bad());
                }
                wanted.extend(lo..=hi);
            }
            None => {
                wanted.insert(port_number(item).ok_or_else(|| PortSpecError::Port(item.to_string()))?);
            }
        }
    }
    if wanted.is_empty() {
        return Err(PortSpecError::Empty);
    }
    Ok(wanted.into_iter().collect())
}

fn port_number(s: &str) -> Option<u16> {
    s.trim().parse::<u16>().ok().filter(|&p| p != 0)
}

/// Default commonly-used ports if none are specified.
pub fn default_top_ports() -> Vec<u16> { top_ports(100) }

/// Return the first N ports from a curated list of commonly-used ports, ascending.
pub fn top_ports(n: usize) -> Vec<u16> {
    const CURATED: &[u16] = &[
        22, 80, 443, 21, 23, 25, 53, 3389, 445, 139, 137, 135, 8080, 3306, 110, 143, 20, 111,
        993, 995, 587, 465, 161, 389, 636, 1723, 5900, 8443, 8000, 548, 631, 1433, 1521, 2049,
        3000, 5000, 5432, 6379, 9100, 62078, 5060, 1080, 3128, 8081, 8888, 9000, 9090, 9200,
        10000, 11211, 27017, 5601, 5672, 15672, 9092, 2375, 2376, 5985, 5986, 7001, 8200, 8500,
        1194, 500, 4500, 1352, 3268, 4444, 6000, 6001, 7000, 7070, 8008, 8009, 8010, 8088, 8181,
        8444, 8880, 9001, 9418, 9443, 9999, 49152, 49153, 49154, 990, 992, 873, 179, 199, 444,
        515, 554, 1025, 1026, 2000, 2001, 3001,
    ];
    let take = n.min(CURATED.len());
    let mut v = CURATED[..take].to_vec();
    v.sort_unstable();
    v.dedup();
    v
}

/// Limits applied while enumerating one host's ports.
#[derive(Clone)]
pub struct ScanLimits {
    pub timeout_per_port: Duration,
    pub per_host_concurrency: usize,
    pub retries: u32,
    pub retry_delay: Duration,
    /// Pacing shared by every host of a batch.
    pub qps: Option<RateLimiter>,
    /// Connection cap shared by every host of a batch.
    pub global: Option<Arc<Semaphore>>,
}

impl Default for ScanLimits {
    fn default() -> Self {
        ScanLimits {
            timeout_per_port: Duration::from_millis(500),
            per_host_concurrency: 64,
            retries: 0,
            retry_delay: Duration::from_millis(50),
            qps: None,
            global: None,
        }
    }
}

enum Attempt {
    State(PortState),
    Hard(String),
}

/// Enumerate `ports` on `ip`. Every port ends up open, closed (refused) or filtered (no answer).
/// Fails only when every attempt hit a hard network error such as a reset or a missing route.
pub async fn scan_ports(ip: IpAddr, ports: &[u16], limits: &ScanLimits) -> Result<Vec<PortProbe>, ProbeError> {
    let host_sem = Arc::new(Semaphore::new(limits.per_host_concurrency.max(1)));
    // dropping the set aborts every attempt still waiting on a permit or a connect
    let mut attempts = JoinSet::new();
    for &port in ports {
        let host_sem = host_sem.clone();
        let limits = limits.clone();
        attempts.spawn(async move {
            let _host_permit = host_sem.acquire_owned().await.ok();
            let _global_permit = match &limits.global {
                Some(g) => g.clone().acquire_owned().await.ok(),
                None => None,
            };
            (port, connect_with_retries(SocketAddr::new(ip, port), &limits).await)
        });
    }

    let mut out = Vec::with_capacity(ports.len());
    let mut hard: Option<String> = None;
    let mut answered = 0usize;
    while let Some(joined) = attempts.join_next().await {
        let (port, attempt) = match joined {
            Ok(done) => done,
            Err(e) => {
                hard.get_or_insert(e.to_string());
                continue;
            }
        };
        match attempt {
            Attempt::State(state) => {
                answered += 1;
                out.push(PortProbe::new(port, state));
            }
            Attempt::Hard(msg) => {
                hard.get_or_insert(msg);
                out.push(PortProbe::new(port, PortState::Filtered));
            }
        }
    }
    // a crashed attempt still leaves its port in the result
    let reported: BTreeSet<u16> = out.iter().map(|p| p.port).collect();
    for &port in ports {
        if !reported.contains(&port) {
            out.push(PortProbe::new(port, PortState::Filtered));
        }
    }
    if answered == 0 {
        if let Some(msg) = hard {
            return Err(ProbeError::Connect(msg));
        }
    }
    out.sort_by_key(|p| p.port);
    Ok(out)
}

async fn connect_with_retries(addr: SocketAddr, limits: &ScanLimits) -> Attempt {
    let mut attempts = 0;
    loop {
        if let Some(q) = &limits.qps { q.acquire().await; }
        let result = match timeout(limits.timeout_per_port, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => return Attempt::State(PortState::Open),
            Ok(Err(e)) if e.kind() == ErrorKind::ConnectionRefused => return Attempt::State(PortState::Closed),
            Ok(Err(e)) => Attempt::Hard(e.to_string()),
            Err(_) => Attempt::State(PortState::Filtered),
        };
        attempts += 1;
        if attempts > limits.retries {
            return result;
        }
        let base = limits.retry_delay.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << attempts.min(6)); // cap growth
        let jitter = thread_rng().gen_range(0..(exp / 4 + 1));
        tokio::time::sleep(Duration::from_millis(exp + jitter)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn port_lists_mix_singles_and_ranges() {
        assert_eq!(parse_ports("443, 22 80").unwrap(), vec![22, 80, 443]);
        assert_eq!(parse_ports("8079-8081,8080 65535").unwrap(), vec![8079, 8080, 8081, 65535]);
    }

    #[test]
    fn bad_port_lists_name_the_offending_item() {
        assert_eq!(parse_ports(" , "), Err(PortSpecError::Empty));
        assert_eq!(parse_ports("22,0"), Err(PortSpecError::Port("0".into())));
        assert_eq!(parse_ports("ssh"), Err(PortSpecError::Port("ssh".into())));
        assert_eq!(parse_ports("100-65536"), Err(PortSpecError::Range("100-65536".into())));
        assert_eq!(parse_ports("10-5"), Err(PortSpecError::Range("10-5".into())));
    }

    #[test]
    fn top_ports_are_sorted_and_bounded() {
        let v = top_ports(5);
        assert_eq!(v, vec![21, 22, 23, 80, 443]);
        assert!(top_ports(10_000).len() <= 110);
    }

    #[tokio::test]
    async fn open_and_closed_ports_are_told_apart() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open = listener.local_addr().unwrap().port();
        let closed = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let probes = scan_ports(IpAddr::from([127, 0, 0, 1]), &[closed, open], &ScanLimits::default()).await.unwrap();
        let state_of = |p: u16| probes.iter().find(|x| x.port == p).map(|x| x.state);
        assert_eq!(state_of(open), Some(PortState::Open));
        assert_eq!(state_of(closed), Some(PortState::Closed));
    }

    #[tokio::test]
    async fn aborting_a_scan_releases_its_attempts() {
        let global = Arc::new(Semaphore::new(0));
        let limits = ScanLimits { global: Some(global.clone()), ..Default::default() };
        let scan = tokio::spawn(async move { scan_ports(IpAddr::from([127, 0, 0, 1]), &[1, 2, 3], &limits).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(Arc::strong_count(&global) > 2);

        scan.abort();
        assert!(scan.await.unwrap_err().is_cancelled());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(Arc::strong_count(&global), 1);
    }
}
