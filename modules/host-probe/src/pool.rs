//! Bounded worker pool that probes a host list and assembles one [`ScanBatch`].

use crate::prober::HostProber;
use netsurvey_core::{normalize, BatchError, ProbeError, RawProbe, ScanBatch};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const DEFAULT_WORKERS: usize = 32;

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Probes in flight at once.
    pub workers: usize,
    /// Upper bound for one host's whole probe.
    pub host_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        PoolOptions { workers: DEFAULT_WORKERS, host_timeout: Duration::from_secs(60) }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct SkippedHost {
    pub ip: IpAddr,
    pub cause: ProbeError,
}

#[derive(Debug, Clone)]
pub struct DroppedRecord {
    pub ip: IpAddr,
    pub error: BatchError,
}

#[derive(Debug)]
pub struct BatchOutcome {
    pub batch: ScanBatch,
    pub skipped: Vec<SkippedHost>,
    pub dropped: Vec<DroppedRecord>,
    /// Hosts never started because the run was cancelled.
    pub unscheduled: usize,
    pub cancelled: bool,
}

impl BatchOutcome {
    pub fn scanned(&self) -> usize {
        self.batch.len() + self.skipped.len() + self.dropped.len()
    }
}

/// Probe every host with at most `opts.workers` probes in flight. Per-host failures are isolated
/// into `skipped`; records that fail normalization or batch checks land in `dropped`.
/// Cancelling `cancel` stops scheduling; probes already running finish or time out.
pub async fn probe_batch(
    hosts: Vec<IpAddr>,
    prober: Arc<dyn HostProber>,
    opts: &PoolOptions,
    cancel: CancellationToken,
    progress: Option<watch::Sender<Progress>>,
) -> BatchOutcome {
    let total = hosts.len();
    let progress = progress.map(Arc::new);
    if let Some(tx) = &progress {
        tx.send_modify(|p| *p = Progress { completed: 0, failed: 0, total });
    }

    let mut batch = ScanBatch::starting_now();
    let sem = Arc::new(Semaphore::new(opts.workers.max(1)));
    let mut handles = Vec::with_capacity(total);
    let mut unscheduled = 0;
    let mut cancelled = false;

    for (i, ip) in hosts.iter().copied().enumerate() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                cancelled = true;
                unscheduled = total - i;
                break;
            }
            p = sem.clone().acquire_owned() => match p {
                Ok(p) => p,
                Err(_) => break,
            },
        };
        let prober = prober.clone();
        let progress = progress.clone();
        let limit = opts.host_timeout;
        handles.push((ip, tokio::spawn(async move {
            let res = run_one(prober, ip, limit).await;
            drop(permit);
            if let Some(tx) = &progress {
                tx.send_modify(|p| {
                    p.completed += 1;
                    if res.is_err() {
                        p.failed += 1;
                    }
                });
            }
            res
        })));
    }

    let mut skipped = Vec::new();
    let mut dropped = Vec::new();
    for (ip, h) in handles {
        let res = h.await.unwrap_or_else(|e| Err(ProbeError::Aborted(e.to_string())));
        match res {
            Ok(raw) => {
                let pushed = normalize(&raw, batch.timestamp()).map_err(BatchError::from).and_then(|rec| batch.push(rec));
                if let Err(e) = pushed {
                    error!(%ip, error = %e, "record dropped");
                    dropped.push(DroppedRecord { ip, error: e });
                }
            }
            Err(cause) => {
                warn!(%ip, %cause, "host skipped");
                skipped.push(SkippedHost { ip, cause });
            }
        }
    }

    info!(
        hosts = total,
        records = batch.len(),
        skipped = skipped.len(),
        dropped = dropped.len(),
        unscheduled,
        cancelled,
        "probe batch finished"
    );
    BatchOutcome { batch, skipped, dropped, unscheduled, cancelled }
}

/// Run one probe in its own task so a panic or overrun is contained to this host.
async fn run_one(prober: Arc<dyn HostProber>, ip: IpAddr, limit: Duration) -> Result<RawProbe, ProbeError> {
    let mut handle = tokio::spawn(async move { prober.probe(ip).await });
    match timeout(limit, &mut handle).await {
        Ok(Ok(res)) => res,
        Ok(Err(join)) => Err(ProbeError::Aborted(join.to_string())),
        Err(_) => {
            handle.abort();
            Err(ProbeError::Timeout(limit))
        }
    }
}
